use std::sync::Arc;

use crate::maintain::IndexMaintainer;
use crate::search::ProximityService;
use crate::store::BusinessStore;

pub struct AppState {
    pub store: Arc<dyn BusinessStore>,
    pub search: ProximityService,
    pub maintainer: IndexMaintainer,
    /// Page size when the query names none.
    pub default_limit: usize,
}
