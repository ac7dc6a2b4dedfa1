use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::error::Error;
use crate::geo::{check_lat, check_lon, LatLon};
use crate::search::SearchPage;
use crate::store::{Business, BusinessId, BusinessUpdate, NewBusiness};

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

pub(super) struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::InvalidCoordinate { .. } | Error::InvalidQuery(_) | Error::InvalidKey(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Cancelled(_) => StatusCode::REQUEST_TIMEOUT,
            Error::Reconciliation(_) | Error::Storage(_) | Error::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        ApiError(status, err.to_string())
    }
}

// ─── GET / and GET /ping ─────────────────────────────────────────

pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "service": "vicinity",
        "message": "geohash proximity search for businesses",
    }))
}

pub async fn ping() -> Json<serde_json::Value> {
    Json(json!({ "message": "pong" }))
}

// ─── GET /v1/nearby/search ───────────────────────────────────────

#[derive(Deserialize)]
pub struct NearbyQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Search radius in meters.
    pub radius: Option<f64>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub async fn nearby_search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NearbyQuery>,
) -> Result<Json<SearchPage>, ApiError> {
    let start = Instant::now();

    let (lat, lon) = match (params.lat, params.lon) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "Provide 'lat' and 'lon' parameters",
            ))
        }
    };
    let radius = params
        .radius
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Missing 'radius' parameter"))?;
    let limit = params.limit.unwrap_or(state.default_limit);
    let offset = params.offset.unwrap_or(0);

    let page = state.search.search(lat, lon, radius, limit, offset).await?;

    info!(
        lat,
        lon,
        radius,
        results = page.results.len(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "GET /v1/nearby/search"
    );
    Ok(Json(page))
}

// ─── POST /v1/businesses ─────────────────────────────────────────

pub async fn create_business(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewBusiness>,
) -> Result<(StatusCode, Json<Business>), ApiError> {
    LatLon::new(payload.latitude, payload.longitude)?;
    if payload.name.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Business name must not be empty"));
    }

    let business = state.store.create(payload).await?;
    state.maintainer.on_create(&business).await?;

    info!(id = business.id, name = %business.name, "POST /v1/businesses");
    Ok((StatusCode::CREATED, Json(business)))
}

// ─── GET /v1/businesses/{id} ─────────────────────────────────────

pub async fn get_business(
    State(state): State<Arc<AppState>>,
    Path(id): Path<BusinessId>,
) -> Result<Json<Business>, ApiError> {
    let business = state
        .store
        .get(id)
        .await?
        .ok_or_else(|| Error::not_found(format!("business {id}")))?;
    Ok(Json(business))
}

// ─── PUT /v1/businesses/{id} ─────────────────────────────────────

pub async fn update_business(
    State(state): State<Arc<AppState>>,
    Path(id): Path<BusinessId>,
    Json(payload): Json<BusinessUpdate>,
) -> Result<Json<Business>, ApiError> {
    // stored coordinates are always valid, so checking the supplied
    // fields alone covers the merged position
    if let Some(lat) = payload.latitude {
        check_lat(lat)?;
    }
    if let Some(lon) = payload.longitude {
        check_lon(lon)?;
    }
    if let Some(ref name) = payload.name {
        if name.trim().is_empty() {
            return Err(api_error(StatusCode::BAD_REQUEST, "Business name must not be empty"));
        }
    }

    // the maintainer gets the pre-image the store actually replaced;
    // a separate get here would race concurrent updates and leave the
    // winner's index entry behind
    let outcome = state.store.update(id, payload).await?;
    state
        .maintainer
        .on_update(&outcome.previous, &outcome.updated)
        .await?;

    info!(id, "PUT /v1/businesses");
    Ok(Json(outcome.updated))
}

// ─── DELETE /v1/businesses/{id} ──────────────────────────────────

pub async fn delete_business(
    State(state): State<Arc<AppState>>,
    Path(id): Path<BusinessId>,
) -> Result<StatusCode, ApiError> {
    state.store.delete(id).await?;
    state.maintainer.on_delete(id).await?;

    info!(id, "DELETE /v1/businesses");
    Ok(StatusCode::NO_CONTENT)
}
