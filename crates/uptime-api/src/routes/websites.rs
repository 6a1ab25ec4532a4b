use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use uptime_core::{CheckInterval, CheckReport, MonitoredResource, ResourceStatus, ResourceUpdate};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WebsiteRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    pub interval: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub is_active: bool,
}

/// A resource as returned by the API, with derived fields.
#[derive(Debug, Serialize)]
pub struct WebsiteView {
    #[serde(flatten)]
    pub resource: MonitoredResource,
    pub uptime_percentage: f64,
    pub monitoring: bool,
}

#[derive(Serialize)]
pub struct WebsiteResponse {
    pub website: WebsiteView,
}

#[derive(Serialize)]
pub struct WebsitesResponse {
    pub websites: Vec<WebsiteView>,
}

#[derive(Serialize)]
pub struct CheckResponse {
    pub website: WebsiteView,
    pub report: CheckReport,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Default, Serialize)]
pub struct OwnerStats {
    pub total_websites: usize,
    pub active_websites: usize,
    pub online_websites: usize,
    pub offline_websites: usize,
    pub warning_websites: usize,
    pub average_response_time_ms: f64,
    pub average_uptime: f64,
    pub total_checks: u64,
    pub successful_checks: u64,
    pub failed_checks: u64,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub stats: OwnerStats,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/owners/{owner}/websites",
            get(list_websites).post(create_website),
        )
        .route(
            "/owners/{owner}/websites/{id}",
            get(get_website).put(update_website).delete(delete_website),
        )
        .route("/owners/{owner}/websites/{id}/toggle", patch(toggle_website))
        .route("/owners/{owner}/websites/{id}/check", post(check_website))
        .route("/owners/{owner}/stats", get(owner_stats))
}

fn is_valid_url(s: &str) -> bool {
    url::Url::parse(s)
        .map(|u| u.scheme() == "http" || u.scheme() == "https")
        .unwrap_or(false)
}

struct ValidWebsite {
    name: String,
    url: String,
    interval: CheckInterval,
}

fn validate(body: WebsiteRequest) -> Result<ValidWebsite, ApiError> {
    let name = body.name.trim();
    let url = body.url.trim();
    if name.is_empty() || url.is_empty() {
        return Err(ApiError::BadRequest("Name and URL are required".into()));
    }
    if !is_valid_url(url) {
        return Err(ApiError::BadRequest(format!("Invalid URL: {}", url)));
    }
    let interval = body
        .interval
        .as_deref()
        .and_then(|raw| raw.parse::<CheckInterval>().ok())
        .ok_or_else(|| {
            ApiError::BadRequest("Invalid interval. Must be 1min, 5min, or 30min".into())
        })?;
    Ok(ValidWebsite {
        name: name.to_string(),
        url: url.to_string(),
        interval,
    })
}

async fn view(state: &AppState, resource: MonitoredResource) -> WebsiteView {
    let monitoring = state.engine.is_monitoring(&resource.id).await;
    WebsiteView {
        uptime_percentage: resource.uptime_percentage(),
        resource,
        monitoring,
    }
}

/// Load a resource, treating one owned by someone else as missing.
async fn owned_resource(
    state: &AppState,
    owner: &str,
    id: &str,
) -> Result<MonitoredResource, ApiError> {
    match state.store.get(id).await? {
        Some(r) if r.owner_id == owner => Ok(r),
        _ => Err(ApiError::NotFound(format!("Website {} not found", id))),
    }
}

/// GET /api/v1/owners/{owner}/websites
async fn list_websites(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<WebsitesResponse>, ApiError> {
    let resources = state.store.list_for_owner(&owner).await?;
    let mut websites = Vec::with_capacity(resources.len());
    for r in resources {
        websites.push(view(&state, r).await);
    }
    Ok(Json(WebsitesResponse { websites }))
}

/// POST /api/v1/owners/{owner}/websites
async fn create_website(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Json(body): Json<WebsiteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let valid = validate(body)?;
    let resource = MonitoredResource::new(owner, valid.name, valid.url, valid.interval);
    let created = state.store.insert(resource).await?;
    info!(resource_id = %created.id, url = %created.target_url, "Website created");

    state.engine.start(created.clone()).await?;

    let website = view(&state, created).await;
    Ok((StatusCode::CREATED, Json(WebsiteResponse { website })))
}

/// GET /api/v1/owners/{owner}/websites/{id}
async fn get_website(
    State(state): State<AppState>,
    Path((owner, id)): Path<(String, String)>,
) -> Result<Json<WebsiteResponse>, ApiError> {
    let resource = owned_resource(&state, &owner, &id).await?;
    let website = view(&state, resource).await;
    Ok(Json(WebsiteResponse { website }))
}

/// PUT /api/v1/owners/{owner}/websites/{id}
async fn update_website(
    State(state): State<AppState>,
    Path((owner, id)): Path<(String, String)>,
    Json(body): Json<WebsiteRequest>,
) -> Result<Json<WebsiteResponse>, ApiError> {
    let valid = validate(body)?;
    let existing = owned_resource(&state, &owner, &id).await?;

    let updated = state
        .store
        .update(
            &id,
            ResourceUpdate {
                name: Some(valid.name),
                target_url: Some(valid.url),
                check_interval: Some(valid.interval),
                is_active: None,
            },
        )
        .await?;

    if existing.check_interval != updated.check_interval || existing.is_active {
        state.engine.restart(updated.clone()).await?;
    }

    let website = view(&state, updated).await;
    Ok(Json(WebsiteResponse { website }))
}

/// PATCH /api/v1/owners/{owner}/websites/{id}/toggle
async fn toggle_website(
    State(state): State<AppState>,
    Path((owner, id)): Path<(String, String)>,
    Json(body): Json<ToggleRequest>,
) -> Result<Json<WebsiteResponse>, ApiError> {
    owned_resource(&state, &owner, &id).await?;

    let updated = state
        .store
        .update(
            &id,
            ResourceUpdate {
                is_active: Some(body.is_active),
                ..Default::default()
            },
        )
        .await?;

    if body.is_active {
        state.engine.start(updated.clone()).await?;
    } else {
        state.engine.stop(&id).await;
    }

    let website = view(&state, updated).await;
    Ok(Json(WebsiteResponse { website }))
}

/// DELETE /api/v1/owners/{owner}/websites/{id}
async fn delete_website(
    State(state): State<AppState>,
    Path((owner, id)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    owned_resource(&state, &owner, &id).await?;

    state.engine.stop(&id).await;
    state.store.remove(&id).await?;
    info!(resource_id = %id, "Website deleted");

    Ok(Json(MessageResponse {
        message: "Website deleted successfully".into(),
    }))
}

/// POST /api/v1/owners/{owner}/websites/{id}/check
async fn check_website(
    State(state): State<AppState>,
    Path((owner, id)): Path<(String, String)>,
) -> Result<Json<CheckResponse>, ApiError> {
    let resource = owned_resource(&state, &owner, &id).await?;
    let report = state.engine.perform_check(&resource).await;

    let refreshed = owned_resource(&state, &owner, &id).await?;
    let website = view(&state, refreshed).await;
    Ok(Json(CheckResponse { website, report }))
}

/// GET /api/v1/owners/{owner}/stats
async fn owner_stats(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<StatsResponse>, ApiError> {
    let resources = state.store.list_for_owner(&owner).await?;
    Ok(Json(StatsResponse {
        stats: summarize(&resources),
    }))
}

fn summarize(resources: &[MonitoredResource]) -> OwnerStats {
    if resources.is_empty() {
        return OwnerStats::default();
    }
    let count_status = |status| resources.iter().filter(|r| r.status == status).count();
    let n = resources.len() as f64;

    OwnerStats {
        total_websites: resources.len(),
        active_websites: resources.iter().filter(|r| r.is_active).count(),
        online_websites: count_status(ResourceStatus::Online),
        offline_websites: count_status(ResourceStatus::Offline),
        warning_websites: count_status(ResourceStatus::Warning),
        average_response_time_ms: resources.iter().map(|r| r.response_time_ms as f64).sum::<f64>()
            / n,
        average_uptime: resources.iter().map(|r| r.uptime_percentage()).sum::<f64>() / n,
        total_checks: resources.iter().map(|r| r.total_checks).sum(),
        successful_checks: resources.iter().map(|r| r.successful_checks).sum(),
        failed_checks: resources.iter().map(|r| r.failed_checks).sum(),
    }
}
