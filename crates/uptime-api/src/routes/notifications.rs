use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use uptime_core::Notification;

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

#[derive(Serialize)]
pub struct NotificationsResponse {
    pub notifications: Vec<Notification>,
    pub total: usize,
    pub unread: usize,
    pub has_more: bool,
}

#[derive(Serialize)]
pub struct MarkedResponse {
    pub marked: usize,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/owners/{owner}/notifications", get(list_notifications))
        .route("/owners/{owner}/notifications/read", post(mark_all_read))
        .route("/owners/{owner}/notifications/{id}/read", post(mark_read))
}

/// GET /api/v1/owners/{owner}/notifications
async fn list_notifications(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Query(page): Query<PageQuery>,
) -> Json<NotificationsResponse> {
    let limit = page.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_PAGE_SIZE);
    let skip = page.skip.unwrap_or(0);
    let (notifications, total) = state.notifications.list(&owner, limit, skip);
    Json(NotificationsResponse {
        has_more: total > skip + notifications.len(),
        unread: state.notifications.unread_count(&owner),
        notifications,
        total,
    })
}

/// POST /api/v1/owners/{owner}/notifications/read
async fn mark_all_read(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Json<MarkedResponse> {
    Json(MarkedResponse {
        marked: state.notifications.mark_all_read(&owner),
    })
}

/// POST /api/v1/owners/{owner}/notifications/{id}/read
async fn mark_read(
    State(state): State<AppState>,
    Path((owner, id)): Path<(String, String)>,
) -> Result<Json<MarkedResponse>, ApiError> {
    if state.notifications.mark_read(&owner, &id) {
        Ok(Json(MarkedResponse { marked: 1 }))
    } else {
        Err(ApiError::NotFound(format!("Notification {} not found", id)))
    }
}
