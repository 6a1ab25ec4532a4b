mod monitoring;
mod notifications;
mod websites;

use axum::Router;

use crate::state::AppState;

pub use websites::WebsiteView;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(websites::router())
        .merge(notifications::router())
        .merge(monitoring::router())
}
