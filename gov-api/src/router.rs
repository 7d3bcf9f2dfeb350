use std::future::ready;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers::{endpoints, health, metrics as metrics_handlers, policies, schemas, topics};
use crate::metrics::{setup_metrics_recorder, track_metrics};
use crate::state::AppState;

/// Builds the full HTTP surface over `AppState`, mirroring
/// `capture::router::router`'s shape: one `Router::new()` with routes,
/// trace/metrics middleware layered on, and state attached last.
pub fn router(state: AppState) -> Router {
    let export_prometheus = state.config.export_prometheus;

    let app = Router::new()
        .route("/_health", get(health::health))
        .route("/topics", get(topics::list))
        .route("/topics/batch/dry-run", post(topics::dry_run))
        .route("/topics/batch/apply", post(topics::apply))
        .route("/topics/bulk-delete", post(topics::bulk_delete))
        .route("/metrics/topics/:name", get(metrics_handlers::topic_metrics))
        .route("/metrics/sync", post(metrics_handlers::sync))
        .route("/schemas/batch/dry-run", post(schemas::dry_run))
        .route("/schemas/batch/apply", post(schemas::apply))
        .route("/schemas/upload", post(schemas::upload))
        .route("/schemas/subjects/:subject", delete(schemas::delete_subject))
        .route("/policies", post(policies::create))
        .route("/policies/active", get(policies::list_active))
        .route("/policies/:policy_id", put(policies::update))
        .route("/policies/:policy_id/versions", get(policies::versions))
        .route("/policies/:policy_id/:version", get(policies::get).delete(policies::delete))
        .route("/policies/:policy_id/:version/activate", post(policies::activate))
        .route("/policies/:policy_id/:version/archive", post(policies::archive))
        .route("/policies/:policy_id/:version/rollback", post(policies::rollback))
        .route("/endpoints", post(endpoints::upsert).get(endpoints::list_active))
        .route("/endpoints/:kind/:id", get(endpoints::get).delete(endpoints::deactivate))
        .route("/endpoints/:kind/:id/test", post(endpoints::test_connection))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(state);

    if export_prometheus {
        let recorder_handle = setup_metrics_recorder();
        app.route("/metrics", get(move || ready(recorder_handle.render())))
    } else {
        app
    }
}
