use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use portal_core::middleware::{request_id_middleware, REQUEST_ID_HEADER};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    app::health_check,
    orders::order_status,
    payments::{
        checkout_event, mount_watch, start_checkout, unmount_watch, verify_payment, view_watch,
    },
    profile::{
        change_password, get_profile, send_whatsapp_otp, update_profile, verify_whatsapp_otp,
    },
    receipts::{get_receipt, print_receipt},
    subscription::{current_subscription, gate, plans, subscription_history, upgrade},
};
use crate::AppState;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/subscription/current", get(current_subscription))
        .route("/subscription/history", get(subscription_history))
        .route("/subscription/plans", get(plans))
        .route("/subscription/gate", get(gate))
        .route("/subscription/upgrade", post(upgrade))
        .route(
            "/payments/:code/watch",
            post(mount_watch).get(view_watch).delete(unmount_watch),
        )
        .route("/payments/:code/checkout", post(start_checkout))
        .route("/payments/:code/checkout/events", post(checkout_event))
        .route("/payments/:code/verify", post(verify_payment))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/profile/password", post(change_password))
        .route("/profile/whatsapp/otp", post(send_whatsapp_otp))
        .route("/profile/whatsapp/verify", post(verify_whatsapp_otp))
        .route("/orders/:number", get(order_status))
        .route("/receipts/:token", get(get_receipt))
        .route("/receipts/:token/print", get(print_receipt));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// One housekeeping pass: expired idempotency entries, stale payment pages
/// and idle sessions.
pub fn sweep(state: &AppState, now: DateTime<Utc>) {
    let session = &state.settings.session;
    let claims = state.idempotency.purge_expired(now);
    let pages = state
        .pages
        .purge(now, chrono::Duration::seconds(session.page_idle_secs));
    let sessions = state
        .sessions
        .purge_idle(now, chrono::Duration::seconds(session.idle_ttl_secs));

    if claims + pages + sessions > 0 {
        tracing::debug!(claims, pages, sessions, "Housekeeping sweep");
    }
}

/// Run [`sweep`] every minute until `shutdown` fires.
pub fn spawn_housekeeping(state: &AppState, shutdown: CancellationToken) {
    let state = state.clone();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Housekeeping stopped");
                    break;
                }
                _ = ticker.tick() => sweep(&state, Utc::now()),
            }
        }
    });
}
