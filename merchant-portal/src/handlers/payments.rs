use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use portal_core::error::AppError;
use serde::{Deserialize, Serialize};

use crate::flows::{verify_after_payment, PageView, Verification, VerificationPolicy};
use crate::middleware::auth::AuthToken;
use crate::services::{CheckoutClientConfig, CheckoutEvent, CheckoutInvoker};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct WatchQuery {
    #[serde(default)]
    pub refresh: bool,
}

/// Mount the payment-pending page and start polling.
pub async fn mount_watch(
    State(state): State<AppState>,
    auth: AuthToken,
    Path(code): Path<String>,
) -> Result<(StatusCode, Json<PageView>), AppError> {
    let page = state.pages.mount(state.page_context(&auth), &code);
    Ok((StatusCode::CREATED, Json(page.view())))
}

pub async fn view_watch(
    State(state): State<AppState>,
    auth: AuthToken,
    Path(code): Path<String>,
    Query(query): Query<WatchQuery>,
) -> Result<Json<PageView>, AppError> {
    let page = state
        .pages
        .get(&auth.session, &code)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("No payment page for {}", code)))?;

    let view = if query.refresh {
        page.refresh().await
    } else {
        page.view()
    };
    Ok(Json(view))
}

pub async fn unmount_watch(
    State(state): State<AppState>,
    auth: AuthToken,
    Path(code): Path<String>,
) -> StatusCode {
    state.pages.unmount(&auth.session, &code);
    StatusCode::NO_CONTENT
}

/// Fetch a payment token and open the hosted checkout. Mounts the page if the
/// browser opened checkout without one.
pub async fn start_checkout(
    State(state): State<AppState>,
    auth: AuthToken,
    Path(code): Path<String>,
) -> Result<Json<CheckoutClientConfig>, AppError> {
    let page = match state.pages.get(&auth.session, &code) {
        Some(page) => page,
        None => state.pages.mount(state.page_context(&auth), &code),
    };

    Ok(Json(page.start_checkout().await?))
}

#[derive(Debug, Serialize)]
pub struct EventAck {
    pub delivered: bool,
}

/// Widget callbacks relayed by the browser. Only the session that opened the
/// checkout can answer it.
pub async fn checkout_event(
    State(state): State<AppState>,
    auth: AuthToken,
    Path(code): Path<String>,
    Json(event): Json<CheckoutEvent>,
) -> (StatusCode, Json<EventAck>) {
    let delivered = state.checkout.deliver(&auth.session, &code, event);
    let status = if delivered {
        StatusCode::ACCEPTED
    } else {
        StatusCode::GONE
    };
    (status, Json(EventAck { delivered }))
}

/// Payment-success page: verify activation, then tell the browser where to go.
pub async fn verify_payment(
    State(state): State<AppState>,
    auth: AuthToken,
    Path(code): Path<String>,
) -> Result<Json<Verification>, AppError> {
    let verification = verify_after_payment(
        state.backend.as_ref(),
        &state.idempotency,
        &state.session(&auth),
        &auth.token,
        &code,
        VerificationPolicy::from(&state.settings.polling),
    )
    .await;

    Ok(Json(verification))
}
