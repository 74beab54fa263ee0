use axum::{extract::State, Json};
use chrono::Utc;
use portal_core::error::AppError;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::flows::{check_subscription_gate, GateDecision, PageView};
use crate::middleware::auth::AuthToken;
use crate::models::{Plan, Subscription};
use crate::services::SubscriptionBackend;
use crate::utils::validation::ValidatedJson;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CurrentSubscriptionResponse {
    pub subscription: Option<Subscription>,
    pub days_remaining: Option<i64>,
}

pub async fn current_subscription(
    State(state): State<AppState>,
    auth: AuthToken,
) -> Result<Json<CurrentSubscriptionResponse>, AppError> {
    let subscription = match state.backend.current_subscription(&auth.token).await {
        Ok(subscription) => subscription,
        Err(AppError::NotFound(_)) => None,
        Err(e) => return Err(e),
    };

    state.session(&auth).set_active_subscription(
        subscription
            .as_ref()
            .filter(|s| s.is_active())
            .map(|s| s.code.clone()),
    );

    Ok(Json(CurrentSubscriptionResponse {
        days_remaining: subscription
            .as_ref()
            .and_then(|s| s.days_remaining(Utc::now())),
        subscription,
    }))
}

pub async fn subscription_history(
    State(state): State<AppState>,
    auth: AuthToken,
) -> Result<Json<Vec<Subscription>>, AppError> {
    Ok(Json(state.backend.subscription_history(&auth.token).await?))
}

pub async fn plans(
    State(state): State<AppState>,
    auth: AuthToken,
) -> Result<Json<Vec<Plan>>, AppError> {
    Ok(Json(state.backend.plans(&auth.token).await?))
}

pub async fn gate(
    State(state): State<AppState>,
    auth: AuthToken,
) -> Result<Json<GateDecision>, AppError> {
    let decision = check_subscription_gate(
        state.backend.as_ref(),
        &state.session(&auth),
        &auth.token,
        Utc::now(),
    )
    .await?;

    Ok(Json(decision))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpgradeRequest {
    #[validate(length(min = 1, message = "Choose a plan"))]
    pub plan_code: String,
}

#[derive(Debug, Serialize)]
pub struct UpgradeResponse {
    pub subscription: Subscription,
    pub requires_payment: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_page: Option<PageView>,
}

/// Choose a plan. Paid plans mount the payment-pending page right away.
pub async fn upgrade(
    State(state): State<AppState>,
    auth: AuthToken,
    ValidatedJson(req): ValidatedJson<UpgradeRequest>,
) -> Result<Json<UpgradeResponse>, AppError> {
    let result = state
        .backend
        .upgrade_subscription(&auth.token, &req.plan_code)
        .await?;

    let session = state.session(&auth);
    let payment_page = if result.requires_payment {
        let page = state
            .pages
            .mount(state.page_context(&auth), &result.subscription.code);
        Some(page.view())
    } else {
        if result.subscription.is_active() {
            session.set_active_subscription(Some(result.subscription.code.clone()));
            session.grant_skip_check(Utc::now());
        }
        None
    };

    tracing::info!(
        session = %auth.session,
        plan_code = %req.plan_code,
        code = %result.subscription.code,
        requires_payment = result.requires_payment,
        "Subscription upgrade requested"
    );

    Ok(Json(UpgradeResponse {
        subscription: result.subscription,
        requires_payment: result.requires_payment,
        payment_page,
    }))
}
