use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use portal_core::error::AppError;
use serde::Serialize;

use crate::forms::{
    normalize_phone, ChangePasswordForm, SendOtpForm, UpdateProfileForm, VerifyOtpForm,
};
use crate::middleware::auth::AuthToken;
use crate::models::{OtpDispatch, Profile};
use crate::services::Claim;
use crate::utils::validation::ValidatedJson;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub profile: Profile,
    pub initials: String,
}

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        Self {
            initials: profile.initials(),
            profile,
        }
    }
}

pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthToken,
) -> Result<Json<ProfileResponse>, AppError> {
    Ok(Json(state.backend.profile(&auth.token).await?.into()))
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthToken,
    ValidatedJson(form): ValidatedJson<UpdateProfileForm>,
) -> Result<Json<ProfileResponse>, AppError> {
    let profile = state.backend.update_profile(&auth.token, &form).await?;
    tracing::info!(session = %auth.session, "Profile updated");
    Ok(Json(profile.into()))
}

pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthToken,
    ValidatedJson(form): ValidatedJson<ChangePasswordForm>,
) -> Result<StatusCode, AppError> {
    state.backend.change_password(&auth.token, &form).await?;
    tracing::info!(session = %auth.session, "Password changed");
    Ok(StatusCode::NO_CONTENT)
}

fn otp_operation(auth: &AuthToken, phone: &str) -> String {
    format!("otp:{}:{}", auth.session.as_str(), normalize_phone(phone))
}

/// Send a WhatsApp verification code. Repeated submissions while a send is in
/// flight, or shortly after one succeeded, do not send another code.
pub async fn send_whatsapp_otp(
    State(state): State<AppState>,
    auth: AuthToken,
    ValidatedJson(form): ValidatedJson<SendOtpForm>,
) -> Result<Json<OtpDispatch>, AppError> {
    let operation = otp_operation(&auth, &form.phone);

    let key = match state.idempotency.claim(&operation, Utc::now()) {
        Claim::Fresh(key) => key,
        Claim::InFlight => {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "A code is already being sent"
            )))
        }
        Claim::Completed => {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "A code was sent recently, check WhatsApp"
            )))
        }
    };

    let claim = state.idempotency.guard(operation);
    match state
        .backend
        .send_whatsapp_otp(&auth.token, &form.phone, &key.to_string())
        .await
    {
        Ok(dispatch) => {
            claim.complete(Utc::now());
            tracing::info!(session = %auth.session, "WhatsApp OTP sent");
            Ok(Json(dispatch))
        }
        Err(e) => {
            claim.release();
            Err(e)
        }
    }
}

pub async fn verify_whatsapp_otp(
    State(state): State<AppState>,
    auth: AuthToken,
    ValidatedJson(form): ValidatedJson<VerifyOtpForm>,
) -> Result<Json<ProfileResponse>, AppError> {
    let profile = state.backend.verify_whatsapp_otp(&auth.token, &form).await?;

    // the number is verified; a later send starts a new operation
    state.idempotency.forget(&otp_operation(&auth, &form.phone));

    tracing::info!(session = %auth.session, verified = profile.whatsapp_verified, "WhatsApp OTP verified");
    Ok(Json(profile.into()))
}
