//! Client for the POS REST backend.
//!
//! Every endpoint answers `{ success, data, message? }`. Non-2xx statuses are
//! mapped into the shared error taxonomy; `success: false` becomes
//! [`AppError::Rejected`] carrying the backend's message.

use crate::config::BackendSettings;
use crate::forms::{normalize_phone, ChangePasswordForm, UpdateProfileForm, VerifyOtpForm};
use crate::models::{
    ApiResponse, BusinessSummary, Order, OtpDispatch, PaymentStatusSnapshot, PaymentToken, Plan,
    Profile, Receipt, Subscription, UpgradeResult, VerifyResult,
};
use async_trait::async_trait;
use portal_core::error::AppError;
use portal_core::observability::{TracedClientExt, TracedRequest, IDEMPOTENCY_KEY_HEADER};
use portal_core::retry::{retry_http_call, RetryConfig};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde_json::json;

/// The slice of the backend the payment reconciliation flow depends on.
#[async_trait]
pub trait SubscriptionBackend: Send + Sync {
    async fn payment_status(
        &self,
        token: &str,
        code: &str,
    ) -> Result<PaymentStatusSnapshot, AppError>;

    async fn current_subscription(&self, token: &str) -> Result<Option<Subscription>, AppError>;

    async fn verify_subscription(
        &self,
        token: &str,
        code: &str,
        idempotency_key: &str,
    ) -> Result<VerifyResult, AppError>;

    async fn payment_token(&self, token: &str, code: &str) -> Result<PaymentToken, AppError>;

    async fn businesses(&self, token: &str) -> Result<Vec<BusinessSummary>, AppError>;
}

pub struct BackendClient {
    client: Client,
    settings: BackendSettings,
    read_retry: RetryConfig,
}

impl BackendClient {
    pub fn new(settings: BackendSettings) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            settings,
            read_retry: RetryConfig::quick(),
        })
    }

    /// Override the retry policy used for idempotent reads.
    pub fn with_read_retry(mut self, read_retry: RetryConfig) -> Self {
        self.read_retry = read_retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.settings.base_url
    }

    /// Build an endpoint URL; each segment is percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<String, AppError> {
        let mut url = Url::parse(&self.settings.base_url).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Invalid backend base_url '{}': {}",
                self.settings.base_url,
                e
            ))
        })?;

        url.path_segments_mut()
            .map_err(|_| {
                AppError::ConfigError(anyhow::anyhow!(
                    "Backend base_url '{}' cannot carry a path",
                    self.settings.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);

        Ok(url.to_string())
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: TracedRequest,
    ) -> Result<ApiResponse<T>, AppError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(operation, error = %e, "Backend request failed");
            AppError::from(e)
        })?;

        let status = response.status();
        let body = response.text().await.map_err(AppError::from)?;

        tracing::debug!(operation, status = %status, "Backend response");

        if !status.is_success() {
            let message = serde_json::from_str::<ApiResponse<serde_json::Value>>(&body)
                .ok()
                .and_then(|envelope| envelope.message)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("Unexpected response")
                        .to_string()
                });
            tracing::warn!(operation, status = %status, message = %message, "Backend returned error status");
            return Err(AppError::from_status(status.as_u16(), message));
        }

        let envelope: ApiResponse<T> = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(operation, error = %e, "Malformed backend response");
            AppError::InternalError(anyhow::anyhow!("Malformed response for {}: {}", operation, e))
        })?;

        Ok(envelope)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        operation: &str,
        segments: &[&str],
        token: Option<&str>,
    ) -> Result<Option<T>, AppError> {
        let url = self.endpoint(segments)?;
        let mut request = self.client.traced_get(&url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        self.execute(operation, request).await?.into_result()
    }

    /// GET with the quick retry policy for transient failures.
    async fn get_with_retry<T: DeserializeOwned>(
        &self,
        operation: &str,
        segments: &[&str],
        token: Option<&str>,
    ) -> Result<Option<T>, AppError> {
        retry_http_call(&self.read_retry, operation, || {
            self.get(operation, segments, token)
        })
        .await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: TracedRequest,
        body: &serde_json::Value,
    ) -> Result<ApiResponse<T>, AppError> {
        self.execute(operation, request.json(body)).await
    }

    pub async fn subscription_history(&self, token: &str) -> Result<Vec<Subscription>, AppError> {
        Ok(self
            .get_with_retry("subscription_history", &["subscriptions", "history"], Some(token))
            .await?
            .unwrap_or_default())
    }

    pub async fn plans(&self, token: &str) -> Result<Vec<Plan>, AppError> {
        Ok(self
            .get_with_retry("subscription_plans", &["subscriptions", "plans"], Some(token))
            .await?
            .unwrap_or_default())
    }

    pub async fn upgrade_subscription(
        &self,
        token: &str,
        plan_code: &str,
    ) -> Result<UpgradeResult, AppError> {
        let url = self.endpoint(&["subscriptions", "upgrade"])?;
        let request = self.client.traced_post(&url).bearer_auth(token);
        self.send_json::<UpgradeResult>(
            "upgrade_subscription",
            request,
            &json!({ "plan_code": plan_code }),
        )
        .await?
        .into_data("upgrade result")
    }

    pub async fn profile(&self, token: &str) -> Result<Profile, AppError> {
        self.get_with_retry::<Profile>("get_profile", &["profile"], Some(token))
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Profile not found")))
    }

    pub async fn update_profile(
        &self,
        token: &str,
        form: &UpdateProfileForm,
    ) -> Result<Profile, AppError> {
        let url = self.endpoint(&["profile"])?;
        let request = self.client.traced_put(&url).bearer_auth(token);
        let body = serde_json::to_value(form)?;
        self.send_json::<Profile>("update_profile", request, &body)
            .await?
            .into_data("profile")
    }

    pub async fn change_password(
        &self,
        token: &str,
        form: &ChangePasswordForm,
    ) -> Result<(), AppError> {
        let url = self.endpoint(&["profile", "password"])?;
        let request = self.client.traced_post(&url).bearer_auth(token);
        let body = json!({
            "current_password": form.current_password,
            "new_password": form.new_password,
            "new_password_confirmation": form.confirm_password,
        });
        self.send_json::<serde_json::Value>("change_password", request, &body)
            .await?
            .into_result()?;
        Ok(())
    }

    pub async fn send_whatsapp_otp(
        &self,
        token: &str,
        phone: &str,
        idempotency_key: &str,
    ) -> Result<OtpDispatch, AppError> {
        let url = self.endpoint(&["profile", "whatsapp", "otp"])?;
        let request = self
            .client
            .traced_post(&url)
            .bearer_auth(token)
            .header(IDEMPOTENCY_KEY_HEADER, idempotency_key);
        let dispatch: Option<OtpDispatch> = self
            .send_json(
                "send_whatsapp_otp",
                request,
                &json!({ "phone": normalize_phone(phone) }),
            )
            .await?
            .into_result()?;

        Ok(dispatch.unwrap_or(OtpDispatch {
            expires_in: 300,
            resend_after: None,
        }))
    }

    pub async fn verify_whatsapp_otp(
        &self,
        token: &str,
        form: &VerifyOtpForm,
    ) -> Result<Profile, AppError> {
        let url = self.endpoint(&["profile", "whatsapp", "verify"])?;
        let request = self.client.traced_post(&url).bearer_auth(token);
        let body = json!({
            "phone": normalize_phone(&form.phone),
            "code": form.code,
        });
        self.send_json::<Profile>("verify_whatsapp_otp", request, &body)
            .await?
            .into_data("profile")
    }

    /// Public order tracker lookup.
    pub async fn order_status(&self, order_number: &str) -> Result<Order, AppError> {
        self.get_with_retry::<Order>("order_status", &["orders", order_number, "status"], None)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order {} not found", order_number)))
    }

    /// Public receipt lookup by its share token.
    pub async fn receipt(&self, receipt_token: &str) -> Result<Receipt, AppError> {
        self.get_with_retry::<Receipt>("receipt", &["receipts", receipt_token], None)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Receipt not found")))
    }
}

#[async_trait]
impl SubscriptionBackend for BackendClient {
    /// Single attempt: the poller owns the cadence.
    async fn payment_status(
        &self,
        token: &str,
        code: &str,
    ) -> Result<PaymentStatusSnapshot, AppError> {
        self.get::<PaymentStatusSnapshot>(
            "payment_status",
            &["subscriptions", code, "payment-status"],
            Some(token),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("No payment status for {}", code)))
    }

    async fn current_subscription(&self, token: &str) -> Result<Option<Subscription>, AppError> {
        self.get_with_retry("current_subscription", &["subscriptions", "current"], Some(token))
            .await
    }

    async fn verify_subscription(
        &self,
        token: &str,
        code: &str,
        idempotency_key: &str,
    ) -> Result<VerifyResult, AppError> {
        let url = self.endpoint(&["subscriptions", code, "verify"])?;
        let request = self
            .client
            .traced_post(&url)
            .bearer_auth(token)
            .header(IDEMPOTENCY_KEY_HEADER, idempotency_key);
        self.send_json::<VerifyResult>("verify_subscription", request, &json!({}))
            .await?
            .into_data("verification result")
    }

    async fn payment_token(&self, token: &str, code: &str) -> Result<PaymentToken, AppError> {
        self.get::<PaymentToken>(
            "payment_token",
            &["subscriptions", code, "payment-token"],
            Some(token),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("No payment token for {}", code)))
    }

    async fn businesses(&self, token: &str) -> Result<Vec<BusinessSummary>, AppError> {
        Ok(self
            .get_with_retry("businesses", &["businesses"], Some(token))
            .await?
            .unwrap_or_default())
    }
}
