pub mod config;
pub mod flows;
pub mod forms;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use config::Settings;
use flows::{PageContext, PaymentPages};
use middleware::auth::AuthToken;
use portal_core::error::AppError;
use services::{
    BackendClient, IdempotencyRegistry, SessionHandle, SessionStore, SnapCheckout,
    SubscriptionBackend,
};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<BackendClient>,
    pub checkout: Arc<SnapCheckout>,
    pub sessions: Arc<SessionStore>,
    pub idempotency: Arc<IdempotencyRegistry>,
    pub pages: Arc<PaymentPages>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self, AppError> {
        let backend = Arc::new(BackendClient::new(settings.backend.clone())?);
        let checkout = Arc::new(SnapCheckout::new(settings.checkout.clone()));
        let sessions = Arc::new(SessionStore::new(settings.session.skip_check_ttl_secs));
        let idempotency = Arc::new(
            IdempotencyRegistry::new(settings.session.idempotency_ttl_secs)
                .with_in_flight_ttl(settings.session.in_flight_ttl_secs),
        );

        Ok(Self {
            backend,
            checkout,
            sessions,
            idempotency,
            pages: Arc::new(PaymentPages::new()),
            settings: Arc::new(settings),
        })
    }

    pub fn session(&self, auth: &AuthToken) -> SessionHandle {
        SessionHandle::new(self.sessions.clone(), auth.session.clone())
    }

    pub fn page_context(&self, auth: &AuthToken) -> PageContext {
        PageContext {
            backend: self.backend.clone() as Arc<dyn SubscriptionBackend>,
            invoker: self.checkout.clone(),
            idempotency: self.idempotency.clone(),
            session: self.session(auth),
            token: auth.token.clone(),
            polling: self.settings.polling.clone(),
        }
    }
}
