//! The payment-pending page, held server-side while the browser has it open.
//!
//! Mounting starts a poller. Snapshots run through the redirect resolver,
//! checkout outcomes drive verification, and unmounting tears everything down.

use super::poller::{Control, PollerHandle, SnapshotHandler, StatusPoller};
use super::resolver::{classify, Landing, Navigation, RedirectResolver, Resolution, ResolverInput, Verdict};
use super::status_source::BackendStatusSource;
use super::verification::{resolve_landing, verify_after_payment, Verification, VerificationPolicy};
use crate::config::PollingSettings;
use crate::models::{PaymentStatusSnapshot, TransactionStatus};
use crate::services::{
    CheckoutClientConfig, CheckoutInvoker, CheckoutOutcome, CheckoutSession, IdempotencyRegistry,
    SessionHandle, SessionKey, SubscriptionBackend,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use portal_core::error::AppError;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutPhase {
    Idle,
    Open,
    Succeeded,
    Pending,
    Failed,
    Closed,
}

#[derive(Debug, Clone)]
struct PageState {
    snapshot: Option<PaymentStatusSnapshot>,
    navigation: Option<Navigation>,
    error: Option<String>,
    message: Option<String>,
    checkout: CheckoutPhase,
    verification: Option<Verification>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NavigationView {
    pub navigation: Navigation,
    pub path: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageView {
    pub code: String,
    pub snapshot: Option<PaymentStatusSnapshot>,
    pub transaction_status: Option<TransactionStatus>,
    pub navigation: Option<NavigationView>,
    pub error: Option<String>,
    pub message: Option<String>,
    pub checkout: CheckoutPhase,
    pub polling: bool,
    pub verification: Option<Verification>,
}

/// Everything a page needs from the application.
#[derive(Clone)]
pub struct PageContext {
    pub backend: Arc<dyn SubscriptionBackend>,
    pub invoker: Arc<dyn CheckoutInvoker>,
    pub idempotency: Arc<IdempotencyRegistry>,
    pub session: SessionHandle,
    pub token: String,
    pub polling: PollingSettings,
}

pub struct PaymentPage {
    code: String,
    ctx: PageContext,
    resolver: RedirectResolver,
    state: Mutex<PageState>,
    poller: Mutex<Option<Arc<PollerHandle>>>,
    unmounted: AtomicBool,
    last_seen: Mutex<DateTime<Utc>>,
}

/// How long a navigated or stopped page stays readable for the browser.
const SETTLED_PAGE_GRACE_SECS: i64 = 60;

/// Poller callback that does not keep the page alive.
struct PageHandler(Weak<PaymentPage>);

#[async_trait]
impl SnapshotHandler for PageHandler {
    async fn on_snapshot(&self, snapshot: PaymentStatusSnapshot) -> Control {
        match self.0.upgrade() {
            Some(page) => page.on_snapshot(snapshot).await,
            None => Control::Stop,
        }
    }
}

impl PaymentPage {
    pub fn mount(ctx: PageContext, code: impl Into<String>) -> Arc<Self> {
        let code = code.into();
        let page = Arc::new(Self {
            code: code.clone(),
            ctx: ctx.clone(),
            resolver: RedirectResolver::new(),
            state: Mutex::new(PageState {
                snapshot: None,
                navigation: None,
                error: None,
                message: None,
                checkout: CheckoutPhase::Idle,
                verification: None,
            }),
            poller: Mutex::new(None),
            unmounted: AtomicBool::new(false),
            last_seen: Mutex::new(Utc::now()),
        });

        let source = Arc::new(BackendStatusSource::new(ctx.backend.clone(), ctx.token.clone()));
        let poller = Arc::new(StatusPoller::new(source, code.clone(), &ctx.polling));
        let handle = poller.spawn(Arc::new(PageHandler(Arc::downgrade(&page))));
        *lock(&page.poller) = Some(Arc::new(handle));

        tracing::info!(session = %ctx.session.key(), code = %code, "Payment page mounted");
        page
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn is_unmounted(&self) -> bool {
        self.unmounted.load(Ordering::Acquire)
    }

    pub fn unmount(&self) {
        if self.unmounted.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = lock(&self.poller).take() {
            handle.stop();
        }
        tracing::info!(session = %self.ctx.session.key(), code = %self.code, "Payment page unmounted");
    }

    fn touch(&self) {
        *lock(&self.last_seen) = Utc::now();
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        *lock(&self.last_seen)
    }

    /// Navigated, or no longer polling.
    pub fn is_settled(&self) -> bool {
        self.resolver.has_redirected()
            || !lock(&self.poller)
                .as_ref()
                .map(|handle| handle.is_running())
                .unwrap_or(false)
    }

    fn stop_polling(&self) {
        if let Some(handle) = lock(&self.poller).as_ref() {
            handle.stop();
        }
    }

    pub fn view(&self) -> PageView {
        self.touch();
        let state = lock(&self.state).clone();
        let polling = lock(&self.poller)
            .as_ref()
            .map(|handle| handle.is_running())
            .unwrap_or(false);

        PageView {
            code: self.code.clone(),
            transaction_status: state
                .snapshot
                .as_ref()
                .and_then(|snapshot| snapshot.transaction_status()),
            snapshot: state.snapshot,
            navigation: state.navigation.map(|navigation| NavigationView {
                navigation,
                path: navigation.path(),
            }),
            error: state.error,
            message: state.message,
            checkout: state.checkout,
            polling,
            verification: state.verification,
        }
    }

    /// Manual refresh from the page. No-op while a fetch is in flight.
    pub async fn refresh(&self) -> PageView {
        let handle = lock(&self.poller).clone();
        if let Some(handle) = handle {
            handle.refresh().await;
        }
        self.view()
    }

    async fn on_snapshot(&self, snapshot: PaymentStatusSnapshot) -> Control {
        if self.is_unmounted() {
            return Control::Stop;
        }

        let session = &self.ctx.session;
        if snapshot.subscription.is_active() && snapshot.subscription.code == self.code {
            session.set_active_subscription(Some(self.code.clone()));
        }

        let mut input =
            ResolverInput::from_snapshot(&snapshot, session.is_active_subscription(&self.code));
        if classify(&input) == Verdict::Success {
            let landing =
                resolve_landing(self.ctx.backend.as_ref(), session, &self.ctx.token).await;
            input = input.with_business(landing == Landing::Dashboard);
        }

        let resolution = self.resolver.resolve(&input);

        let mut state = lock(&self.state);
        state.snapshot = Some(snapshot);
        match resolution {
            Resolution::Navigate(navigation) => {
                state.navigation = Some(navigation);
                Control::Stop
            }
            Resolution::Stay => Control::Continue,
            Resolution::AlreadyRedirected => Control::Stop,
        }
    }

    /// Fetch a payment token and open the checkout. The outcome is applied to
    /// the page in the background; the browser keeps reading [`view`](Self::view).
    pub async fn start_checkout(self: &Arc<Self>) -> Result<CheckoutClientConfig, AppError> {
        self.touch();
        if self.is_unmounted() {
            return Err(AppError::Conflict(anyhow::anyhow!("Payment page is closed")));
        }
        if self.resolver.has_redirected() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Payment already resolved"
            )));
        }

        let token = self
            .ctx
            .backend
            .payment_token(&self.ctx.token, &self.code)
            .await?;
        let config = self.ctx.invoker.client_config(&token);

        {
            let mut state = lock(&self.state);
            state.checkout = CheckoutPhase::Open;
            state.error = None;
            state.message = None;
        }

        let page = self.clone();
        let session = CheckoutSession {
            owner: self.ctx.session.key().clone(),
            code: self.code.clone(),
            token,
        };
        tokio::spawn(async move {
            let outcome = page.ctx.invoker.invoke(session).await;
            page.apply_checkout_outcome(outcome).await;
        });

        Ok(config)
    }

    async fn apply_checkout_outcome(&self, outcome: Result<CheckoutOutcome, AppError>) {
        if self.is_unmounted() {
            tracing::debug!(code = %self.code, "Ignoring checkout outcome for unmounted page");
            return;
        }

        match outcome {
            Ok(CheckoutOutcome::Success { .. }) => {
                lock(&self.state).checkout = CheckoutPhase::Succeeded;

                let verification = verify_after_payment(
                    self.ctx.backend.as_ref(),
                    &self.ctx.idempotency,
                    &self.ctx.session,
                    &self.ctx.token,
                    &self.code,
                    VerificationPolicy::from(&self.ctx.polling),
                )
                .await;

                let navigation = self
                    .resolver
                    .navigate(Navigation::Success(verification.landing));

                let mut state = lock(&self.state);
                state.verification = Some(verification);
                if let Resolution::Navigate(navigation) = navigation {
                    state.navigation = Some(navigation);
                }
                drop(state);
                self.stop_polling();
            }
            Ok(CheckoutOutcome::Pending { .. }) => {
                let mut state = lock(&self.state);
                state.checkout = CheckoutPhase::Pending;
                state.message = Some("Payment is being processed".to_string());
            }
            Ok(CheckoutOutcome::Error { message }) => {
                let mut state = lock(&self.state);
                state.checkout = CheckoutPhase::Failed;
                state.error = Some(message);
            }
            Ok(CheckoutOutcome::Closed) => {
                let mut state = lock(&self.state);
                state.checkout = CheckoutPhase::Closed;
                state.error = None;
                state.message = Some("Payment window closed. You can try again.".to_string());
            }
            Err(e) => {
                tracing::warn!(code = %self.code, error = %e, "Checkout could not start");
                let mut state = lock(&self.state);
                state.checkout = CheckoutPhase::Failed;
                state.error = Some(e.to_string());
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mounted pages, one per session and subscription code.
#[derive(Default)]
pub struct PaymentPages {
    pages: DashMap<(SessionKey, String), Arc<PaymentPage>>,
}

impl PaymentPages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount a page, replacing (and tearing down) one already mounted for the
    /// same session and code.
    pub fn mount(&self, ctx: PageContext, code: &str) -> Arc<PaymentPage> {
        let key = (ctx.session.key().clone(), code.to_string());
        let page = PaymentPage::mount(ctx, code);
        if let Some(previous) = self.pages.insert(key, page.clone()) {
            previous.unmount();
        }
        page
    }

    pub fn get(&self, session: &SessionKey, code: &str) -> Option<Arc<PaymentPage>> {
        self.pages
            .get(&(session.clone(), code.to_string()))
            .map(|page| page.clone())
    }

    pub fn unmount(&self, session: &SessionKey, code: &str) -> bool {
        match self.pages.remove(&(session.clone(), code.to_string())) {
            Some((_, page)) => {
                page.unmount();
                true
            }
            None => false,
        }
    }

    /// Tear down and forget pages that were unmounted, settled and left
    /// alone past a short grace, or not looked at for `idle`.
    pub fn purge(&self, now: DateTime<Utc>, idle: Duration) -> usize {
        let grace = Duration::seconds(SETTLED_PAGE_GRACE_SECS);
        let before = self.pages.len();
        self.pages.retain(|(session, code), page| {
            let quiet = now - page.last_seen();
            let keep = !page.is_unmounted()
                && quiet < idle
                && !(page.is_settled() && quiet >= grace);
            if !keep {
                page.unmount();
                tracing::debug!(session = %session, code = %code, "Evicting payment page");
            }
            keep
        });
        before - self.pages.len()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}
