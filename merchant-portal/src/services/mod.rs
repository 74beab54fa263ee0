pub mod api_client;
pub mod checkout;
pub mod idempotency;
pub mod receipt_printer;
pub mod session;

pub use api_client::{BackendClient, SubscriptionBackend};
pub use checkout::{
    CheckoutClientConfig, CheckoutEvent, CheckoutInvoker, CheckoutOutcome, CheckoutResult, CheckoutSession,
    SnapCheckout,
};
pub use idempotency::{Claim, ClaimGuard, IdempotencyRegistry};
pub use session::{SessionContext, SessionHandle, SessionKey, SessionStore};
