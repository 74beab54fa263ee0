//! Payment reconciliation: polling, checkout outcomes, redirects.

pub mod gate;
pub mod payment_page;
pub mod poller;
pub mod resolver;
pub mod status_source;
pub mod verification;

pub use gate::{check_subscription_gate, GateDecision, GateReason};
pub use payment_page::{CheckoutPhase, PageContext, PageView, PaymentPage, PaymentPages};
pub use poller::{Control, PollerHandle, SnapshotHandler, StatusPoller};
pub use resolver::{
    classify, decide, Landing, Navigation, RedirectResolver, Resolution, ResolverInput, Verdict,
};
pub use status_source::{BackendStatusSource, StatusSource};
pub use verification::{
    resolve_landing, verify_after_payment, Verification, VerificationOutcome, VerificationPolicy,
};
