pub mod business;
pub mod envelope;
pub mod order;
pub mod payment;
pub mod profile;
pub mod receipt;
pub mod subscription;

pub use business::BusinessSummary;
pub use envelope::ApiResponse;
pub use order::{LineItem, Order, OrderPaymentStatus, OrderStatus, OrderStatusView};
pub use payment::{PaymentAttempt, PaymentStatusSnapshot, PaymentToken, TransactionStatus};
pub use profile::{OtpDispatch, Profile};
pub use receipt::{Receipt, ReceiptBusiness};
pub use subscription::{Plan, Subscription, SubscriptionStatus, UpgradeResult, VerifyResult};
