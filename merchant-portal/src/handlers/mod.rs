pub mod app;
pub mod orders;
pub mod payments;
pub mod profile;
pub mod receipts;
pub mod subscription;
