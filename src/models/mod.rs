pub mod billing;
pub mod compute;

pub use billing::{BillingQuery, BillingResult, Granularity};
pub use compute::{InstanceState, InstanceStateChange, ResponseMetadata, TerminationReceipt};
