pub mod consumer_group;
pub mod delivery_client;
pub mod offset_tracker;
pub mod retry_policy;

pub use consumer_group::consumer_group_id;
pub use delivery_client::{DeliveryClient, DeliveryError};
pub use offset_tracker::OffsetTracker;
pub use retry_policy::{ExhaustedAction, RetryPolicy};
