pub mod drain_errors;
pub mod relay_messages;

pub use drain_errors::drain_consumer_errors;
pub use relay_messages::{RelayMessagesUseCase, RelayStats};
