pub mod config;
pub mod http_delivery_client;

pub use config::{Config, ConfigError};
pub use http_delivery_client::HttpDeliveryClient;
