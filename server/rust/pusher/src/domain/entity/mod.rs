pub mod partition_cursor;

pub use partition_cursor::{OffsetAnomaly, PartitionKey};
