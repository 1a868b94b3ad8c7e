pub mod request;

pub use request::{SyncBatchRequest, SyncOptions};
