pub mod batch_result;

pub use batch_result::{SyncBatchResult, SyncItemDetail};
