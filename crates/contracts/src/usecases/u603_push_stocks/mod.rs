pub mod request;
pub mod response;

pub use request::{PushBatchRequest, PushItem, PushOptions};
pub use response::PushResult;
