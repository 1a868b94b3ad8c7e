pub mod request;
pub mod response;

pub use request::{ResolveRequest, ResolveUrgency};
pub use response::ResolveOutcome;
