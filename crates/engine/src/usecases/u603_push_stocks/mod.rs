pub mod executor;

pub use executor::PushEngine;
