pub mod domain;
pub mod engine;
pub mod shared;
pub mod system;
pub mod usecases;

pub use engine::SyncEngine;
