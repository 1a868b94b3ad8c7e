pub mod executor;

pub use executor::BulkSyncOrchestrator;
