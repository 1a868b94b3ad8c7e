pub mod stock;
pub mod sync_log;
