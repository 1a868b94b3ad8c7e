pub mod config;
pub mod data;
pub mod marketplaces;
pub mod sku_lock;
pub mod sync_log;
