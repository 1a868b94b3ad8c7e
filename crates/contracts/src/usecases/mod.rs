pub mod common;

pub mod u601_resolve_stock;
pub mod u602_bulk_sync;
pub mod u603_push_stocks;
