pub mod common;

pub mod a001_sku_mapping;
pub mod a002_connection_mp;
pub mod a003_local_product;
