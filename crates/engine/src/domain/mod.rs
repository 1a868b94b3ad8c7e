pub mod a001_sku_mapping;
pub mod a003_local_product;
