pub mod repository;

pub use repository::{LocalCatalog, SqliteCatalog};
