use serde::{Deserialize, Serialize};

/// Товар локального каталога (узкий контракт чтения и записи остатка).
///
/// Движок видит из локального каталога только эти поля; остальное
/// (цены, описания, категории) принадлежит каталогу.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalProduct {
    pub sku: String,

    /// Текущий остаток в локальном каталоге
    pub current_stock: i64,

    /// Активен ли товар (неактивные можно исключать из синхронизации)
    pub active: bool,

    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}
