use serde::{Deserialize, Serialize};

/// Запрос на пакетную синхронизацию остатков
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncBatchRequest {
    /// Локальные SKU для синхронизации
    pub skus: Vec<String>,

    #[serde(default)]
    pub options: SyncOptions,
}

/// Опции пакетной синхронизации
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Посчитать изменения, ничего не применяя (ни локально, ни удаленно)
    #[serde(default)]
    pub dry_run: bool,

    /// Размер чанка; None — значение из конфигурации
    #[serde(default)]
    pub chunk_size: Option<usize>,

    /// Пропускать неактивные товары локального каталога
    #[serde(default)]
    pub only_active: bool,

    /// Досканировать мастер-каталог для SKU, не найденных в складских
    /// остатках (отдельный лимит страниц)
    #[serde(default = "default_true")]
    pub catalog_fallback: bool,

    /// Дедлайн: по истечении пагинация прерывается, частичный результат
    /// возвращается вызывающей стороне
    #[serde(default)]
    pub deadline: Option<chrono::DateTime<chrono::Utc>>,
}

fn default_true() -> bool {
    true
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            chunk_size: None,
            only_active: false,
            catalog_fallback: true,
            deadline: None,
        }
    }
}
