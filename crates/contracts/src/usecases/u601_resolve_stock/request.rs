use serde::{Deserialize, Serialize};

/// Запрос на разрешение остатка одного SKU
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveRequest {
    /// Локальный SKU
    pub sku: String,

    /// Насколько глубоко сканировать при fallback
    #[serde(default)]
    pub urgency: ResolveUrgency,
}

impl ResolveRequest {
    pub fn new(sku: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            urgency: ResolveUrgency::default(),
        }
    }
}

/// Срочность запроса — масштабирует лимиты постраничного сканирования
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResolveUrgency {
    /// Обычный лимит страниц
    #[default]
    Normal,

    /// Расширенный лимит (отладка, ручной поиск)
    Deep,
}
