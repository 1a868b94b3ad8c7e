use serde::{Deserialize, Serialize};

/// Одна позиция для отправки остатка.
///
/// quantity — всегда абсолютное целевое значение, не дельта: повторная
/// отправка того же числа безопасна (идемпотентность).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushItem {
    pub sku: String,
    pub quantity: i64,
}

impl PushItem {
    pub fn new(sku: impl Into<String>, quantity: i64) -> Self {
        Self {
            sku: sku.into(),
            quantity,
        }
    }
}

/// Запрос на отправку остатков на маркетплейс
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushBatchRequest {
    pub items: Vec<PushItem>,

    #[serde(default)]
    pub options: PushOptions,
}

/// Опции отправки
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushOptions {
    /// Посчитать, что было бы отправлено, без вызова write-эндпоинта
    #[serde(default)]
    pub dry_run: bool,

    /// Отправлять даже при совпадении с последним известным удаленным
    /// количеством
    #[serde(default)]
    pub force_update: bool,

    /// Дедлайн: оставшиеся позиции пакета не отправляются
    #[serde(default)]
    pub deadline: Option<chrono::DateTime<chrono::Utc>>,
}
