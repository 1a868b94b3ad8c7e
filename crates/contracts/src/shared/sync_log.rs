use serde::{Deserialize, Serialize};

/// Операция синхронизации
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    /// Чтение остатка с маркетплейса
    Pull,

    /// Отправка остатка на маркетплейс
    Push,
}

impl SyncOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pull => "PULL",
            Self::Push => "PUSH",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s {
            "PULL" => Some(Self::Pull),
            "PUSH" => Some(Self::Push),
            _ => None,
        }
    }
}

/// Итог операции по одному SKU.
///
/// NotFound — отдельный исход, а не ошибка: цепочка fallback завершилась
/// без совпадения, ни один вызов при этом не упал.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Failed,
    NotFound,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::NotFound => "NOT_FOUND",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s {
            "SUCCESS" => Some(Self::Success),
            "FAILED" => Some(Self::Failed),
            "NOT_FOUND" => Some(Self::NotFound),
            _ => None,
        }
    }
}

/// Запись журнала синхронизации (append-only, никогда не мутируется)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub id: i64,
    pub sku: String,
    pub operation: SyncOperation,
    pub status: SyncStatus,

    /// Эндпоинт-источник (DIRECT_SEARCH | BULK_INVENTORY | MASTER_CATALOG),
    /// если операция дошла до данных
    pub source: Option<String>,

    pub message: Option<String>,

    /// Длительность попытки
    pub duration_ms: Option<i64>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}
