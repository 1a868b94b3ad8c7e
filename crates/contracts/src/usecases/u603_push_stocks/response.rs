use crate::shared::sync_log::SyncStatus;
use serde::{Deserialize, Serialize};

/// Результат отправки остатка одного SKU
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushResult {
    pub sku: String,

    pub status: SyncStatus,

    /// Значение, которое маркетплейс подтвердил примененным
    pub applied_quantity: Option<i64>,

    /// Сообщение маркетплейса (при отказе — дословно)
    pub message: Option<String>,

    pub pushed_at: chrono::DateTime<chrono::Utc>,
}

impl PushResult {
    pub fn success(sku: impl Into<String>, applied_quantity: i64) -> Self {
        Self {
            sku: sku.into(),
            status: SyncStatus::Success,
            applied_quantity: Some(applied_quantity),
            message: None,
            pushed_at: chrono::Utc::now(),
        }
    }

    pub fn failed(sku: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            status: SyncStatus::Failed,
            applied_quantity: None,
            message: Some(message.into()),
            pushed_at: chrono::Utc::now(),
        }
    }

    pub fn not_found(sku: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            status: SyncStatus::NotFound,
            applied_quantity: None,
            message: None,
            pushed_at: chrono::Utc::now(),
        }
    }
}
