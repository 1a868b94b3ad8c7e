pub mod repository;

use contracts::shared::sync_log::{SyncLogEntry, SyncOperation, SyncStatus};
use sea_orm::DatabaseConnection;

/// Новая запись журнала (id и created_at назначаются при вставке)
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub sku: String,
    pub operation: SyncOperation,
    pub status: SyncStatus,
    pub source: Option<String>,
    pub message: Option<String>,
    pub duration_ms: Option<i64>,
}

impl NewLogEntry {
    pub fn new(sku: impl Into<String>, operation: SyncOperation, status: SyncStatus) -> Self {
        Self {
            sku: sku.into(),
            operation,
            status,
            source: None,
            message: None,
            duration_ms: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: i64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

/// Журнал синхронизации: append-only запись исходов и выборки для
/// мониторинга и повторной обработки сбоев.
#[derive(Clone)]
pub struct SyncAuditLog {
    conn: DatabaseConnection,
}

impl SyncAuditLog {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Записать исход. Best-effort: сбой журналирования не роняет
    /// саму операцию синхронизации, ошибка уходит в warn.
    pub async fn record(&self, entry: NewLogEntry) {
        if let Err(e) = repository::insert(&self.conn, &entry).await {
            tracing::warn!("Failed to write sync_log entry for {}: {}", entry.sku, e);
        }
    }

    /// Последние N записей по одному SKU (отладка конкретного товара)
    pub async fn recent_for_sku(
        &self,
        sku: &str,
        limit: u64,
    ) -> anyhow::Result<Vec<SyncLogEntry>> {
        repository::recent_for_sku(&self.conn, sku, limit).await
    }

    /// Недавние записи со статусом FAILED (по SKU или по всем)
    pub async fn recent_failures(
        &self,
        sku: Option<&str>,
        window_days: i64,
    ) -> anyhow::Result<Vec<SyncLogEntry>> {
        repository::recent_failures(&self.conn, sku, window_days).await
    }

    /// Различные SKU со сбоями за окно — вход для bulk-retry инструментов
    pub async fn failed_skus_since(&self, window_days: i64) -> anyhow::Result<Vec<String>> {
        repository::failed_skus_since(&self.conn, window_days).await
    }
}
