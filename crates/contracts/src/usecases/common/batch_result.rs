use crate::shared::sync_log::SyncStatus;
use serde::{Deserialize, Serialize};

/// Деталь по одному SKU внутри пакетной операции
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncItemDetail {
    pub sku: String,

    pub status: SyncStatus,

    /// Количество на маркетплейсе (если удалось разрешить)
    pub remote_quantity: Option<i64>,

    /// Количество в локальном каталоге до применения
    pub local_quantity: Option<i64>,

    /// Было ли изменение реально применено (false при dry-run и при
    /// совпадающих количествах)
    pub applied: bool,

    pub message: Option<String>,
}

/// Итог пакетной операции (sync или push).
///
/// Эфемерный объект — возвращается вызывающей стороне; в журнал
/// синхронизации персистится построчная выжимка.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncBatchResult {
    pub total_processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub not_found: usize,

    pub items: Vec<SyncItemDetail>,

    pub duration_ms: i64,

    /// Пакет выполнялся в dry-run режиме
    pub dry_run: bool,

    /// false, если пакет прерван дедлайном — накопленные данные сохранены
    pub completed: bool,
}

impl SyncBatchResult {
    pub fn empty(dry_run: bool) -> Self {
        Self {
            total_processed: 0,
            successful: 0,
            failed: 0,
            not_found: 0,
            items: Vec::new(),
            duration_ms: 0,
            dry_run,
            completed: true,
        }
    }

    /// Добавить деталь и обновить счетчики
    pub fn push_item(&mut self, item: SyncItemDetail) {
        self.total_processed += 1;
        match item.status {
            SyncStatus::Success => self.successful += 1,
            SyncStatus::Failed => self.failed += 1,
            SyncStatus::NotFound => self.not_found += 1,
        }
        self.items.push(item);
    }

    /// Ограниченная выборка сообщений об ошибках для отчета пользователю
    pub fn failure_sample(&self, limit: usize) -> Vec<String> {
        self.items
            .iter()
            .filter(|i| i.status == SyncStatus::Failed)
            .filter_map(|i| i.message.as_ref().map(|m| format!("{}: {}", i.sku, m)))
            .take(limit)
            .collect()
    }
}
