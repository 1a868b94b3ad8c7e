use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use contracts::domain::a001_sku_mapping::aggregate::SkuMapping;
use contracts::shared::sync_log::{SyncOperation, SyncStatus};
use contracts::usecases::common::{SyncBatchResult, SyncItemDetail};
use contracts::usecases::u601_resolve_stock::{ResolveOutcome, ResolveRequest};
use contracts::usecases::u603_push_stocks::{PushBatchRequest, PushItem, PushOptions, PushResult};
use tokio::sync::Semaphore;

use crate::domain::a001_sku_mapping::SkuMappingRegistry;
use crate::shared::config::Config;
use crate::shared::marketplaces::{StockMarketplaceApi, StockUpdate};
use crate::shared::sync_log::{NewLogEntry, SyncAuditLog};
use crate::usecases::u601_resolve_stock::StockResolver;

/// Итог предварительного разрешения идентификаторов одной позиции
enum Prepared {
    /// Сопоставление известно; свежее удаленное количество — если позицию
    /// пришлось разрешать через маркетплейс прямо сейчас
    Ready {
        item: PushItem,
        mapping: Box<SkuMapping>,
        fresh_remote_quantity: Option<i64>,
    },
    /// Товар не найден на маркетплейсе
    NotFound { sku: String },
    /// Разрешение упало
    Failed { sku: String, message: String },
}

/// Executor для UseCase отправки остатков на маркетплейс.
///
/// Количества абсолютные, поэтому повторная отправка безопасна. Отказ по
/// одной позиции не трогает остальные: результат write-эндпоинта построчный.
pub struct PushEngine {
    api: Arc<dyn StockMarketplaceApi>,
    registry: Arc<SkuMappingRegistry>,
    resolver: Arc<StockResolver>,
    audit: SyncAuditLog,
    config: Arc<Config>,
}

impl PushEngine {
    pub fn new(
        api: Arc<dyn StockMarketplaceApi>,
        registry: Arc<SkuMappingRegistry>,
        resolver: Arc<StockResolver>,
        audit: SyncAuditLog,
        config: Arc<Config>,
    ) -> Self {
        Self {
            api,
            registry,
            resolver,
            audit,
            config,
        }
    }

    /// Отправить пакет остатков.
    ///
    /// Для позиций без сопоставления выполняется разовое разрешение через
    /// маркетплейс (с ограничением параллелизма); так и не разрешенные
    /// помечаются NOT_FOUND и не отправляются.
    pub async fn execute(&self, request: &PushBatchRequest) -> Result<SyncBatchResult> {
        let started = std::time::Instant::now();
        let options = &request.options;
        let mut result = SyncBatchResult::empty(options.dry_run);

        let prepared = self.prepare_items(&request.items).await;

        let mut to_send: Vec<(PushItem, SkuMapping)> = Vec::new();
        let mut expired = false;
        for outcome in prepared {
            if !expired && deadline_passed(options) {
                expired = true;
                result.completed = false;
            }
            // Частичный результат обязан учесть каждый входной SKU:
            // оборванные дедлайном позиции помечаются, а не исчезают
            if expired {
                let sku = match outcome {
                    Prepared::Ready { item, .. } => item.sku,
                    Prepared::NotFound { sku } | Prepared::Failed { sku, .. } => sku,
                };
                let detail = deadline_detail(sku, None);
                self.audit_detail(&detail).await;
                result.push_item(detail);
                continue;
            }
            match outcome {
                Prepared::Ready {
                    item,
                    mapping,
                    fresh_remote_quantity,
                } => {
                    let unchanged =
                        !options.force_update && fresh_remote_quantity == Some(item.quantity);
                    if unchanged {
                        let detail = SyncItemDetail {
                            sku: item.sku.clone(),
                            status: SyncStatus::Success,
                            remote_quantity: fresh_remote_quantity,
                            local_quantity: Some(item.quantity),
                            applied: false,
                            message: Some("Количество не изменилось, отправка пропущена".into()),
                        };
                        self.audit_detail(&detail).await;
                        result.push_item(detail);
                    } else if options.dry_run {
                        let detail = SyncItemDetail {
                            sku: item.sku.clone(),
                            status: SyncStatus::Success,
                            remote_quantity: fresh_remote_quantity,
                            local_quantity: Some(item.quantity),
                            applied: false,
                            message: Some(format!("dry-run: отправка {}", item.quantity)),
                        };
                        self.audit_detail(&detail).await;
                        result.push_item(detail);
                    } else {
                        to_send.push((item, *mapping));
                    }
                }
                Prepared::NotFound { sku } => {
                    let detail = SyncItemDetail {
                        sku,
                        status: SyncStatus::NotFound,
                        remote_quantity: None,
                        local_quantity: None,
                        applied: false,
                        message: Some("Товар не найден на маркетплейсе".into()),
                    };
                    self.audit_detail(&detail).await;
                    result.push_item(detail);
                }
                Prepared::Failed { sku, message } => {
                    let detail = SyncItemDetail {
                        sku,
                        status: SyncStatus::Failed,
                        remote_quantity: None,
                        local_quantity: None,
                        applied: false,
                        message: Some(message),
                    };
                    self.audit_detail(&detail).await;
                    result.push_item(detail);
                }
            }
        }

        if expired {
            for (item, _) in to_send {
                let detail = deadline_detail(item.sku, Some(item.quantity));
                self.audit_detail(&detail).await;
                result.push_item(detail);
            }
        } else if !to_send.is_empty() {
            self.send_batch(&to_send, &mut result).await;
        }

        result.duration_ms = started.elapsed().as_millis() as i64;
        tracing::info!(
            "Push finished: {} processed, {} ok, {} failed, {} not found in {} ms",
            result.total_processed,
            result.successful,
            result.failed,
            result.not_found,
            result.duration_ms
        );
        Ok(result)
    }

    /// Отправить один SKU (обертка над пакетом из одной позиции)
    pub async fn push_single(&self, item: PushItem, options: PushOptions) -> Result<PushResult> {
        let request = PushBatchRequest {
            items: vec![item.clone()],
            options,
        };
        let result = self.execute(&request).await?;
        let Some(detail) = result.items.into_iter().next() else {
            anyhow::bail!("Push of {} was cut off by deadline", item.sku);
        };
        Ok(match detail.status {
            SyncStatus::Success => PushResult::success(
                detail.sku,
                detail.remote_quantity.unwrap_or(item.quantity),
            ),
            SyncStatus::NotFound => PushResult::not_found(detail.sku),
            SyncStatus::Failed => PushResult::failed(
                detail.sku,
                detail.message.unwrap_or_else(|| "Отправка не удалась".into()),
            ),
        })
    }

    /// Разрешить идентификаторы всех позиций с потолком параллелизма
    async fn prepare_items(&self, items: &[PushItem]) -> Vec<Prepared> {
        let semaphore = Arc::new(Semaphore::new(self.config.push.concurrency));
        let mut handles = Vec::with_capacity(items.len());

        for item in items.iter().cloned() {
            let semaphore = semaphore.clone();
            let registry = self.registry.clone();
            let resolver = self.resolver.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                prepare_one(&registry, &resolver, item).await
            }));
        }

        let mut prepared = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(outcome) => prepared.push(outcome),
                Err(e) => prepared.push(Prepared::Failed {
                    sku: "?".into(),
                    message: format!("Задача разрешения прервана: {}", e),
                }),
            }
        }
        prepared
    }

    /// Один вызов write-эндпоинта на весь пакет; результаты построчные
    async fn send_batch(
        &self,
        to_send: &[(PushItem, SkuMapping)],
        result: &mut SyncBatchResult,
    ) {
        // На проводе идут SKU маркетплейса; ответ маппим обратно на локальные.
        // Несколько локальных SKU могут делить один master_sku, поэтому на
        // каждый удаленный SKU держим очередь позиций в порядке отправки
        let mut local_by_remote: HashMap<&str, VecDeque<&PushItem>> = HashMap::new();
        let updates: Vec<StockUpdate> = to_send
            .iter()
            .map(|(item, mapping)| {
                local_by_remote
                    .entry(mapping.identifiers.master_sku.as_str())
                    .or_default()
                    .push_back(item);
                StockUpdate {
                    sku: mapping.identifiers.master_sku.clone(),
                    quantity: item.quantity,
                }
            })
            .collect();

        match self.api.update_stocks(&updates).await {
            Ok(responses) => {
                for response in responses {
                    let item = local_by_remote
                        .get_mut(response.sku.as_str())
                        .and_then(|queue| queue.pop_front());
                    let Some(item) = item else {
                        tracing::warn!("Push response for unknown SKU: {}", response.sku);
                        continue;
                    };
                    let detail = if response.success {
                        SyncItemDetail {
                            sku: item.sku.clone(),
                            status: SyncStatus::Success,
                            remote_quantity: response.applied_quantity,
                            local_quantity: Some(item.quantity),
                            applied: true,
                            message: None,
                        }
                    } else {
                        SyncItemDetail {
                            sku: item.sku.clone(),
                            status: SyncStatus::Failed,
                            remote_quantity: None,
                            local_quantity: Some(item.quantity),
                            applied: false,
                            message: response.message.clone(),
                        }
                    };
                    self.audit_detail(&detail).await;
                    result.push_item(detail);
                }
            }
            Err(e) => {
                // Весь вызов упал: каждая отправлявшаяся позиция — FAILED
                let message = e.to_string();
                for (item, _) in to_send {
                    let detail = SyncItemDetail {
                        sku: item.sku.clone(),
                        status: SyncStatus::Failed,
                        remote_quantity: None,
                        local_quantity: Some(item.quantity),
                        applied: false,
                        message: Some(message.clone()),
                    };
                    self.audit_detail(&detail).await;
                    result.push_item(detail);
                }
            }
        }
    }

    async fn audit_detail(&self, detail: &SyncItemDetail) {
        let mut entry = NewLogEntry::new(detail.sku.clone(), SyncOperation::Push, detail.status);
        if let Some(ref message) = detail.message {
            entry = entry.with_message(message.clone());
        }
        self.audit.record(entry).await;
    }
}

async fn prepare_one(
    registry: &SkuMappingRegistry,
    resolver: &StockResolver,
    item: PushItem,
) -> Prepared {
    match registry.resolve(&item.sku).await {
        Ok(Some(mapping)) => Prepared::Ready {
            item,
            mapping: Box::new(mapping),
            fresh_remote_quantity: None,
        },
        Ok(None) => {
            // Сопоставления нет: разовое разрешение через маркетплейс,
            // успешное само создаст запись в реестре
            match resolver.resolve(&ResolveRequest::new(item.sku.clone())).await {
                Ok(ResolveOutcome::Found { record }) => match registry.resolve(&item.sku).await {
                    Ok(Some(mapping)) => Prepared::Ready {
                        item,
                        mapping: Box::new(mapping),
                        fresh_remote_quantity: record.quantity(),
                    },
                    Ok(None) => Prepared::NotFound { sku: item.sku },
                    Err(e) => Prepared::Failed {
                        sku: item.sku,
                        message: e.to_string(),
                    },
                },
                Ok(ResolveOutcome::NotFound) => Prepared::NotFound { sku: item.sku },
                Err(e) => Prepared::Failed {
                    sku: item.sku,
                    message: e.to_string(),
                },
            }
        }
        Err(e) => Prepared::Failed {
            sku: item.sku,
            message: e.to_string(),
        },
    }
}

fn deadline_detail(sku: String, local_quantity: Option<i64>) -> SyncItemDetail {
    SyncItemDetail {
        sku,
        status: SyncStatus::Failed,
        remote_quantity: None,
        local_quantity,
        applied: false,
        message: Some("Дедлайн истек до отправки".into()),
    }
}

fn deadline_passed(options: &PushOptions) -> bool {
    options
        .deadline
        .map(|deadline| Utc::now() >= deadline)
        .unwrap_or(false)
}
