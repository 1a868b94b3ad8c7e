use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use contracts::domain::a001_sku_mapping::aggregate::MarketplaceIdentifiers;
use contracts::shared::stock::{StockRecord, StockSource};
use contracts::shared::sync_log::{SyncOperation, SyncStatus};
use contracts::usecases::common::{SyncBatchResult, SyncItemDetail};
use contracts::usecases::u602_bulk_sync::{SyncBatchRequest, SyncOptions};

use crate::domain::a001_sku_mapping::SkuMappingRegistry;
use crate::domain::a003_local_product::LocalCatalog;
use crate::shared::config::Config;
use crate::shared::marketplaces::{MarketplaceError, StockMarketplaceApi};
use crate::shared::sku_lock::SkuLockMap;
use crate::shared::sync_log::{NewLogEntry, SyncAuditLog};
use crate::usecases::u601_resolve_stock::executor::{
    identifiers_from_inventory, identifiers_from_product,
};

/// Executor для UseCase пакетной синхронизации остатков.
///
/// Чанк обслуживается одним ограниченным сканом складских остатков
/// (плюс fallback-скан каталога для ненайденных), а не поштучным
/// разрешением: на больших пакетах это на порядки меньше запросов.
pub struct BulkSyncOrchestrator {
    api: Arc<dyn StockMarketplaceApi>,
    registry: Arc<SkuMappingRegistry>,
    catalog: Arc<dyn LocalCatalog>,
    audit: SyncAuditLog,
    locks: Arc<SkuLockMap>,
    config: Arc<Config>,
}

/// Найденные в скане записи чанка, по локальному SKU
type ChunkRecords = HashMap<String, (StockRecord, MarketplaceIdentifiers)>;

impl BulkSyncOrchestrator {
    pub fn new(
        api: Arc<dyn StockMarketplaceApi>,
        registry: Arc<SkuMappingRegistry>,
        catalog: Arc<dyn LocalCatalog>,
        audit: SyncAuditLog,
        locks: Arc<SkuLockMap>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            api,
            registry,
            catalog,
            audit,
            locks,
            config,
        }
    }

    /// Синхронизировать пакет SKU: подтянуть удаленные остатки и применить
    /// их к локальному каталогу.
    ///
    /// Сбой скана одного чанка помечает его неразрешенные SKU как FAILED и
    /// не трогает остальные чанки. Дедлайн возвращает частичный результат
    /// с completed = false.
    pub async fn execute(&self, request: &SyncBatchRequest) -> Result<SyncBatchResult> {
        let started = std::time::Instant::now();
        let options = &request.options;
        let mut result = SyncBatchResult::empty(options.dry_run);
        let chunk_size = options
            .chunk_size
            .unwrap_or(self.config.sync.chunk_size)
            .max(1);

        tracing::info!(
            "Bulk sync started: {} SKUs, chunk size {}, dry_run {}",
            request.skus.len(),
            chunk_size,
            options.dry_run
        );

        'chunks: for chunk in request.skus.chunks(chunk_size) {
            if deadline_passed(options) {
                result.completed = false;
                break;
            }

            let mut records = ChunkRecords::new();
            let scan_error = match self.scan_chunk(chunk, options, &mut records).await {
                Ok(()) => None,
                Err(e) => {
                    tracing::warn!("Chunk scan failed: {}", e);
                    Some(e.to_string())
                }
            };

            for sku in chunk {
                if deadline_passed(options) {
                    result.completed = false;
                    break 'chunks;
                }

                let detail = match records.get(sku) {
                    Some((record, identifiers)) => {
                        self.apply_record(sku, record, identifiers, options).await
                    }
                    None => match &scan_error {
                        // Скан упал: про эти SKU мы ничего не знаем
                        Some(message) => SyncItemDetail {
                            sku: sku.clone(),
                            status: SyncStatus::Failed,
                            remote_quantity: None,
                            local_quantity: None,
                            applied: false,
                            message: Some(message.clone()),
                        },
                        None => SyncItemDetail {
                            sku: sku.clone(),
                            status: SyncStatus::NotFound,
                            remote_quantity: None,
                            local_quantity: None,
                            applied: false,
                            message: None,
                        },
                    },
                };

                let mut entry = NewLogEntry::new(sku.clone(), SyncOperation::Pull, detail.status);
                if let Some((record, _)) = records.get(sku) {
                    entry = entry.with_source(record.source.as_str());
                }
                if let Some(ref message) = detail.message {
                    entry = entry.with_message(message.clone());
                }
                self.audit.record(entry).await;

                result.push_item(detail);
            }
        }

        result.duration_ms = started.elapsed().as_millis() as i64;
        tracing::info!(
            "Bulk sync finished: {} processed, {} ok, {} failed, {} not found in {} ms",
            result.total_processed,
            result.successful,
            result.failed,
            result.not_found,
            result.duration_ms
        );
        Ok(result)
    }

    /// Один ограниченный скан складских остатков на чанк; найденное
    /// накапливается в records. Ранний выход, когда найдены все SKU чанка.
    async fn scan_chunk(
        &self,
        chunk: &[String],
        options: &SyncOptions,
        records: &mut ChunkRecords,
    ) -> Result<(), MarketplaceError> {
        let wanted: HashSet<&str> = chunk.iter().map(String::as_str).collect();
        let page_size = self.config.marketplace.page_size;
        let priority = &self.config.resolver.field_priority;

        for page in 0..self.config.resolver.inventory_page_limit {
            if records.len() == wanted.len() || deadline_passed(options) {
                break;
            }
            let result = self.api.fetch_inventory_page(page, page_size).await?;
            for row in &result.items {
                let matched = if wanted.contains(row.variation_sku.as_str()) {
                    Some(row.variation_sku.clone())
                } else {
                    row.master_sku
                        .as_deref()
                        .filter(|m| wanted.contains(m))
                        .map(str::to_string)
                };
                if let Some(sku) = matched {
                    records.entry(sku).or_insert_with(|| {
                        (row.to_stock_record(priority), identifiers_from_inventory(row))
                    });
                }
            }
            if result.is_final() {
                break;
            }
        }

        if !options.catalog_fallback || records.len() == wanted.len() {
            return Ok(());
        }

        // Ненайденные в складских остатках досматриваем в мастер-каталоге
        for page in 0..self.config.sync.catalog_fallback_page_limit {
            if records.len() == wanted.len() || deadline_passed(options) {
                break;
            }
            let result = self.api.fetch_catalog_page(page, page_size, None).await?;
            for row in &result.items {
                let matched = wanted
                    .iter()
                    .find(|sku| row.matches_sku(sku))
                    .map(|sku| sku.to_string());
                if let Some(sku) = matched {
                    records.entry(sku).or_insert_with(|| {
                        (
                            row.to_stock_record(StockSource::MasterCatalog, priority),
                            identifiers_from_product(row),
                        )
                    });
                }
            }
            if result.is_final() {
                break;
            }
        }

        Ok(())
    }

    /// Применить найденную удаленную запись к локальному каталогу
    async fn apply_record(
        &self,
        sku: &str,
        record: &StockRecord,
        identifiers: &MarketplaceIdentifiers,
        options: &SyncOptions,
    ) -> SyncItemDetail {
        let Some(remote_quantity) = record.quantity() else {
            // Неизвестное количество не превращаем в ноль
            return SyncItemDetail {
                sku: sku.to_string(),
                status: SyncStatus::Failed,
                remote_quantity: None,
                local_quantity: None,
                applied: false,
                message: Some("Количество не определено: эндпоинт не вернул ни одного поля остатка".into()),
            };
        };

        let product = match self.catalog.get_product(sku).await {
            Ok(product) => product,
            Err(e) => {
                return SyncItemDetail {
                    sku: sku.to_string(),
                    status: SyncStatus::Failed,
                    remote_quantity: Some(remote_quantity),
                    local_quantity: None,
                    applied: false,
                    message: Some(format!("Ошибка чтения локального каталога: {}", e)),
                }
            }
        };
        let Some(product) = product else {
            return SyncItemDetail {
                sku: sku.to_string(),
                status: SyncStatus::Failed,
                remote_quantity: Some(remote_quantity),
                local_quantity: None,
                applied: false,
                message: Some("Товар отсутствует в локальном каталоге".into()),
            };
        };

        if options.only_active && !product.active {
            return SyncItemDetail {
                sku: sku.to_string(),
                status: SyncStatus::Success,
                remote_quantity: Some(remote_quantity),
                local_quantity: Some(product.current_stock),
                applied: false,
                message: Some("Пропущен: товар неактивен".into()),
            };
        }

        let unchanged = product.current_stock == remote_quantity;
        if options.dry_run || unchanged {
            return SyncItemDetail {
                sku: sku.to_string(),
                status: SyncStatus::Success,
                remote_quantity: Some(remote_quantity),
                local_quantity: Some(product.current_stock),
                applied: false,
                message: if unchanged {
                    None
                } else {
                    Some(format!(
                        "dry-run: {} -> {}",
                        product.current_stock, remote_quantity
                    ))
                },
            };
        }

        // Запись в каталог под замком SKU: параллельные запуски по одному
        // товару сериализуются
        let lock = self.locks.lock_for(sku);
        let _guard = lock.lock().await;
        if let Err(e) = self.catalog.set_stock(sku, remote_quantity).await {
            return SyncItemDetail {
                sku: sku.to_string(),
                status: SyncStatus::Failed,
                remote_quantity: Some(remote_quantity),
                local_quantity: Some(product.current_stock),
                applied: false,
                message: Some(format!("Ошибка записи остатка: {}", e)),
            };
        }

        // Остаток уже применен, поэтому сбой реестра не отменяет SUCCESS,
        // но и не глотается молча
        let mapping_note = match self.registry.upsert(sku, identifiers).await {
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Failed to refresh SKU mapping for {}: {}", sku, e);
                Some(format!("Остаток применен, сопоставление не сохранено: {}", e))
            }
        };

        SyncItemDetail {
            sku: sku.to_string(),
            status: SyncStatus::Success,
            remote_quantity: Some(remote_quantity),
            local_quantity: Some(product.current_stock),
            applied: true,
            message: mapping_note,
        }
    }
}

fn deadline_passed(options: &SyncOptions) -> bool {
    options
        .deadline
        .map(|deadline| Utc::now() >= deadline)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::a003_local_product::SqliteCatalog;
    use crate::shared::config::DatabaseConfig;
    use crate::shared::data::db;
    use crate::shared::marketplaces::mock::{inventory_row, product_row, MockMarketplace};
    use contracts::shared::stock::StockFields;

    fn test_config() -> Arc<Config> {
        let mut config = Config {
            database: DatabaseConfig {
                path: "sqlite::memory:".into(),
            },
            marketplace: Default::default(),
            resolver: Default::default(),
            sync: Default::default(),
            push: Default::default(),
        };
        config.resolver.inventory_page_limit = 4;
        config.sync.catalog_fallback_page_limit = 3;
        Arc::new(config)
    }

    struct Fixture {
        orchestrator: BulkSyncOrchestrator,
        catalog: Arc<SqliteCatalog>,
        audit: SyncAuditLog,
        mock: Arc<MockMarketplace>,
    }

    async fn fixture(mock: MockMarketplace) -> Fixture {
        let conn = db::connect("sqlite::memory:").await.unwrap();
        let mock = Arc::new(mock);
        let catalog = Arc::new(SqliteCatalog::new(conn.clone()));
        let audit = SyncAuditLog::new(conn.clone());
        let orchestrator = BulkSyncOrchestrator::new(
            mock.clone(),
            Arc::new(SkuMappingRegistry::new(conn)),
            catalog.clone(),
            audit.clone(),
            Arc::new(SkuLockMap::new()),
            test_config(),
        );
        Fixture {
            orchestrator,
            catalog,
            audit,
            mock,
        }
    }

    fn available(v: i64) -> StockFields {
        StockFields {
            available: Some(v),
            ..Default::default()
        }
    }

    fn warehouse_only(v: i64) -> StockFields {
        StockFields {
            warehouse: Some(v),
            ..Default::default()
        }
    }

    fn request(skus: &[&str], options: SyncOptions) -> SyncBatchRequest {
        SyncBatchRequest {
            skus: skus.iter().map(|s| s.to_string()).collect(),
            options,
        }
    }

    #[tokio::test]
    async fn batch_applies_remote_quantities() {
        let mock = MockMarketplace::new();
        mock.push_inventory_page(vec![inventory_row("A100", available(12))]);
        mock.push_inventory_page(vec![inventory_row("A101", warehouse_only(4))]);
        let f = fixture(mock).await;
        f.catalog.upsert_product("A100", "Кружка", 10, true).await.unwrap();
        f.catalog.upsert_product("A101", "Чайник", 9, true).await.unwrap();
        f.catalog.upsert_product("MISSING-1", "Блюдце", 1, true).await.unwrap();

        let result = f
            .orchestrator
            .execute(&request(&["A100", "A101", "MISSING-1"], SyncOptions::default()))
            .await
            .unwrap();

        assert_eq!(result.total_processed, 3);
        assert_eq!(result.successful, 2);
        assert_eq!(result.not_found, 1);
        assert!(result.completed);

        // available приоритетнее warehouse; warehouse без available тоже прямое чтение
        let a100 = f.catalog.get_product("A100").await.unwrap().unwrap();
        assert_eq!(a100.current_stock, 12);
        let a101 = f.catalog.get_product("A101").await.unwrap().unwrap();
        assert_eq!(a101.current_stock, 4);
        let missing = f.catalog.get_product("MISSING-1").await.unwrap().unwrap();
        assert_eq!(missing.current_stock, 1);
    }

    #[tokio::test]
    async fn dry_run_changes_nothing() {
        let mock = MockMarketplace::new();
        mock.push_inventory_page(vec![inventory_row("A100", available(12))]);
        let f = fixture(mock).await;
        f.catalog.upsert_product("A100", "Кружка", 10, true).await.unwrap();

        let options = SyncOptions {
            dry_run: true,
            ..Default::default()
        };
        let result = f.orchestrator.execute(&request(&["A100"], options)).await.unwrap();

        assert!(result.dry_run);
        assert_eq!(result.successful, 1);
        assert!(!result.items[0].applied);
        assert_eq!(result.items[0].remote_quantity, Some(12));
        // Локальный каталог не тронут, write-эндпоинт не вызывался
        let product = f.catalog.get_product("A100").await.unwrap().unwrap();
        assert_eq!(product.current_stock, 10);
        assert_eq!(f.mock.update_calls(), 0);
    }

    #[tokio::test]
    async fn equal_quantities_skip_write() {
        let mock = MockMarketplace::new();
        mock.push_inventory_page(vec![inventory_row("A100", available(10))]);
        let f = fixture(mock).await;
        f.catalog.upsert_product("A100", "Кружка", 10, true).await.unwrap();

        let result = f
            .orchestrator
            .execute(&request(&["A100"], SyncOptions::default()))
            .await
            .unwrap();
        assert_eq!(result.successful, 1);
        assert!(!result.items[0].applied);
    }

    #[tokio::test]
    async fn scan_stops_early_when_chunk_is_complete() {
        let mut mock = MockMarketplace::new();
        mock.endless_last_page = true;
        mock.push_inventory_page(vec![
            inventory_row("A100", available(1)),
            inventory_row("A101", available(2)),
        ]);
        let f = fixture(mock).await;
        f.catalog.upsert_product("A100", "Кружка", 0, true).await.unwrap();
        f.catalog.upsert_product("A101", "Чайник", 0, true).await.unwrap();

        f.orchestrator
            .execute(&request(&["A100", "A101"], SyncOptions::default()))
            .await
            .unwrap();
        // Все SKU нашлись на первой странице: дальше не листаем
        assert_eq!(f.mock.inventory_calls(), 1);
        assert_eq!(f.mock.catalog_calls(), 0);
    }

    #[tokio::test]
    async fn scanning_is_bounded_without_matches() {
        let mut mock = MockMarketplace::new();
        mock.endless_last_page = true;
        mock.push_inventory_page(vec![inventory_row("OTHER-1", available(1))]);
        mock.push_catalog_page(vec![product_row("OTHER-2", available(1))]);
        let f = fixture(mock).await;
        f.catalog.upsert_product("A100", "Кружка", 0, true).await.unwrap();

        let result = f
            .orchestrator
            .execute(&request(&["A100"], SyncOptions::default()))
            .await
            .unwrap();
        assert_eq!(result.not_found, 1);
        // Лимиты из конфигурации: 4 страницы остатков, 3 страницы каталога
        assert_eq!(f.mock.inventory_calls(), 4);
        assert_eq!(f.mock.catalog_calls(), 3);
    }

    #[tokio::test]
    async fn catalog_fallback_finds_unlisted_inventory() {
        let mock = MockMarketplace::new();
        // В складских остатках товара нет, в каталоге есть
        mock.push_catalog_page(vec![product_row("A100", available(6))]);
        let f = fixture(mock).await;
        f.catalog.upsert_product("A100", "Кружка", 1, true).await.unwrap();

        let result = f
            .orchestrator
            .execute(&request(&["A100"], SyncOptions::default()))
            .await
            .unwrap();
        assert_eq!(result.successful, 1);
        let product = f.catalog.get_product("A100").await.unwrap().unwrap();
        assert_eq!(product.current_stock, 6);
    }

    #[tokio::test]
    async fn scan_failure_marks_unresolved_skus_failed() {
        let mock = MockMarketplace::new();
        *mock.fail_reads_with.lock().unwrap() = Some("gateway down".into());
        let f = fixture(mock).await;
        f.catalog.upsert_product("A100", "Кружка", 1, true).await.unwrap();

        let result = f
            .orchestrator
            .execute(&request(&["A100", "A101"], SyncOptions::default()))
            .await
            .unwrap();
        assert_eq!(result.failed, 2);
        assert!(result.items[0].message.as_deref().unwrap().contains("gateway down"));

        let entries = f.audit.recent_failures(None, 1).await.unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn expired_deadline_returns_partial_result() {
        let mock = MockMarketplace::new();
        mock.push_inventory_page(vec![inventory_row("A100", available(5))]);
        let f = fixture(mock).await;

        let options = SyncOptions {
            deadline: Some(Utc::now() - chrono::Duration::seconds(1)),
            ..Default::default()
        };
        let result = f.orchestrator.execute(&request(&["A100"], options)).await.unwrap();
        assert!(!result.completed);
        assert_eq!(result.total_processed, 0);
    }

    #[tokio::test]
    async fn inactive_products_are_skipped_when_requested() {
        let mock = MockMarketplace::new();
        mock.push_inventory_page(vec![inventory_row("A100", available(12))]);
        let f = fixture(mock).await;
        f.catalog.upsert_product("A100", "Кружка", 10, false).await.unwrap();

        let options = SyncOptions {
            only_active: true,
            ..Default::default()
        };
        let result = f.orchestrator.execute(&request(&["A100"], options)).await.unwrap();
        assert_eq!(result.successful, 1);
        assert!(!result.items[0].applied);
        let product = f.catalog.get_product("A100").await.unwrap().unwrap();
        assert_eq!(product.current_stock, 10);
    }

    #[tokio::test]
    async fn mapping_store_failure_is_reported_on_applied_item() {
        let mock = Arc::new(MockMarketplace::new());
        mock.push_inventory_page(vec![inventory_row("A100", available(12))]);
        let conn = db::connect("sqlite::memory:").await.unwrap();

        // Ломаем реестр сопоставлений, остальные таблицы живы
        use sea_orm::{ConnectionTrait, Statement};
        conn.execute(Statement::from_string(
            sea_orm::DatabaseBackend::Sqlite,
            "DROP TABLE a001_sku_mapping;".to_string(),
        ))
        .await
        .unwrap();

        let catalog = Arc::new(SqliteCatalog::new(conn.clone()));
        catalog.upsert_product("A100", "Кружка", 1, true).await.unwrap();
        let orchestrator = BulkSyncOrchestrator::new(
            mock,
            Arc::new(SkuMappingRegistry::new(conn.clone())),
            catalog.clone(),
            SyncAuditLog::new(conn),
            Arc::new(SkuLockMap::new()),
            test_config(),
        );

        let result = orchestrator
            .execute(&request(&["A100"], SyncOptions::default()))
            .await
            .unwrap();

        // Остаток применен, сбой реестра виден в сообщении позиции
        assert_eq!(result.successful, 1);
        assert!(result.items[0].applied);
        assert!(result.items[0]
            .message
            .as_deref()
            .unwrap()
            .contains("сопоставление не сохранено"));
        let product = catalog.get_product("A100").await.unwrap().unwrap();
        assert_eq!(product.current_stock, 12);
    }

    #[tokio::test]
    async fn unknown_quantity_is_failure_not_zero() {
        let mock = MockMarketplace::new();
        mock.push_inventory_page(vec![inventory_row("A100", StockFields::default())]);
        let f = fixture(mock).await;
        f.catalog.upsert_product("A100", "Кружка", 10, true).await.unwrap();

        let result = f
            .orchestrator
            .execute(&request(&["A100"], SyncOptions::default()))
            .await
            .unwrap();
        assert_eq!(result.failed, 1);
        // Остаток не обнулен
        let product = f.catalog.get_product("A100").await.unwrap().unwrap();
        assert_eq!(product.current_stock, 10);
    }
}
