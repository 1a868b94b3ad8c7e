use std::sync::Arc;

use anyhow::Result;
use contracts::domain::a001_sku_mapping::aggregate::MarketplaceIdentifiers;
use contracts::shared::stock::{StockRecord, StockSource};
use contracts::shared::sync_log::{SyncOperation, SyncStatus};
use contracts::usecases::u601_resolve_stock::{ResolveOutcome, ResolveRequest, ResolveUrgency};

use crate::domain::a001_sku_mapping::SkuMappingRegistry;
use crate::shared::config::Config;
use crate::shared::marketplaces::{
    InventoryRow, MarketplaceError, ProductRow, StockMarketplaceApi,
};
use crate::shared::sync_log::{NewLogEntry, SyncAuditLog};

/// Стратегии поиска остатка в порядке убывания точности и стоимости.
///
/// Порядок зафиксирован списком, не ветвлением: первая успешная стратегия
/// останавливает цепочку, последующие не выполняются.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolveStrategy {
    /// Фильтрованный поиск по мастер-каталогу (дешево, фильтр ненадежен)
    DirectSearch,
    /// Постраничный скан складских остатков (авторитетные данные)
    InventoryScan,
    /// Постраничный скан мастер-каталога (последний шанс, данные вторичны)
    CatalogScan,
}

const STRATEGY_CHAIN: [ResolveStrategy; 3] = [
    ResolveStrategy::DirectSearch,
    ResolveStrategy::InventoryScan,
    ResolveStrategy::CatalogScan,
];

/// Executor для UseCase разрешения остатка одного SKU
pub struct StockResolver {
    api: Arc<dyn StockMarketplaceApi>,
    registry: Arc<SkuMappingRegistry>,
    audit: SyncAuditLog,
    config: Arc<Config>,
}

impl StockResolver {
    pub fn new(
        api: Arc<dyn StockMarketplaceApi>,
        registry: Arc<SkuMappingRegistry>,
        audit: SyncAuditLog,
        config: Arc<Config>,
    ) -> Self {
        Self {
            api,
            registry,
            audit,
            config,
        }
    }

    /// Разрешить остаток SKU по цепочке fallback-стратегий.
    ///
    /// Found и NotFound — нормальные исходы; Err возвращается только если
    /// хотя бы одна стратегия упала и совпадение так и не нашлось.
    /// Каждый исход фиксируется в журнале синхронизации.
    pub async fn resolve(&self, request: &ResolveRequest) -> Result<ResolveOutcome> {
        let started = std::time::Instant::now();
        let sku = request.sku.as_str();
        let mut last_error: Option<MarketplaceError> = None;

        for strategy in STRATEGY_CHAIN {
            match self.run_strategy(strategy, sku, request.urgency).await {
                Ok(Some((record, identifiers))) => {
                    let duration_ms = started.elapsed().as_millis() as i64;
                    // Сбой хранилища сопоставлений тоже обязан оставить след
                    // в журнале, прежде чем уйти наверх ошибкой
                    if let Err(e) = self.registry.upsert(sku, &identifiers).await {
                        self.audit
                            .record(
                                NewLogEntry::new(sku, SyncOperation::Pull, SyncStatus::Failed)
                                    .with_source(record.source.as_str())
                                    .with_message(format!(
                                        "Сопоставление не сохранено: {}",
                                        e
                                    ))
                                    .with_duration_ms(duration_ms),
                            )
                            .await;
                        return Err(e);
                    }
                    self.audit
                        .record(
                            NewLogEntry::new(sku, SyncOperation::Pull, SyncStatus::Success)
                                .with_source(record.source.as_str())
                                .with_duration_ms(duration_ms),
                        )
                        .await;
                    tracing::info!(
                        "Resolved {} via {} in {} ms",
                        sku,
                        record.source.as_str(),
                        duration_ms
                    );
                    return Ok(ResolveOutcome::Found { record });
                }
                Ok(None) => {}
                Err(e) => {
                    // Сбой стратегии не прерывает цепочку: следующая может найти
                    tracing::warn!("Resolve strategy {:?} failed for {}: {}", strategy, sku, e);
                    last_error = Some(e);
                }
            }
        }

        let duration_ms = started.elapsed().as_millis() as i64;

        if let Some(e) = last_error {
            self.audit
                .record(
                    NewLogEntry::new(sku, SyncOperation::Pull, SyncStatus::Failed)
                        .with_message(e.to_string())
                        .with_duration_ms(duration_ms),
                )
                .await;
            return Err(e.into());
        }

        self.audit
            .record(
                NewLogEntry::new(sku, SyncOperation::Pull, SyncStatus::NotFound)
                    .with_duration_ms(duration_ms),
            )
            .await;
        Ok(ResolveOutcome::NotFound)
    }

    async fn run_strategy(
        &self,
        strategy: ResolveStrategy,
        sku: &str,
        urgency: ResolveUrgency,
    ) -> Result<Option<(StockRecord, MarketplaceIdentifiers)>, MarketplaceError> {
        match strategy {
            ResolveStrategy::DirectSearch => self.direct_search(sku).await,
            ResolveStrategy::InventoryScan => self.inventory_scan(sku, urgency).await,
            ResolveStrategy::CatalogScan => self.catalog_scan(sku, urgency).await,
        }
    }

    /// Фильтрованный поиск по каталогу. Выдача фильтра обязательна к
    /// точной перепроверке: сервер может вернуть substring-совпадения
    /// или проигнорировать фильтр вовсе.
    async fn direct_search(
        &self,
        sku: &str,
    ) -> Result<Option<(StockRecord, MarketplaceIdentifiers)>, MarketplaceError> {
        let page_size = self.config.marketplace.page_size;
        for page in 0..self.config.resolver.search_page_limit {
            let result = self
                .api
                .fetch_catalog_page(page, page_size, Some(sku))
                .await?;
            if let Some(row) = result.items.iter().find(|row| row.matches_sku(sku)) {
                return Ok(Some(self.from_product(row)));
            }
            if result.is_final() {
                break;
            }
        }
        Ok(None)
    }

    /// Скан складских остатков до совпадения или лимита страниц
    async fn inventory_scan(
        &self,
        sku: &str,
        urgency: ResolveUrgency,
    ) -> Result<Option<(StockRecord, MarketplaceIdentifiers)>, MarketplaceError> {
        let page_size = self.config.marketplace.page_size;
        let page_limit = match urgency {
            ResolveUrgency::Normal => self.config.resolver.inventory_page_limit,
            ResolveUrgency::Deep => self.config.resolver.inventory_page_limit_deep,
        };
        for page in 0..page_limit {
            let result = self.api.fetch_inventory_page(page, page_size).await?;
            if let Some(row) = result.items.iter().find(|row| {
                row.variation_sku == sku || row.master_sku.as_deref() == Some(sku)
            }) {
                return Ok(Some(self.from_inventory(row)));
            }
            if result.is_final() {
                break;
            }
        }
        Ok(None)
    }

    /// Скан мастер-каталога без фильтра до совпадения или лимита страниц
    async fn catalog_scan(
        &self,
        sku: &str,
        urgency: ResolveUrgency,
    ) -> Result<Option<(StockRecord, MarketplaceIdentifiers)>, MarketplaceError> {
        let page_size = self.config.marketplace.page_size;
        let page_limit = match urgency {
            ResolveUrgency::Normal => self.config.resolver.catalog_page_limit,
            ResolveUrgency::Deep => self.config.resolver.catalog_page_limit_deep,
        };
        for page in 0..page_limit {
            let result = self.api.fetch_catalog_page(page, page_size, None).await?;
            if let Some(row) = result.items.iter().find(|row| row.matches_sku(sku)) {
                return Ok(Some(self.from_catalog(row)));
            }
            if result.is_final() {
                break;
            }
        }
        Ok(None)
    }

    fn from_product(&self, row: &ProductRow) -> (StockRecord, MarketplaceIdentifiers) {
        let record = row.to_stock_record(
            StockSource::DirectSearch,
            &self.config.resolver.field_priority,
        );
        (record, identifiers_from_product(row))
    }

    fn from_catalog(&self, row: &ProductRow) -> (StockRecord, MarketplaceIdentifiers) {
        let record = row.to_stock_record(
            StockSource::MasterCatalog,
            &self.config.resolver.field_priority,
        );
        (record, identifiers_from_product(row))
    }

    fn from_inventory(&self, row: &InventoryRow) -> (StockRecord, MarketplaceIdentifiers) {
        let record = row.to_stock_record(&self.config.resolver.field_priority);
        (record, identifiers_from_inventory(row))
    }
}

pub(crate) fn identifiers_from_product(row: &ProductRow) -> MarketplaceIdentifiers {
    MarketplaceIdentifiers {
        master_sku: row.master_sku.clone(),
        product_id: row.product_id,
        variation_id: row.variation_id,
        warehouse_id: None,
    }
}

pub(crate) fn identifiers_from_inventory(row: &InventoryRow) -> MarketplaceIdentifiers {
    MarketplaceIdentifiers {
        master_sku: row
            .master_sku
            .clone()
            .unwrap_or_else(|| row.variation_sku.clone()),
        product_id: row.product_id,
        variation_id: row.variation_id,
        warehouse_id: row.warehouse_id,
    }
}
