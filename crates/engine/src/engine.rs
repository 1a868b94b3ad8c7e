use std::sync::Arc;

use anyhow::Result;
use contracts::shared::sync_log::SyncLogEntry;
use contracts::usecases::common::SyncBatchResult;
use contracts::usecases::u601_resolve_stock::{ResolveOutcome, ResolveRequest};
use contracts::usecases::u602_bulk_sync::SyncBatchRequest;
use contracts::usecases::u603_push_stocks::{PushBatchRequest, PushItem, PushOptions, PushResult};
use sea_orm::DatabaseConnection;

use crate::domain::a001_sku_mapping::SkuMappingRegistry;
use crate::domain::a003_local_product::LocalCatalog;
use crate::shared::config::Config;
use crate::shared::marketplaces::{StockMarketplaceApi, TestConnectionResult};
use crate::shared::sku_lock::SkuLockMap;
use crate::shared::sync_log::SyncAuditLog;
use crate::usecases::u601_resolve_stock::StockResolver;
use crate::usecases::u602_bulk_sync::BulkSyncOrchestrator;
use crate::usecases::u603_push_stocks::PushEngine;

/// Фасад движка синхронизации остатков.
///
/// Все зависимости передаются явно при сборке: клиент маркетплейса и
/// локальный каталог — трейт-объектами, соединение с БД — снаружи.
/// Компоненты шарят реестр сопоставлений, журнал и карту замков.
pub struct SyncEngine {
    api: Arc<dyn StockMarketplaceApi>,
    resolver: Arc<StockResolver>,
    orchestrator: BulkSyncOrchestrator,
    push: PushEngine,
    audit: SyncAuditLog,
}

impl SyncEngine {
    pub fn new(
        conn: DatabaseConnection,
        api: Arc<dyn StockMarketplaceApi>,
        catalog: Arc<dyn LocalCatalog>,
        config: Arc<Config>,
    ) -> Self {
        let registry = Arc::new(SkuMappingRegistry::new(conn.clone()));
        let audit = SyncAuditLog::new(conn);
        let locks = Arc::new(SkuLockMap::new());

        let resolver = Arc::new(StockResolver::new(
            api.clone(),
            registry.clone(),
            audit.clone(),
            config.clone(),
        ));
        let orchestrator = BulkSyncOrchestrator::new(
            api.clone(),
            registry.clone(),
            catalog,
            audit.clone(),
            locks,
            config.clone(),
        );
        let push = PushEngine::new(
            api.clone(),
            registry,
            resolver.clone(),
            audit.clone(),
            config,
        );

        Self {
            api,
            resolver,
            orchestrator,
            push,
            audit,
        }
    }

    /// Разрешить остаток одного SKU по цепочке fallback-стратегий
    pub async fn resolve_single(&self, request: &ResolveRequest) -> Result<ResolveOutcome> {
        self.resolver.resolve(request).await
    }

    /// Пакетная синхронизация: удаленные остатки -> локальный каталог
    pub async fn sync_batch(&self, request: &SyncBatchRequest) -> Result<SyncBatchResult> {
        self.orchestrator.execute(request).await
    }

    /// Пакетная отправка абсолютных остатков на маркетплейс
    pub async fn push_batch(&self, request: &PushBatchRequest) -> Result<SyncBatchResult> {
        self.push.execute(request).await
    }

    /// Отправка одного SKU
    pub async fn push_single(&self, item: PushItem, options: PushOptions) -> Result<PushResult> {
        self.push.push_single(item, options).await
    }

    /// Последние записи журнала по SKU (отладка конкретного товара)
    pub async fn recent_for_sku(&self, sku: &str, limit: u64) -> Result<Vec<SyncLogEntry>> {
        self.audit.recent_for_sku(sku, limit).await
    }

    /// Недавние сбои (по одному SKU или по всем)
    pub async fn recent_failures(
        &self,
        sku: Option<&str>,
        window_days: i64,
    ) -> Result<Vec<SyncLogEntry>> {
        self.audit.recent_failures(sku, window_days).await
    }

    /// SKU со сбоями за окно — кандидаты на повторную синхронизацию
    pub async fn failed_skus_since(&self, window_days: i64) -> Result<Vec<String>> {
        self.audit.failed_skus_since(window_days).await
    }

    /// Повторить синхронизацию всех SKU, падавших за окно
    pub async fn retry_failed(&self, window_days: i64) -> Result<SyncBatchResult> {
        let skus = self.audit.failed_skus_since(window_days).await?;
        tracing::info!("Retrying {} failed SKUs from last {} days", skus.len(), window_days);
        self.orchestrator
            .execute(&SyncBatchRequest {
                skus,
                options: Default::default(),
            })
            .await
    }

    /// Проверка подключения к маркетплейсу
    pub async fn test_connection(&self) -> TestConnectionResult {
        self.api.test_connection().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::a003_local_product::SqliteCatalog;
    use crate::shared::config::DatabaseConfig;
    use crate::shared::data::db;
    use crate::shared::marketplaces::mock::{inventory_row, MockMarketplace};
    use contracts::shared::stock::StockFields;
    use contracts::shared::sync_log::SyncStatus;

    fn test_config() -> Arc<Config> {
        Arc::new(Config {
            database: DatabaseConfig {
                path: "sqlite::memory:".into(),
            },
            marketplace: Default::default(),
            resolver: Default::default(),
            sync: Default::default(),
            push: Default::default(),
        })
    }

    async fn engine_with(mock: MockMarketplace) -> (SyncEngine, Arc<SqliteCatalog>) {
        let conn = db::connect("sqlite::memory:").await.unwrap();
        let catalog = Arc::new(SqliteCatalog::new(conn.clone()));
        let engine = SyncEngine::new(conn, Arc::new(mock), catalog.clone(), test_config());
        (engine, catalog)
    }

    #[tokio::test]
    async fn full_cycle_resolve_sync_and_history() {
        let mock = MockMarketplace::new();
        mock.push_inventory_page(vec![inventory_row(
            "A100",
            StockFields {
                available: Some(12),
                ..Default::default()
            },
        )]);
        let (engine, catalog) = engine_with(mock).await;
        catalog.upsert_product("A100", "Кружка", 10, true).await.unwrap();

        let outcome = engine
            .resolve_single(&ResolveRequest::new("A100"))
            .await
            .unwrap();
        assert!(outcome.is_found());

        let result = engine
            .sync_batch(&SyncBatchRequest {
                skus: vec!["A100".into()],
                options: Default::default(),
            })
            .await
            .unwrap();
        assert_eq!(result.successful, 1);
        assert_eq!(catalog.get_product("A100").await.unwrap().unwrap().current_stock, 12);

        let history = engine.recent_for_sku("A100", 10).await.unwrap();
        assert!(history.iter().all(|e| e.status == SyncStatus::Success));
        assert!(history.len() >= 2);
    }

    #[tokio::test]
    async fn retry_failed_picks_up_logged_failures() {
        let mock = MockMarketplace::new();
        *mock.fail_reads_with.lock().unwrap() = Some("gateway down".into());
        let (engine, catalog) = engine_with(mock).await;
        catalog.upsert_product("A100", "Кружка", 1, true).await.unwrap();

        let _ = engine.resolve_single(&ResolveRequest::new("A100")).await;
        let failed = engine.failed_skus_since(1).await.unwrap();
        assert_eq!(failed, vec!["A100".to_string()]);
    }
}
