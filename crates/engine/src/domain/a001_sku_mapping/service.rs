use std::collections::HashMap;

use contracts::domain::a001_sku_mapping::aggregate::{
    MarketplaceIdentifiers, SkuMapping,
};
use sea_orm::DatabaseConnection;
use tokio::sync::RwLock;

use super::repository;

/// Реестр сопоставлений локальных SKU с идентификаторами маркетплейса.
///
/// Кэш read-through на весь процесс: промах идет в БД, попадание не
/// трогает ее вовсе. Записи не инвалидируются автоматически, свежесть
/// отражает last_verified_at.
pub struct SkuMappingRegistry {
    conn: DatabaseConnection,
    cache: RwLock<HashMap<String, SkuMapping>>,
}

impl SkuMappingRegistry {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self {
            conn,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Найти сопоставление по локальному SKU.
    ///
    /// Отсутствие записи это нормальный исход (Ok(None)), не ошибка:
    /// сопоставления создаются лениво при первом успешном разрешении.
    pub async fn resolve(&self, local_sku: &str) -> anyhow::Result<Option<SkuMapping>> {
        {
            let cache = self.cache.read().await;
            if let Some(mapping) = cache.get(local_sku) {
                return Ok(Some(mapping.clone()));
            }
        }

        let mapping = repository::get_by_local_sku(&self.conn, local_sku).await?;
        if let Some(ref mapping) = mapping {
            self.cache
                .write()
                .await
                .insert(local_sku.to_string(), mapping.clone());
        }
        Ok(mapping)
    }

    /// Создать или обновить сопоставление (last-write-wins).
    ///
    /// Вызывается после каждого успешного разрешения остатка, поэтому
    /// кэш и БД обновляются вместе.
    pub async fn upsert(
        &self,
        local_sku: &str,
        identifiers: &MarketplaceIdentifiers,
    ) -> anyhow::Result<SkuMapping> {
        let existing = self.resolve(local_sku).await?;

        let mapping = match existing {
            Some(mut mapping) => {
                mapping.refresh(identifiers);
                repository::update(&self.conn, &mapping).await?;
                mapping
            }
            None => {
                let mapping = SkuMapping::new_for_insert(local_sku, identifiers.clone());
                repository::insert(&self.conn, &mapping).await?;
                tracing::info!(
                    "Created SKU mapping: {} -> {} (product {})",
                    local_sku,
                    identifiers.master_sku,
                    identifiers.product_id
                );
                mapping
            }
        };

        self.cache
            .write()
            .await
            .insert(local_sku.to_string(), mapping.clone());
        Ok(mapping)
    }

    /// Все сопоставления (для отладки и выгрузок)
    pub async fn list_all(&self) -> anyhow::Result<Vec<SkuMapping>> {
        repository::list_all(&self.conn).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::data::db;

    async fn registry_with_memory_db() -> SkuMappingRegistry {
        let conn = db::connect("sqlite::memory:").await.unwrap();
        SkuMappingRegistry::new(conn)
    }

    fn identifiers(master_sku: &str, product_id: i64) -> MarketplaceIdentifiers {
        MarketplaceIdentifiers::new(master_sku, product_id)
    }

    #[tokio::test]
    async fn miss_is_ok_none() {
        let registry = registry_with_memory_db().await;
        let result = registry.resolve("UNKNOWN-1").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn upsert_then_resolve_round_trips() {
        let registry = registry_with_memory_db().await;
        registry.upsert("A100", &identifiers("MS-A100", 9001)).await.unwrap();

        let mapping = registry.resolve("A100").await.unwrap().expect("mapping");
        assert_eq!(mapping.local_sku, "A100");
        assert_eq!(mapping.identifiers.master_sku, "MS-A100");
        assert_eq!(mapping.identifiers.product_id, 9001);
    }

    #[tokio::test]
    async fn upsert_merges_and_bumps_version() {
        let registry = registry_with_memory_db().await;
        let mut first = identifiers("MS-A100", 9001);
        first.variation_id = Some(11);
        registry.upsert("A100", &first).await.unwrap();

        // Повторное разрешение без variation_id не должно его затереть
        let second = identifiers("MS-A100-v2", 9002);
        let updated = registry.upsert("A100", &second).await.unwrap();
        assert_eq!(updated.identifiers.master_sku, "MS-A100-v2");
        assert_eq!(updated.identifiers.variation_id, Some(11));
        assert_eq!(updated.metadata.version, 1);
    }

    #[tokio::test]
    async fn cache_hit_skips_database() {
        let registry = registry_with_memory_db().await;
        registry.upsert("A100", &identifiers("MS-A100", 9001)).await.unwrap();

        // Сносим таблицу под кэшем: попадание все равно обязано отвечать
        use sea_orm::{ConnectionTrait, Statement};
        registry
            .conn
            .execute(Statement::from_string(
                sea_orm::DatabaseBackend::Sqlite,
                "DROP TABLE a001_sku_mapping;".to_string(),
            ))
            .await
            .unwrap();

        let mapping = registry.resolve("A100").await.unwrap();
        assert!(mapping.is_some());
    }
}
