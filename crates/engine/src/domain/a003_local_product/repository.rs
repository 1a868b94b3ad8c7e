use async_trait::async_trait;
use chrono::Utc;
use contracts::domain::a003_local_product::aggregate::LocalProduct;
use serde::{Deserialize, Serialize};

use sea_orm::entity::prelude::*;
use sea_orm::{EntityTrait, Set};

/// Локальный каталог глазами движка: прочитать товар, записать остаток.
///
/// Продакшен-каталог может жить в другой системе; движку достаточно
/// этих двух операций.
#[async_trait]
pub trait LocalCatalog: Send + Sync {
    async fn get_product(&self, sku: &str) -> anyhow::Result<Option<LocalProduct>>;

    /// Записать новый остаток (абсолютное значение)
    async fn set_stock(&self, sku: &str, quantity: i64) -> anyhow::Result<()>;
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "a003_local_product")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub sku: String,
    pub name: String,
    pub current_stock: i64,
    pub active: bool,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for LocalProduct {
    fn from(m: Model) -> Self {
        LocalProduct {
            sku: m.sku,
            current_stock: m.current_stock,
            active: m.active,
            updated_at: m.updated_at,
        }
    }
}

/// Локальный каталог в той же sqlite-базе, что и остальной движок
#[derive(Clone)]
pub struct SqliteCatalog {
    conn: DatabaseConnection,
}

impl SqliteCatalog {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Завести или перезаписать товар (первичное наполнение каталога)
    pub async fn upsert_product(
        &self,
        sku: &str,
        name: &str,
        current_stock: i64,
        active: bool,
    ) -> anyhow::Result<()> {
        let active_model = ActiveModel {
            sku: Set(sku.to_string()),
            name: Set(name.to_string()),
            current_stock: Set(current_stock),
            active: Set(active),
            updated_at: Set(Some(Utc::now())),
        };
        Entity::insert(active_model)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(Column::Sku)
                    .update_columns([
                        Column::Name,
                        Column::CurrentStock,
                        Column::Active,
                        Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl LocalCatalog for SqliteCatalog {
    async fn get_product(&self, sku: &str) -> anyhow::Result<Option<LocalProduct>> {
        let result = Entity::find_by_id(sku).one(&self.conn).await?;
        Ok(result.map(Into::into))
    }

    async fn set_stock(&self, sku: &str, quantity: i64) -> anyhow::Result<()> {
        let existing = Entity::find_by_id(sku).one(&self.conn).await?;
        let Some(model) = existing else {
            anyhow::bail!("Local product not found: {}", sku);
        };
        let mut active: ActiveModel = model.into();
        active.current_stock = Set(quantity);
        active.updated_at = Set(Some(Utc::now()));
        active.update(&self.conn).await?;
        Ok(())
    }
}
