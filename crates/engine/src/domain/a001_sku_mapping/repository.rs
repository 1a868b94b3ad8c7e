use chrono::Utc;
use contracts::domain::a001_sku_mapping::aggregate::{
    MarketplaceIdentifiers, SkuMapping, SkuMappingId,
};
use contracts::domain::common::EntityMetadata;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sea_orm::entity::prelude::*;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "a001_sku_mapping")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub local_sku: String,
    pub master_sku: String,
    pub product_id: i64,
    pub variation_id: Option<i64>,
    pub warehouse_id: Option<i64>,
    pub last_verified_at: chrono::DateTime<chrono::Utc>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for SkuMapping {
    fn from(m: Model) -> Self {
        let metadata = EntityMetadata {
            created_at: m.created_at.unwrap_or_else(Utc::now),
            updated_at: m.updated_at.unwrap_or_else(Utc::now),
            version: m.version,
        };
        let uuid = Uuid::parse_str(&m.id).unwrap_or_else(|_| Uuid::new_v4());

        SkuMapping {
            id: SkuMappingId::new(uuid),
            local_sku: m.local_sku,
            identifiers: MarketplaceIdentifiers {
                master_sku: m.master_sku,
                product_id: m.product_id,
                variation_id: m.variation_id,
                warehouse_id: m.warehouse_id,
            },
            last_verified_at: m.last_verified_at,
            metadata,
        }
    }
}

fn to_active(mapping: &SkuMapping) -> ActiveModel {
    ActiveModel {
        id: Set(mapping.id.value().to_string()),
        local_sku: Set(mapping.local_sku.clone()),
        master_sku: Set(mapping.identifiers.master_sku.clone()),
        product_id: Set(mapping.identifiers.product_id),
        variation_id: Set(mapping.identifiers.variation_id),
        warehouse_id: Set(mapping.identifiers.warehouse_id),
        last_verified_at: Set(mapping.last_verified_at),
        created_at: Set(Some(mapping.metadata.created_at)),
        updated_at: Set(Some(mapping.metadata.updated_at)),
        version: Set(mapping.metadata.version),
    }
}

pub async fn get_by_local_sku(
    conn: &DatabaseConnection,
    local_sku: &str,
) -> anyhow::Result<Option<SkuMapping>> {
    let result = Entity::find()
        .filter(Column::LocalSku.eq(local_sku))
        .one(conn)
        .await?;
    Ok(result.map(Into::into))
}

pub async fn insert(conn: &DatabaseConnection, mapping: &SkuMapping) -> anyhow::Result<Uuid> {
    mapping.validate().map_err(|e| anyhow::anyhow!(e))?;
    to_active(mapping).insert(conn).await?;
    Ok(mapping.id.value())
}

pub async fn update(conn: &DatabaseConnection, mapping: &SkuMapping) -> anyhow::Result<()> {
    mapping.validate().map_err(|e| anyhow::anyhow!(e))?;
    to_active(mapping).update(conn).await?;
    Ok(())
}

pub async fn list_all(conn: &DatabaseConnection) -> anyhow::Result<Vec<SkuMapping>> {
    let items: Vec<SkuMapping> = Entity::find()
        .all(conn)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(items)
}
