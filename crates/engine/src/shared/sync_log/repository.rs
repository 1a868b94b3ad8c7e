use super::NewLogEntry;
use chrono::Utc;
use contracts::shared::sync_log::{SyncLogEntry, SyncOperation, SyncStatus};
use sea_orm::entity::prelude::*;
use sea_orm::{DatabaseConnection, QueryOrder, QuerySelect, Set};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sync_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub sku: String,
    pub operation: String,
    pub status: String,
    pub source: Option<String>,
    pub message: Option<String>,
    pub duration_ms: Option<i64>,
    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for SyncLogEntry {
    fn from(m: Model) -> Self {
        SyncLogEntry {
            id: m.id,
            sku: m.sku,
            // Неизвестные коды в журнале невозможны без ручной правки БД;
            // на всякий случай деградируем в FAILED, а не паникуем
            operation: SyncOperation::from_str_loose(&m.operation).unwrap_or(SyncOperation::Pull),
            status: SyncStatus::from_str_loose(&m.status).unwrap_or(SyncStatus::Failed),
            source: m.source,
            message: m.message,
            duration_ms: m.duration_ms,
            created_at: m
                .created_at
                .parse::<chrono::DateTime<chrono::Utc>>()
                .unwrap_or_else(|_| Utc::now()),
        }
    }
}

/// Добавить запись в журнал
pub async fn insert(conn: &DatabaseConnection, entry: &NewLogEntry) -> anyhow::Result<()> {
    let active = ActiveModel {
        id: sea_orm::ActiveValue::NotSet,
        sku: Set(entry.sku.clone()),
        operation: Set(entry.operation.as_str().to_string()),
        status: Set(entry.status.as_str().to_string()),
        source: Set(entry.source.clone()),
        message: Set(entry.message.clone()),
        duration_ms: Set(entry.duration_ms),
        created_at: Set(Utc::now().to_rfc3339()),
    };
    active.insert(conn).await?;
    Ok(())
}

/// Последние записи по SKU, новые сверху
pub async fn recent_for_sku(
    conn: &DatabaseConnection,
    sku: &str,
    limit: u64,
) -> anyhow::Result<Vec<SyncLogEntry>> {
    let entries: Vec<SyncLogEntry> = Entity::find()
        .filter(Column::Sku.eq(sku))
        .order_by_desc(Column::Id)
        .limit(limit)
        .all(conn)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(entries)
}

/// Записи со статусом FAILED за окно (по одному SKU или по всем)
pub async fn recent_failures(
    conn: &DatabaseConnection,
    sku: Option<&str>,
    window_days: i64,
) -> anyhow::Result<Vec<SyncLogEntry>> {
    let since = (Utc::now() - chrono::Duration::days(window_days)).to_rfc3339();
    let mut query = Entity::find()
        .filter(Column::Status.eq(SyncStatus::Failed.as_str()))
        .filter(Column::CreatedAt.gte(since));
    if let Some(sku) = sku {
        query = query.filter(Column::Sku.eq(sku));
    }
    let entries: Vec<SyncLogEntry> = query
        .order_by_desc(Column::Id)
        .all(conn)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(entries)
}

/// Различные SKU со сбоями за окно
pub async fn failed_skus_since(
    conn: &DatabaseConnection,
    window_days: i64,
) -> anyhow::Result<Vec<String>> {
    let since = (Utc::now() - chrono::Duration::days(window_days)).to_rfc3339();
    let skus: Vec<String> = Entity::find()
        .select_only()
        .column(Column::Sku)
        .distinct()
        .filter(Column::Status.eq(SyncStatus::Failed.as_str()))
        .filter(Column::CreatedAt.gte(since))
        .into_tuple()
        .all(conn)
        .await?;
    Ok(skus)
}
