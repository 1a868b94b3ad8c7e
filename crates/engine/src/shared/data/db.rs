use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, Statement};

/// Открыть sqlite-базу и гарантировать схему.
///
/// Возвращает соединение вызывающей стороне — движок собирается через
/// явное внедрение зависимостей, глобального состояния нет.
pub async fn connect(db_path: &str) -> anyhow::Result<DatabaseConnection> {
    let conn = if db_path == "sqlite::memory:" {
        Database::connect(db_path).await?
    } else {
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let absolute_path = if std::path::Path::new(db_path).is_absolute() {
            std::path::PathBuf::from(db_path)
        } else {
            std::env::current_dir()?.join(db_path)
        };
        // Normalize path separators and ensure proper URL form on Windows
        let normalized = absolute_path.to_string_lossy().replace('\\', "/");
        let needs_leading_slash = !normalized.starts_with('/') && normalized.contains(':');
        let prefix = if needs_leading_slash { "/" } else { "" };
        let db_url = format!("sqlite://{}{}?mode=rwc", prefix, normalized);
        Database::connect(&db_url).await?
    };

    bootstrap_schema(&conn).await?;
    Ok(conn)
}

async fn table_exists(conn: &DatabaseConnection, name: &str) -> anyhow::Result<bool> {
    let check = format!(
        "SELECT name FROM sqlite_master WHERE type='table' AND name='{}';",
        name
    );
    let rows = conn
        .query_all(Statement::from_string(DatabaseBackend::Sqlite, check))
        .await?;
    Ok(!rows.is_empty())
}

/// Минимальный бутстрап схемы (таблицы создаются при первом запуске)
pub async fn bootstrap_schema(conn: &DatabaseConnection) -> anyhow::Result<()> {
    if !table_exists(conn, "a001_sku_mapping").await? {
        tracing::info!("Creating a001_sku_mapping table");
        let create_sku_mapping_sql = r#"
            CREATE TABLE a001_sku_mapping (
                id TEXT PRIMARY KEY NOT NULL,
                local_sku TEXT NOT NULL UNIQUE,
                master_sku TEXT NOT NULL,
                product_id INTEGER NOT NULL,
                variation_id INTEGER,
                warehouse_id INTEGER,
                last_verified_at TEXT NOT NULL,
                created_at TEXT,
                updated_at TEXT,
                version INTEGER NOT NULL DEFAULT 0
            );
        "#;
        conn.execute(Statement::from_string(
            DatabaseBackend::Sqlite,
            create_sku_mapping_sql.to_string(),
        ))
        .await?;
    }

    if !table_exists(conn, "a003_local_product").await? {
        tracing::info!("Creating a003_local_product table");
        let create_local_product_sql = r#"
            CREATE TABLE a003_local_product (
                sku TEXT PRIMARY KEY NOT NULL,
                name TEXT NOT NULL DEFAULT '',
                current_stock INTEGER NOT NULL DEFAULT 0,
                active INTEGER NOT NULL DEFAULT 1,
                updated_at TEXT
            );
        "#;
        conn.execute(Statement::from_string(
            DatabaseBackend::Sqlite,
            create_local_product_sql.to_string(),
        ))
        .await?;
    }

    if !table_exists(conn, "sync_log").await? {
        tracing::info!("Creating sync_log table");
        let create_sync_log_sql = r#"
            CREATE TABLE sync_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sku TEXT NOT NULL,
                operation TEXT NOT NULL,
                status TEXT NOT NULL,
                source TEXT,
                message TEXT,
                duration_ms INTEGER,
                created_at TEXT NOT NULL
            );
        "#;
        conn.execute(Statement::from_string(
            DatabaseBackend::Sqlite,
            create_sync_log_sql.to_string(),
        ))
        .await?;

        // Индексы под два паттерна чтения журнала:
        // последние записи по SKU и недавние сбои по статусу
        conn.execute(Statement::from_string(
            DatabaseBackend::Sqlite,
            "CREATE INDEX idx_sync_log_sku ON sync_log (sku, id DESC);".to_string(),
        ))
        .await?;
        conn.execute(Statement::from_string(
            DatabaseBackend::Sqlite,
            "CREATE INDEX idx_sync_log_status_created ON sync_log (status, created_at);"
                .to_string(),
        ))
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_creates_queryable_tables() {
        let conn = connect("sqlite::memory:").await.expect("connect in-memory");
        for table in ["a001_sku_mapping", "a003_local_product", "sync_log"] {
            assert!(table_exists(&conn, table).await.unwrap(), "{} missing", table);
        }
    }

    #[tokio::test]
    async fn bootstrap_is_idempotent() {
        let conn = connect("sqlite::memory:").await.unwrap();
        bootstrap_schema(&conn).await.expect("second bootstrap must not fail");
    }
}
