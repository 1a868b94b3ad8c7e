use contracts::shared::stock::PriorityField;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub marketplace: MarketplaceConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub push: PushConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MarketplaceConfig {
    pub base_url: String,
    pub sandbox_url: String,
    pub timeout_secs: u64,
    /// Лимит повторов на 429/5xx/timeout до transient-ошибки
    pub max_retries: u32,
    pub page_size: i32,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-seller.uzum.uz".into(),
            sandbox_url: "https://api-seller-sandbox.uzum.uz".into(),
            timeout_secs: 30,
            max_retries: 3,
            page_size: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ResolverConfig {
    /// Порядок предпочтения полей остатка. Соответствие полей API витрине
    /// маркетплейса не документировано, поэтому порядок настраивается
    pub field_priority: Vec<PriorityField>,
    /// Страниц фильтрованного поиска по мастер-каталогу
    pub search_page_limit: i32,
    /// Страниц скана складских остатков (обычный / глубокий режим)
    pub inventory_page_limit: i32,
    pub inventory_page_limit_deep: i32,
    /// Страниц скана мастер-каталога (обычный / глубокий режим)
    pub catalog_page_limit: i32,
    pub catalog_page_limit_deep: i32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            field_priority: vec![PriorityField::Available, PriorityField::Warehouse],
            search_page_limit: 3,
            inventory_page_limit: 20,
            inventory_page_limit_deep: 120,
            catalog_page_limit: 10,
            catalog_page_limit_deep: 40,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SyncConfig {
    /// Размер чанка пакетной синхронизации
    pub chunk_size: usize,
    /// Отдельный лимит страниц для fallback-скана каталога по ненайденным SKU
    pub catalog_fallback_page_limit: i32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            chunk_size: 50,
            catalog_fallback_page_limit: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PushConfig {
    /// Потолок параллелизма при разрешении идентификаторов перед отправкой
    pub concurrency: usize,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

/// Default configuration embedded in the binary
const DEFAULT_CONFIG: &str = r#"
[database]
path = "target/db/stock_sync.db"

[marketplace]
base_url = "https://api-seller.uzum.uz"
sandbox_url = "https://api-seller-sandbox.uzum.uz"
timeout_secs = 30
max_retries = 3
page_size = 100

[resolver]
field_priority = ["available", "warehouse"]
search_page_limit = 3
inventory_page_limit = 20
inventory_page_limit_deep = 120
catalog_page_limit = 10
catalog_page_limit_deep = 40

[sync]
chunk_size = 50
catalog_fallback_page_limit = 10

[push]
concurrency = 4
"#;

impl Config {
    /// Проверка инвариантов конфигурации; нарушение прерывает запуск целиком
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.resolver.field_priority.is_empty() {
            anyhow::bail!("resolver.field_priority must not be empty");
        }
        if self.marketplace.page_size <= 0 {
            anyhow::bail!("marketplace.page_size must be positive");
        }
        if self.resolver.inventory_page_limit <= 0 || self.resolver.catalog_page_limit <= 0 {
            anyhow::bail!("resolver page limits must be positive");
        }
        if self.sync.chunk_size == 0 {
            anyhow::bail!("sync.chunk_size must be positive");
        }
        if self.push.concurrency == 0 {
            anyhow::bail!("push.concurrency must be positive");
        }
        Ok(())
    }
}

/// Load configuration from config.toml file
///
/// Search order:
/// 1. Next to the executable (for production)
/// 2. Falls back to embedded default config
pub fn load_config() -> anyhow::Result<Config> {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let config_path = exe_dir.join("config.toml");

            if config_path.exists() {
                tracing::info!("Loading config from: {}", config_path.display());
                let contents = std::fs::read_to_string(&config_path)?;
                let config: Config = toml::from_str(&contents)?;
                config.validate()?;
                return Ok(config);
            } else {
                tracing::warn!("config.toml not found at: {}", config_path.display());
            }
        }
    }

    tracing::info!("Using default embedded configuration");
    let config: Config = toml::from_str(DEFAULT_CONFIG)?;
    config.validate()?;
    Ok(config)
}

/// Get the database file path from configuration
/// Resolves relative paths relative to the executable directory
pub fn get_database_path(config: &Config) -> anyhow::Result<PathBuf> {
    let db_path_str = &config.database.path;
    let db_path = Path::new(db_path_str);

    if db_path.is_absolute() {
        return Ok(db_path.to_path_buf());
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            return Ok(exe_dir.join(db_path));
        }
    }

    Ok(PathBuf::from(db_path_str))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_loads() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).expect("default config must parse");
        assert_eq!(config.database.path, "target/db/stock_sync.db");
        assert_eq!(config.marketplace.max_retries, 3);
        assert_eq!(
            config.resolver.field_priority,
            vec![PriorityField::Available, PriorityField::Warehouse]
        );
        config.validate().expect("default config must validate");
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: Config = toml::from_str("[database]\npath = \"x.db\"").unwrap();
        assert_eq!(config.sync.chunk_size, 50);
        assert_eq!(config.resolver.inventory_page_limit, 20);
        assert_eq!(config.push.concurrency, 4);
    }

    #[test]
    fn test_empty_field_priority_rejected() {
        let config: Config =
            toml::from_str("[database]\npath = \"x.db\"\n[resolver]\nfield_priority = []").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_custom_field_priority_parses() {
        let config: Config = toml::from_str(
            "[database]\npath = \"x.db\"\n[resolver]\nfield_priority = [\"warehouse\", \"available\"]",
        )
        .unwrap();
        assert_eq!(
            config.resolver.field_priority,
            vec![PriorityField::Warehouse, PriorityField::Available]
        );
    }
}
