pub mod uzum;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use contracts::shared::stock::{PriorityField, StockFields, StockRecord, StockSource};

// ============================================================================
// Таксономия ошибок маркетплейса
// ============================================================================

/// Ошибка вызова API маркетплейса.
///
/// Transient — сеть/таймаут/лимит запросов, повторы уже исчерпаны клиентом.
/// Remote — маркетплейс отверг запрос; код и сообщение сохранены дословно,
/// повторы не выполняются.
#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    #[error("transient marketplace failure: {0}")]
    Transient(String),

    #[error("marketplace rejected request ({code}): {message}")]
    Remote { code: String, message: String },

    #[error("failed to parse marketplace response: {0}")]
    Parse(String),
}

impl MarketplaceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

pub type ApiResult<T> = Result<T, MarketplaceError>;

// ============================================================================
// Страница выдачи
// ============================================================================

/// Страница постраничной выдачи (нумерация с нуля).
///
/// has_more и total у маркетплейса противоречивы; авторитетен только
/// признак пустой страницы.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: Option<bool>,
    pub total: Option<i64>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            has_more: None,
            total: None,
        }
    }

    /// Конец данных: пустая страница, независимо от has_more/total
    pub fn is_final(&self) -> bool {
        self.items.is_empty()
    }
}

// ============================================================================
// Нормализованные строки эндпоинтов
// ============================================================================

/// Магазин продавца (эндпоинт списка магазинов)
#[derive(Debug, Clone)]
pub struct ShopRow {
    pub id: i64,
    pub name: String,
}

/// Склад продавца (эндпоинт списка складов)
#[derive(Debug, Clone)]
pub struct WarehouseRow {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
}

/// Строка мастер-каталога. Остатки здесь могут быть вторичными/устаревшими.
#[derive(Debug, Clone)]
pub struct ProductRow {
    pub product_id: i64,
    pub master_sku: String,
    pub name: String,
    pub variation_id: Option<i64>,
    pub variation_sku: Option<String>,
    pub fields: StockFields,
}

impl ProductRow {
    /// Точное (case-sensitive) совпадение строки с искомым SKU
    pub fn matches_sku(&self, sku: &str) -> bool {
        self.master_sku == sku || self.variation_sku.as_deref() == Some(sku)
    }

    /// Нормализовать в StockRecord (адаптер эндпоинта каталога)
    pub fn to_stock_record(&self, source: StockSource, priority: &[PriorityField]) -> StockRecord {
        let sku = self
            .variation_sku
            .clone()
            .unwrap_or_else(|| self.master_sku.clone());
        StockRecord::new(
            sku,
            Some(self.name.clone()),
            self.fields.clone(),
            source,
            priority,
        )
    }
}

/// Строка складских остатков: вложенная вариация плюс блок остатков.
/// Авторитетный источник реальной доступности.
#[derive(Debug, Clone)]
pub struct InventoryRow {
    pub product_id: i64,
    pub variation_id: Option<i64>,
    /// SKU вариации (masterVariation.sku) — ключ точного совпадения
    pub variation_sku: String,
    pub master_sku: Option<String>,
    pub name: Option<String>,
    pub warehouse_id: Option<i64>,
    pub fields: StockFields,
}

impl InventoryRow {
    /// Нормализовать в StockRecord (адаптер эндпоинта складских остатков)
    pub fn to_stock_record(&self, priority: &[PriorityField]) -> StockRecord {
        StockRecord::new(
            self.variation_sku.clone(),
            self.name.clone(),
            self.fields.clone(),
            StockSource::BulkInventory,
            priority,
        )
    }
}

/// Пара для write-эндпоинта: абсолютное целевое количество
#[derive(Debug, Clone, PartialEq)]
pub struct StockUpdate {
    pub sku: String,
    pub quantity: i64,
}

/// Построчный результат write-эндпоинта
#[derive(Debug, Clone)]
pub struct StockUpdateResult {
    pub sku: String,
    pub success: bool,
    pub applied_quantity: Option<i64>,
    pub message: Option<String>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Результат проверки подключения к маркетплейсу
#[derive(Debug, Clone)]
pub struct TestConnectionResult {
    pub success: bool,
    pub message: String,
    pub duration_ms: u64,
    pub details: Option<String>,
}

// ============================================================================
// Трейт клиента
// ============================================================================

/// Клиент эндпоинтов остатков маркетплейса.
///
/// Единственная точка сетевого I/O движка; реализация обязана сама
/// выполнять подпись запросов, таймауты и ограниченные повторы, и быть
/// безопасной для конкурентного использования.
#[async_trait]
pub trait StockMarketplaceApi: Send + Sync {
    /// Список магазинов продавца
    async fn fetch_shops(&self) -> ApiResult<Vec<ShopRow>>;

    /// Список складов продавца
    async fn fetch_warehouses(&self) -> ApiResult<Vec<WarehouseRow>>;

    /// Страница мастер-каталога; search — ненадежный серверный фильтр
    /// по SKU/наименованию (может тихо деградировать до substring)
    async fn fetch_catalog_page(
        &self,
        page: i32,
        page_size: i32,
        search: Option<&str>,
    ) -> ApiResult<Page<ProductRow>>;

    /// Страница складских остатков
    async fn fetch_inventory_page(&self, page: i32, page_size: i32)
        -> ApiResult<Page<InventoryRow>>;

    /// Отправка абсолютных остатков; результат построчный
    async fn update_stocks(&self, items: &[StockUpdate]) -> ApiResult<Vec<StockUpdateResult>>;

    /// Проверка подключения (легкий вызов списка магазинов)
    async fn test_connection(&self) -> TestConnectionResult;
}
