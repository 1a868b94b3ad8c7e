//! Сценарный мок клиента маркетплейса для тестов движка.
//!
//! Страницы задаются заранее, каждый эндпоинт считает вызовы. Это
//! позволяет проверять порядок стратегий, ограниченность сканирования
//! и чистоту dry-run без сети.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    ApiResult, InventoryRow, MarketplaceError, Page, ProductRow, ShopRow, StockMarketplaceApi,
    StockUpdate, StockUpdateResult, TestConnectionResult, WarehouseRow,
};
use contracts::shared::stock::StockFields;

#[derive(Default)]
pub struct MockMarketplace {
    pub catalog_pages: Mutex<Vec<Page<ProductRow>>>,
    pub inventory_pages: Mutex<Vec<Page<InventoryRow>>>,
    /// Страница за пределами списка повторяется бесконечно
    /// (маркетплейс, который никогда не отдает пустую страницу)
    pub endless_last_page: bool,
    /// Фильтр searchQuery тихо возвращает пустую выдачу
    pub broken_search: bool,
    /// SKU, которые write-эндпоинт отвергает с этим сообщением
    pub rejected_skus: Mutex<Vec<(String, String)>>,
    /// Ошибка, возвращаемая каждым read-вызовом (для тестов деградации)
    pub fail_reads_with: Mutex<Option<String>>,

    pub shops_calls: AtomicUsize,
    pub catalog_calls: AtomicUsize,
    pub inventory_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub pushed: Mutex<Vec<StockUpdate>>,
}

impl MockMarketplace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_catalog_page(&self, items: Vec<ProductRow>) {
        self.catalog_pages.lock().unwrap().push(Page {
            items,
            has_more: None,
            total: None,
        });
    }

    pub fn push_inventory_page(&self, items: Vec<InventoryRow>) {
        self.inventory_pages.lock().unwrap().push(Page {
            items,
            has_more: None,
            total: None,
        });
    }

    pub fn reject_sku(&self, sku: &str, message: &str) {
        self.rejected_skus
            .lock()
            .unwrap()
            .push((sku.to_string(), message.to_string()));
    }

    pub fn catalog_calls(&self) -> usize {
        self.catalog_calls.load(Ordering::SeqCst)
    }

    pub fn inventory_calls(&self) -> usize {
        self.inventory_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    fn read_error(&self) -> Option<MarketplaceError> {
        self.fail_reads_with
            .lock()
            .unwrap()
            .as_ref()
            .map(|m| MarketplaceError::Transient(m.clone()))
    }

    fn page_at<T: Clone>(&self, pages: &[Page<T>], page: i32) -> Page<T> {
        let idx = page as usize;
        if idx < pages.len() {
            pages[idx].clone()
        } else if self.endless_last_page && !pages.is_empty() {
            pages[pages.len() - 1].clone()
        } else {
            Page::empty()
        }
    }
}

/// Строка инвентаря с заданными полями остатков
pub fn inventory_row(sku: &str, fields: StockFields) -> InventoryRow {
    InventoryRow {
        product_id: 1000,
        variation_id: Some(1),
        variation_sku: sku.to_string(),
        master_sku: Some(sku.to_string()),
        name: Some(format!("Товар {}", sku)),
        warehouse_id: Some(501),
        fields,
    }
}

/// Строка каталога с заданными полями остатков
pub fn product_row(sku: &str, fields: StockFields) -> ProductRow {
    ProductRow {
        product_id: 2000,
        master_sku: sku.to_string(),
        name: format!("Товар {}", sku),
        variation_id: Some(1),
        variation_sku: Some(sku.to_string()),
        fields,
    }
}

#[async_trait]
impl StockMarketplaceApi for MockMarketplace {
    async fn fetch_shops(&self) -> ApiResult<Vec<ShopRow>> {
        self.shops_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.read_error() {
            return Err(e);
        }
        Ok(vec![ShopRow {
            id: 77,
            name: "Test shop".to_string(),
        }])
    }

    async fn fetch_warehouses(&self) -> ApiResult<Vec<WarehouseRow>> {
        if let Some(e) = self.read_error() {
            return Err(e);
        }
        Ok(vec![WarehouseRow {
            id: 501,
            name: "Main".to_string(),
            is_active: true,
        }])
    }

    async fn fetch_catalog_page(
        &self,
        page: i32,
        _page_size: i32,
        search: Option<&str>,
    ) -> ApiResult<Page<ProductRow>> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.read_error() {
            return Err(e);
        }
        let pages = self.catalog_pages.lock().unwrap();
        let mut result = self.page_at(&pages, page);
        // Серверный фильтр имитируем как substring: ровно та деградация,
        // из-за которой резолвер обязан перепроверять точное совпадение
        if let Some(q) = search {
            if self.broken_search {
                result.items.clear();
            } else {
                result.items.retain(|p| {
                    p.master_sku.contains(q)
                        || p.variation_sku.as_deref().map(|s| s.contains(q)).unwrap_or(false)
                });
            }
        }
        Ok(result)
    }

    async fn fetch_inventory_page(
        &self,
        page: i32,
        _page_size: i32,
    ) -> ApiResult<Page<InventoryRow>> {
        self.inventory_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.read_error() {
            return Err(e);
        }
        let pages = self.inventory_pages.lock().unwrap();
        Ok(self.page_at(&pages, page))
    }

    async fn update_stocks(&self, items: &[StockUpdate]) -> ApiResult<Vec<StockUpdateResult>> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.pushed.lock().unwrap().extend(items.iter().cloned());
        let rejected = self.rejected_skus.lock().unwrap();
        Ok(items
            .iter()
            .map(|item| {
                let rejection = rejected.iter().find(|(sku, _)| sku == &item.sku);
                match rejection {
                    Some((_, message)) => StockUpdateResult {
                        sku: item.sku.clone(),
                        success: false,
                        applied_quantity: None,
                        message: Some(message.clone()),
                        updated_at: None,
                    },
                    None => StockUpdateResult {
                        sku: item.sku.clone(),
                        success: true,
                        applied_quantity: Some(item.quantity),
                        message: None,
                        updated_at: Some(chrono::Utc::now()),
                    },
                }
            })
            .collect())
    }

    async fn test_connection(&self) -> TestConnectionResult {
        let start = std::time::Instant::now();
        match self.fetch_shops().await {
            Ok(shops) => TestConnectionResult {
                success: true,
                message: format!("Найдено магазинов: {}", shops.len()),
                duration_ms: start.elapsed().as_millis() as u64,
                details: None,
            },
            Err(e) => TestConnectionResult {
                success: false,
                message: e.to_string(),
                duration_ms: start.elapsed().as_millis() as u64,
                details: None,
            },
        }
    }
}
