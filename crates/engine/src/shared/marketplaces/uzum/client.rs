use rand::Rng;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use async_trait::async_trait;
use contracts::domain::a002_connection_mp::aggregate::ConnectionMp;
use contracts::shared::stock::StockFields;

use crate::shared::config::MarketplaceConfig;
use crate::shared::marketplaces::{
    ApiResult, InventoryRow, MarketplaceError, Page, ProductRow, ShopRow, StockMarketplaceApi,
    StockUpdate, StockUpdateResult, TestConnectionResult, WarehouseRow,
};

const BACKOFF_BASE_MS: u64 = 500;

/// HTTP-клиент для работы с Uzum Market Seller API
///
/// Каждый запрос подписывается (X-Signature); 429/5xx/таймауты повторяются
/// с экспоненциальной задержкой до max_retries, прочие отказы возвращаются
/// как Remote без повторов.
pub struct UzumApiClient {
    client: reqwest::Client,
    base_url: String,
    connection: ConnectionMp,
    max_retries: u32,
}

impl UzumApiClient {
    pub fn new(connection: ConnectionMp, config: &MarketplaceConfig) -> Self {
        let base_url = if connection.test_mode {
            config.sandbox_url.clone()
        } else {
            config.base_url.clone()
        };
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(config.timeout_secs))
                .build()
                .expect("Failed to create HTTP client"),
            base_url,
            connection,
            max_retries: config.max_retries,
        }
    }

    /// Подпись запроса: hex(SHA-256(api_secret + METHOD + path + timestamp))
    fn sign(&self, method: &str, path: &str, timestamp: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.connection.api_secret.as_bytes());
        hasher.update(method.as_bytes());
        hasher.update(path.as_bytes());
        hasher.update(timestamp.as_bytes());
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }

    fn backoff_delay(attempt: u32) -> std::time::Duration {
        let base = BACKOFF_BASE_MS * (1u64 << attempt.min(6));
        // Джиттер ±20%, чтобы повторные запросы не синхронизировались
        let factor = rand::thread_rng().gen_range(0.8..1.2);
        std::time::Duration::from_millis((base as f64 * factor) as u64)
    }

    /// Выполнить запрос с подписью и ограниченными повторами
    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> ApiResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt: u32 = 0;

        loop {
            let timestamp = chrono::Utc::now().timestamp_millis().to_string();
            let signature = self.sign(method.as_str(), path, &timestamp);

            let mut builder = self
                .client
                .request(method.clone(), &url)
                .header("Authorization", format!("Bearer {}", self.connection.api_key))
                .header("X-Shop-Id", &self.connection.shop_id)
                .header("X-Timestamp", &timestamp)
                .header("X-Signature", &signature)
                .query(query);
            if let Some(body) = body {
                builder = builder.json(body);
            }

            let response = match builder.send().await {
                Ok(response) => response,
                Err(e) => {
                    if (e.is_timeout() || e.is_connect()) && attempt < self.max_retries {
                        let delay = Self::backoff_delay(attempt);
                        tracing::warn!(
                            "Uzum API {} {} network failure ({}), retry {}/{} in {:?}",
                            method,
                            path,
                            e,
                            attempt + 1,
                            self.max_retries,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(MarketplaceError::Transient(format!(
                        "{} {} failed after {} attempts: {}",
                        method, path, attempt + 1, e
                    )));
                }
            };

            let status = response.status();
            let body_text = response.text().await.unwrap_or_default();

            if status.is_success() {
                return serde_json::from_str::<T>(&body_text).map_err(|e| {
                    let preview: String = body_text.chars().take(500).collect();
                    tracing::error!("Failed to parse Uzum API response: {}. Body: {}", e, preview);
                    MarketplaceError::Parse(format!("{} {}: {}. Body: {}", method, path, e, preview))
                });
            }

            if Self::is_retryable(status) {
                if attempt < self.max_retries {
                    let delay = Self::backoff_delay(attempt);
                    tracing::warn!(
                        "Uzum API {} {} returned {}, retry {}/{} in {:?}",
                        method,
                        path,
                        status,
                        attempt + 1,
                        self.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                return Err(MarketplaceError::Transient(format!(
                    "{} {} returned {} after {} attempts",
                    method,
                    path,
                    status,
                    attempt + 1
                )));
            }

            // Отказ маркетплейса: код и сообщение сохраняем дословно
            let (code, message) = match serde_json::from_str::<UzumErrorBody>(&body_text) {
                Ok(err) => (
                    err.error_code.unwrap_or_else(|| status.as_u16().to_string()),
                    err.message.unwrap_or(body_text),
                ),
                Err(_) => (status.as_u16().to_string(), body_text),
            };
            tracing::error!("Uzum API {} {} rejected ({}): {}", method, path, code, message);
            return Err(MarketplaceError::Remote { code, message });
        }
    }

    fn is_retryable(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }
}

#[async_trait]
impl StockMarketplaceApi for UzumApiClient {
    /// Список магазинов через GET /v1/seller/shops
    async fn fetch_shops(&self) -> ApiResult<Vec<ShopRow>> {
        let response: UzumShopsResponse = self
            .request(reqwest::Method::GET, "/v1/seller/shops", &[], None)
            .await?;
        Ok(response.shops.into_iter().map(Into::into).collect())
    }

    /// Список складов через GET /v1/seller/warehouses
    async fn fetch_warehouses(&self) -> ApiResult<Vec<WarehouseRow>> {
        let response: UzumWarehousesResponse = self
            .request(reqwest::Method::GET, "/v1/seller/warehouses", &[], None)
            .await?;
        Ok(response.warehouses.into_iter().map(Into::into).collect())
    }

    /// Страница мастер-каталога через GET /v1/seller/products.
    /// searchQuery на стороне маркетплейса ненадежен (substring, периодически
    /// игнорируется), результат обязателен к точной перепроверке.
    async fn fetch_catalog_page(
        &self,
        page: i32,
        page_size: i32,
        search: Option<&str>,
    ) -> ApiResult<Page<ProductRow>> {
        let mut query = vec![("page", page.to_string()), ("size", page_size.to_string())];
        if let Some(search) = search {
            query.push(("searchQuery", search.to_string()));
        }
        let response: UzumProductsResponse = self
            .request(reqwest::Method::GET, "/v1/seller/products", &query, None)
            .await?;
        Ok(Page {
            items: response.product_list.into_iter().map(Into::into).collect(),
            has_more: response.has_more,
            total: response.total_elements,
        })
    }

    /// Страница складских остатков через GET /v1/seller/warehouse-inventory
    async fn fetch_inventory_page(
        &self,
        page: i32,
        page_size: i32,
    ) -> ApiResult<Page<InventoryRow>> {
        let query = vec![("page", page.to_string()), ("size", page_size.to_string())];
        let response: UzumInventoryResponse = self
            .request(
                reqwest::Method::GET,
                "/v1/seller/warehouse-inventory",
                &query,
                None,
            )
            .await?;
        Ok(Page {
            items: response.items.into_iter().map(Into::into).collect(),
            has_more: response.has_more,
            total: response.total_elements,
        })
    }

    /// Отправка абсолютных остатков через POST /v1/seller/stocks
    async fn update_stocks(&self, items: &[StockUpdate]) -> ApiResult<Vec<StockUpdateResult>> {
        let request = UzumStocksUpdateRequest {
            warehouse_id: self.connection.default_warehouse_id,
            stocks: items
                .iter()
                .map(|item| UzumStockAmount {
                    sku: item.sku.clone(),
                    amount: item.quantity,
                })
                .collect(),
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| MarketplaceError::Parse(format!("failed to encode stocks body: {}", e)))?;
        let response: UzumStocksUpdateResponse = self
            .request(
                reqwest::Method::POST,
                "/v1/seller/stocks",
                &[],
                Some(&body),
            )
            .await?;
        Ok(response.results.into_iter().map(Into::into).collect())
    }

    /// Проверка подключения легким вызовом списка магазинов
    async fn test_connection(&self) -> TestConnectionResult {
        let start = std::time::Instant::now();
        match self.fetch_shops().await {
            Ok(shops) => {
                let names: Vec<String> = shops.iter().map(|s| s.name.clone()).collect();
                TestConnectionResult {
                    success: true,
                    message: format!("Подключение успешно, магазинов: {}", shops.len()),
                    duration_ms: start.elapsed().as_millis() as u64,
                    details: Some(names.join(", ")),
                }
            }
            Err(e) => TestConnectionResult {
                success: false,
                message: format!("Ошибка подключения: {}", e),
                duration_ms: start.elapsed().as_millis() as u64,
                details: None,
            },
        }
    }
}

// ============================================================================
// Request/Response structures для Uzum Market Seller API
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UzumErrorBody {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UzumShopsResponse {
    #[serde(default)]
    pub shops: Vec<UzumShop>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UzumShop {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UzumWarehousesResponse {
    #[serde(default)]
    pub warehouses: Vec<UzumWarehouse>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UzumWarehouse {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UzumProductsResponse {
    #[serde(default)]
    pub product_list: Vec<UzumProduct>,
    #[serde(default)]
    pub has_more: Option<bool>,
    #[serde(default)]
    pub total_elements: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UzumProduct {
    pub product_id: i64,
    pub seller_sku: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub variation: Option<UzumVariationBrief>,
    // Остатки каталога вторичны и могут отставать от складских
    #[serde(default)]
    pub stocks: Option<UzumStock>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UzumVariationBrief {
    pub id: i64,
    #[serde(default)]
    pub sku: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UzumInventoryResponse {
    #[serde(default)]
    pub items: Vec<UzumInventoryItem>,
    #[serde(default)]
    pub has_more: Option<bool>,
    #[serde(default)]
    pub total_elements: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UzumInventoryItem {
    pub product_id: i64,
    #[serde(default)]
    pub warehouse_id: Option<i64>,
    pub master_variation: UzumMasterVariation,
    #[serde(default)]
    pub stock: Option<UzumStock>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UzumMasterVariation {
    #[serde(default)]
    pub id: Option<i64>,
    pub sku: String,
    #[serde(default)]
    pub master_sku: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Блок остатков: любое поле может отсутствовать в зависимости от
/// эндпоинта и состояния товара
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UzumStock {
    #[serde(default)]
    pub warehouse: Option<i64>,
    #[serde(default)]
    pub available: Option<i64>,
    #[serde(default)]
    pub locked: Option<i64>,
    #[serde(default)]
    pub spare: Option<i64>,
    #[serde(default)]
    pub transport: Option<i64>,
    #[serde(default)]
    pub safety: Option<i64>,
    #[serde(default)]
    pub promotion: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UzumStocksUpdateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse_id: Option<i64>,
    pub stocks: Vec<UzumStockAmount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UzumStockAmount {
    pub sku: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UzumStocksUpdateResponse {
    #[serde(default)]
    pub results: Vec<UzumStockResult>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UzumStockResult {
    pub sku: String,
    pub status: String,
    #[serde(default)]
    pub applied_amount: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

// ============================================================================
// Адаптеры ответов API в нормализованные строки движка
// ============================================================================

impl From<UzumShop> for ShopRow {
    fn from(shop: UzumShop) -> Self {
        ShopRow {
            id: shop.id,
            name: shop.name,
        }
    }
}

impl From<UzumWarehouse> for WarehouseRow {
    fn from(warehouse: UzumWarehouse) -> Self {
        WarehouseRow {
            id: warehouse.id,
            name: warehouse.name,
            is_active: warehouse.is_active,
        }
    }
}

impl From<UzumStock> for StockFields {
    fn from(stock: UzumStock) -> Self {
        StockFields {
            warehouse: stock.warehouse,
            available: stock.available,
            locked: stock.locked,
            spare: stock.spare,
            transport: stock.transport,
            safety: stock.safety,
            promotion: stock.promotion,
        }
    }
}

impl From<UzumProduct> for ProductRow {
    fn from(product: UzumProduct) -> Self {
        ProductRow {
            product_id: product.product_id,
            name: product.title.unwrap_or_default(),
            variation_id: product.variation.as_ref().map(|v| v.id),
            variation_sku: product.variation.and_then(|v| v.sku),
            master_sku: product.seller_sku,
            fields: product.stocks.map(Into::into).unwrap_or_default(),
        }
    }
}

impl From<UzumInventoryItem> for InventoryRow {
    fn from(item: UzumInventoryItem) -> Self {
        InventoryRow {
            product_id: item.product_id,
            variation_id: item.master_variation.id,
            variation_sku: item.master_variation.sku,
            master_sku: item.master_variation.master_sku,
            name: item.master_variation.title,
            warehouse_id: item.warehouse_id,
            fields: item.stock.map(Into::into).unwrap_or_default(),
        }
    }
}

impl From<UzumStockResult> for StockUpdateResult {
    fn from(result: UzumStockResult) -> Self {
        StockUpdateResult {
            success: result.status == "OK",
            sku: result.sku,
            applied_quantity: result.applied_amount,
            message: result.message,
            updated_at: result.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> UzumApiClient {
        let connection = ConnectionMp::new("test", "key-1", "secret-1", "777");
        UzumApiClient::new(connection, &MarketplaceConfig::default())
    }

    #[test]
    fn signature_is_deterministic_hex() {
        let client = test_client();
        let a = client.sign("GET", "/v1/seller/shops", "1700000000000");
        let b = client.sign("GET", "/v1/seller/shops", "1700000000000");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        // Любое изменение входа меняет подпись
        let c = client.sign("POST", "/v1/seller/shops", "1700000000000");
        assert_ne!(a, c);
    }

    #[test]
    fn sandbox_url_used_in_test_mode() {
        let mut connection = ConnectionMp::new("test", "key-1", "secret-1", "777");
        connection.test_mode = true;
        let client = UzumApiClient::new(connection, &MarketplaceConfig::default());
        assert_eq!(client.base_url, "https://api-seller-sandbox.uzum.uz");
    }

    #[test]
    fn inventory_item_maps_nested_variation() {
        let json = r#"{
            "productId": 9001,
            "warehouseId": 501,
            "masterVariation": {"id": 11, "sku": "A100", "masterSku": "A100-M", "title": "Кружка"},
            "stock": {"available": 12, "warehouse": 15, "locked": 3}
        }"#;
        let item: UzumInventoryItem = serde_json::from_str(json).unwrap();
        let row: InventoryRow = item.into();
        assert_eq!(row.variation_sku, "A100");
        assert_eq!(row.master_sku.as_deref(), Some("A100-M"));
        assert_eq!(row.fields.available, Some(12));
        assert_eq!(row.fields.warehouse, Some(15));
        assert_eq!(row.fields.safety, None);
    }

    #[test]
    fn product_without_stocks_maps_to_empty_fields() {
        let json = r#"{"productId": 1, "sellerSku": "B200", "title": "Чайник"}"#;
        let product: UzumProduct = serde_json::from_str(json).unwrap();
        let row: ProductRow = product.into();
        assert_eq!(row.master_sku, "B200");
        assert!(row.fields.is_empty());
    }

    #[test]
    fn stock_result_status_maps_to_success_flag() {
        let json = r#"{"sku": "A100", "status": "REJECTED", "message": "unknown sku"}"#;
        let result: UzumStockResult = serde_json::from_str(json).unwrap();
        let mapped: StockUpdateResult = result.into();
        assert!(!mapped.success);
        assert_eq!(mapped.message.as_deref(), Some("unknown sku"));
    }
}
