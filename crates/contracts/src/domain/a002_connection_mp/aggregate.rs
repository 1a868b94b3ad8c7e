use serde::{Deserialize, Serialize};

/// Подключение к Uzum Market Seller API.
///
/// Передается в движок явно (без глобального состояния); учетные данные
/// хранит вызывающая сторона.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMp {
    /// Человекочитаемое наименование подключения
    pub description: String,

    #[serde(rename = "API_Key")]
    pub api_key: String,

    /// Секрет для подписи запросов (X-Signature)
    #[serde(rename = "API_Secret")]
    pub api_secret: String,

    /// ID магазина продавца
    #[serde(rename = "ID_Магазина")]
    pub shop_id: String,

    /// Склад по умолчанию для операций с остатками
    pub default_warehouse_id: Option<i64>,

    /// Тестовый режим (sandbox base URL)
    #[serde(rename = "ТестовыйРежим", default)]
    pub test_mode: bool,
}

impl ConnectionMp {
    pub fn new(
        description: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        shop_id: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            shop_id: shop_id.into(),
            default_warehouse_id: None,
            test_mode: false,
        }
    }

    /// Валидация данных
    pub fn validate(&self) -> Result<(), String> {
        if self.api_key.trim().is_empty() {
            return Err("API Key не может быть пустым".into());
        }
        if self.api_secret.trim().is_empty() {
            return Err("API Secret не может быть пустым".into());
        }
        if self.shop_id.trim().is_empty() {
            return Err("ID магазина должен быть указан".into());
        }
        Ok(())
    }
}
