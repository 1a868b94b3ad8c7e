use crate::domain::common::EntityMetadata;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// ID Type
// ============================================================================

/// Уникальный идентификатор сопоставления SKU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SkuMappingId(pub Uuid);

impl SkuMappingId {
    pub fn new(value: Uuid) -> Self {
        Self(value)
    }

    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

// ============================================================================
// Value objects
// ============================================================================

/// Идентификаторы товара на стороне маркетплейса.
///
/// Все поля кроме master_sku могут отсутствовать: маркетплейс присваивает
/// variation_id и warehouse_id не для всех товаров.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketplaceIdentifiers {
    /// Мастер-SKU маркетплейса (их собственный артикул)
    pub master_sku: String,

    /// Внутренний ID товара в каталоге маркетплейса
    pub product_id: i64,

    /// ID вариации (для товаров с вариантами)
    pub variation_id: Option<i64>,

    /// ID склада, к которому привязан остаток
    pub warehouse_id: Option<i64>,
}

impl MarketplaceIdentifiers {
    pub fn new(master_sku: impl Into<String>, product_id: i64) -> Self {
        Self {
            master_sku: master_sku.into(),
            product_id,
            variation_id: None,
            warehouse_id: None,
        }
    }

    /// Слить новые идентификаторы поверх текущих (last-write-wins по полям).
    ///
    /// Отсутствующее (None) поле в `other` не затирает уже известное значение.
    pub fn merge_from(&mut self, other: &MarketplaceIdentifiers) {
        self.master_sku = other.master_sku.clone();
        self.product_id = other.product_id;
        if other.variation_id.is_some() {
            self.variation_id = other.variation_id;
        }
        if other.warehouse_id.is_some() {
            self.warehouse_id = other.warehouse_id;
        }
    }
}

// ============================================================================
// Aggregate
// ============================================================================

/// Сопоставление локального SKU с идентификаторами маркетплейса.
///
/// Создается лениво при первом успешном разрешении остатка.
/// Записи никогда не удаляются автоматически — устаревание отслеживается
/// через last_verified_at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkuMapping {
    pub id: SkuMappingId,

    /// Локальный SKU (уникален в таблице)
    pub local_sku: String,

    pub identifiers: MarketplaceIdentifiers,

    /// Когда сопоставление последний раз подтверждалось данными маркетплейса
    pub last_verified_at: chrono::DateTime<chrono::Utc>,

    pub metadata: EntityMetadata,
}

impl SkuMapping {
    /// Создать новое сопоставление для вставки в БД
    pub fn new_for_insert(local_sku: impl Into<String>, identifiers: MarketplaceIdentifiers) -> Self {
        Self {
            id: SkuMappingId::new_v4(),
            local_sku: local_sku.into(),
            identifiers,
            last_verified_at: chrono::Utc::now(),
            metadata: EntityMetadata::new(),
        }
    }

    /// Применить новые идентификаторы и отметить подтверждение
    pub fn refresh(&mut self, identifiers: &MarketplaceIdentifiers) {
        self.identifiers.merge_from(identifiers);
        self.last_verified_at = chrono::Utc::now();
        self.metadata.touch();
    }

    /// Валидация данных
    pub fn validate(&self) -> Result<(), String> {
        if self.local_sku.trim().is_empty() {
            return Err("Локальный SKU не может быть пустым".into());
        }
        if self.identifiers.master_sku.trim().is_empty() {
            return Err("Master SKU маркетплейса не может быть пустым".into());
        }
        Ok(())
    }
}
