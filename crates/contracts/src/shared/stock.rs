use serde::{Deserialize, Serialize};

// ============================================================================
// Источник данных
// ============================================================================

/// Какой эндпоинт маркетплейса дал запись об остатке
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockSource {
    /// Фильтрованный поиск по мастер-каталогу
    DirectSearch,

    /// Постраничный скан складских остатков
    BulkInventory,

    /// Постраничный скан мастер-каталога
    MasterCatalog,
}

impl StockSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectSearch => "DIRECT_SEARCH",
            Self::BulkInventory => "BULK_INVENTORY",
            Self::MasterCatalog => "MASTER_CATALOG",
        }
    }
}

// ============================================================================
// Сырые поля остатков
// ============================================================================

/// Поле остатка, участвующее в приоритетном выборе количества.
///
/// Порядок приоритета задается конфигурацией ([resolver] field_priority):
/// точное соответствие полей API витрине маркетплейса не документировано,
/// поэтому порядок нельзя зашивать в код.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityField {
    Available,
    Warehouse,
}

/// Подполя остатка, как их возвращают эндпоинты маркетплейса.
///
/// Любое подмножество может отсутствовать — эндпоинты непоследовательны.
/// Отсутствующее поле это None, а не ноль.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockFields {
    pub warehouse: Option<i64>,
    pub available: Option<i64>,
    pub locked: Option<i64>,
    pub spare: Option<i64>,
    pub transport: Option<i64>,
    pub safety: Option<i64>,
    pub promotion: Option<i64>,
}

impl StockFields {
    /// Есть ли хоть одно известное подполе
    pub fn is_empty(&self) -> bool {
        self.warehouse.is_none()
            && self.available.is_none()
            && self.locked.is_none()
            && self.spare.is_none()
            && self.transport.is_none()
            && self.safety.is_none()
            && self.promotion.is_none()
    }

    fn field(&self, f: PriorityField) -> Option<i64> {
        match f {
            PriorityField::Available => self.available,
            PriorityField::Warehouse => self.warehouse,
        }
    }

    /// Привести поля к каноническому количеству по политике приоритетов.
    ///
    /// 1. Первое присутствующее поле из списка приоритетов — прямое чтение.
    /// 2. Иначе сумма известных подполей (warehouse + locked + spare +
    ///    transport + promotion) — производное значение.
    /// 3. Если неизвестно ни одно подполе — Unknown, а не ноль.
    pub fn resolve(&self, priority: &[PriorityField]) -> ResolvedQuantity {
        for f in priority {
            if let Some(v) = self.field(*f) {
                return ResolvedQuantity::Direct(v.max(0));
            }
        }

        if self.is_empty() {
            return ResolvedQuantity::Unknown;
        }

        let parts = [
            self.warehouse,
            self.locked,
            self.spare,
            self.transport,
            self.promotion,
        ];
        let sum: i64 = parts.iter().flatten().sum();
        ResolvedQuantity::Derived(sum.max(0))
    }
}

/// Каноническое количество после применения политики приоритетов
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum ResolvedQuantity {
    /// Прямое чтение одного из приоритетных полей
    Direct(i64),

    /// Сумма известных подполей (прямого чтения не было)
    Derived(i64),

    /// Ни одно подполе не известно
    Unknown,
}

impl ResolvedQuantity {
    pub fn value(&self) -> Option<i64> {
        match self {
            Self::Direct(v) | Self::Derived(v) => Some(*v),
            Self::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

// ============================================================================
// Нормализованная запись об остатке
// ============================================================================

/// Запись об остатке одного SKU, нормализованная из ответа любого эндпоинта.
///
/// Транзиентный value object: не персистится и не шарится между задачами.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockRecord {
    /// SKU на стороне маркетплейса (вариация, если есть)
    pub sku: String,

    pub product_name: Option<String>,

    pub fields: StockFields,

    pub source: StockSource,

    /// Каноническое количество по политике приоритетов
    pub resolved: ResolvedQuantity,

    pub fetched_at: chrono::DateTime<chrono::Utc>,
}

impl StockRecord {
    pub fn new(
        sku: impl Into<String>,
        product_name: Option<String>,
        fields: StockFields,
        source: StockSource,
        priority: &[PriorityField],
    ) -> Self {
        let resolved = fields.resolve(priority);
        Self {
            sku: sku.into(),
            product_name,
            fields,
            source,
            resolved,
            fetched_at: chrono::Utc::now(),
        }
    }

    pub fn quantity(&self) -> Option<i64> {
        self.resolved.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT_PRIORITY: [PriorityField; 2] = [PriorityField::Available, PriorityField::Warehouse];

    #[test]
    fn available_wins_over_warehouse() {
        let fields = StockFields {
            available: Some(12),
            warehouse: Some(99),
            ..Default::default()
        };
        assert_eq!(fields.resolve(&DEFAULT_PRIORITY), ResolvedQuantity::Direct(12));
    }

    #[test]
    fn warehouse_alone_is_direct() {
        let fields = StockFields {
            warehouse: Some(5),
            ..Default::default()
        };
        assert_eq!(fields.resolve(&DEFAULT_PRIORITY), ResolvedQuantity::Direct(5));
    }

    #[test]
    fn subfields_sum_into_derived_total() {
        let fields = StockFields {
            locked: Some(2),
            spare: Some(1),
            ..Default::default()
        };
        assert_eq!(fields.resolve(&DEFAULT_PRIORITY), ResolvedQuantity::Derived(3));
    }

    #[test]
    fn empty_fields_are_unknown_not_zero() {
        let fields = StockFields::default();
        assert_eq!(fields.resolve(&DEFAULT_PRIORITY), ResolvedQuantity::Unknown);
        assert_eq!(fields.resolve(&DEFAULT_PRIORITY).value(), None);
    }

    #[test]
    fn negative_remote_values_clamp_to_zero() {
        let fields = StockFields {
            available: Some(-4),
            ..Default::default()
        };
        assert_eq!(fields.resolve(&DEFAULT_PRIORITY), ResolvedQuantity::Direct(0));
    }

    #[test]
    fn reversed_priority_prefers_warehouse() {
        let fields = StockFields {
            available: Some(12),
            warehouse: Some(99),
            ..Default::default()
        };
        let priority = [PriorityField::Warehouse, PriorityField::Available];
        assert_eq!(fields.resolve(&priority), ResolvedQuantity::Direct(99));
    }

    #[test]
    fn safety_only_record_is_derived_zero_sum() {
        // safety_stock не входит в сумму, но запись не пустая — производный ноль
        let fields = StockFields {
            safety: Some(7),
            ..Default::default()
        };
        assert_eq!(fields.resolve(&DEFAULT_PRIORITY), ResolvedQuantity::Derived(0));
    }
}
