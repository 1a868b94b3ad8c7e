use crate::shared::stock::StockRecord;
use serde::{Deserialize, Serialize};

/// Исход разрешения остатка.
///
/// NotFound — легитимный исход (цепочка fallback прошла без совпадения),
/// ошибки вызовов сюда не попадают и поднимаются отдельно.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ResolveOutcome {
    Found { record: StockRecord },
    NotFound,
}

impl ResolveOutcome {
    pub fn record(&self) -> Option<&StockRecord> {
        match self {
            Self::Found { record } => Some(record),
            Self::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}
