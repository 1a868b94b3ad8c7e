use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

/// Карта замков по SKU: не более одного писателя локального каталога на SKU.
///
/// Два одновременных запуска синхронизации по одному SKU сериализуются на
/// шаге применения; замки создаются лениво и живут до конца процесса.
#[derive(Default)]
pub struct SkuLockMap {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SkuLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Получить (или создать) замок для SKU
    pub fn lock_for(&self, sku: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().expect("sku lock map poisoned");
        locks
            .entry(sku.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}
