use crate::error::PlatformError;
use crate::id::FarmId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Hands out one mutex per farm so that operations touching the same farm
/// serialize while operations on different farms proceed in parallel.
///
/// The scope guards only local read-modify-write of store state; callers
/// must not hold it across an asset-ledger round-trip, which can block for
/// seconds.
#[derive(Debug, Default)]
pub struct FarmLockRegistry {
    scopes: Mutex<HashMap<FarmId, Arc<Mutex<()>>>>,
}

impl FarmLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or create) the mutual-exclusion scope for one farm. Lock the
    /// returned mutex for the duration of a local read-modify-write.
    pub fn scope(&self, farm_id: &FarmId) -> Result<Arc<Mutex<()>>, PlatformError> {
        let mut scopes = self
            .scopes
            .lock()
            .map_err(|e| PlatformError::Other(format!("lock registry poisoned: {}", e)))?;
        Ok(scopes.entry(farm_id.clone()).or_default().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_same_farm_shares_a_scope() {
        let registry = FarmLockRegistry::new();
        let a = registry.scope(&FarmId::new("farm-1")).unwrap();
        let b = registry.scope(&FarmId::new("farm-1")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let other = registry.scope(&FarmId::new("farm-2")).unwrap();
        assert!(!Arc::ptr_eq(&a, &other));
    }

    #[test]
    fn test_scope_serializes_critical_sections() {
        let registry = Arc::new(FarmLockRegistry::new());
        let counter = Arc::new(Mutex::new(0u64));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            let counter = Arc::clone(&counter);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    let scope = registry.scope(&FarmId::new("farm-1")).unwrap();
                    let _guard = scope.lock().unwrap();
                    let mut count = counter.lock().unwrap();
                    *count += 1;
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*counter.lock().unwrap(), 800);
    }
}
