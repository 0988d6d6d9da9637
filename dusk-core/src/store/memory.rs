use std::collections::BTreeMap;

use super::KvStore;
use crate::error::Result;

/// In-process store, used for dry runs and tests
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for MemoryStore {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_overwrites_and_get_returns_last_value() {
        let mut store = MemoryStore::new();
        assert_eq!(store.get(b"k").unwrap(), None);

        store.put(b"k", b"one").unwrap();
        store.put(b"k", b"two").unwrap();
        assert_eq!(store.get(b"k").unwrap().as_deref(), Some(&b"two"[..]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_keys_are_exact_bytes() {
        let mut store = MemoryStore::new();
        store.put(b"/a", b"x").unwrap();
        assert_eq!(store.get(b"/a/").unwrap(), None);
        assert_eq!(store.get(b"/A").unwrap(), None);
    }
}
