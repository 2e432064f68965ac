use std::sync::{Arc, PoisonError, RwLock};

/// In-memory holder for the current access token. Never persisted.
///
/// Cheap to clone; clones share the same slot. Only the renewal
/// coordinator writes to it.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    slot: Arc<RwLock<Option<String>>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<String> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set(&self, token: String) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    pub(crate) fn clear(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_slot() {
        let store = TokenStore::new();
        let reader = store.clone();
        assert_eq!(reader.get(), None);

        store.set("abc".into());
        assert_eq!(reader.get().as_deref(), Some("abc"));

        store.clear();
        assert_eq!(reader.get(), None);
    }
}
