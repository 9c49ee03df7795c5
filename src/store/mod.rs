//! Client-side store: one [`Slice`] per remote collection.
//!
//! A `Store` is an explicit value handed to services and controllers, never a
//! process global, so every test can build its own.

pub mod slice;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::model::EntityKind;

pub use slice::{Applied, CollectionState, FetchTicket, LoadStatus, Slice, UploadKey};

/// Cheap-to-clone handle; clones share the same slices.
#[derive(Debug, Clone)]
pub struct Store {
    slices: Arc<BTreeMap<EntityKind, Slice>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        let slices = EntityKind::ALL
            .into_iter()
            .map(|kind| (kind, Slice::new(kind)))
            .collect();
        Self {
            slices: Arc::new(slices),
        }
    }

    pub fn slice(&self, kind: EntityKind) -> &Slice {
        // Every kind is inserted in `new`.
        &self.slices[&kind]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slice> {
        self.slices.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_entity_has_a_slice() {
        let store = Store::new();
        for kind in EntityKind::ALL {
            assert_eq!(store.slice(kind).kind(), kind);
        }
        assert_eq!(store.iter().count(), EntityKind::ALL.len());
    }

    #[test]
    fn clones_share_state_but_new_stores_do_not() {
        let a = Store::new();
        let b = a.clone();
        a.slice(EntityKind::Lead).toggle_action();
        assert_eq!(b.slice(EntityKind::Lead).version(), 1);
        assert_eq!(Store::new().slice(EntityKind::Lead).version(), 0);
    }
}
