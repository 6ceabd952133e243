//! In-memory document store with atomic uniqueness claims, optimistic versioning and change
//! subscriptions.
//!
//! Collections are addressed by path (`sections/sales/vehicles`); documents are loosely-typed field maps.

use std::sync::{
    Arc, Weak,
    atomic::{AtomicU64, Ordering},
};

use dashmap::{DashMap, mapref::entry::Entry};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{AccessError, AccessResult};

type Document = Map<String, Value>;
type Listener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub collection: String,
    pub id: String,
    pub kind: ChangeKind,
    pub version: u64,
    pub data: Document,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VersionedDocument {
    pub version: u64,
    pub data: Document,
}

#[derive(Debug, Clone)]
struct StoredDocument {
    version: u64,
    data: Document,
    unique_field: String,
    // Claimed value; absent or blank values claim nothing.
    unique_value: Option<String>,
}

#[derive(Default)]
struct Inner {
    documents: DashMap<(String, String), StoredDocument>,
    // (collection, field, value) -> document id
    unique: DashMap<(String, String, String), String>,
    listeners: DashMap<String, Vec<(u64, Listener)>>,
    next_listener: AtomicU64,
}

#[derive(Clone, Default)]
pub struct DocumentStore {
    inner: Arc<Inner>,
}

fn unique_value(data: &Document, field: &str) -> Option<String> {
    match data.get(field)? {
        Value::Null => None,
        Value::String(text) => Some(text.trim().to_string()).filter(|value| !value.is_empty()),
        other => Some(other.to_string()),
    }
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<VersionedDocument> {
        self.inner
            .documents
            .get(&(collection.to_string(), id.to_string()))
            .map(|stored| VersionedDocument {
                version: stored.version,
                data: stored.data.clone(),
            })
    }

    /// All documents of `collection`, sorted by id.
    pub fn list(&self, collection: &str) -> Vec<(String, VersionedDocument)> {
        let mut documents: Vec<_> = self
            .inner
            .documents
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .map(|entry| {
                (
                    entry.key().1.clone(),
                    VersionedDocument {
                        version: entry.version,
                        data: entry.data.clone(),
                    },
                )
            })
            .collect();
        documents.sort_by(|a, b| a.0.cmp(&b.0));
        documents
    }

    /// Creates a document whose `unique_field` value must not already exist in the collection.
    ///
    /// The claim and the insert happen atomically, so two concurrent creates with the same value cannot
    /// both succeed.
    pub fn create_unique(
        &self,
        collection: &str,
        id: &str,
        unique_field: &str,
        data: Document,
    ) -> AccessResult<u64> {
        let value = unique_value(&data, unique_field);

        let event = {
            let slot = match self
                .inner
                .documents
                .entry((collection.to_string(), id.to_string()))
            {
                Entry::Occupied(_) => {
                    return Err(AccessError::DuplicateRecord {
                        collection: collection.to_string(),
                        field: "id".to_string(),
                        value: id.to_string(),
                    });
                }
                Entry::Vacant(slot) => slot,
            };

            if let Some(value) = &value {
                match self.inner.unique.entry((
                    collection.to_string(),
                    unique_field.to_string(),
                    value.clone(),
                )) {
                    Entry::Occupied(_) => {
                        warn!(collection, field = unique_field, value = %value, "Duplicate record rejected");
                        return Err(AccessError::DuplicateRecord {
                            collection: collection.to_string(),
                            field: unique_field.to_string(),
                            value: value.clone(),
                        });
                    }
                    Entry::Vacant(claim) => {
                        claim.insert(id.to_string());
                    }
                }
            }

            slot.insert(StoredDocument {
                version: 1,
                data: data.clone(),
                unique_field: unique_field.to_string(),
                unique_value: value,
            });

            ChangeEvent {
                collection: collection.to_string(),
                id: id.to_string(),
                kind: ChangeKind::Created,
                version: 1,
                data,
            }
        };

        self.notify(&event);
        Ok(1)
    }

    /// Replaces a document only if its stored version equals `expected_version`. Returns the new version.
    pub fn update_if_version(
        &self,
        collection: &str,
        id: &str,
        expected_version: u64,
        data: Document,
    ) -> AccessResult<u64> {
        let event = {
            let mut stored = self
                .inner
                .documents
                .get_mut(&(collection.to_string(), id.to_string()))
                .ok_or_else(|| AccessError::NotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                })?;

            if stored.version != expected_version {
                return Err(AccessError::VersionConflict {
                    id: id.to_string(),
                    expected: expected_version,
                    actual: stored.version,
                });
            }

            let field = stored.unique_field.clone();
            let old = stored.unique_value.clone();
            let new = unique_value(&data, &field);
            if new != old {
                if let Some(new) = &new {
                    match self
                        .inner
                        .unique
                        .entry((collection.to_string(), field.clone(), new.clone()))
                    {
                        Entry::Occupied(_) => {
                            return Err(AccessError::DuplicateRecord {
                                collection: collection.to_string(),
                                field,
                                value: new.clone(),
                            });
                        }
                        Entry::Vacant(claim) => {
                            claim.insert(id.to_string());
                        }
                    }
                }
                if let Some(old) = old {
                    self.inner
                        .unique
                        .remove(&(collection.to_string(), field, old));
                }
                stored.unique_value = new;
            }

            stored.version += 1;
            stored.data = data.clone();

            ChangeEvent {
                collection: collection.to_string(),
                id: id.to_string(),
                kind: ChangeKind::Updated,
                version: stored.version,
                data,
            }
        };

        self.notify(&event);
        Ok(event.version)
    }

    pub fn delete(&self, collection: &str, id: &str) -> AccessResult<()> {
        let (_, stored) = self
            .inner
            .documents
            .remove(&(collection.to_string(), id.to_string()))
            .ok_or_else(|| AccessError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        if let Some(value) = stored.unique_value {
            self.inner
                .unique
                .remove(&(collection.to_string(), stored.unique_field, value));
        }

        self.notify(&ChangeEvent {
            collection: collection.to_string(),
            id: id.to_string(),
            kind: ChangeKind::Deleted,
            version: stored.version,
            data: stored.data,
        });
        Ok(())
    }

    /// Registers `listener` for changes in `collection`. Dropping the returned handle unsubscribes.
    pub fn subscribe<F>(&self, collection: &str, listener: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        let listener: Listener = Arc::new(listener);
        self.inner
            .listeners
            .entry(collection.to_string())
            .or_default()
            .push((id, listener));
        debug!(collection, id, "Listener subscribed");

        Subscription {
            store: Arc::downgrade(&self.inner),
            collection: collection.to_string(),
            id,
        }
    }

    fn notify(&self, event: &ChangeEvent) {
        // Listeners run outside the map guard so they may read the store.
        let listeners: Vec<Listener> = match self.inner.listeners.get(&event.collection) {
            Some(listeners) => listeners.iter().map(|(_, l)| Arc::clone(l)).collect(),
            None => return,
        };
        for listener in listeners {
            listener(event);
        }
    }
}

/// Live subscription handle. Unsubscribes on drop.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    store: Weak<Inner>,
    collection: String,
    id: u64,
}

impl Subscription {
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(inner) = self.store.upgrade() else {
            return;
        };
        if let Some(mut listeners) = inner.listeners.get_mut(&self.collection) {
            listeners.retain(|(id, _)| *id != self.id);
            debug!(collection = %self.collection, id = self.id, "Listener unsubscribed");
        }
    }
}
