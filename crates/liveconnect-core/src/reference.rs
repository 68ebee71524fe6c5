//! Reference-counted table of foreign object identifiers

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Wire identifier of a foreign object (Java object, JS object or JNI member id)
///
/// Identifier 0 is reserved for "no object" and is never stored in a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ObjectId(u32);

impl ObjectId {
    /// The null object
    pub const NULL: ObjectId = ObjectId(0);

    pub const fn new(raw: u32) -> Self {
        ObjectId(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for ObjectId {
    fn from(raw: u32) -> Self {
        ObjectId(raw)
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a table entry stands for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceKind {
    Object,
    /// Method or field id; the JNI signature drives argument and result marshalling
    Member { signature: Arc<str> },
}

/// One live table entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub id: ObjectId,
    pub refcount: u32,
    pub kind: ReferenceKind,
}

/// Maps identifiers to reference counts
///
/// An entry exists exactly while its count is above zero. All mutation goes through a
/// single lock; callers only ever hold identifiers, never entries.
#[derive(Debug, Default)]
pub struct ReferenceTable {
    entries: Mutex<HashMap<u32, Reference>>,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more holder of `id`, creating the entry on first mention
    pub fn acquire(&self, id: ObjectId) -> ObjectId {
        self.acquire_with(id, ReferenceKind::Object)
    }

    /// Like [`acquire`](Self::acquire) for method/field ids
    ///
    /// The signature is fixed by the first typed acquisition; later ones keep it.
    pub fn acquire_typed(&self, id: ObjectId, signature: &str) -> ObjectId {
        self.acquire_with(
            id,
            ReferenceKind::Member {
                signature: Arc::from(signature),
            },
        )
    }

    fn acquire_with(&self, id: ObjectId, kind: ReferenceKind) -> ObjectId {
        if id.is_null() {
            return ObjectId::NULL;
        }
        let mut entries = self.entries.lock();
        let entry = entries.entry(id.get()).or_insert_with(|| Reference {
            id,
            refcount: 0,
            kind: ReferenceKind::Object,
        });
        if entry.kind == ReferenceKind::Object {
            entry.kind = kind;
        }
        entry.refcount = entry.refcount.saturating_add(1);
        id
    }

    /// Drop one holder of `id`; returns true when the entry was removed
    ///
    /// Releasing null, an absent id, or an exhausted entry is a no-op.
    pub fn release(&self, id: ObjectId) -> bool {
        if id.is_null() {
            return false;
        }
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(&id.get()) else {
            return false;
        };
        entry.refcount = entry.refcount.saturating_sub(1);
        if entry.refcount == 0 {
            entries.remove(&id.get());
            true
        } else {
            false
        }
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.entries.lock().contains_key(&id.get())
    }

    /// Current count for `id` (0 when absent)
    pub fn refcount(&self, id: ObjectId) -> u32 {
        self.entries
            .lock()
            .get(&id.get())
            .map(|entry| entry.refcount)
            .unwrap_or(0)
    }

    /// Signature attached to a member id
    pub fn signature(&self, id: ObjectId) -> Option<Arc<str>> {
        match self.entries.lock().get(&id.get()).map(|entry| &entry.kind) {
            Some(ReferenceKind::Member { signature }) => Some(signature.clone()),
            _ => None,
        }
    }

    pub fn get(&self, id: ObjectId) -> Option<Reference> {
        self.entries.lock().get(&id.get()).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Remove every entry, returning the ids that were live
    pub fn clear(&self) -> Vec<ObjectId> {
        let mut entries = self.entries.lock();
        let mut ids: Vec<ObjectId> = entries.drain().map(|(_, entry)| entry.id).collect();
        ids.sort();
        ids
    }
}
