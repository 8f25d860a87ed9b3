//! Schema declarations: collections and their indexes.
//!
//! A schema is declared once at store construction. Opening the store (for
//! the first time or after a version bump) creates any missing tables and
//! indexes idempotently; existing ones are left untouched.

/// How a collection's primary key is assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyDef {
    /// Store-assigned, monotonically increasing integer key. The assigned
    /// key is written back into the record body's `id` field.
    AutoIncrement,
    /// Key extracted from the named record field (JSON path, dot-separated).
    Field(String),
}

/// A secondary index over one record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub name: String,
    /// JSON path into the record body, dot-separated (e.g. `"status"` or
    /// `"vehicle.registrationNumber"`).
    pub field: String,
    pub unique: bool,
}

impl IndexDef {
    /// A non-unique index.
    pub fn new(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            unique: false,
        }
    }

    /// A unique index — `add` fails with a constraint violation on duplicates.
    pub fn unique(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            unique: true,
        }
    }
}

/// A named collection with a primary key and zero or more indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDef {
    pub name: String,
    pub key: KeyDef,
    pub indexes: Vec<IndexDef>,
}

impl CollectionDef {
    /// A collection with store-assigned integer keys.
    pub fn auto(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: KeyDef::AutoIncrement,
            indexes: Vec::new(),
        }
    }

    /// A collection keyed by one of its record fields.
    pub fn keyed(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: KeyDef::Field(field.into()),
            indexes: Vec::new(),
        }
    }

    pub fn with_index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    pub(crate) fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.name == name)
    }
}

/// The full declared schema: a version plus all collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub version: u32,
    pub collections: Vec<CollectionDef>,
}

impl Schema {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            collections: Vec::new(),
        }
    }

    pub fn collection(mut self, def: CollectionDef) -> Self {
        self.collections.push(def);
        self
    }

    pub(crate) fn get(&self, name: &str) -> Option<&CollectionDef> {
        self.collections.iter().find(|c| c.name == name)
    }
}
