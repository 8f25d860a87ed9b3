//! The SQLite-backed collection store.

use crate::error::{StoreError, StoreResult};
use crate::schema::{CollectionDef, KeyDef, Schema};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// A collection primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Int(i64),
    Text(String),
}

impl rusqlite::ToSql for Key {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        match self {
            Key::Int(i) => i.to_sql(),
            Key::Text(s) => s.to_sql(),
        }
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Text(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Text(value)
    }
}

impl From<fieldcite_types::EntityId> for Key {
    fn from(value: fieldcite_types::EntityId) -> Self {
        Key::Text(value.to_string())
    }
}

/// Iteration order for queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

/// A bound on the indexed value (or the primary key when no index is given).
/// All bounds are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyRange {
    Only(Value),
    From(Value),
    UpTo(Value),
    Between(Value, Value),
}

/// Parameters for a cursored query over a collection.
#[derive(Debug, Clone, Default)]
pub struct Query<'a> {
    pub index: Option<&'a str>,
    pub range: Option<KeyRange>,
    pub direction: Direction,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl<'a> Query<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(mut self, name: &'a str) -> Self {
        self.index = Some(name);
        self
    }

    pub fn only(mut self, value: Value) -> Self {
        self.range = Some(KeyRange::Only(value));
        self
    }

    pub fn range(mut self, range: KeyRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// Durable, transactional store of JSON-bodied collections.
///
/// All mutating calls commit before returning. Cheap to clone — clones share
/// the same underlying connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    schema: Schema,
}

impl Store {
    /// Opens (or creates) a store at the given path and applies the schema.
    pub fn open(path: impl AsRef<Path>, schema: Schema) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            schema,
        };
        store.init_schema()?;
        debug!("opened store at {}", path.as_ref().display());
        Ok(store)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory(schema: Schema) -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            schema,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Creates missing tables and indexes; existing ones are left untouched.
    fn init_schema(&self) -> StoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute_batch(
            "CREATE TABLE IF NOT EXISTS store_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;

        let current: Option<String> = tx
            .query_row(
                "SELECT value FROM store_meta WHERE key = 'version'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let current: u32 = current.and_then(|v| v.parse().ok()).unwrap_or(0);

        let mut ddl = String::new();
        for def in &self.schema.collections {
            match &def.key {
                KeyDef::AutoIncrement => {
                    ddl.push_str(&format!(
                        "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY AUTOINCREMENT, body TEXT NOT NULL);\n",
                        def.name
                    ));
                }
                KeyDef::Field(_) => {
                    ddl.push_str(&format!(
                        "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, body TEXT NOT NULL);\n",
                        def.name
                    ));
                }
            }
            for index in &def.indexes {
                let unique = if index.unique { "UNIQUE " } else { "" };
                ddl.push_str(&format!(
                    "CREATE {}INDEX IF NOT EXISTS idx_{}_{} ON {} (json_extract(body, '{}'));\n",
                    unique,
                    def.name,
                    index.name,
                    def.name,
                    json_path(&index.field)
                ));
            }
        }
        tx.execute_batch(&ddl)?;

        if current != self.schema.version {
            info!(
                "store schema v{} -> v{}",
                current, self.schema.version
            );
            tx.execute(
                "INSERT INTO store_meta (key, value) VALUES ('version', ?1)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![self.schema.version.to_string()],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn def(&self, collection: &str) -> StoreResult<&CollectionDef> {
        self.schema
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))
    }

    /// Inserts a new record. Fails with `StoreError::Constraint` if the
    /// primary key or a unique index already holds this value.
    pub fn add<T: Serialize>(&self, collection: &str, record: &T) -> StoreResult<Key> {
        let def = self.def(collection)?;
        let body = serde_json::to_value(record)?;
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let key = insert(&tx, def, &body, WriteMode::Add)?;
        tx.commit()?;
        Ok(key)
    }

    /// Upserts a record: inserts, or replaces the record with the same
    /// primary key. Never fails on a duplicate primary key.
    pub fn put<T: Serialize>(&self, collection: &str, record: &T) -> StoreResult<Key> {
        let def = self.def(collection)?;
        let body = serde_json::to_value(record)?;
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let key = insert(&tx, def, &body, WriteMode::Put)?;
        tx.commit()?;
        Ok(key)
    }

    /// Upserts a batch of records in one transaction. If any record violates
    /// a constraint, nothing is written.
    pub fn put_many<T: Serialize>(&self, collection: &str, records: &[T]) -> StoreResult<()> {
        let def = self.def(collection)?;
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for record in records {
            let body = serde_json::to_value(record)?;
            insert(&tx, def, &body, WriteMode::Put)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Point lookup by primary key. A missing record is `None`, not an error.
    pub fn get<T: DeserializeOwned>(
        &self,
        collection: &str,
        key: impl Into<Key>,
    ) -> StoreResult<Option<T>> {
        let def = self.def(collection)?;
        let key: Key = key.into();
        let conn = self.conn.lock().unwrap();
        let body: Option<String> = conn
            .query_row(
                &format!("SELECT body FROM {} WHERE id = ?1", def.name),
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        match body {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    /// Ordered query over a collection, optionally through a secondary index
    /// with an inclusive range, direction, limit and offset. Ties on the
    /// indexed value are broken by primary key, so iteration is stable.
    pub fn query<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: &Query<'_>,
    ) -> StoreResult<Vec<T>> {
        let def = self.def(collection)?;

        let expr = match query.index {
            Some(name) => {
                let index = def.index(name).ok_or_else(|| StoreError::UnknownIndex {
                    collection: def.name.clone(),
                    index: name.to_string(),
                })?;
                format!("json_extract(body, '{}')", json_path(&index.field))
            }
            None => "id".to_string(),
        };

        let mut sql = format!("SELECT body FROM {}", def.name);
        let mut params: Vec<SqlValue> = Vec::new();
        if let Some(range) = &query.range {
            match range {
                KeyRange::Only(v) => {
                    sql.push_str(&format!(" WHERE {expr} = ?"));
                    params.push(to_sql_value(v));
                }
                KeyRange::From(v) => {
                    sql.push_str(&format!(" WHERE {expr} >= ?"));
                    params.push(to_sql_value(v));
                }
                KeyRange::UpTo(v) => {
                    sql.push_str(&format!(" WHERE {expr} <= ?"));
                    params.push(to_sql_value(v));
                }
                KeyRange::Between(lo, hi) => {
                    sql.push_str(&format!(" WHERE {expr} >= ? AND {expr} <= ?"));
                    params.push(to_sql_value(lo));
                    params.push(to_sql_value(hi));
                }
            }
        }

        let dir = match query.direction {
            Direction::Forward => "ASC",
            Direction::Reverse => "DESC",
        };
        sql.push_str(&format!(" ORDER BY {expr} {dir}, id {dir} LIMIT ? OFFSET ?"));
        params.push(SqlValue::Integer(
            query.limit.map(|l| l as i64).unwrap_or(-1),
        ));
        params.push(SqlValue::Integer(query.offset as i64));

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params), |row| row.get::<_, String>(0))?;

        let mut results = Vec::new();
        for body in rows {
            results.push(serde_json::from_str(&body?)?);
        }
        Ok(results)
    }

    /// Deletes a record by primary key. Deleting a missing key is a no-op.
    pub fn delete(&self, collection: &str, key: impl Into<Key>) -> StoreResult<()> {
        let def = self.def(collection)?;
        let key: Key = key.into();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", def.name),
            params![key],
        )?;
        Ok(())
    }

    /// Removes every record from a collection.
    pub fn clear(&self, collection: &str) -> StoreResult<()> {
        let def = self.def(collection)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(&format!("DELETE FROM {}", def.name), [])?;
        Ok(())
    }

    /// Number of records in a collection.
    pub fn count(&self, collection: &str) -> StoreResult<usize> {
        let def = self.def(collection)?;
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", def.name),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum WriteMode {
    Add,
    Put,
}

/// Writes one record inside an open transaction, returning its key.
fn insert(
    tx: &Transaction<'_>,
    def: &CollectionDef,
    body: &Value,
    mode: WriteMode,
) -> StoreResult<Key> {
    match &def.key {
        KeyDef::AutoIncrement => {
            let existing = body.get("id").and_then(Value::as_i64);
            match existing {
                Some(id) => {
                    let sql = match mode {
                        WriteMode::Add => {
                            format!("INSERT INTO {} (id, body) VALUES (?1, ?2)", def.name)
                        }
                        WriteMode::Put => format!(
                            "INSERT INTO {} (id, body) VALUES (?1, ?2)
                             ON CONFLICT(id) DO UPDATE SET body = excluded.body",
                            def.name
                        ),
                    };
                    tx.execute(&sql, params![id, body.to_string()])?;
                    Ok(Key::Int(id))
                }
                None => {
                    tx.execute(
                        &format!("INSERT INTO {} (body) VALUES (?1)", def.name),
                        params![body.to_string()],
                    )?;
                    let id = tx.last_insert_rowid();
                    // Write the assigned key back into the record body.
                    tx.execute(
                        &format!(
                            "UPDATE {} SET body = json_set(body, '$.id', ?1) WHERE id = ?1",
                            def.name
                        ),
                        params![id],
                    )?;
                    Ok(Key::Int(id))
                }
            }
        }
        KeyDef::Field(field) => {
            let key_value =
                body.pointer(&json_pointer(field))
                    .ok_or_else(|| StoreError::MissingKeyField {
                        collection: def.name.clone(),
                        field: field.clone(),
                    })?;
            let key = match key_value {
                Value::String(s) => Key::Text(s.clone()),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => Key::Int(i),
                    None => Key::Text(n.to_string()),
                },
                _ => {
                    return Err(StoreError::MissingKeyField {
                        collection: def.name.clone(),
                        field: field.clone(),
                    })
                }
            };
            let sql = match mode {
                WriteMode::Add => format!("INSERT INTO {} (id, body) VALUES (?1, ?2)", def.name),
                WriteMode::Put => format!(
                    "INSERT INTO {} (id, body) VALUES (?1, ?2)
                     ON CONFLICT(id) DO UPDATE SET body = excluded.body",
                    def.name
                ),
            };
            tx.execute(&sql, params![key, body.to_string()])?;
            Ok(key)
        }
    }
}

fn json_path(field: &str) -> String {
    format!("$.{field}")
}

fn json_pointer(field: &str) -> String {
    format!("/{}", field.replace('.', "/"))
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => SqlValue::Integer(i),
            (None, Some(f)) => SqlValue::Real(f),
            _ => SqlValue::Null,
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}
