//! SQLite-backed collections.
//!
//! A collection is a table and document fields are its columns. Filters,
//! projections and sort keys name columns directly, so every field name is
//! checked to be a plain identifier before it reaches SQL.

use puzzlegallery_common::{Error, Result};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{ToSql, Transaction, TransactionBehavior};

use crate::collection::{Collection, Connector, UpdateOutcome, WriteGuard};
use crate::document::{Document, Value};
use crate::options::{Filter, FindOptions, Projection, SortOrder};
use crate::pool::{get_conn, DbPool, PooledConnection};

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(match self {
            Value::Integer(i) => ValueRef::Integer(*i),
            Value::Real(f) => ValueRef::Real(*f),
            Value::Text(s) => ValueRef::Text(s.as_bytes()),
            Value::Blob(b) => ValueRef::Blob(b),
        }))
    }
}

/// Convert a raw column value. NULL becomes `None` (absent field); text
/// that is not valid UTF-8 is decoded lossily.
fn value_from_ref(value: ValueRef<'_>) -> Option<Value> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(Value::Integer(i)),
        ValueRef::Real(f) => Some(Value::Real(f)),
        ValueRef::Text(t) => Some(Value::Text(String::from_utf8_lossy(t).into_owned())),
        ValueRef::Blob(b) => Some(Value::Blob(b.to_vec())),
    }
}

/// Quote a field name for use as a column, rejecting anything that is not
/// `[A-Za-z_][A-Za-z0-9_]*`.
fn quote(field: &str) -> Result<String> {
    let mut chars = field.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(Error::invalid_input(format!("invalid field name: {field:?}")));
    }
    Ok(format!("\"{field}\""))
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::database(e.to_string())
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

/// Like [`db_err`], but reports unique-key violations as `Error::Conflict`.
fn write_err(e: rusqlite::Error) -> Error {
    if is_unique_violation(&e) {
        Error::conflict(e.to_string())
    } else {
        db_err(e)
    }
}

/// Build ` WHERE a = ? AND b = ?`, pushing the bound values in order.
fn where_clause<'a>(filter: &'a Filter, params: &mut Vec<&'a Value>) -> Result<String> {
    if filter.is_empty() {
        return Ok(String::new());
    }
    let mut parts = Vec::with_capacity(filter.clauses().len());
    for (field, value) in filter.clauses() {
        parts.push(format!("{} = ?", quote(field)?));
        params.push(value);
    }
    Ok(format!(" WHERE {}", parts.join(" AND ")))
}

fn clamp(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Connector handing out [`SqliteCollection`] handles from a pool.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    pool: DbPool,
    table: String,
}

impl SqliteConnector {
    /// Create a connector for the collection stored in `table`.
    pub fn new(pool: DbPool, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        quote(&table)?;
        Ok(Self { pool, table })
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl Connector for SqliteConnector {
    type Handle = SqliteCollection;

    fn connect(&self) -> Result<SqliteCollection> {
        SqliteCollection::new(get_conn(&self.pool)?, &self.table)
    }
}

/// A collection handle holding one pooled connection.
///
/// The connection goes back to the pool when the handle is dropped.
pub struct SqliteCollection {
    conn: PooledConnection,
    table: String,
    guard: Option<WriteGuard>,
}

impl SqliteCollection {
    pub fn new(conn: PooledConnection, table: &str) -> Result<Self> {
        Ok(Self {
            conn,
            table: quote(table)?,
            guard: None,
        })
    }

    /// Run `f` in an IMMEDIATE transaction, committing only if the write
    /// guard passes. Any error rolls the whole transaction back.
    ///
    /// IMMEDIATE takes the write lock up front, so reads inside `f` and the
    /// writes that follow them see the same state.
    fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .map_err(db_err)?;
        let out = f(&tx)?;
        if let Some(guard) = &self.guard {
            guard()?;
        }
        tx.commit().map_err(db_err)?;
        Ok(out)
    }

    /// Column names of the collection's table, in declaration order.
    fn columns(&self) -> Result<Vec<String>> {
        let table = self.table.trim_matches('"');
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1)")
            .map_err(db_err)?;
        let columns = stmt
            .query_map([table], |row| row.get::<_, String>(0))
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(columns)
    }

    fn select_list(&self, projection: &Projection) -> Result<String> {
        let fields: Vec<String> = match projection {
            Projection::All => return Ok("*".to_string()),
            Projection::Include(fields) => fields.clone(),
            Projection::Exclude(excluded) => self
                .columns()?
                .into_iter()
                .filter(|c| !excluded.contains(c))
                .collect(),
        };
        if fields.is_empty() {
            return Err(Error::invalid_input("projection selects no fields"));
        }
        Ok(fields
            .iter()
            .map(|f| quote(f))
            .collect::<Result<Vec<_>>>()?
            .join(", "))
    }

    fn insert_with(conn: &rusqlite::Connection, table: &str, document: &Document) -> Result<()> {
        if document.is_empty() {
            return Err(Error::invalid_input("cannot insert an empty document"));
        }
        let mut columns = Vec::with_capacity(document.len());
        let mut params: Vec<&Value> = Vec::with_capacity(document.len());
        for (field, value) in document.iter() {
            columns.push(quote(field)?);
            params.push(value);
        }
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders})",
            columns.join(", ")
        );
        conn.execute(&sql, rusqlite::params_from_iter(params))
            .map_err(write_err)?;
        Ok(())
    }
}

impl Collection for SqliteCollection {
    fn count(&self, filter: &Filter) -> Result<u64> {
        let mut params = Vec::new();
        let sql = format!(
            "SELECT COUNT(*) FROM {}{}",
            self.table,
            where_clause(filter, &mut params)?
        );
        let count: i64 = self
            .conn
            .query_row(&sql, rusqlite::params_from_iter(params), |row| row.get(0))
            .map_err(db_err)?;
        Ok(count.max(0) as u64)
    }

    fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<Document>> {
        let mut params = Vec::new();
        let mut sql = format!(
            "SELECT {} FROM {}{}",
            self.select_list(&options.projection)?,
            self.table,
            where_clause(filter, &mut params)?
        );

        if !options.sort.is_empty() {
            let keys = options
                .sort
                .iter()
                .map(|s| {
                    let dir = match s.order {
                        SortOrder::Ascending => "ASC",
                        SortOrder::Descending => "DESC",
                    };
                    quote(&s.field).map(|col| format!("{col} {dir}"))
                })
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(&format!(" ORDER BY {}", keys.join(", ")));
        }

        // SQLite only accepts OFFSET after a LIMIT; -1 means unbounded.
        let limit = options.limit.map(clamp).unwrap_or(-1);
        sql.push_str(&format!(" LIMIT {limit} OFFSET {}", clamp(options.skip)));

        let mut stmt = self.conn.prepare(&sql).map_err(db_err)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let documents = stmt
            .query_map(rusqlite::params_from_iter(params), |row| {
                let mut doc = Document::new();
                for (i, name) in names.iter().enumerate() {
                    if let Some(value) = value_from_ref(row.get_ref(i)?) {
                        doc.insert(name.clone(), value);
                    }
                }
                Ok(doc)
            })
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;

        Ok(documents)
    }

    fn insert_one(&self, document: &Document) -> Result<()> {
        self.write(|tx| Self::insert_with(tx, &self.table, document))
    }

    fn update_one(&self, filter: &Filter, set: &Document, upsert: bool) -> Result<UpdateOutcome> {
        if set.is_empty() {
            return Err(Error::invalid_input("update sets no fields"));
        }

        let mut assignments = Vec::with_capacity(set.len());
        let mut params: Vec<&Value> = Vec::with_capacity(set.len() + filter.clauses().len());
        for (field, value) in set.iter() {
            assignments.push(format!("{} = ?", quote(field)?));
            params.push(value);
        }
        let sql = format!(
            "UPDATE {table} SET {} WHERE rowid IN (SELECT rowid FROM {table}{} LIMIT 1)",
            assignments.join(", "),
            where_clause(filter, &mut params)?,
            table = self.table,
        );

        self.write(|tx| {
            let matched = tx
                .execute(&sql, rusqlite::params_from_iter(params))
                .map_err(write_err)? as u64;

            let upserted = matched == 0 && upsert;
            if upserted {
                let mut document: Document = filter.clauses().iter().cloned().collect();
                for (field, value) in set.iter() {
                    document.insert(field, value.clone());
                }
                Self::insert_with(tx, &self.table, &document)?;
            }
            Ok(UpdateOutcome { matched, upserted })
        })
    }

    fn delete_many(&self, filter: &Filter) -> Result<u64> {
        let mut params = Vec::new();
        let sql = format!(
            "DELETE FROM {}{}",
            self.table,
            where_clause(filter, &mut params)?
        );
        self.write(|tx| {
            let deleted = tx
                .execute(&sql, rusqlite::params_from_iter(params))
                .map_err(db_err)?;
            Ok(deleted as u64)
        })
    }

    fn set_write_guard(&mut self, guard: WriteGuard) {
        self.guard = Some(guard);
    }
}
