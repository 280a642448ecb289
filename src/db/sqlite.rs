use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection};
use serde_json::Value;

use super::{quote_ident, Database};
use crate::error::DataAccessError;
use crate::models::{FieldMap, Row, TableSchema};

/// Data access over a local SQLite database file.
///
/// Values are bound as text and converted by SQLite's column affinity, so
/// `age:18` matches and stores an INTEGER for an INTEGER column.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file, creating its parent directory if needed
    pub fn open(path: &Path) -> Result<Self, DataAccessError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| DataAccessError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        Ok(Self::from_connection(Connection::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self, DataAccessError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        SqliteStore {
            conn: Mutex::new(conn),
        }
    }

    /// Run a batch of statements, e.g. to create tables
    pub fn execute_batch(&self, sql: &str) -> Result<(), DataAccessError> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DataAccessError> {
        self.conn.lock().map_err(|_| DataAccessError::LockPoisoned)
    }
}

#[async_trait]
impl Database for SqliteStore {
    async fn tables(&self) -> Result<Vec<TableSchema>, DataAccessError> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut fields_stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let fields = fields_stmt
                .query_map([&name], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            tables.push(TableSchema { name, fields });
        }

        Ok(tables)
    }

    async fn get(&self, table: &str, query: &FieldMap) -> Result<Vec<Row>, DataAccessError> {
        let conn = self.lock()?;

        let sql = format!("SELECT * FROM {}{}", quote_ident(table), where_clause(query, 1));
        let mut stmt = conn.prepare(&sql)?;
        let columns = column_names(&stmt);

        let mut rows = stmt.query(params_from_iter(query.values()))?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            result.push(read_row(row, &columns)?);
        }

        Ok(result)
    }

    async fn create(&self, table: &str, data: &FieldMap) -> Result<Row, DataAccessError> {
        let conn = self.lock()?;

        let sql = if data.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES RETURNING *", quote_ident(table))
        } else {
            let columns: Vec<String> = data.keys().map(quote_ident).collect();
            let placeholders: Vec<String> = (1..=data.len()).map(|i| format!("?{}", i)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
                quote_ident(table),
                columns.join(", "),
                placeholders.join(", ")
            )
        };

        let mut stmt = conn.prepare(&sql)?;
        let columns = column_names(&stmt);

        let mut rows = stmt.query(params_from_iter(data.values()))?;
        match rows.next()? {
            Some(row) => Ok(read_row(row, &columns)?),
            None => Err(DataAccessError::Sqlite(rusqlite::Error::QueryReturnedNoRows)),
        }
    }

    async fn set(
        &self,
        table: &str,
        query: &FieldMap,
        data: &FieldMap,
    ) -> Result<u64, DataAccessError> {
        let conn = self.lock()?;

        let assignments: Vec<String> = data
            .keys()
            .enumerate()
            .map(|(i, key)| format!("{} = ?{}", quote_ident(key), i + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {}{}",
            quote_ident(table),
            assignments.join(", "),
            where_clause(query, data.len() + 1)
        );

        let changed = conn.execute(&sql, params_from_iter(data.values().chain(query.values())))?;
        Ok(changed as u64)
    }

    async fn remove(&self, table: &str, query: &FieldMap) -> Result<u64, DataAccessError> {
        let conn = self.lock()?;

        let sql = format!("DELETE FROM {}{}", quote_ident(table), where_clause(query, 1));
        let removed = conn.execute(&sql, params_from_iter(query.values()))?;
        Ok(removed as u64)
    }
}

/// Build ` WHERE "a" = ?n AND "b" = ?n+1`, or nothing for an empty query
fn where_clause(query: &FieldMap, first_param: usize) -> String {
    if query.is_empty() {
        return String::new();
    }

    let conditions: Vec<String> = query
        .keys()
        .enumerate()
        .map(|(i, key)| format!("{} = ?{}", quote_ident(key), first_param + i))
        .collect();

    format!(" WHERE {}", conditions.join(" AND "))
}

fn column_names(stmt: &rusqlite::Statement<'_>) -> Vec<String> {
    stmt.column_names().into_iter().map(String::from).collect()
}

fn read_row(row: &rusqlite::Row<'_>, columns: &[String]) -> rusqlite::Result<Row> {
    let mut out = Row::new();

    for (i, name) in columns.iter().enumerate() {
        let value = match row.get_ref(i)? {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(n) => Value::from(n),
            ValueRef::Real(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
            ValueRef::Blob(bytes) => Value::String(hex::encode(bytes)),
        };
        out.insert(name.clone(), value);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .execute_batch(
                r#"
                CREATE TABLE user (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL DEFAULT '',
                    age INTEGER DEFAULT 0,
                    authority INTEGER DEFAULT 1,
                    avatar BLOB
                );
                CREATE TABLE channel (id TEXT PRIMARY KEY, platform TEXT);
                INSERT INTO user (name, age) VALUES ('koishi', 18), ('satori', 17), ('nonebot', 18);
                "#,
            )
            .unwrap();
        store
    }

    fn map(pairs: &[(&str, &str)]) -> FieldMap {
        pairs.iter().copied().collect()
    }

    #[tokio::test]
    async fn lists_tables_with_fields_in_column_order() {
        let tables = store().tables().await.unwrap();

        assert_eq!(
            tables,
            vec![
                TableSchema::new("channel", ["id", "platform"]),
                TableSchema::new("user", ["id", "name", "age", "authority", "avatar"]),
            ]
        );
    }

    #[tokio::test]
    async fn looks_up_single_table() {
        let store = store();
        assert!(store.table("user").await.unwrap().is_some());
        assert!(store.table("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_filters_with_text_params_on_integer_columns() {
        let rows = store().get("user", &map(&[("age", "18")])).await.unwrap();

        let names: Vec<_> = rows.iter().map(|r| r["name"].clone()).collect();
        assert_eq!(names, vec![json!("koishi"), json!("nonebot")]);
        assert_eq!(rows[0]["age"], json!(18));
        assert_eq!(
            rows[0].keys().collect::<Vec<_>>(),
            vec!["id", "name", "age", "authority", "avatar"]
        );
    }

    #[tokio::test]
    async fn get_combines_fields_with_and() {
        let rows = store()
            .get("user", &map(&[("age", "18"), ("name", "nonebot")]))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn empty_query_returns_all_rows() {
        let rows = store().get("user", &FieldMap::new()).await.unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[tokio::test]
    async fn create_returns_row_with_defaults() {
        let row = store()
            .create("user", &map(&[("name", "alice"), ("age", "20")]))
            .await
            .unwrap();

        assert_eq!(row["id"], json!(4));
        assert_eq!(row["name"], json!("alice"));
        assert_eq!(row["age"], json!(20));
        assert_eq!(row["authority"], json!(1));
        assert_eq!(row["avatar"], Value::Null);
    }

    #[tokio::test]
    async fn set_updates_matching_rows() {
        let store = store();

        let matched = store
            .set("user", &map(&[("age", "18")]), &map(&[("authority", "3")]))
            .await
            .unwrap();
        assert_eq!(matched, 2);

        let rows = store.get("user", &map(&[("authority", "3")])).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn remove_deletes_matching_rows() {
        let store = store();

        let removed = store.remove("user", &map(&[("age", "18")])).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.get("user", &FieldMap::new()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blobs_are_hex_encoded() {
        let store = store();
        store
            .execute_batch("UPDATE user SET avatar = x'cafe' WHERE name = 'koishi'")
            .unwrap();

        let rows = store.get("user", &map(&[("name", "koishi")])).await.unwrap();
        assert_eq!(rows[0]["avatar"], json!("cafe"));
    }

    #[test]
    fn opens_file_in_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("bot.db");

        SqliteStore::open(&path).unwrap();
        assert!(path.exists());
    }
}
