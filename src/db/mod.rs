pub mod postgres;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DataAccessError;
use crate::models::{DatabaseSettings, FieldMap, Row, TableSchema};

pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;

/// Schema introspection and CRUD primitives over named tables.
///
/// Filters are equality matches on every field of the query map, combined with AND.
#[async_trait]
pub trait Database: Send + Sync {
    /// All tables with their field names
    async fn tables(&self) -> Result<Vec<TableSchema>, DataAccessError>;

    /// Look up a single table schema by name
    async fn table(&self, name: &str) -> Result<Option<TableSchema>, DataAccessError> {
        Ok(self.tables().await?.into_iter().find(|t| t.name == name))
    }

    /// Rows matching the query; an empty query matches every row
    async fn get(&self, table: &str, query: &FieldMap) -> Result<Vec<Row>, DataAccessError>;

    /// Insert one row and return it as stored, defaults included
    async fn create(&self, table: &str, data: &FieldMap) -> Result<Row, DataAccessError>;

    /// Update all rows matching the query, returning the number of rows matched
    async fn set(
        &self,
        table: &str,
        query: &FieldMap,
        data: &FieldMap,
    ) -> Result<u64, DataAccessError>;

    /// Delete all rows matching the query, returning the number of rows removed
    async fn remove(&self, table: &str, query: &FieldMap) -> Result<u64, DataAccessError>;
}

/// Open the backend selected in settings
pub async fn open(settings: &DatabaseSettings) -> Result<Arc<dyn Database>, DataAccessError> {
    match settings {
        DatabaseSettings::Sqlite { path } => {
            log::info!("Opening SQLite database at {}", path.display());
            Ok(Arc::new(SqliteStore::open(path)?))
        }
        DatabaseSettings::Postgres { connection, schema } => {
            log::info!(
                "Connecting to PostgreSQL {}:{}/{} (schema {})",
                connection.host,
                connection.port,
                connection.database,
                schema
            );
            Ok(Arc::new(PostgresStore::connect(connection, schema).await?))
        }
    }
}

/// Quote an identifier for use in SQL, doubling embedded quotes
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
