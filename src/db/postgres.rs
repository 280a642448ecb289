use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row as _};

use super::{quote_ident, Database};
use crate::error::DataAccessError;
use crate::models::{ConnectionConfig, FieldMap, Row, TableSchema};

const PASSWORD_ENV: &str = "DATABASE_OPERATE_PASSWORD";

/// Build a connection string with proper URL encoding and SSL mode
fn build_connection_string(config: &ConnectionConfig) -> String {
    let password = if config.password.is_empty() {
        std::env::var(PASSWORD_ENV).unwrap_or_default()
    } else {
        config.password.clone()
    };

    // URL encode username and password to handle special characters safely
    let username = urlencoding::encode(&config.username);
    let password = urlencoding::encode(&password);

    format!(
        "postgres://{}:{}@{}:{}/{}?sslmode={}",
        username, password, config.host, config.port, config.database, config.ssl_mode
    )
}

/// Sanitize error messages to remove credentials embedded in connection URLs
pub fn sanitize_error(error: &str) -> String {
    let mut sanitized = error.to_string();

    if let Some(start) = sanitized.find("postgres://") {
        if let Some(at_pos) = sanitized[start..].find('@') {
            let end = start + at_pos + 1;
            sanitized = format!(
                "{}postgres://[credentials]@{}",
                &sanitized[..start],
                &sanitized[end..]
            );
        }
    }

    let mut search_from = 0;
    while let Some(offset) = sanitized[search_from..].find("password=") {
        let start = search_from + offset;
        let after = &sanitized[start + 9..];
        let end_offset = after
            .find(|c: char| c.is_whitespace() || c == '&' || c == '"' || c == '\'' || c == ';')
            .unwrap_or(after.len());
        sanitized = format!(
            "{}password=[hidden]{}",
            &sanitized[..start],
            &after[end_offset..]
        );
        search_from = start + "password=[hidden]".len();
    }

    sanitized
}

/// Data access over the tables of one PostgreSQL schema.
///
/// Filters compare the text form of a column (`col::text = $n`); written values
/// are cast from text to the column's declared type. Rows are fetched through
/// `row_to_json` so column order survives, with every value re-read as its
/// PostgreSQL text form so numerics keep their exact digits.
pub struct PostgresStore {
    pool: PgPool,
    schema: String,
}

impl PostgresStore {
    pub async fn connect(config: &ConnectionConfig, schema: &str) -> Result<Self, DataAccessError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&build_connection_string(config))
            .await
            .map_err(|e| {
                log::warn!("PostgreSQL connection failed: {}", sanitize_error(&e.to_string()));
                e
            })?;

        Ok(Self::from_pool(pool, schema))
    }

    pub fn from_pool(pool: PgPool, schema: &str) -> Self {
        PostgresStore {
            pool,
            schema: schema.to_string(),
        }
    }

    fn qualified(&self, table: &str) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(table))
    }

    /// Declared SQL type per column, e.g. `integer` or `character varying(255)`
    async fn column_types(&self, table: &str) -> Result<HashMap<String, String>, DataAccessError> {
        let rows = sqlx::query(
            r#"
            SELECT a.attname AS column_name,
                   format_type(a.atttypid, a.atttypmod) AS column_type
            FROM pg_catalog.pg_attribute a
            JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
            WHERE n.nspname = $1
              AND c.relname = $2
              AND a.attnum > 0
              AND NOT a.attisdropped
            "#,
        )
        .bind(self.schema.as_str())
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(DataAccessError::MissingTable(table.to_string()));
        }

        Ok(rows
            .into_iter()
            .map(|row| (row.get("column_name"), row.get("column_type")))
            .collect())
    }

    /// `CAST($n::text AS <type>)` for each data field, in order
    fn typed_placeholders(
        data: &FieldMap,
        types: &HashMap<String, String>,
        first_param: usize,
    ) -> Vec<String> {
        data.keys()
            .enumerate()
            .map(|(i, key)| match types.get(key) {
                Some(ty) => format!("CAST(${}::text AS {})", first_param + i, ty),
                None => format!("${}", first_param + i),
            })
            .collect()
    }

    async fn fetch_rows<'a>(
        &self,
        sql: &'a str,
        params: Vec<&'a str>,
    ) -> Result<Vec<Row>, DataAccessError> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(param);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| -> Result<Row, DataAccessError> {
                let json: String = row.try_get("row_json")?;
                Ok(serde_json::from_str::<Row>(&json)?)
            })
            .collect()
    }
}

#[async_trait]
impl Database for PostgresStore {
    async fn tables(&self) -> Result<Vec<TableSchema>, DataAccessError> {
        let rows = sqlx::query(
            r#"
            SELECT c.relname AS table_name, a.attname AS column_name
            FROM pg_catalog.pg_class c
            JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
            JOIN pg_catalog.pg_attribute a ON a.attrelid = c.oid
            WHERE n.nspname = $1
              AND c.relkind IN ('r', 'p')
              AND a.attnum > 0
              AND NOT a.attisdropped
            ORDER BY c.relname, a.attnum
            "#,
        )
        .bind(self.schema.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut tables: Vec<TableSchema> = Vec::new();
        for row in rows {
            let table_name: String = row.get("table_name");
            let column_name: String = row.get("column_name");

            let same_table = tables.last().is_some_and(|t| t.name == table_name);
            if same_table {
                if let Some(table) = tables.last_mut() {
                    table.fields.push(column_name);
                    continue;
                }
            }
            tables.push(TableSchema {
                name: table_name,
                fields: vec![column_name],
            });
        }

        Ok(tables)
    }

    async fn get(&self, table: &str, query: &FieldMap) -> Result<Vec<Row>, DataAccessError> {
        let sql = format!(
            "SELECT {} FROM {} AS t{}",
            row_json("t"),
            self.qualified(table),
            where_clause(query, 1)
        );

        self.fetch_rows(&sql, query.values().collect()).await
    }

    async fn create(&self, table: &str, data: &FieldMap) -> Result<Row, DataAccessError> {
        let insert = if data.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES RETURNING *", self.qualified(table))
        } else {
            let types = self.column_types(table).await?;
            let columns: Vec<String> = data.keys().map(quote_ident).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
                self.qualified(table),
                columns.join(", "),
                Self::typed_placeholders(data, &types, 1).join(", ")
            )
        };
        let sql = format!(
            "WITH inserted AS ({}) SELECT {} FROM inserted",
            insert,
            row_json("inserted")
        );

        self.fetch_rows(&sql, data.values().collect())
            .await?
            .into_iter()
            .next()
            .ok_or(DataAccessError::Postgres(sqlx::Error::RowNotFound))
    }

    async fn set(
        &self,
        table: &str,
        query: &FieldMap,
        data: &FieldMap,
    ) -> Result<u64, DataAccessError> {
        let types = self.column_types(table).await?;
        let assignments: Vec<String> = data
            .keys()
            .zip(Self::typed_placeholders(data, &types, 1))
            .map(|(key, value)| format!("{} = {}", quote_ident(key), value))
            .collect();
        let sql = format!(
            "UPDATE {} AS t SET {}{}",
            self.qualified(table),
            assignments.join(", "),
            where_clause(query, data.len() + 1)
        );

        let mut statement = sqlx::query(&sql);
        for value in data.values().chain(query.values()) {
            statement = statement.bind(value);
        }

        Ok(statement.execute(&self.pool).await?.rows_affected())
    }

    async fn remove(&self, table: &str, query: &FieldMap) -> Result<u64, DataAccessError> {
        let sql = format!(
            "DELETE FROM {} AS t{}",
            self.qualified(table),
            where_clause(query, 1)
        );

        let mut statement = sqlx::query(&sql);
        for value in query.values() {
            statement = statement.bind(value);
        }

        Ok(statement.execute(&self.pool).await?.rows_affected())
    }
}

/// Project a row alias into a JSON object of column text values, in column order.
///
/// Going through `json_each_text` keeps values like `numeric` `10.10` as written
/// instead of reparsing them as JSON numbers.
fn row_json(alias: &str) -> String {
    format!(
        "COALESCE((SELECT json_object_agg(e.key, e.value ORDER BY e.ord) \
         FROM json_each_text(row_to_json({alias})) WITH ORDINALITY AS e(key, value, ord)), \
         '{{}}'::json)::text AS row_json",
        alias = alias
    )
}

/// Build ` WHERE t."a"::text = $n AND ...`, or nothing for an empty query
fn where_clause(query: &FieldMap, first_param: usize) -> String {
    if query.is_empty() {
        return String::new();
    }

    let conditions: Vec<String> = query
        .keys()
        .enumerate()
        .map(|(i, key)| format!("t.{}::text = ${}", quote_ident(key), first_param + i))
        .collect();

    format!(" WHERE {}", conditions.join(" AND "))
}
