use super::{parse_fields, require_table, CommandError, UsageError};
use crate::models::FieldMap;
use crate::render::html;
use crate::session::Reply;
use crate::state::AppState;

/// Render the rows of a table matching every pair in `query`.
///
/// Without a query every row is listed. An empty result is answered with text,
/// never with an empty table.
pub async fn get_rows(
    state: &AppState,
    table_name: &str,
    query: Option<&str>,
) -> Result<Reply, CommandError> {
    let schema = require_table(state, table_name).await?;

    let query = match query {
        Some(query) => parse_fields(query, &schema)?,
        None => FieldMap::new(),
    };

    let rows = state.database.get(&schema.name, &query).await?;
    if rows.is_empty() {
        return Err(UsageError::EmptyResult.into());
    }

    log::debug!("{} rows from {}", rows.len(), schema.name);

    let image = state.renderer.render(&html::rows_page(&rows)).await?;
    Ok(image.into())
}
