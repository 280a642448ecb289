use super::CommandError;
use crate::render::html;
use crate::session::Reply;
use crate::state::AppState;

/// List every table name as a single-column table
pub async fn list_tables(state: &AppState) -> Result<Reply, CommandError> {
    let names: Vec<String> = state
        .database
        .tables()
        .await?
        .into_iter()
        .map(|table| table.name)
        .collect();

    let image = state.renderer.render(&html::tables_page(&names)).await?;
    Ok(image.into())
}
