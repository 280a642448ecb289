use super::{parse_fields, require_table, CommandError, UsageError};
use crate::render::html;
use crate::session::{Reply, Session};
use crate::state::AppState;

// ============================================================================
// Create
// ============================================================================

/// Insert one row and render it as stored, highlighting defaulted fields
pub async fn create_row(
    state: &AppState,
    table_name: &str,
    data: &str,
) -> Result<Reply, CommandError> {
    let schema = require_table(state, table_name).await?;
    let data = parse_fields(data, &schema)?;

    let row = state.database.create(&schema.name, &data).await?;
    log::info!("Inserted a row into {}", schema.name);

    let page = html::created_page(&schema.name, &row, &data);
    Ok(state.renderer.render(&page).await?.into())
}

// ============================================================================
// Set
// ============================================================================

/// Update rows matching `query` and render them before and after.
///
/// The after view re-runs the same query, so rows whose updated values no
/// longer match it are not shown.
pub async fn set_rows(
    state: &AppState,
    table_name: &str,
    query: &str,
    data: &str,
) -> Result<Reply, CommandError> {
    let schema = require_table(state, table_name).await?;
    let query = parse_fields(query, &schema)?;
    let data = parse_fields(data, &schema)?;

    let before = state.database.get(&schema.name, &query).await?;
    if before.is_empty() {
        return Err(UsageError::NoMatchingRows.into());
    }

    let matched = state.database.set(&schema.name, &query, &data).await?;
    log::info!("Updated {} rows in {}", matched, schema.name);

    let after = state.database.get(&schema.name, &query).await?;

    let page = html::updated_page(&before, &after);
    Ok(state.renderer.render(&page).await?.into())
}

// ============================================================================
// Remove
// ============================================================================

/// Show the rows matching `query` and delete them once the session replies
/// with the confirmation token before the timeout.
///
/// Any other reply, a timeout or a closed session cancels without deleting.
pub async fn remove_rows(
    state: &AppState,
    session: &mut dyn Session,
    table_name: &str,
    query: &str,
) -> Result<Reply, CommandError> {
    let schema = require_table(state, table_name).await?;
    let query = parse_fields(query, &schema)?;

    let rows = state.database.get(&schema.name, &query).await?;
    if rows.is_empty() {
        return Err(UsageError::NoMatchingRows.into());
    }

    let settings = &state.settings;
    let page = html::remove_confirm_page(&rows, &settings.confirm_token, settings.confirm_timeout_secs);
    session.send(state.renderer.render(&page).await?.into()).await?;

    let answer = session.prompt(settings.confirm_timeout()).await?;
    if answer.as_deref() != Some(settings.confirm_token.as_str()) {
        log::info!("Removal from {} cancelled", schema.name);
        return Ok(Reply::Text("Removal cancelled".to_string()));
    }

    let removed = state.database.remove(&schema.name, &query).await?;
    log::info!("Removed {} rows from {}", removed, schema.name);

    Ok(Reply::Text(format!("Removed {} row(s) shown above", removed)))
}
