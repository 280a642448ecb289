use std::sync::Arc;

use crate::db::Database;
use crate::models::CommandSettings;
use crate::render::Renderer;

/// Services shared by every command invocation
#[derive(Clone)]
pub struct AppState {
    /// Schema introspection and CRUD backend
    pub database: Arc<dyn Database>,

    /// Turns reply pages into displayable artifacts
    pub renderer: Arc<dyn Renderer>,

    pub settings: CommandSettings,
}

impl AppState {
    pub fn new(
        database: Arc<dyn Database>,
        renderer: Arc<dyn Renderer>,
        settings: CommandSettings,
    ) -> Self {
        Self {
            database,
            renderer,
            settings,
        }
    }
}
