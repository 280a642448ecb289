//! Chat commands for raw table CRUD.
//!
//! Five sub-commands (`tables`, `get`, `create`, `set`, `remove`) under one root
//! command validate their input against the live table schemas, call an
//! injected [`db::Database`], and answer with HTML tables passed through an
//! injected [`render::Renderer`]. Removal waits for a confirmation message from
//! the invoking [`session::Session`].

pub mod commands;
pub mod db;
pub mod error;
pub mod models;
pub mod render;
pub mod session;
pub mod state;

pub use commands::{Command, CommandKind, Dispatcher, UsageError};
pub use error::Error;
pub use models::{FieldMap, Row, Settings, TableSchema};
pub use session::{ChannelSession, Reply, Session};
pub use state::AppState;
