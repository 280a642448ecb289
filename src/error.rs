use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by a data-access backend
#[derive(Debug, Error)]
pub enum DataAccessError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("Failed to decode row: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Database connection lock poisoned")]
    LockPoisoned,

    #[error("Failed to create database directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Table '{0}' does not exist")]
    MissingTable(String),
}

/// Failure reported by a rendering backend
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to write render output: {0}")]
    Io(#[from] std::io::Error),

    #[error("Renderer exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Renderer did not finish within {0} seconds")]
    Timeout(u64),

    #[error("Renderer produced no output at {0}")]
    MissingOutput(PathBuf),
}

/// Failure reported by the conversational session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Errors that escape a command invocation and reach the host
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
