pub mod metadata;
pub mod query;
pub mod table;

use std::fmt;

use thiserror::Error;

use crate::error::{DataAccessError, Error, RenderError, SessionError};
use crate::models::{FieldMap, FieldMapError, TableSchema};
use crate::session::{Reply, Session};
use crate::state::AppState;

pub use metadata::*;
pub use query::*;
pub use table::*;

/// Problems with the user's input, answered with a plain text reply
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("Table '{0}' not found, check the table name")]
    TableNotFound(String),

    #[error("Table '{table}' has no field '{field}', check the field names")]
    UnknownField { table: String, field: String },

    #[error("Malformed pair '{token}'. Use key:value pairs separated by commas, e.g. 'name:koishi', 'age:18' or 'name:koishi,age:18'")]
    MalformedPair { token: String },

    #[error("The query returned no rows")]
    EmptyResult,

    #[error("No matching rows found")]
    NoMatchingRows,

    #[error("Missing argument <{argument}>\n{usage}")]
    MissingArgument {
        argument: &'static str,
        usage: String,
    },

    #[error("Too many arguments\n{usage}")]
    TooManyArguments { usage: String },

    #[error("Unknown command '{name}'\n{help}")]
    UnknownCommand { name: String, help: String },

    #[error("Unterminated quote in command")]
    UnterminatedQuote,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error(transparent)]
    Failed(#[from] Error),
}

impl From<DataAccessError> for CommandError {
    fn from(e: DataAccessError) -> Self {
        CommandError::Failed(e.into())
    }
}

impl From<RenderError> for CommandError {
    fn from(e: RenderError) -> Self {
        CommandError::Failed(e.into())
    }
}

impl From<SessionError> for CommandError {
    fn from(e: SessionError) -> Self {
        CommandError::Failed(e.into())
    }
}

// ============================================================================
// Command surface
// ============================================================================

struct Argument {
    name: &'static str,
    required: bool,
}

const fn required(name: &'static str) -> Argument {
    Argument { name, required: true }
}

const fn optional(name: &'static str) -> Argument {
    Argument {
        name,
        required: false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Tables,
    Get,
    Create,
    Set,
    Remove,
}

impl CommandKind {
    pub const ALL: [CommandKind; 5] = [
        CommandKind::Tables,
        CommandKind::Get,
        CommandKind::Create,
        CommandKind::Set,
        CommandKind::Remove,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Tables => "tables",
            CommandKind::Get => "get",
            CommandKind::Create => "create",
            CommandKind::Set => "set",
            CommandKind::Remove => "remove",
        }
    }

    pub fn from_name(name: &str) -> Option<CommandKind> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    fn arguments(self) -> &'static [Argument] {
        const TABLES: &[Argument] = &[];
        const GET: &[Argument] = &[required("tableName"), optional("query")];
        const CREATE: &[Argument] = &[required("tableName"), required("data")];
        const SET: &[Argument] = &[required("tableName"), required("query"), required("data")];
        const REMOVE: &[Argument] = &[required("tableName"), required("query")];

        match self {
            CommandKind::Tables => TABLES,
            CommandKind::Get => GET,
            CommandKind::Create => CREATE,
            CommandKind::Set => SET,
            CommandKind::Remove => REMOVE,
        }
    }

    fn description(self) -> &'static str {
        match self {
            CommandKind::Tables => "List all table names",
            CommandKind::Get => "Query rows",
            CommandKind::Create => "Insert a row",
            CommandKind::Set => "Update rows",
            CommandKind::Remove => "Delete rows",
        }
    }

    fn details(self) -> &'static str {
        match self {
            CommandKind::Tables => "List the names of every table in the database",
            CommandKind::Get => "Query the rows of a table that match every pair in query\nquery is any number of key:value pairs separated by commas; omit it to list every row",
            CommandKind::Create => "Insert one row into a table\ndata is any number of key:value pairs separated by commas",
            CommandKind::Set => "Update the rows of a table that match query\nquery and data are any number of key:value pairs separated by commas",
            CommandKind::Remove => "Delete the rows of a table that match query, after confirmation\nquery is any number of key:value pairs separated by commas",
        }
    }

    fn example(self) -> &'static str {
        match self {
            CommandKind::Tables => "tables",
            CommandKind::Get => "get user name:koishi,age:18",
            CommandKind::Create => "create user name:koishi,age:18",
            CommandKind::Set => "set user name:koishi,age:18 name:koishi,age:300",
            CommandKind::Remove => "remove user name:nonebot,age:18",
        }
    }

    /// Signature line, e.g. `database.get <tableName> [query]`
    pub fn signature(self, root: &str) -> String {
        let mut signature = format!("{}.{}", root, self.name());
        for argument in self.arguments() {
            if argument.required {
                signature.push_str(&format!(" <{}>", argument.name));
            } else {
                signature.push_str(&format!(" [{}]", argument.name));
            }
        }
        signature
    }

    pub fn usage(self, root: &str) -> String {
        format!(
            "{}\n{}\nExample: {}.{}",
            self.signature(root),
            self.details(),
            root,
            self.example()
        )
    }

    fn check_arguments(self, args: &[String], root: &str) -> Result<(), UsageError> {
        let arguments = self.arguments();

        if args.len() > arguments.len() {
            return Err(UsageError::TooManyArguments {
                usage: self.usage(root),
            });
        }

        if let Some(missing) = arguments.iter().skip(args.len()).find(|a| a.required) {
            return Err(UsageError::MissingArgument {
                argument: missing.name,
                usage: self.usage(root),
            });
        }

        Ok(())
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Overview of every sub-command under the root command
pub fn help_text(root: &str) -> String {
    let mut lines = vec![format!("{}: database operations", root)];
    for kind in CommandKind::ALL {
        lines.push(format!("  {}  {}", kind.signature(root), kind.description()));
    }
    lines.push(format!("Use {}.<command> --help for details", root));
    lines.join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help(Option<CommandKind>),
    Tables,
    Get {
        table: String,
        query: Option<String>,
    },
    Create {
        table: String,
        data: String,
    },
    Set {
        table: String,
        query: String,
        data: String,
    },
    Remove {
        table: String,
        query: String,
    },
}

impl Command {
    /// Parse a chat message addressed to `root`.
    ///
    /// Accepts `root`, `root.<command> args…` and `root <command> args…`.
    /// Returns `Ok(None)` for messages addressed to something else.
    pub fn parse(line: &str, root: &str) -> Result<Option<Command>, UsageError> {
        let addressed = line.split_whitespace().next().is_some_and(|head| {
            head == root || head.strip_prefix(root).is_some_and(|rest| rest.starts_with('.'))
        });
        if !addressed {
            return Ok(None);
        }

        let words = split_arguments(line)?;
        let Some((head, rest)) = words.split_first() else {
            return Ok(None);
        };

        let (name, args) = match head.strip_prefix(root).and_then(|s| s.strip_prefix('.')) {
            Some(name) => (name, rest),
            None => match rest.split_first() {
                Some((name, args)) => (name.as_str(), args),
                None => return Ok(Some(Command::Help(None))),
            },
        };

        if name == "help" {
            return Ok(Some(Command::Help(None)));
        }

        let kind = CommandKind::from_name(name).ok_or_else(|| UsageError::UnknownCommand {
            name: name.to_string(),
            help: help_text(root),
        })?;

        if args.iter().any(|a| a == "-h" || a == "--help") {
            return Ok(Some(Command::Help(Some(kind))));
        }

        kind.check_arguments(args, root)?;

        let mut args = args.iter().cloned();
        let mut next = || args.next().unwrap_or_default();
        let command = match kind {
            CommandKind::Tables => Command::Tables,
            CommandKind::Get => {
                let table = next();
                let query = Some(next()).filter(|q| !q.is_empty());
                Command::Get { table, query }
            }
            CommandKind::Create => Command::Create {
                table: next(),
                data: next(),
            },
            CommandKind::Set => Command::Set {
                table: next(),
                query: next(),
                data: next(),
            },
            CommandKind::Remove => Command::Remove {
                table: next(),
                query: next(),
            },
        };

        Ok(Some(command))
    }

    pub fn kind(&self) -> Option<CommandKind> {
        match self {
            Command::Help(_) => None,
            Command::Tables => Some(CommandKind::Tables),
            Command::Get { .. } => Some(CommandKind::Get),
            Command::Create { .. } => Some(CommandKind::Create),
            Command::Set { .. } => Some(CommandKind::Set),
            Command::Remove { .. } => Some(CommandKind::Remove),
        }
    }
}

/// Split a command line on whitespace, keeping double-quoted runs together
pub fn split_arguments(line: &str) -> Result<Vec<String>, UsageError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quoted {
        return Err(UsageError::UnterminatedQuote);
    }
    if in_word {
        words.push(current);
    }

    Ok(words)
}

// ============================================================================
// Shared handler steps
// ============================================================================

/// Look the table up in the live schema registry
pub(crate) async fn require_table(state: &AppState, name: &str) -> Result<TableSchema, CommandError> {
    state
        .database
        .table(name)
        .await?
        .ok_or_else(|| UsageError::TableNotFound(name.to_string()).into())
}

/// Parse a `key:value,…` argument against the table's fields
pub(crate) fn parse_fields(input: &str, schema: &TableSchema) -> Result<FieldMap, UsageError> {
    FieldMap::parse(input, schema).map_err(|e| match e {
        FieldMapError::Malformed { token } => UsageError::MalformedPair { token },
        FieldMapError::UnknownField { field } => UsageError::UnknownField {
            table: schema.name.clone(),
            field,
        },
    })
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes chat messages to the command handlers
pub struct Dispatcher {
    state: AppState,
}

impl Dispatcher {
    pub fn new(state: AppState) -> Self {
        Dispatcher { state }
    }

    /// Handle one incoming message.
    ///
    /// Returns `Ok(None)` if the message is not a command for this plugin. Input
    /// problems come back as text replies; backend failures are returned as errors.
    pub async fn handle(
        &self,
        line: &str,
        session: &mut dyn Session,
    ) -> Result<Option<Reply>, Error> {
        match Command::parse(line, &self.state.settings.root) {
            Ok(Some(command)) => self.execute(command, session).await.map(Some),
            Ok(None) => Ok(None),
            Err(e) => Ok(Some(Reply::Text(e.to_string()))),
        }
    }

    /// Run a parsed command
    pub async fn execute(&self, command: Command, session: &mut dyn Session) -> Result<Reply, Error> {
        let root = &self.state.settings.root;
        if let Some(kind) = command.kind() {
            log::info!("Running {}.{}", root, kind);
        }

        let result = match command {
            Command::Help(None) => Ok(Reply::Text(help_text(root))),
            Command::Help(Some(kind)) => Ok(Reply::Text(kind.usage(root))),
            Command::Tables => list_tables(&self.state).await,
            Command::Get { table, query } => get_rows(&self.state, &table, query.as_deref()).await,
            Command::Create { table, data } => create_row(&self.state, &table, &data).await,
            Command::Set { table, query, data } => {
                set_rows(&self.state, &table, &query, &data).await
            }
            Command::Remove { table, query } => {
                remove_rows(&self.state, session, &table, &query).await
            }
        };

        match result {
            Ok(reply) => Ok(reply),
            Err(CommandError::Usage(e)) => {
                log::debug!("Rejected command: {}", e);
                Ok(Reply::Text(e.to_string()))
            }
            Err(CommandError::Failed(e)) => {
                log::warn!("Command failed: {}", e);
                Err(e)
            }
        }
    }
}
