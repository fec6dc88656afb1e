//! Command implementations for the sc CLI.
//!
//! This module contains the actual command handlers that are invoked by the CLI.

pub mod config;
pub mod eval;
pub mod filters;
pub mod operators;

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use collection_engine_rs::filter::{FilterNode, RawFilterNode};
use collection_engine_rs::{DefinitionError, EngineError, StateStore, StateStoreError};
use collection_library_rs::error::ProviderError;

use crate::cli::Cli;

/// Error type for command execution.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Saved filter error.
    #[error("filter error: {0}")]
    Definition(#[from] DefinitionError),

    /// Engine error.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// State file error.
    #[error("state error: {0}")]
    State(#[from] StateStoreError),

    /// Library snapshot error.
    #[error("library error: {0}")]
    Library(#[from] ProviderError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CommandError {
    /// Returns the definition error behind this error, if any.
    #[cfg(test)]
    pub fn definition_error(&self) -> Option<&DefinitionError> {
        match self {
            CommandError::Definition(e) | CommandError::Engine(EngineError::Definition(e)) => {
                Some(e)
            }
            _ => None,
        }
    }
}

/// Result type for command execution.
pub type Result<T> = std::result::Result<T, CommandError>;

/// Context for command execution, containing common dependencies.
pub struct CommandContext {
    /// Whether to output JSON.
    pub json_output: bool,
    /// Whether to use colors.
    pub use_colors: bool,
    /// Whether to be quiet (errors only).
    pub quiet: bool,
    /// Whether to be verbose.
    pub verbose: bool,
    /// State file override.
    pub state_path: Option<PathBuf>,
    /// Config file override.
    pub config_path: Option<PathBuf>,
}

impl CommandContext {
    /// Creates a new command context from CLI arguments.
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            json_output: cli.json,
            use_colors: !cli.no_color,
            quiet: cli.quiet,
            verbose: cli.verbose,
            state_path: cli.state.clone(),
            config_path: cli.config.clone(),
        }
    }

    /// Opens the state store at the override path or the default location.
    pub fn state_store(&self) -> Result<StateStore> {
        match &self.state_path {
            Some(path) => Ok(StateStore::with_path(path.clone())),
            None => Ok(StateStore::new()?),
        }
    }
}

/// Reads and validates a filter tree from a JSON file, or stdin for `-`.
pub fn read_tree(source: &str) -> Result<FilterNode> {
    let contents = if source == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(source)?
    };
    parse_tree(&contents)
}

/// Parses a filter tree, reporting every validation error at once.
pub fn parse_tree(contents: &str) -> Result<FilterNode> {
    let raw: RawFilterNode = serde_json::from_str(contents)?;
    FilterNode::try_from(raw).map_err(|e| CommandError::Definition(e.into()))
}
