//! CLI argument parsing using clap derive macros.
//!
//! This module defines the command-line interface for the sc CLI.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use collection_engine_rs::filter::OperatorCategory;
use collection_engine_rs::FilterId;
use collection_library_rs::models::EntityKind;

/// sc - Manage and evaluate smart collections
#[derive(Parser, Debug)]
#[command(name = "sc")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbose output (show debug logs)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// State file holding saved filters and memberships
    #[arg(long, global = true, env = "SC_STATE", value_name = "FILE")]
    pub state: Option<PathBuf>,

    /// Config file (default: ~/.config/sc/config.toml, or SC_CONFIG)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Describe the filter operator catalog
    #[command(alias = "ops")]
    Operators {
        /// Only show operators in this category
        #[arg(long, value_enum)]
        category: Option<CategoryArg>,
    },

    /// List and manage saved filters
    #[command(alias = "f")]
    Filters {
        #[command(subcommand)]
        command: Option<FiltersCommands>,
    },

    /// Evaluate a saved filter against a library snapshot
    Eval {
        /// Filter ID
        filter_id: FilterId,

        /// Library snapshot JSON file
        #[arg(long, value_name = "FILE")]
        library: PathBuf,

        /// Evaluate as this user
        #[arg(long)]
        user: Option<u64>,
    },

    /// View and initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

/// Filter subcommands
#[derive(Subcommand, Debug)]
pub enum FiltersCommands {
    /// List saved filters (default)
    List {
        /// Show filters visible to this user (global filters only if omitted)
        #[arg(long)]
        user: Option<u64>,
    },

    /// Show filter details
    Show {
        /// Filter ID
        filter_id: FilterId,
    },

    /// Create a new filter
    Add {
        /// Filter name
        #[arg(long)]
        name: String,

        /// Entity kind the filter selects from
        #[arg(long, default_value = "series")]
        target: EntityKind,

        /// Owning user (global if omitted)
        #[arg(long)]
        owner: Option<u64>,

        /// Filter tree JSON file, or - for stdin
        #[arg(long, value_name = "FILE")]
        tree: String,
    },

    /// Replace a filter's tree
    Edit {
        /// Filter ID
        filter_id: FilterId,

        /// Filter tree JSON file, or - for stdin
        #[arg(long, value_name = "FILE")]
        tree: String,
    },

    /// Rename a filter
    Rename {
        /// Filter ID
        filter_id: FilterId,

        /// New name
        name: String,
    },

    /// Delete a filter
    Delete {
        /// Filter ID
        filter_id: FilterId,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Print config file path
    Path,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Operator categories accepted by `operators --category`
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CategoryArg {
    Files,
    Info,
    Dates,
    User,
    Logic,
}

impl From<CategoryArg> for OperatorCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Files => OperatorCategory::Files,
            CategoryArg::Info => OperatorCategory::Info,
            CategoryArg::Dates => OperatorCategory::Dates,
            CategoryArg::User => OperatorCategory::User,
            CategoryArg::Logic => OperatorCategory::Logic,
        }
    }
}
