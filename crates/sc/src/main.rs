use std::process::ExitCode;

use clap::Parser;
use collection_engine_rs::{DefinitionError, EngineError, StateStoreError};
use tracing::Level;

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands, ConfigCommands, FiltersCommands};
use commands::eval::EvalOptions;
use commands::filters::FiltersAddOptions;
use commands::{CommandContext, CommandError};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                let error_json = serde_json::json!({
                    "error": {
                        "code": error_code(&e),
                        "message": e.to_string(),
                    }
                });
                match serde_json::to_string_pretty(&error_json) {
                    Ok(text) => eprintln!("{text}"),
                    Err(_) => eprintln!("Error: {e}"),
                }
            } else {
                eprintln!("Error: {e}");
            }
            error_exit_code(&e)
        }
    }
}

/// Sends engine logs to stderr: warnings by default, debug with `-v`, errors with `-q`.
fn init_logging(cli: &Cli) {
    let level = log_level(cli.verbose, cli.quiet);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(!cli.no_color)
        .init();
}

fn log_level(verbose: bool, quiet: bool) -> Level {
    if verbose {
        Level::DEBUG
    } else if quiet {
        Level::ERROR
    } else {
        Level::WARN
    }
}

async fn run(cli: &Cli) -> commands::Result<()> {
    let ctx = CommandContext::from_cli(cli);

    match &cli.command {
        Commands::Operators { category } => {
            commands::operators::execute(&ctx, category.map(Into::into))
        }
        Commands::Filters { command } => match command {
            None => commands::filters::execute_list(&ctx, None),
            Some(FiltersCommands::List { user }) => commands::filters::execute_list(&ctx, *user),
            Some(FiltersCommands::Show { filter_id }) => {
                commands::filters::execute_show(&ctx, *filter_id)
            }
            Some(FiltersCommands::Add {
                name,
                target,
                owner,
                tree,
            }) => {
                let opts = FiltersAddOptions {
                    name: name.clone(),
                    target: *target,
                    owner: *owner,
                    tree: tree.clone(),
                };
                commands::filters::execute_add(&ctx, &opts)
            }
            Some(FiltersCommands::Edit { filter_id, tree }) => {
                commands::filters::execute_edit(&ctx, *filter_id, tree)
            }
            Some(FiltersCommands::Rename { filter_id, name }) => {
                commands::filters::execute_rename(&ctx, *filter_id, name)
            }
            Some(FiltersCommands::Delete { filter_id }) => {
                commands::filters::execute_delete(&ctx, *filter_id)
            }
        },
        Commands::Eval {
            filter_id,
            library,
            user,
        } => {
            let opts = EvalOptions {
                filter_id: *filter_id,
                library: library.clone(),
                user: *user,
            };
            commands::eval::execute(&ctx, &opts).await
        }
        Commands::Config { command } => match command {
            None | Some(ConfigCommands::Show) => commands::config::execute_show(&ctx),
            Some(ConfigCommands::Path) => commands::config::execute_path(&ctx),
            Some(ConfigCommands::Init { force }) => commands::config::execute_init(&ctx, *force),
        },
    }
}

/// Returns the error code string for JSON output.
fn error_code(e: &CommandError) -> &'static str {
    match e {
        CommandError::Definition(d) | CommandError::Engine(EngineError::Definition(d)) => match d {
            DefinitionError::Invalid(_) | DefinitionError::EmptyName => "INVALID_FILTER",
            DefinitionError::NotFound(_) | DefinitionError::NotVisible(_) => "NOT_FOUND",
        },
        CommandError::Engine(_) => "ENGINE_ERROR",
        CommandError::State(_) => "STATE_ERROR",
        CommandError::Library(_) => "LIBRARY_ERROR",
        CommandError::Config(_) => "CONFIG_ERROR",
        CommandError::Io(_) => "IO_ERROR",
        CommandError::Json(_) => "JSON_ERROR",
    }
}

/// Returns the process exit status for an error.
fn exit_status(e: &CommandError) -> u8 {
    match e {
        CommandError::Definition(d) | CommandError::Engine(EngineError::Definition(d)) => match d {
            DefinitionError::Invalid(_) | DefinitionError::EmptyName => 1,
            DefinitionError::NotFound(_) | DefinitionError::NotVisible(_) => 4,
        },
        CommandError::Engine(_) => 2,
        CommandError::State(StateStoreError::UnsupportedVersion { .. }) => 5,
        CommandError::State(_) => 3,
        CommandError::Library(_) => 3,
        CommandError::Config(_) => 5,
        CommandError::Io(_) => 3,
        CommandError::Json(_) => 1,
    }
}

fn error_exit_code(e: &CommandError) -> ExitCode {
    ExitCode::from(exit_status(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use collection_engine_rs::filter::ValidationErrors;
    use collection_engine_rs::FilterId;

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(true, false), Level::DEBUG);
        assert_eq!(log_level(false, true), Level::ERROR);
        assert_eq!(log_level(false, false), Level::WARN);
    }

    #[test]
    fn test_error_code_not_found_through_engine() {
        let err = CommandError::Engine(EngineError::Definition(DefinitionError::NotFound(
            FilterId::new(),
        )));
        assert_eq!(error_code(&err), "NOT_FOUND");
        assert_eq!(exit_status(&err), 4);
    }

    #[test]
    fn test_error_code_invalid_filter() {
        let errors = ValidationErrors::single(
            collection_engine_rs::filter::FilterError::NonCanonical {
                path: "$".to_string(),
            },
        );
        let err = CommandError::Definition(DefinitionError::Invalid(errors));
        assert_eq!(error_code(&err), "INVALID_FILTER");
        assert_eq!(exit_status(&err), 1);
    }

    #[test]
    fn test_error_code_engine_without_runtime() {
        let err = CommandError::Engine(EngineError::NoRuntime);
        assert_eq!(error_code(&err), "ENGINE_ERROR");
        assert_eq!(exit_status(&err), 2);
    }

    #[test]
    fn test_error_code_config() {
        let err = CommandError::Config("bad".to_string());
        assert_eq!(error_code(&err), "CONFIG_ERROR");
        assert_eq!(exit_status(&err), 5);
    }
}
