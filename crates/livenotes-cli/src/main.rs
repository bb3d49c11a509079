//! livenotes CLI - signed-in notes from the terminal
//!
//! Sign in once, then add, list, edit, delete and watch your notes.

mod app;
mod cli;
mod commands;
mod error;
mod notifier;
mod provider;

use clap::{CommandFactory, Parser};

use crate::app::App;
use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::auth_cmd::{run_login, run_logout, run_status};
use crate::commands::common::{load_client_config, resolve_db_path};
use crate::commands::completions::run_completions;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::list::run_list;
use crate::commands::profile::run_profile;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let command = match cli.command {
        Some(Commands::Completions { shell, output }) => {
            return run_completions(shell, output.as_deref());
        }
        None if cli.note.is_empty() => {
            Cli::command().print_help()?;
            println!();
            return Ok(());
        }
        command => command,
    };

    let config = load_client_config(cli.config.as_deref())?;
    let db_path = resolve_db_path(cli.db_path, &config)?;
    tracing::debug!("Using database at {}", db_path.display());
    let app = App::open(&config, &db_path).await?;

    let result = match command {
        Some(Commands::Login) => run_login(&app).await,
        Some(Commands::Logout { yes }) => run_logout(&app, yes).await,
        Some(Commands::Status) => run_status(&app).await,
        Some(Commands::Profile { json }) => run_profile(&app, json).await,
        Some(Commands::Add { text }) => run_add(&app, &text).await,
        Some(Commands::List { limit, json }) => run_list(&app, limit, json).await,
        Some(Commands::Edit { id, text }) => run_edit(&app, &id, &text).await,
        Some(Commands::Delete { id, yes }) => run_delete(&app, &id, yes).await,
        Some(Commands::Watch) => run_watch(&app).await,
        Some(Commands::Completions { .. }) => Ok(()),
        // Quick capture mode: livenotes "my note"
        None => run_add(&app, &cli.note).await,
    };

    app.session.shutdown();
    result
}

fn init_tracing() {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "livenotes=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests;
