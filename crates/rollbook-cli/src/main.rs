//! Rollbook CLI: the `rollbook` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = support::store_config(&cli.db, cli.load_wait_ms);

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Shell => commands::shell::run(config),

        Commands::Add {
            id,
            name,
            score,
            json,
        } => commands::record::run_add(config, id, name, score, json),

        Commands::Update {
            id,
            name,
            score,
            json,
        } => commands::record::run_update(config, id, name, score, json),

        Commands::Delete { id, json } => commands::record::run_delete(config, id, json),

        Commands::Get { id, json } => commands::record::run_get(config, id, json),

        Commands::List { by_score, json } => commands::record::run_list(config, by_score, json),
    }
}
