mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, LogFormat};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose, cli.global.log_format);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, format: LogFormat) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.with_target(false).init(),
        LogFormat::Json => builder.json().with_current_span(false).init(),
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let global = &cli.global;
    match cli.command {
        // Local commands; of these only `templates import` resolves credentials
        Command::Config(args) => commands::config_cmd::handle(args, global),
        Command::Templates(args) => commands::templates::handle(args, global).await,

        Command::Run => commands::run::handle(global).await,
        Command::Mitigate(args) => commands::mitigate::handle(args, global).await,
        Command::Remove(args) => commands::mitigate::remove(args, global).await,
        Command::Zones(args) => commands::zones::handle(args, global).await,
        Command::Incidents(args) => commands::incidents::handle(args, global).await,
        Command::System(args) => commands::system::handle(args, global).await,
    }
}
