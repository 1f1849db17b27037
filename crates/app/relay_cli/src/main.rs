// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use std::time::Duration;

use clap::Parser;
use cli::{AskArgs, Cli, Commands};
use relay_core::agents::client::AgentsClient;
use relay_core::agents::credential::AmbientCredential;
use relay_core::relay::{self, RelayInput};

mod cli;
mod logging;

fn main() -> Result<()> {
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<()> {
    logging::init()?;

    let args = Cli::parse();

    match args.command {
        Commands::Ask(ask_args) => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(ask(ask_args))?;
        }
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

async fn ask(args: AskArgs) -> Result<()> {
    let endpoint = args
        .project_endpoint
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| {
            Error::Custom(
                "Missing AIProjectConnString (pass --project-endpoint or set the variable)".into(),
            )
        })?;

    let client = AgentsClient::new(&endpoint, AmbientCredential::new())?
        .with_poll_interval(Duration::from_millis(args.poll_interval_ms));

    let reply = relay::relay_message(
        &client,
        RelayInput {
            message: args.message,
            agent_id: args.agent_id,
            thread_id: args.thread_id.filter(|t| !t.is_empty()),
        },
    )
    .await?;

    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}
