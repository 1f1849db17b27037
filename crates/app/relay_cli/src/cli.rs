use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "relay_cli", about = "Talk to a hosted agent from the command line")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one message to an agent and print the reply as JSON
    Ask(AskArgs),
    /// Print the version
    Version,
}

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Message to send.
    #[arg(long, short)]
    pub message: String,

    /// Agent to talk to.
    #[arg(long, short)]
    pub agent_id: String,

    /// Thread to continue; a new one is created when omitted.
    #[arg(long, short)]
    pub thread_id: Option<String>,

    /// Agent service project endpoint.
    #[arg(long, env = "AIProjectConnString")]
    pub project_endpoint: Option<String>,

    /// Delay between run status polls, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub poll_interval_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ask_parses_short_flags() {
        let cli = Cli::try_parse_from([
            "relay_cli",
            "ask",
            "-m",
            "hello",
            "-a",
            "A1",
            "-t",
            "thread_1",
        ])
        .expect("parse");
        match cli.command {
            Commands::Ask(args) => {
                assert_eq!(args.message, "hello");
                assert_eq!(args.agent_id, "A1");
                assert_eq!(args.thread_id.as_deref(), Some("thread_1"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn ask_requires_message_and_agent() {
        assert!(Cli::try_parse_from(["relay_cli", "ask", "-m", "hello"]).is_err());
        assert!(Cli::try_parse_from(["relay_cli", "ask", "-a", "A1"]).is_err());
    }
}
