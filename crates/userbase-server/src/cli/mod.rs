use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "userbase-server")]
#[command(about = "Userbase HTTP server")]
pub struct Cli {
    /// Serve from the in-process store seeded with demo users instead of Postgres
    #[arg(long)]
    memory: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run database migrations
    Migrate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Server { memory: bool },
    Migrate,
}

impl From<Cli> for RunMode {
    fn from(cli: Cli) -> Self {
        match cli.command {
            None => RunMode::Server { memory: cli.memory },
            Some(Command::Migrate) => RunMode::Migrate,
        }
    }
}

pub fn parse_args() -> RunMode {
    Cli::parse().into()
}
