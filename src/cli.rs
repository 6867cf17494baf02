use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "refmarket")]
#[command(author, version, about = "Telegram marketplace bot with referral codes", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot
    Run {
        /// Use webhook mode instead of long polling
        #[arg(long)]
        webhook: bool,
    },

    /// Apply pending database migrations and exit
    Migrate,

    /// Print platform statistics from the database as JSON
    Stats,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
