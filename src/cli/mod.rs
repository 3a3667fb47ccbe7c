//! Command-line interface for trackr.

use clap::{Parser, Subcommand};

/// trackr - a small project tracker for teams
#[derive(Parser)]
#[command(name = "trackr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the web server (the default when no command is given)
    #[command(alias = "s")]
    Serve,

    /// Write a default config.toml if none exists
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        let cli = Cli::try_parse_from(["trackr"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["trackr", "s"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Serve));

        let cli = Cli::try_parse_from(["trackr", "init"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Init));

        assert!(Cli::try_parse_from(["trackr", "daemon"]).is_err());
    }
}
