//! Command-line arguments

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "structr-expr", version)]
#[command(about = "Evaluate Structr expressions and render templates")]
pub struct Cli {
    /// JSON fixture seeding the in-memory entity store
    #[arg(long, short, global = true, env = "STRUCTR_FIXTURE")]
    pub fixture: Option<PathBuf>,

    /// Id of the entity bound to `this`
    #[arg(long, global = true, requires = "fixture")]
    pub this: Option<String>,

    /// `structr.conf` file with `key = value` settings
    #[arg(long, short, global = true, env = "STRUCTR_CONF")]
    pub config: Option<PathBuf>,

    /// Fail on malformed arithmetic instead of returning the error text
    #[arg(long, global = true)]
    pub strict: bool,

    /// Log filter directive
    #[arg(long, global = true, default_value = "warn", env = "STRUCTR_LOG")]
    pub log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Evaluate a single expression and print its value
    Eval {
        /// Expression without the surrounding `${...}`
        expression: String,

        /// Evaluate in script style (`${{...}}`)
        #[arg(long)]
        script: bool,
    },

    /// Render a template file, or stdin when the path is `-`
    Render {
        /// Template path
        template: PathBuf,
    },

    /// List the registered functions with their descriptions
    Functions {
        /// Print only the names
        #[arg(long)]
        names_only: bool,
    },

    /// Print the usage text of a function
    Usage {
        /// Function name
        name: String,

        /// Show the script-style usage
        #[arg(long)]
        script: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl From<LogFormat> for structr_log::Format {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
            LogFormat::Json => Self::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "structr-expr",
            "eval",
            "add(1, 2)",
            "--strict",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert!(cli.strict);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(matches!(cli.command, Command::Eval { script: false, .. }));
    }

    #[test]
    fn test_this_requires_fixture() {
        let result = Cli::try_parse_from(["structr-expr", "--this", "u1", "eval", "this"]);
        assert!(result.is_err());
    }
}
