use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "taiga-etl", version, about = "Collect Taiga projects and user stories into boards and issues")]
pub struct Cli {
    /// JSON configuration file: connection, client tuning, and run options.
    #[arg(short, long, env = "TAIGA_ETL_CONFIG", default_value = "taiga-etl.json")]
    pub config: PathBuf,

    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long, env = "TAIGA_ETL_LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Collect, extract, and convert the configured projects.
    Run {
        /// Project ids to run, replacing those in the configuration file.
        #[arg(long, value_delimiter = ',')]
        projects: Vec<u64>,

        /// Ignore conversion watermarks and convert everything.
        #[arg(long)]
        full_resync: bool,

        /// Store snapshot loaded before and saved after the run, so
        /// watermarks carry across invocations.
        #[arg(long)]
        state_file: Option<PathBuf>,
    },

    /// Check that the connection's credentials are accepted.
    TestConnection,

    /// List the projects visible to the connection.
    RemoteProjects {
        /// Server-side search term.
        #[arg(long)]
        search: Option<String>,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 100)]
        page_size: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_flags_parse() {
        let cli = Cli::parse_from([
            "taiga-etl",
            "--config",
            "etl.json",
            "run",
            "--projects",
            "42,43",
            "--full-resync",
            "--state-file",
            "state.json",
        ]);
        assert_eq!(cli.config, PathBuf::from("etl.json"));
        match cli.command {
            Command::Run {
                projects,
                full_resync,
                state_file,
            } => {
                assert_eq!(projects, vec![42, 43]);
                assert!(full_resync);
                assert_eq!(state_file, Some(PathBuf::from("state.json")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_remote_projects_defaults() {
        let cli = Cli::parse_from(["taiga-etl", "remote-projects", "--search", "alpha"]);
        match cli.command {
            Command::RemoteProjects {
                search,
                page,
                page_size,
            } => {
                assert_eq!(search.as_deref(), Some("alpha"));
                assert_eq!(page, 1);
                assert_eq!(page_size, 100);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
