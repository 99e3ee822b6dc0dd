/// CLI Module
///
/// Command-line interface configuration using clap. Every option can also be
/// supplied through the environment (or a `.env` file).
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgConnectOptions;
use std::path::PathBuf;

/// Song Play ETL
///
/// Extract song metadata and listening logs from JSON files and load them into
/// a PostgreSQL star schema
#[derive(Parser, Debug)]
#[command(name = "songplay-etl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Drop and recreate the target database, then create all tables (destructive)
    Setup(SetupArgs),
    /// Load every song file, then every log file, into the target database
    Load(LoadArgs),
}

/// Connection parameters shared by both commands
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Database server host
    #[arg(long, env = "DB_HOST", default_value = "127.0.0.1", global = true)]
    pub host: String,

    /// Database server port
    #[arg(long, env = "DB_PORT", default_value = "5432", global = true)]
    pub port: u16,

    /// Database user
    #[arg(short = 'u', long, env = "DB_USER", default_value = "student", global = true)]
    pub user: String,

    /// Database password
    #[arg(long, env = "DB_PASSWORD", default_value = "student", global = true, hide_env_values = true)]
    pub password: String,

    /// Target database holding the star schema
    #[arg(short = 'd', long, env = "DB_NAME", default_value = "sparkifydb", global = true)]
    pub database: String,
}

#[derive(Args, Debug, Clone)]
pub struct SetupArgs {
    /// Existing database to connect to while the target is dropped and recreated
    #[arg(long, env = "DB_ADMIN_NAME", default_value = "studentdb")]
    pub admin_database: String,
}

#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    /// Root directory of song-metadata files
    #[arg(long, env = "SONG_DATA_DIR", value_name = "DIR", default_value = "data/song_data")]
    pub song_data: PathBuf,

    /// Root directory of event-log files
    #[arg(long, env = "LOG_DATA_DIR", value_name = "DIR", default_value = "data/log_data")]
    pub log_data: PathBuf,

    /// Log and skip files that fail to parse instead of aborting the run
    #[arg(long)]
    pub skip_invalid_files: bool,

    /// Drop and recreate all tables before loading (destructive)
    #[arg(long)]
    pub reset_schema: bool,
}

impl ConnectionArgs {
    /// Connection options for `database` on the configured server
    pub fn connect_options(&self, database: &str) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(database)
    }
}

impl Cli {
    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.connection.database.trim().is_empty() {
            anyhow::bail!("Target database name must not be empty");
        }

        if self.connection.port == 0 {
            anyhow::bail!("Port must be greater than 0");
        }

        if let Command::Setup(setup) = &self.command {
            if setup.admin_database.trim().is_empty() {
                anyhow::bail!("Admin database name must not be empty");
            }

            if setup.admin_database == self.connection.database {
                anyhow::bail!(
                    "Admin database ({}) must differ from the target database, which is dropped during setup",
                    setup.admin_database
                );
            }
        }

        Ok(())
    }
}
