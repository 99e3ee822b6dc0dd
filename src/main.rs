/// Song Play ETL
///
/// An ETL pipeline that loads song metadata and listening logs from JSON files
/// into a PostgreSQL star schema.
mod cli;
mod db;
mod error;
mod etl;
mod models;
mod pipeline;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command, ConnectionArgs, LoadArgs, SetupArgs};
use db::{schema, Database};
use etl::load::PgWarehouse;
use pipeline::{Pipeline, PipelineConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    cli.validate()?;

    match &cli.command {
        Command::Setup(args) => setup(&cli.connection, args).await,
        Command::Load(args) => load(&cli.connection, args).await,
    }
}

/// Recreate the target database and its tables
async fn setup(connection: &ConnectionArgs, args: &SetupArgs) -> Result<()> {
    println!("💾 Connecting to administrative database {}...", args.admin_database);
    let admin = Database::connect(connection.connect_options(&args.admin_database))
        .await
        .context("Failed to connect to the administrative database")?;

    admin.recreate_database(&connection.database).await.context("Failed to recreate the target database")?;
    admin.close().await;

    let database = Database::connect(connection.connect_options(&connection.database))
        .await
        .context("Failed to connect to the target database")?;

    println!("📋 Creating tables in {}...", database.name());
    database.reset_schema().await.context("Failed to create tables")?;
    database.close().await;

    println!("✅ Database schema created successfully!");
    tracing::info!("Setup of {} complete", connection.database);
    Ok(())
}

/// Run the full extract-transform-load sequence
async fn load(connection: &ConnectionArgs, args: &LoadArgs) -> Result<()> {
    println!("💾 Connecting to database {}...", connection.database);
    let database = Database::connect(connection.connect_options(&connection.database))
        .await
        .context("Failed to connect to PostgreSQL database")?;

    database.test_connection().await.context("Database connection test failed")?;

    let config = PipelineConfig {
        song_root: args.song_data.clone(),
        log_root: args.log_data.clone(),
        skip_invalid_files: args.skip_invalid_files,
    };
    let warehouse = PgWarehouse::new(database.pool().clone(), &schema::STATEMENTS);
    let mut pipeline = Pipeline::new(warehouse, config);

    if args.reset_schema {
        println!("📋 Recreating tables...");
        database.reset_schema().await.context("Failed to recreate tables")?;
    } else {
        database.verify_schema().await.context("Schema check failed")?;
    }
    pipeline.schema_ready()?;

    let result = pipeline.run().await;
    database.close().await;

    let _stats = result.context("Pipeline execution failed")?;

    println!("\n✨ Pipeline execution complete!");
    Ok(())
}
