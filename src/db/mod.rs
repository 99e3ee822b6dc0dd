/// Database Module
///
/// This module handles all PostgreSQL database operations including:
/// - Connection management (a single connection per run)
/// - Recreating the target database
/// - Dropping, creating and checking the star schema tables
pub mod schema;

use crate::error::EtlError;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};

pub struct Database {
    pool: PgPool,
    name: String,
}

impl Database {
    /// Open the single connection used for the lifetime of the run
    pub async fn connect(options: PgConnectOptions) -> Result<Self, EtlError> {
        let name = options.get_database().unwrap_or_default().to_string();

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|source| EtlError::Connection { database: name.clone(), source })?;

        tracing::debug!("Connected to database {}", name);
        Ok(Self { pool, name })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Test the database connection
    pub async fn test_connection(&self) -> Result<(), EtlError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|source| EtlError::Connection { database: self.name.clone(), source })?;

        Ok(())
    }

    /// Drop `target` if it exists and create it again, empty.
    ///
    /// Must be called on a connection to a different (administrative) database.
    pub async fn recreate_database(&self, target: &str) -> Result<(), EtlError> {
        if target == self.name {
            return Err(EtlError::Config(format!("cannot recreate '{}' while connected to it", target)));
        }

        for statement in [schema::drop_database(target), schema::create_database(target)] {
            self.execute_ddl(&statement).await?;
        }

        tracing::info!("Recreated database {}", target);
        Ok(())
    }

    /// Drop every table, then create every table
    pub async fn reset_schema(&self) -> Result<(), EtlError> {
        for statement in schema::drop_statements() {
            self.execute_ddl(statement).await?;
        }

        for statement in schema::create_statements() {
            self.execute_ddl(statement).await?;
        }

        tracing::info!("Created {} tables in {}", schema::TABLES.len(), self.name);
        Ok(())
    }

    /// Fail with a schema error unless all tables exist
    pub async fn verify_schema(&self) -> Result<(), EtlError> {
        for table in schema::TABLES.iter() {
            let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
                .bind(table.name)
                .fetch_one(&self.pool)
                .await
                .map_err(|source| EtlError::Database { context: "schema check", source })?;

            if !exists {
                return Err(EtlError::Schema {
                    statement: format!("table {}", table.name),
                    message: "table does not exist; run setup or pass --reset-schema".to_string(),
                });
            }
        }

        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    /// DDL runs over the simple query protocol; `CREATE DATABASE` refuses to
    /// run inside the implicit transaction of a prepared statement
    async fn execute_ddl(&self, statement: &str) -> Result<(), EtlError> {
        tracing::debug!("Executing: {}", statement.trim());

        sqlx::raw_sql(statement)
            .execute(&self.pool)
            .await
            .map_err(|err| EtlError::Schema { statement: statement.trim().to_string(), message: err.to_string() })?;

        Ok(())
    }
}
