//! # Database Operations
//!
//! Connection pooling and schema migrations for the Postgres-backed stores.
//!
//! ```rust,no_run
//! use casework_core::config::DatabaseConfig;
//! use casework_core::database::{DatabaseConnection, DatabaseMigrations};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = DatabaseConnection::connect(&DatabaseConfig::default()).await?;
//! DatabaseMigrations::run_all(db.pool()).await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod migrations;

pub use connection::DatabaseConnection;
pub use migrations::{DatabaseMigrations, MIGRATOR};
