/*!
 * Database module for persistent storage of checkpoints.
 *
 * This module provides SQLite-based persistence for checkpoint records,
 * so an interrupted run can resume without retranslating finished documents.
 */

pub mod schema;
pub mod connection;
pub mod repository;
pub mod models;

// Re-export main types
pub use connection::DatabaseConnection;
pub use models::{CheckpointRecord, CHECKPOINT_VERSION};
pub use repository::Repository;
