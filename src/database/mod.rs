/*!
 * Database module for persistent storage of the workflow.
 *
 * This module provides SQLite-based persistence for:
 * - Translation requests, with an optimistic version counter
 * - The append-only workflow event log
 * - Translation memory entries and glossary terms
 */

pub mod schema;
pub mod connection;
pub mod repository;

// Re-export main types
pub use connection::{DatabaseConnection, DatabaseStats};
pub use repository::Repository;
