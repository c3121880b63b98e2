// Database module
// SQLite storage for embedding records, shared by every collection

pub mod sqlite;

pub use sqlite::*;
