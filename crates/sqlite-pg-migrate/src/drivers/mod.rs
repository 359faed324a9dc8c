//! Database driver implementations.
//!
//! - [`sqlite`]: source reader over a SQLite file (SQLx)
//! - [`postgres`]: destination writer (tokio-postgres + deadpool)
//! - [`common`]: shared utilities (TLS)

pub mod common;
pub mod postgres;
pub mod sqlite;

pub use common::SslMode;
pub use postgres::PostgresWriter;
pub use sqlite::SqliteReader;
