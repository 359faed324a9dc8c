//! PostgreSQL driver (destination side).

mod writer;

pub use writer::{build_fetch_sql, build_insert_sql, PostgresWriter};
