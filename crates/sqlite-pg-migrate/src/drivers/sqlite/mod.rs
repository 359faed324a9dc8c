//! SQLite driver (source side).

mod reader;

pub use reader::SqliteReader;
