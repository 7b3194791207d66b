mod backend;
mod postgres;
mod query;
mod sqlite;

pub use backend::{SqlDialect, TodoStore};
pub use postgres::PostgresBackend;
pub use query::{item_update, list_update, SqlValue, UpdateBuilder, UpdateStatement, UpdateTarget};
pub use sqlite::SqliteBackend;
