// Infrastructure modules
pub mod database;          // Fact store interface, transaction wrapper, store lifecycle
pub mod postgres_database; // PostgreSQL fact store
pub mod sqlite_database;   // SQLite fact store

pub use database::{
    open_store, FactStore, ProjectionUpdate, StoreHandle, StoreTransaction, UserDirectory,
};
pub use postgres_database::PostgresFactStore;
pub use sqlite_database::SqliteFactStore;
