mod schema;
mod sqlite_page_repository;
mod sqlite_repository;
mod sqlite_snapshot_repository;

pub use schema::initialize_database;
pub use sqlite_repository::SqliteRepository;
