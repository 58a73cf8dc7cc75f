//! Database layer
//!
//! Persistence for HopeLine. Two backends are supported:
//! - SQLite (default, single-binary deployment)
//! - MySQL (hosted deployments)
//!
//! Repositories dispatch on `DatabasePool::driver()` and run the SQL for
//! the active backend.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
