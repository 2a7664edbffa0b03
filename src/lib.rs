pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::storage::{connector_from_uri, FileStore, MemoryStore};
#[cfg(feature = "libsql-store")]
pub use adapters::storage::LibsqlStore;
#[cfg(feature = "mongodb-store")]
pub use adapters::storage::MongoStore;
pub use config::TomlConfig;
pub use core::{etl::EtlEngine, pipeline::RefreshPipeline};
pub use domain::model::{CollectionRef, RefreshResult, RefreshStatus};
pub use utils::error::{EtlError, Result};
