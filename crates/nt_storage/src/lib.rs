use nt_core::{Error, Persistence, Result};
use std::path::Path;
use std::sync::Arc;

pub mod backends;
pub mod cache;

pub use backends::*;
pub use cache::TtlCache;

/// Opens the named persistence backend.
pub async fn create_storage(kind: &str, database: Option<&Path>) -> Result<Arc<dyn Persistence>> {
    match kind.trim().to_ascii_lowercase().as_str() {
        "memory" => Ok(Arc::new(MemoryStorage::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let path = database.unwrap_or_else(|| Path::new("nt.db"));
            Ok(Arc::new(SQLiteStorage::new_with_path(path).await?))
        }
        other => {
            let _ = database;
            Err(Error::Config(format!("unsupported storage backend: {}", other)))
        }
    }
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::cache::TtlCache;
    pub use super::create_storage;
}
