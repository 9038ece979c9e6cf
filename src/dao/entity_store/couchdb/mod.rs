mod config;
mod error;
mod models;
mod store;

pub use config::CouchConfig;
pub use error::CouchDaoError;
pub use store::CouchEntityStore;

use crate::dao::storage::StorageError;

impl From<CouchDaoError> for StorageError {
    fn from(err: CouchDaoError) -> Self {
        match err {
            CouchDaoError::Missing { collection, id } => StorageError::missing(collection, id),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
