pub mod clock;
pub mod error;
pub mod models;
pub mod storage;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, ProviderError, SearchError};
pub use models::ClassificationProvider;
pub use storage::{ArticleStorage, Persistence, SearchHistory, UsageStorage};
pub use types::*;

pub type Result<T> = std::result::Result<T, Error>;
