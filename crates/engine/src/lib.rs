//! Ranking, search, and the upload/read/delete paths of the ibed media store.
//!
//! [`MediaService`] is the entry point for callers. [`RankingEngine`] and
//! [`SearchEngine`] are usable on their own, and [`spawn_refresh_task`]
//! runs the periodic ranking snapshot.

pub mod error;
pub mod metrics;
pub mod ranking;
pub mod refresh;
pub mod search;
pub mod service;

pub use error::{EngineError, EngineResult, ErrorKind};
pub use ranking::{RankingEngine, RankingSnapshot};
pub use refresh::spawn_refresh_task;
pub use search::{DEFAULT_SEARCH_LIMIT, SearchEngine, normalize_limit};
pub use service::{MediaService, OpenedImage, UploadOutcome, UploadRequest};
