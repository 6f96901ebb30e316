//! Service layer
//!
//! The cached loader and the refresh pipeline.

pub mod loader;
pub mod refresh;

pub use loader::{
    CachedLoader, CursorSource, LoaderState, RecordDecoder, ResultList, ResultObserver, RowCursor,
};
pub use refresh::{DEFAULT_BATCH_SIZE, RefreshPipeline, Trigger};
