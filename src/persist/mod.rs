//! Persistence Module
//!
//! Crash-consistent on-disk copy of the aggregation state.
//!
//! ## Layout
//! ```text
//! {data_dir}/
//!   ├── sources/<source-uuid>.weather   (full history of one source)
//!   └── stations.weather                (full station projection)
//! ```
//!
//! ## Write Model
//! Whole-record overwrite: each write replaces the file with a complete
//! record via temp-file-then-rename, so a crash leaves either the old or the
//! new copy, never a torn one.

mod format;
mod manager;

pub use format::{
    decode_history, decode_projection, decode_record, encode_history, encode_projection,
    encode_record, RecordKind, HEADER_SIZE, MAGIC, VERSION,
};
pub use manager::{LoadedState, PersistenceManager};
