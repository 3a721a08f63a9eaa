//! roundindex-core: event handlers and entity model for a Prop House indexer.
//!
//! # Architecture
//!
//! ```text
//! Indexer (checkpoint skip, stats)
//!    └── EventRouter (family + event → handler)
//!           ├── handlers::house         (houses, rounds created)
//!           ├── handlers::round         (registration, cancel, finalize)
//!           ├── handlers::ledger        (deposits, claims, rescues, receipts)
//!           └── handlers::creator_pass  (round creator permissions)
//!                  └── EntityStore (memory / SQLite)
//! ```

pub mod checkpoint;
pub mod entity;
pub mod error;
pub mod events;
pub mod handlers;
pub mod ids;
pub mod indexer;
pub mod router;
pub mod store;

pub use checkpoint::{Checkpoint, CheckpointManager, CheckpointStore, MemoryCheckpointStore};
pub use entity::{Entity, EntityKind};
pub use error::{DecodeError, HandlerError, IndexerError};
pub use events::{ContractFamily, EventPayload, LogEvent, LogMeta};
pub use indexer::{IndexStats, Indexer, IndexerConfig};
pub use router::{Dispatch, EventRouter};
pub use store::{EntityStore, EntityStoreExt, MemoryEntityStore};
