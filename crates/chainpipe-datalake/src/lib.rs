//! chainpipe-datalake — raw-data blob storage for indexers.
//!
//! Indexers often want to keep the raw bytes they fetched (RPC responses,
//! block blobs) beside the structured index, both for replays and for
//! audits. A [`DataLake`] namespaces resources under `network/chain` and
//! writes them through a pluggable [`Storage`] backend.
//!
//! ```no_run
//! # async fn example() -> Result<(), chainpipe_datalake::DataLakeError> {
//! use chainpipe_datalake::{DataLake, FileStorage, Resource};
//!
//! let storage = FileStorage::new("/var/lib/indexer/lake").await?;
//! let lake = DataLake::new("mainnet", "ethereum", Box::new(storage));
//!
//! let res = Resource::json(&serde_json::json!({ "number": 19_000_000 }))?;
//! lake.store_resource_at_height(&res, "block", 19_000_000).await?;
//! # Ok(())
//! # }
//! ```

pub mod data_lake;
pub mod error;
pub mod resource;
pub mod storage;

pub use data_lake::DataLake;
pub use error::DataLakeError;
pub use resource::Resource;
pub use storage::{FileStorage, MemoryStorage, Storage};
