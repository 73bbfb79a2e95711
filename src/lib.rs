//! nanodlp-adapter - Caching front end for the NanoDLP printer HTTP API
//!
//! NanoDLP devices answer slowly, reuse plate IDs, and occasionally hang.
//! This crate sits between a UI and the device: it bounds every request by
//! a timeout, caches the plate list and preview thumbnails with
//! single-flight fetching, resolves plate IDs in the background, and
//! retries the status poll once before giving up.
//!
//! # Example
//!
//! ```rust,no_run
//! use nanodlp_adapter::{NanoDlpAdapter, ThumbnailSize};
//!
//! #[tokio::main]
//! async fn main() -> nanodlp_adapter::Result<()> {
//!     let adapter = NanoDlpAdapter::builder("http://192.168.1.50").build()?;
//!
//!     let status = adapter.get_status().await?;
//!     println!("status: {}", status["status"]);
//!
//!     let png = adapter
//!         .get_file_thumbnail("cube.sl1", ThumbnailSize::Large)
//!         .await;
//!     println!("thumbnail: {} bytes", png.len());
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod cache;
pub mod config;
pub mod error;
pub mod imaging;
pub mod resolver;
pub mod retry;
pub mod status;
pub mod telemetry;
pub mod transport;
pub mod types;

// Re-export main types at crate root
pub use adapter::{DirectoryListing, NanoDlpAdapter, NanoDlpAdapterBuilder, ZDirection};
pub use cache::{
    CacheEntry, Fetched, PlateList, PlateListCache, SingleFlightCache, ThumbnailCache,
    ThumbnailSize, TtlPolicy,
};
pub use config::{AdapterConfig, CacheSettings, StatusSettings};
pub use error::{AdapterError, Result};
pub use imaging::{DefaultImageHelper, ImageHelper};
pub use resolver::PlateResolver;
pub use retry::RetryConfig;
pub use status::{
    CanonicalState, JobStatus, NanoDlpStateMachine, StateCanonicalizer, StatusMap, StatusPoller,
};
pub use transport::{Method, Request, ReqwestTransport, Response, TimeoutTransport, Transport};
pub use types::{PlateRecord, StatusSnapshot};

/// Crate version, for the CLI.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
