//! Serve an OGC Features and STAC item search API over pgstac, or over
//! features held in memory.
//!
//! # Examples
//!
//! ```no_run
//! use pgfeatures_server::{Api, MemoryBackend};
//! use tokio::net::TcpListener;
//!
//! # tokio_test::block_on(async {
//! let api = Api::new(MemoryBackend::new(), "http://localhost:8081").unwrap();
//! let router = pgfeatures_server::routes::from_api(api);
//! let listener = TcpListener::bind("127.0.0.1:8081").await.unwrap();
//! axum::serve(listener, router).await.unwrap();
//! # })
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![deny(
    missing_debug_implementations,
    missing_docs,
    unsafe_code,
    unused_crate_dependencies,
    unused_extern_crates,
    unused_import_braces
)]

mod api;
mod backend;
mod cache;
mod config;
mod error;
mod executor;
mod format;
pub mod links;
pub mod render;
pub mod routes;

pub use api::Api;
#[cfg(feature = "pgstac")]
pub use backend::{PgstacBackend, PoolConfig};
pub use backend::{Backend, MemoryBackend};
pub use cache::{CollectionCache, CollectionKey};
pub use config::{Config, DEFAULT_CACHE_CONTROL, DEFAULT_CACHE_TTL};
pub use error::Error;
pub use executor::execute;
pub use format::OutputFormat;
pub use links::{Link, UrlBuilder};

/// Crate-specific result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
use {rstest as _, tokio_test as _};
