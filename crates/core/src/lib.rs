//! Query translation for a pgstac-backed features API.
//!
//! This crate turns HTTP request inputs (GET query parameters or a POST
//! body) into one validated [Search], the canonical request a backend
//! executes. Backends answer with an [Envelope]: a page of features, a
//! matched count, and opaque next/prev cursors.
//!
//! # Examples
//!
//! ```
//! use pgfeatures::{GetItems, Limits};
//!
//! let get_items: GetItems = serde_json::from_value(serde_json::json!({
//!     "datetime": "2020-03-07T00:00:00Z/..",
//!     "sortby": "-datetime",
//! })).unwrap();
//! let search = get_items
//!     .into_search("noaa-emergency-response", Limits { default: 10, max: 10_000 })
//!     .unwrap();
//! assert_eq!(search.collections, vec!["noaa-emergency-response"]);
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

mod bbox;
mod client;
mod collection;
pub mod datetime;
mod envelope;
mod error;
mod fields;
mod filter;
mod query;
pub mod request;
mod search;
pub mod sort;

pub use bbox::Bbox;
pub use client::{CollectionClient, SearchClient};
pub use collection::CollectionDescriptor;
pub use datetime::Interval;
pub use envelope::{Envelope, Item};
pub use error::Error;
pub use fields::Fields;
pub use filter::{Filter, FilterLang};
pub use query::{Operator, Query};
pub use request::{
    DEFAULT_LIMIT, DEFAULT_MAX_LIMIT, GetItems, GetSearch, Limits, SearchBody, SearchBuilder,
};
pub use search::Search;
pub use sort::{Direction, Sortby, SortbyInput};

/// Crate-specific result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
use {rstest as _, serde_urlencoded as _};
