use thiserror::Error;

/// Error enum for crate-specific errors.
///
/// Every variant describes a problem with caller input, detected before any
/// backend is contacted.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// [cql2::Error]
    #[error(transparent)]
    Cql2(#[from] Box<cql2::Error>),

    /// The datetime interval has no closed endpoint, e.g. `../..`.
    #[error("empty datetime interval")]
    EmptyDatetimeInterval,

    /// This vector is not a valid bounding box.
    #[error("invalid bbox ({bbox:?}): {reason}")]
    InvalidBbox {
        /// The offending values.
        bbox: Vec<f64>,

        /// Why the values were rejected.
        reason: &'static str,
    },

    /// This string is not a valid datetime or datetime interval.
    #[error("invalid datetime: {0}")]
    InvalidDatetime(String),

    /// Unsupported `filter-lang` value.
    #[error("invalid filter-lang: {0}")]
    InvalidFilterLang(String),

    /// The filter could not be read as CQL2.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// The requested limit is zero or larger than the configured maximum.
    #[error("limit must be between 1 and {max}, got {limit}")]
    InvalidLimit {
        /// The requested limit.
        limit: u64,

        /// The configured per-query ceiling.
        max: u64,
    },

    /// The `query` parameter is malformed.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A sortby value could not be parsed.
    #[error("invalid sortby: {0}")]
    InvalidSortby(String),

    /// [std::num::ParseFloatError]
    #[error(transparent)]
    ParseFloat(#[from] std::num::ParseFloatError),

    /// [std::num::ParseIntError]
    #[error(transparent)]
    ParseInt(#[from] std::num::ParseIntError),

    /// A search has both bbox and intersects.
    #[error("search has bbox and intersects")]
    SearchHasBboxAndIntersects,

    /// [serde_json::Error]
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    /// The start of a datetime interval is after its end.
    #[error("interval start ({0}) is after end ({1})")]
    StartIsAfterEnd(String, String),
}

impl From<cql2::Error> for Error {
    fn from(error: cql2::Error) -> Self {
        Error::Cql2(Box::new(error))
    }
}
