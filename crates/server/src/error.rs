use http::StatusCode;
use thiserror::Error;

/// Crate-specific error enum.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A bb8 pool error.
    #[cfg(feature = "pgstac")]
    #[error(transparent)]
    Bb8TokioPostgresRun(#[from] bb8::RunError<tokio_postgres::Error>),

    /// [csv::Error]
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// The backend could not resolve a pagination cursor.
    #[error("invalid pagination token: {0}")]
    CursorNotFound(String),

    /// [geojson::Error]
    #[error(transparent)]
    Geojson(#[from] Box<geojson::Error>),

    /// [std::io::Error]
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The in-memory backend rejected some data.
    #[error("memory backend: {0}")]
    MemoryBackend(String),

    /// The in-memory backend's lock was poisoned.
    #[error("memory backend lock poisoned")]
    MemoryPoisoned,

    /// A collection, item, or other resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// [pgfeatures::Error], always a problem with the request.
    #[error(transparent)]
    Request(#[from] pgfeatures::Error),

    /// The request body could not be read.
    #[error("invalid request body: {0}")]
    RequestBody(serde_json::Error),

    /// [serde_json::Error]
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    /// [serde_urlencoded::de::Error]
    #[error(transparent)]
    SerdeUrlencodedDe(#[from] serde_urlencoded::de::Error),

    /// The requested output format is not supported.
    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    /// The backend rejected or failed the search.
    #[error("{message}")]
    Upstream {
        /// The backend's message.
        message: String,

        /// True when the backend itself is at fault, rather than the request.
        internal: bool,
    },

    /// [tokio_postgres::Error]
    #[cfg(feature = "pgstac")]
    #[error(transparent)]
    TokioPostgres(#[from] tokio_postgres::Error),

    /// [url::ParseError]
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Returns the HTTP status code for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use http::StatusCode;
    /// use pgfeatures_server::Error;
    ///
    /// let error = Error::NotFound("Collection 'x' not found.".to_string());
    /// assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    /// ```
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Request(_)
            | Error::RequestBody(_)
            | Error::SerdeUrlencodedDe(_)
            | Error::UnsupportedFormat(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::NotFound(_) | Error::CursorNotFound(_) => StatusCode::NOT_FOUND,
            Error::Upstream {
                internal: false, ..
            } => StatusCode::BAD_REQUEST,
            #[cfg(feature = "pgstac")]
            Error::Bb8TokioPostgresRun(bb8::RunError::TimedOut) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the message shown to callers.
    ///
    /// Internal faults get a generic message; their details are only
    /// logged.
    pub fn detail(&self) -> String {
        if self.status_code().is_server_error() {
            self.status_code()
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string()
        } else {
            self.to_string()
        }
    }
}

#[cfg(feature = "pgstac")]
impl Error {
    /// Classifies a pgstac error, given the cursor the search carried.
    pub(crate) fn from_pgstac(err: pgstac::Error, token: Option<&str>) -> Error {
        if let Some(token) = token.filter(|_| err.is_cursor_not_found()) {
            return Error::CursorNotFound(token.to_string());
        }
        let internal = err.is_internal();
        let message = err
            .db_message()
            .map(String::from)
            .unwrap_or_else(|| err.to_string());
        Error::Upstream { message, internal }
    }
}
