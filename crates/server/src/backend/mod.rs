mod memory;
#[cfg(feature = "pgstac")]
mod pgstac;

use crate::Error;
pub use memory::MemoryBackend;
#[cfg(feature = "pgstac")]
pub use self::pgstac::{PgstacBackend, PoolConfig};
use pgfeatures::{CollectionClient, SearchClient};

/// Storage backend for a features API.
///
/// This trait combines [`SearchClient`] and [`CollectionClient`], with the
/// server's error type, so one value can answer every route.
pub trait Backend:
    SearchClient<Error = Error> + CollectionClient<Error = Error> + Clone + Sync + Send + 'static
{
    /// Returns a short name for this backend, used in logs.
    ///
    /// # Examples
    ///
    /// ```
    /// use pgfeatures_server::{MemoryBackend, Backend};
    ///
    /// assert_eq!(MemoryBackend::new().name(), "memory");
    /// ```
    fn name(&self) -> &'static str;
}
