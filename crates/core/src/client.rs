use crate::{CollectionDescriptor, Envelope, Item, Search};
use std::future::Future;

/// A client that can search for features.
///
/// [SearchClient::search] is the only required method. [SearchClient::item]
/// has a default implementation that delegates to `search`.
pub trait SearchClient: Send + Sync {
    /// The error type for this client.
    type Error: Send;

    /// Executes one search and returns one page of results.
    fn search(&self, search: Search) -> impl Future<Output = Result<Envelope, Self::Error>> + Send;

    /// Returns a single feature from a collection.
    ///
    /// The default implementation uses [SearchClient::search] with `ids` and
    /// `collections` filters.
    fn item(
        &self,
        collection_id: &str,
        item_id: &str,
    ) -> impl Future<Output = Result<Option<Item>, Self::Error>> + Send {
        async move {
            let search = Search::new()
                .ids(vec![item_id.to_string()])
                .collections(vec![collection_id.to_string()])
                .limit(1);
            let envelope = self.search(search).await?;
            Ok(envelope.features.into_iter().next())
        }
    }
}

/// A client that can look up collections.
pub trait CollectionClient: Send + Sync {
    /// The error type for this client.
    type Error: Send;

    /// Returns a collection's descriptor, or `None` if it does not exist.
    fn collection(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<CollectionDescriptor>, Self::Error>> + Send;
}
