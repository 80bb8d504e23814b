use crate::{
    Backend, CollectionCache, CollectionKey, Config, Error, Link, OutputFormat, Result,
    UrlBuilder,
    executor::execute,
    links::Pagination,
    render::{self, GeometryEncoding, Listing, Rendered},
};
use pgfeatures::{CollectionDescriptor, GetItems, GetSearch, SearchBody};
use serde_json::{Map, Value};

/// A features API.
///
/// Every operation runs the same pipeline: parse the transport inputs, build
/// a validated search, execute it once against the backend, then render the
/// envelope in the negotiated format.
#[derive(Clone, Debug)]
pub struct Api<B: Backend> {
    /// The backend storage for this API.
    pub backend: B,

    /// The settings for this API.
    pub config: Config,

    /// Builds this API's urls.
    pub url_builder: UrlBuilder,

    cache: CollectionCache,
}

impl<B: Backend> Api<B> {
    /// Creates a new API with the given backend and default settings.
    ///
    /// # Examples
    ///
    /// ```
    /// use pgfeatures_server::{Api, MemoryBackend};
    ///
    /// let api = Api::new(MemoryBackend::new(), "http://pgfeatures.test").unwrap();
    /// ```
    pub fn new(backend: B, root: &str) -> Result<Api<B>> {
        let config = Config::default();
        Ok(Api {
            backend,
            url_builder: UrlBuilder::new(root)?,
            cache: CollectionCache::new(config.cache_ttl()),
            config,
        })
    }

    /// Sets the settings, resetting the collection cache.
    ///
    /// # Examples
    ///
    /// ```
    /// use pgfeatures_server::{Api, Config, MemoryBackend};
    ///
    /// let config = Config { max_limit: 100, ..Default::default() };
    /// let api = Api::new(MemoryBackend::new(), "http://pgfeatures.test")
    ///     .unwrap()
    ///     .with_config(config);
    /// assert_eq!(api.config.max_limit, 100);
    /// ```
    pub fn with_config(mut self, config: Config) -> Api<B> {
        self.cache = CollectionCache::new(config.cache_ttl());
        self.config = config;
        self
    }

    /// Returns a collection's descriptor.
    pub async fn collection(&self, id: &str) -> Result<CollectionDescriptor> {
        let key = CollectionKey { id: id.to_string() };
        self.cache
            .get_or_fetch(key, || self.backend.collection(id))
            .await?
            .ok_or_else(|| Error::NotFound(format!("Collection '{id}' not found.")))
    }

    /// Returns one page of a collection's items.
    ///
    /// `query` is the raw query string, which the pagination links reuse.
    /// The collection is looked up first, so an unknown collection is a 404
    /// even when the query is also invalid.
    pub async fn items(
        &self,
        collection_id: &str,
        query: Option<&str>,
        accept: Option<&str>,
    ) -> Result<Rendered> {
        let collection = self.collection(collection_id).await?;
        let get_items: GetItems = serde_urlencoded::from_str(query.unwrap_or_default())?;
        let format = OutputFormat::negotiate(get_items.f.as_deref(), accept)?;
        let search = get_items.into_search(collection_id, self.config.limits())?;
        let envelope = execute(&self.backend, search).await?;
        let url = self.url_builder.items(collection_id);
        let mut links = vec![
            Link::new(self.url_builder.collection(collection_id), "collection")
                .r#type(mime::APPLICATION_JSON)
                .title(collection.title()),
        ];
        links.extend(Pagination::Get { url: &url, query }.links(&envelope, format.content_type()));
        Listing {
            envelope,
            links,
            metadata: render::items_metadata(&collection),
            url_builder: &self.url_builder,
            geometry: GeometryEncoding::GeoJson,
        }
        .render(format)
    }

    /// Returns a single item.
    pub async fn item(
        &self,
        collection_id: &str,
        item_id: &str,
        query: Option<&str>,
        accept: Option<&str>,
    ) -> Result<Rendered> {
        // An unknown collection is a 404 before the query is looked at.
        self.collection(collection_id).await?;
        let get_items: GetItems = serde_urlencoded::from_str(query.unwrap_or_default())?;
        let format = OutputFormat::negotiate(get_items.f.as_deref(), accept)?;
        let item = self
            .backend
            .item(collection_id, item_id)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "Item {item_id} in Collection {collection_id} does not exist."
                ))
            })?;
        render::item(item, &self.url_builder, format)
    }

    /// Searches with GET query parameters.
    pub async fn search_get(&self, query: Option<&str>, accept: Option<&str>) -> Result<Rendered> {
        let get_search: GetSearch = serde_urlencoded::from_str(query.unwrap_or_default())?;
        let format = OutputFormat::negotiate(get_search.items.f.as_deref(), accept)?;
        let search = get_search.into_search(self.config.limits())?;
        let envelope = execute(&self.backend, search).await?;
        let url = self.url_builder.search();
        let links = Pagination::Get { url: &url, query }.links(&envelope, format.content_type());
        Listing {
            envelope,
            links,
            metadata: render::search_metadata(&self.config.title),
            url_builder: &self.url_builder,
            geometry: GeometryEncoding::Wkt,
        }
        .render(format)
    }

    /// Searches with a POST body.
    ///
    /// An empty body is an empty search. The format still comes from the
    /// query string and the `Accept` header.
    pub async fn search_post(
        &self,
        body: &[u8],
        query: Option<&str>,
        accept: Option<&str>,
    ) -> Result<Rendered> {
        let get_items: GetItems = serde_urlencoded::from_str(query.unwrap_or_default())?;
        let format = OutputFormat::negotiate(get_items.f.as_deref(), accept)?;
        let body = if body.iter().all(u8::is_ascii_whitespace) {
            Value::Object(Map::new())
        } else {
            serde_json::from_slice(body).map_err(Error::RequestBody)?
        };
        let search_body: SearchBody =
            serde_json::from_value(body.clone()).map_err(Error::RequestBody)?;
        let search = search_body.into_search(self.config.limits())?;
        let envelope = execute(&self.backend, search).await?;
        let url = self.url_builder.search();
        let links = Pagination::Post {
            url: &url,
            body: &body,
        }
        .links(&envelope, format.content_type());
        Listing {
            envelope,
            links,
            metadata: render::search_metadata(&self.config.title),
            url_builder: &self.url_builder,
            geometry: GeometryEncoding::Wkt,
        }
        .render(format)
    }
}
