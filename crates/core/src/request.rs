//! Transport-level request parameters and the builder that turns them into a
//! [Search].

use crate::{
    Bbox, Error, Fields, Filter, FilterLang, Interval, Query, Result, Search, Sortby, SortbyInput,
    sort,
};
use geojson::Geometry;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The default number of features per page.
pub const DEFAULT_LIMIT: u64 = 10;

/// The default per-query maximum number of features.
pub const DEFAULT_MAX_LIMIT: u64 = 10_000;

/// Page size limits applied by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Used when the caller does not ask for a limit.
    pub default: u64,

    /// Requests above this are rejected.
    pub max: u64,
}

/// GET parameters for the items endpoint.
///
/// Everything is a string, as it arrives in the query string.
#[derive(Clone, Default, Debug, Serialize, Deserialize)]
pub struct GetItems {
    /// Comma-delimited bounding box.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<String>,

    /// Datetime or datetime interval.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,

    /// Comma-delimited item ids.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<String>,

    /// CQL2 filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Language of `filter`, defaults to `cql2-text`.
    #[serde(rename = "filter-lang", skip_serializing_if = "Option::is_none")]
    pub filter_lang: Option<String>,

    /// JSON `query` object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    /// Comma-delimited sort fields, each optionally prefixed by `+` or `-`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sortby: Option<String>,

    /// Comma-delimited property names.
    ///
    /// `Some("")` is different from `None`: it asks for no properties.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<String>,

    /// The page size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,

    /// The pagination cursor.
    #[serde(alias = "token", skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,

    /// Output format override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f: Option<String>,
}

/// GET parameters for the search endpoint.
#[derive(Clone, Default, Debug, Serialize, Deserialize)]
pub struct GetSearch {
    /// Most fields are shared with [GetItems].
    #[serde(flatten)]
    pub items: GetItems,

    /// Comma-delimited collection ids.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collections: Option<String>,

    /// GeoJSON geometry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intersects: Option<String>,
}

/// The JSON body of a POST search.
///
/// Unknown keys are ignored.
#[derive(Clone, Default, Debug, Deserialize)]
pub struct SearchBody {
    /// Collection ids.
    #[serde(default)]
    pub collections: Option<Vec<String>>,

    /// Item ids.
    #[serde(default)]
    pub ids: Option<Vec<String>>,

    /// Bounding box values.
    #[serde(default)]
    pub bbox: Option<Vec<f64>>,

    /// GeoJSON geometry.
    #[serde(default)]
    pub intersects: Option<Geometry>,

    /// Datetime or datetime interval.
    #[serde(default)]
    pub datetime: Option<String>,

    /// Property comparisons.
    #[serde(default)]
    pub query: Option<Value>,

    /// CQL2 filter, as text or JSON.
    #[serde(default)]
    pub filter: Option<Value>,

    /// Language of `filter`.
    #[serde(default, rename = "filter-lang")]
    pub filter_lang: Option<String>,

    /// Sort instructions.
    #[serde(default)]
    pub sortby: Option<SortbyInput>,

    /// Field projection.
    #[serde(default)]
    pub fields: Option<Fields>,

    /// The page size.
    #[serde(default)]
    pub limit: Option<u64>,

    /// The pagination cursor.
    #[serde(default)]
    pub token: Option<String>,
}

/// Builds a validated [Search] from request inputs.
///
/// Inputs are merged in three tiers: defaults (set by [SearchBuilder::new]),
/// then simple parameters, then structured ones. A later setter for the same
/// key replaces an earlier one. The builder performs no I/O.
///
/// # Examples
///
/// ```
/// use pgfeatures::{Limits, SearchBuilder};
///
/// let limits = Limits { default: 10, max: 100 };
/// let search = SearchBuilder::new(limits).limit(20).build().unwrap();
/// assert_eq!(search.limit, Some(20));
///
/// SearchBuilder::new(limits).limit(101).build().unwrap_err();
/// ```
#[derive(Debug, Clone)]
pub struct SearchBuilder {
    limits: Limits,
    search: Search,
    filter: Option<Filter>,
}

impl SearchBuilder {
    /// Creates a new builder with the default limit applied.
    pub fn new(limits: Limits) -> SearchBuilder {
        SearchBuilder {
            limits,
            search: Search::new().limit(limits.default),
            filter: None,
        }
    }

    /// Sets the collections.
    pub fn collections(mut self, collections: Vec<String>) -> SearchBuilder {
        self.search = self.search.collections(collections);
        self
    }

    /// Sets the item ids.
    pub fn ids(mut self, ids: Vec<String>) -> SearchBuilder {
        self.search.ids = ids;
        self
    }

    /// Sets the bbox.
    pub fn bbox(mut self, bbox: Bbox) -> SearchBuilder {
        self.search.bbox = Some(bbox);
        self
    }

    /// Sets the intersects geometry.
    pub fn intersects(mut self, intersects: Geometry) -> SearchBuilder {
        self.search.intersects = Some(intersects);
        self
    }

    /// Sets the datetime interval.
    pub fn datetime(mut self, datetime: Interval) -> SearchBuilder {
        self.search.datetime = Some(datetime);
        self
    }

    /// Sets the property comparisons.
    pub fn query(mut self, query: Query) -> SearchBuilder {
        self.search.query = (!query.is_empty()).then_some(query);
        self
    }

    /// Sets the page size.
    pub fn limit(mut self, limit: u64) -> SearchBuilder {
        self.search.limit = Some(limit);
        self
    }

    /// Sets the pagination cursor.
    pub fn token(mut self, token: String) -> SearchBuilder {
        self.search.token = (!token.is_empty()).then_some(token);
        self
    }

    /// Sets the filter.
    pub fn filter(mut self, filter: Filter) -> SearchBuilder {
        self.filter = Some(filter);
        self
    }

    /// Sets the sort instructions.
    pub fn sortby(mut self, sortby: Vec<Sortby>) -> SearchBuilder {
        self.search.sortby = sortby;
        self
    }

    /// Sets the field projection.
    pub fn fields(mut self, fields: Fields) -> SearchBuilder {
        self.search.fields = (!fields.is_empty()).then_some(fields);
        self
    }

    /// Validates and returns the search.
    pub fn build(self) -> Result<Search> {
        let limit = self.search.limit.unwrap_or(self.limits.default);
        if limit == 0 || limit > self.limits.max {
            return Err(Error::InvalidLimit {
                limit,
                max: self.limits.max,
            });
        }
        let search = match self.filter {
            Some(filter) => self.search.filter(filter)?,
            None => self.search,
        };
        let search = search.limit(limit).valid()?;
        tracing::debug!(?search, "built search");
        Ok(search)
    }
}

impl GetItems {
    /// Builds the search for the items of one collection.
    ///
    /// The collection id always replaces any caller-supplied collections.
    ///
    /// # Examples
    ///
    /// ```
    /// use pgfeatures::{GetItems, Limits};
    ///
    /// let get_items = GetItems {
    ///     bbox: Some("-180,-90,180,90".to_string()),
    ///     ..Default::default()
    /// };
    /// let search = get_items
    ///     .into_search("a-collection", Limits { default: 10, max: 100 })
    ///     .unwrap();
    /// assert_eq!(search.collections, vec!["a-collection"]);
    /// assert_eq!(search.limit, Some(10));
    /// ```
    pub fn into_search(self, collection_id: &str, limits: Limits) -> Result<Search> {
        self.into_builder(limits)?
            .collections(vec![collection_id.to_string()])
            .build()
    }

    fn into_builder(self, limits: Limits) -> Result<SearchBuilder> {
        let mut builder = SearchBuilder::new(limits);
        if let Some(bbox) = non_empty(self.bbox) {
            builder = builder.bbox(bbox.parse()?);
        }
        if let Some(datetime) = non_empty(self.datetime) {
            builder = builder.datetime(datetime.parse()?);
        }
        if let Some(ids) = non_empty(self.ids) {
            builder = builder.ids(split(&ids));
        }
        if let Some(limit) = non_empty(self.limit) {
            builder = builder.limit(limit.trim().parse()?);
        }
        if let Some(token) = self.offset {
            builder = builder.token(token);
        }
        if let Some(query) = non_empty(self.query) {
            builder = builder.query(query.parse()?);
        }
        if let Some(filter) = non_empty(self.filter) {
            let lang = non_empty(self.filter_lang)
                .map(|lang| lang.parse::<FilterLang>())
                .transpose()?;
            builder = builder.filter(Filter::from_str_and_lang(&filter, lang)?);
        }
        if let Some(sortby) = non_empty(self.sortby) {
            builder = builder.sortby(sort::parse_list(&sortby)?);
        }
        if let Some(properties) = self.properties {
            builder = builder.fields(Fields::from_properties(properties.split(',')));
        }
        Ok(builder)
    }
}

impl GetSearch {
    /// Builds the search for the catalog-wide search endpoint.
    pub fn into_search(self, limits: Limits) -> Result<Search> {
        let mut builder = self.items.into_builder(limits)?;
        if let Some(collections) = non_empty(self.collections) {
            builder = builder.collections(split(&collections));
        }
        if let Some(intersects) = non_empty(self.intersects) {
            builder = builder.intersects(serde_json::from_str(&intersects)?);
        }
        builder.build()
    }
}

impl SearchBody {
    /// Builds the search for a POST search body.
    ///
    /// # Examples
    ///
    /// ```
    /// use pgfeatures::{Limits, SearchBody};
    /// use serde_json::json;
    ///
    /// let body: SearchBody = serde_json::from_value(json!({
    ///     "collections": ["a-collection"],
    ///     "sortby": "-datetime",
    ///     "filter": "name = 'X'",
    /// })).unwrap();
    /// let search = body.into_search(Limits { default: 10, max: 100 }).unwrap();
    /// assert_eq!(search.sortby[0].field, "datetime");
    /// assert!(search.filter.is_some());
    /// ```
    pub fn into_search(self, limits: Limits) -> Result<Search> {
        let mut builder = SearchBuilder::new(limits);
        if let Some(collections) = self.collections {
            builder = builder.collections(collections);
        }
        if let Some(ids) = self.ids {
            builder = builder.ids(ids);
        }
        if let Some(bbox) = self.bbox {
            builder = builder.bbox(bbox.try_into()?);
        }
        if let Some(intersects) = self.intersects {
            builder = builder.intersects(intersects);
        }
        if let Some(datetime) = non_empty(self.datetime) {
            builder = builder.datetime(datetime.parse()?);
        }
        if let Some(limit) = self.limit {
            builder = builder.limit(limit);
        }
        if let Some(token) = self.token {
            builder = builder.token(token);
        }
        if let Some(query) = self.query {
            builder = builder.query(Query::from_value(query)?);
        }
        if let Some(filter) = self.filter {
            let lang = non_empty(self.filter_lang)
                .map(|lang| lang.parse::<FilterLang>())
                .transpose()?;
            builder = builder.filter(Filter::from_value_and_lang(filter, lang)?);
        }
        if let Some(sortby) = self.sortby {
            builder = builder.sortby(sortby.into_list()?);
        }
        if let Some(fields) = self.fields {
            builder = builder.fields(fields);
        }
        builder.build()
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

fn split(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
