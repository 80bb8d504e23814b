use crate::{Bbox, Error, Fields, Filter, FilterLang, Interval, Query, Result, Sortby};
use geojson::Geometry;
use serde::Serialize;
use serde_json::{Map, Value};

/// The canonical search request sent to a backend.
///
/// A search is built once per HTTP request (usually through a
/// [SearchBuilder](crate::SearchBuilder)) and is not changed afterwards.
/// Its JSON serialization is the request body of `pgstac.search`.
///
/// # Examples
///
/// ```
/// use pgfeatures::Search;
///
/// let search = Search::new()
///     .collections(vec!["a-collection".to_string()])
///     .limit(42)
///     .valid()
///     .unwrap();
/// let value = serde_json::to_value(search).unwrap();
/// assert_eq!(value["collections"][0], "a-collection");
/// assert_eq!(value["limit"], 42);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Search {
    /// Collection ids; empty searches every collection.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub collections: Vec<String>,

    /// Item ids.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,

    /// The bounding box.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Bbox>,

    /// The intersection geometry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intersects: Option<Geometry>,

    /// The datetime interval, forwarded as given.
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_interval")]
    pub datetime: Option<Interval>,

    /// Property comparisons.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<Query>,

    /// A CQL2 JSON filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Map<String, Value>>,

    /// The filter language, always `cql2-json` when a filter is set.
    #[serde(rename = "filter-lang", skip_serializing_if = "Option::is_none")]
    pub filter_lang: Option<FilterLang>,

    /// Sort instructions, in priority order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sortby: Vec<Sortby>,

    /// Field projection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Fields>,

    /// The page size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,

    /// The opaque pagination cursor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

fn serialize_interval<S: serde::Serializer>(
    interval: &Option<Interval>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match interval {
        Some(interval) => serializer.serialize_str(interval.as_str()),
        None => serializer.serialize_none(),
    }
}

impl Search {
    /// Creates a new, empty search.
    pub fn new() -> Search {
        Search::default()
    }

    /// Sets the collections of this search, dropping duplicates.
    pub fn collections(mut self, collections: Vec<String>) -> Search {
        let mut unique = Vec::with_capacity(collections.len());
        for collection in collections {
            if !unique.contains(&collection) {
                unique.push(collection);
            }
        }
        self.collections = unique;
        self
    }

    /// Sets the ids of this search.
    pub fn ids(mut self, ids: Vec<String>) -> Search {
        self.ids = ids;
        self
    }

    /// Sets the bbox of this search.
    pub fn bbox(mut self, bbox: Bbox) -> Search {
        self.bbox = Some(bbox);
        self
    }

    /// Sets the intersects geometry of this search.
    pub fn intersects(mut self, intersects: impl Into<Geometry>) -> Search {
        self.intersects = Some(intersects.into());
        self
    }

    /// Sets the datetime of this search.
    pub fn datetime(mut self, datetime: Interval) -> Search {
        self.datetime = Some(datetime);
        self
    }

    /// Sets the limit of this search.
    pub fn limit(mut self, limit: u64) -> Search {
        self.limit = Some(limit);
        self
    }

    /// Sets the sortby of this search.
    pub fn sortby(mut self, sortby: Vec<Sortby>) -> Search {
        self.sortby = sortby;
        self
    }

    /// Sets the fields of this search.
    pub fn fields(mut self, fields: Fields) -> Search {
        self.fields = Some(fields);
        self
    }

    /// Sets the pagination cursor of this search.
    pub fn token(mut self, token: impl ToString) -> Search {
        self.token = Some(token.to_string());
        self
    }

    /// Sets the filter, translating it to CQL2 JSON.
    ///
    /// # Examples
    ///
    /// ```
    /// use pgfeatures::{Filter, FilterLang, Search};
    ///
    /// let search = Search::new().filter(Filter::Cql2Text("name = 'X'".to_string())).unwrap();
    /// assert_eq!(search.filter_lang, Some(FilterLang::Cql2Json));
    /// assert!(search.filter.is_some());
    /// ```
    pub fn filter(mut self, filter: Filter) -> Result<Search> {
        match filter.into_cql2_json()? {
            Filter::Cql2Json(map) => {
                self.filter = Some(map);
                self.filter_lang = Some(FilterLang::Cql2Json);
                Ok(self)
            }
            Filter::Cql2Text(text) => Err(Error::InvalidFilter(text)),
        }
    }

    /// Returns an error if this search is invalid, e.g. if both bbox and
    /// intersects are specified.
    ///
    /// Returns the search unchanged if it is valid.
    ///
    /// # Examples
    ///
    /// ```
    /// use pgfeatures::Search;
    /// use geojson::{Geometry, Value};
    ///
    /// let search = Search::new().bbox("-180,-90,180,80".parse().unwrap()).valid().unwrap();
    /// search.intersects(Geometry::new(Value::Point(vec![0.0, 0.0]))).valid().unwrap_err();
    /// ```
    pub fn valid(self) -> Result<Search> {
        if self.bbox.is_some() && self.intersects.is_some() {
            return Err(Error::SearchHasBboxAndIntersects);
        }
        if self.filter.is_some() && self.filter_lang != Some(FilterLang::Cql2Json) {
            return Err(Error::InvalidFilterLang(
                self.filter_lang
                    .map(|lang| lang.to_string())
                    .unwrap_or_default(),
            ));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::Search;
    use crate::{Error, Fields, Filter, Sortby};
    use geojson::{Geometry, Value};
    use serde_json::json;

    #[test]
    fn bbox_and_intersects() {
        let search = Search::new()
            .bbox("0,0,1,1".parse().unwrap())
            .intersects(Geometry::new(Value::Point(vec![0.5, 0.5])));
        assert!(matches!(
            search.valid().unwrap_err(),
            Error::SearchHasBboxAndIntersects
        ));
    }

    #[test]
    fn serialize_full() {
        let search = Search::new()
            .collections(vec!["a".to_string(), "b".to_string(), "a".to_string()])
            .ids(vec!["1".to_string()])
            .bbox("0,0,1,1".parse().unwrap())
            .datetime("2020-01-01T00:00:00Z/..".parse().unwrap())
            .sortby(vec![Sortby::desc("datetime")])
            .fields(Fields::from_properties(["name"]))
            .limit(10)
            .token("next:a:1")
            .filter(Filter::Cql2Text("name = 'X'".to_string()))
            .unwrap()
            .valid()
            .unwrap();
        let value = serde_json::to_value(search).unwrap();
        assert_eq!(value["collections"], json!(["a", "b"]));
        assert_eq!(value["ids"], json!(["1"]));
        assert_eq!(value["bbox"], json!([0.0, 0.0, 1.0, 1.0]));
        assert_eq!(value["datetime"], "2020-01-01T00:00:00Z/..");
        assert_eq!(
            value["sortby"],
            json!([{"field": "datetime", "direction": "desc"}])
        );
        assert_eq!(value["fields"], json!({"include": ["properties.name"]}));
        assert_eq!(value["limit"], 10);
        assert_eq!(value["token"], "next:a:1");
        assert_eq!(value["filter-lang"], "cql2-json");
        assert_eq!(value["filter"]["op"], "=");
    }

    #[test]
    fn serialize_empty() {
        assert_eq!(serde_json::to_value(Search::new()).unwrap(), json!({}));
    }
}
