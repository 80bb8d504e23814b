use crate::{Backend, Error, Result};
use chrono::{DateTime, FixedOffset};
use geo::Intersects;
use pgfeatures::{
    CollectionClient, CollectionDescriptor, DEFAULT_LIMIT, Direction, Envelope, Fields, Item,
    Operator, Search, SearchClient, Sortby,
};
use serde_json::{Map, Value};
use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
    sync::{Arc, RwLock},
};

/// Keys that are kept when a projection includes only some fields.
const ALWAYS_INCLUDED: [&str; 4] = ["type", "id", "collection", "geometry"];

/// A naive backend that stores collections and items in memory.
///
/// Searches are evaluated in process. Cursors are offsets into the sorted
/// result set, prefixed like pgstac's (`next:` or `prev:`), and are only
/// meaningful to this backend.
///
/// # Examples
///
/// ```
/// use pgfeatures::CollectionDescriptor;
/// use pgfeatures_server::MemoryBackend;
/// use serde_json::json;
///
/// let backend = MemoryBackend::new();
/// backend.add_collection(CollectionDescriptor::new("a-collection")).unwrap();
/// backend.add_item(json!({
///     "type": "Feature",
///     "id": "an-item",
///     "collection": "a-collection",
///     "geometry": null,
///     "properties": {"datetime": "2024-01-01T00:00:00Z"},
/// })).unwrap();
/// ```
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    collections: Arc<RwLock<BTreeMap<String, CollectionDescriptor>>>,
    items: Arc<RwLock<HashMap<String, Vec<Item>>>>,
}

impl MemoryBackend {
    /// Creates a new, empty memory backend.
    pub fn new() -> MemoryBackend {
        MemoryBackend::default()
    }

    /// Adds or replaces a collection.
    pub fn add_collection(&self, collection: CollectionDescriptor) -> Result<()> {
        let mut collections = self.collections.write().map_err(|_| Error::MemoryPoisoned)?;
        let _ = collections.insert(collection.id.clone(), collection);
        Ok(())
    }

    /// Adds an item to its collection, which must already exist.
    pub fn add_item(&self, item: Value) -> Result<()> {
        let Value::Object(item) = item else {
            return Err(Error::MemoryBackend(format!(
                "item must be a JSON object, got {item}"
            )));
        };
        let Some(collection_id) = item.get("collection").and_then(Value::as_str) else {
            return Err(Error::MemoryBackend(format!(
                "item {} does not have a collection",
                id(&item).unwrap_or_default()
            )));
        };
        if !self
            .collections
            .read()
            .map_err(|_| Error::MemoryPoisoned)?
            .contains_key(collection_id)
        {
            return Err(Error::MemoryBackend(format!(
                "no collection with id='{collection_id}'"
            )));
        }
        let mut items = self.items.write().map_err(|_| Error::MemoryPoisoned)?;
        let collection = items.entry(collection_id.to_string()).or_default();
        collection.retain(|existing| id(existing) != id(&item));
        collection.push(item);
        Ok(())
    }

    /// Adds many items.
    pub fn add_items(&self, items: impl IntoIterator<Item = Value>) -> Result<()> {
        for item in items {
            self.add_item(item)?;
        }
        Ok(())
    }

    fn matching(&self, search: &Search) -> Result<Vec<Item>> {
        let items = self.items.read().map_err(|_| Error::MemoryPoisoned)?;
        let matcher = Matcher::new(search)?;
        let mut matching = Vec::new();
        let collections = items
            .iter()
            .filter(|(id, _)| search.collections.is_empty() || search.collections.contains(id));
        for (_, collection) in collections {
            for item in collection {
                if matcher.matches(item)? {
                    matching.push(item.clone());
                }
            }
        }
        Ok(matching)
    }
}

impl SearchClient for MemoryBackend {
    type Error = Error;

    async fn search(&self, search: Search) -> Result<Envelope> {
        let mut items = self.matching(&search)?;
        sort(&mut items, &search.sortby);
        let number_matched = items.len();
        let offset = match search.token.as_deref() {
            Some(token) => parse_token(token)
                .filter(|&offset| offset <= number_matched)
                .ok_or_else(|| Error::CursorNotFound(token.to_string()))?,
            None => 0,
        };
        let limit = usize::try_from(search.limit.unwrap_or(DEFAULT_LIMIT)).unwrap_or(usize::MAX);
        let end = offset.saturating_add(limit).min(number_matched);
        let next = (end < number_matched).then(|| format!("next:{end}"));
        let prev = (offset > 0).then(|| format!("prev:{}", offset.saturating_sub(limit)));
        let features = items
            .drain(offset..end)
            .map(|item| match &search.fields {
                Some(fields) => project(item, fields),
                None => item,
            })
            .collect();
        Ok(Envelope {
            features,
            number_matched: Some(number_matched as u64),
            next,
            prev,
        })
    }
}

impl CollectionClient for MemoryBackend {
    type Error = Error;

    async fn collection(&self, id: &str) -> Result<Option<CollectionDescriptor>> {
        let collections = self.collections.read().map_err(|_| Error::MemoryPoisoned)?;
        Ok(collections.get(id).cloned())
    }
}

impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Evaluates one search against items.
struct Matcher<'a> {
    search: &'a Search,
    bbox: Option<geo::Rect>,
    intersects: Option<geo::Geometry>,
}

impl<'a> Matcher<'a> {
    fn new(search: &'a Search) -> Result<Matcher<'a>> {
        let bbox = search.bbox.map(|bbox| {
            let [xmin, ymin, xmax, ymax] = bbox.xy();
            geo::Rect::new(geo::coord! { x: xmin, y: ymin }, geo::coord! { x: xmax, y: ymax })
        });
        let intersects = search
            .intersects
            .clone()
            .map(geo::Geometry::try_from)
            .transpose()
            .map_err(Box::new)?;
        Ok(Matcher {
            search,
            bbox,
            intersects,
        })
    }

    fn matches(&self, item: &Item) -> Result<bool> {
        Ok(self.id_matches(item)
            && self.geometry_matches(item)?
            && self.datetime_matches(item)
            && self.query_matches(item)
            && self.filter_matches(item)?)
    }

    fn id_matches(&self, item: &Item) -> bool {
        self.search.ids.is_empty()
            || id(item).is_some_and(|id| self.search.ids.iter().any(|i| i == id))
    }

    fn geometry_matches(&self, item: &Item) -> Result<bool> {
        if self.bbox.is_none() && self.intersects.is_none() {
            return Ok(true);
        }
        let Some(geometry) = item.get("geometry").filter(|geometry| !geometry.is_null()) else {
            return Ok(false);
        };
        let geometry: geojson::Geometry = serde_json::from_value(geometry.clone())?;
        let geometry: geo::Geometry = geometry.try_into().map_err(Box::new)?;
        Ok(self.bbox.is_none_or(|bbox| geometry.intersects(&bbox))
            && self
                .intersects
                .as_ref()
                .is_none_or(|intersects| geometry.intersects(intersects)))
    }

    fn datetime_matches(&self, item: &Item) -> bool {
        let Some(interval) = self.search.datetime.as_ref() else {
            return true;
        };
        let datetime = |key: &str| {
            property(item, key)
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        };
        let (start, end): (Option<DateTime<FixedOffset>>, Option<DateTime<FixedOffset>>) =
            match datetime("datetime") {
                Some(datetime) => (Some(datetime), Some(datetime)),
                None => (datetime("start_datetime"), datetime("end_datetime")),
            };
        match (start, end) {
            (Some(start), Some(end)) => interval.overlaps(start, end),
            _ => false,
        }
    }

    fn query_matches(&self, item: &Item) -> bool {
        let Some(query) = self.search.query.as_ref() else {
            return true;
        };
        query.iter().all(|(name, comparisons)| {
            let value = property(item, name).unwrap_or(&Value::Null);
            comparisons.iter().all(|(operator, expected)| {
                let ordering = compare(value, expected);
                match operator {
                    Operator::Eq => value == expected,
                    Operator::Neq => value != expected,
                    Operator::Lt => ordering == Some(Ordering::Less),
                    Operator::Lte => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                    Operator::Gt => ordering == Some(Ordering::Greater),
                    Operator::Gte => {
                        matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
                    }
                }
            })
        })
    }

    fn filter_matches(&self, item: &Item) -> Result<bool> {
        match self.search.filter.as_ref() {
            Some(filter) => evaluate(item, filter),
            None => Ok(true),
        }
    }
}

/// Evaluates the comparison and boolean subset of cql2-json.
fn evaluate(item: &Item, expr: &Map<String, Value>) -> Result<bool> {
    let op = expr.get("op").and_then(Value::as_str).unwrap_or_default();
    let args = expr
        .get("args")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let boolean = |arg: &Value| match arg {
        Value::Object(expr) => evaluate(item, expr),
        Value::Bool(b) => Ok(*b),
        _ => Err(unsupported(format!("not a boolean expression: {arg}"))),
    };
    match (op, args) {
        ("and", args) => {
            for arg in args {
                if !boolean(arg)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        ("or", args) => {
            for arg in args {
                if boolean(arg)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        ("not", [arg]) => Ok(!boolean(arg)?),
        ("isNull", [arg]) => Ok(operand(item, arg).is_null()),
        (op @ ("=" | "<>" | "<" | ">" | "<=" | ">="), [left, right]) => {
            let left = operand(item, left);
            let right = operand(item, right);
            let ordering = compare(&left, &right);
            Ok(match op {
                "=" => ordering == Some(Ordering::Equal),
                "<>" => ordering != Some(Ordering::Equal),
                "<" => ordering == Some(Ordering::Less),
                ">" => ordering == Some(Ordering::Greater),
                "<=" => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                _ => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            })
        }
        (op, args) => Err(unsupported(format!(
            "unsupported filter operation: {op} with {} argument(s)",
            args.len()
        ))),
    }
}

fn operand(item: &Item, arg: &Value) -> Value {
    match arg {
        Value::Object(object) => {
            if let Some(name) = object.get("property").and_then(Value::as_str) {
                property(item, name).cloned().unwrap_or(Value::Null)
            } else if let Some(instant) = object.get("timestamp").or_else(|| object.get("date")) {
                instant.clone()
            } else {
                arg.clone()
            }
        }
        _ => arg.clone(),
    }
}

fn unsupported(message: String) -> Error {
    Error::Upstream {
        message,
        internal: false,
    }
}

/// Looks up a top-level key, a dotted path, or a bare property name.
fn property<'a>(item: &'a Item, name: &str) -> Option<&'a Value> {
    lookup(item, name).or_else(|| {
        item.get("properties")
            .and_then(|properties| properties.get(name))
    })
}

fn lookup<'a>(item: &'a Item, path: &str) -> Option<&'a Value> {
    if let Some(value) = item.get(path) {
        return Some(value);
    }
    let (head, rest) = path.split_once('.')?;
    match item.get(head)? {
        Value::Object(child) => lookup(child, rest),
        _ => None,
    }
}

fn id(item: &Item) -> Option<&str> {
    item.get("id").and_then(Value::as_str)
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => (a == b).then_some(Ordering::Equal),
    }
}

/// Sorts items, with nulls first, then by id for a stable page order.
///
/// Fields no item has leave the order unchanged.
fn sort(items: &mut [Item], sortby: &[Sortby]) {
    let default = [Sortby::desc("datetime")];
    let sortby = if sortby.is_empty() { &default[..] } else { sortby };
    items.sort_by(|a, b| {
        sortby
            .iter()
            .map(|sortby| {
                let a = property(a, &sortby.field).unwrap_or(&Value::Null);
                let b = property(b, &sortby.field).unwrap_or(&Value::Null);
                let ordering = match (a.is_null(), b.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    (false, false) => compare(a, b).unwrap_or(Ordering::Equal),
                };
                match sortby.direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| id(a).cmp(&id(b)))
    });
}

fn parse_token(token: &str) -> Option<usize> {
    token
        .strip_prefix("next:")
        .or_else(|| token.strip_prefix("prev:"))?
        .parse()
        .ok()
}

fn project(item: Item, fields: &Fields) -> Item {
    let mut item = if fields.include.is_empty() {
        item
    } else {
        let mut projected = Map::new();
        for key in ALWAYS_INCLUDED {
            if let Some(value) = item.get(key) {
                let _ = projected.insert(key.to_string(), value.clone());
            }
        }
        for path in &fields.include {
            if let Some(value) = lookup(&item, path) {
                insert_path(&mut projected, path, value.clone());
            }
        }
        projected
    };
    for path in &fields.exclude {
        remove_path(&mut item, path);
    }
    item
}

fn insert_path(item: &mut Item, path: &str, value: Value) {
    match path.split_once('.') {
        Some((head, rest)) => {
            let child = item
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(child) = child {
                insert_path(child, rest, value);
            }
        }
        None => {
            let _ = item.insert(path.to_string(), value);
        }
    }
}

fn remove_path(item: &mut Item, path: &str) {
    match path.split_once('.') {
        Some((head, rest)) => {
            if let Some(Value::Object(child)) = item.get_mut(head) {
                remove_path(child, rest);
            }
        }
        None => {
            let _ = item.remove(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryBackend;
    use crate::Error;
    use pgfeatures::{
        Bbox, CollectionClient, CollectionDescriptor, Fields, Filter, FilterLang, Search,
        SearchClient, Sortby,
    };
    use serde_json::{Value, json};

    fn item(id: &str, datetime: &str, name: &str, cloud_cover: u64) -> Value {
        json!({
            "type": "Feature",
            "id": id,
            "collection": "a-collection",
            "geometry": {"type": "Point", "coordinates": [-105.1, 41.1]},
            "properties": {"datetime": datetime, "name": name, "eo:cloud_cover": cloud_cover},
            "links": [],
        })
    }

    fn backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend
            .add_collection(CollectionDescriptor::new("a-collection"))
            .unwrap();
        backend
            .add_collection(CollectionDescriptor::new("another-collection"))
            .unwrap();
        backend
            .add_items([
                item("a", "2024-01-01T00:00:00Z", "X", 10),
                item("b", "2024-01-02T00:00:00Z", "Y", 50),
                item("c", "2024-01-03T00:00:00Z", "Z", 90),
            ])
            .unwrap();
        backend
    }

    #[tokio::test]
    async fn default_order() {
        let envelope = backend().search(Search::new()).await.unwrap();
        assert_eq!(envelope.ids(), vec!["c", "b", "a"]);
        assert_eq!(envelope.number_matched, Some(3));
        assert!(envelope.next.is_none());
        assert!(envelope.prev.is_none());
    }

    #[tokio::test]
    async fn unknown_collection() {
        let envelope = backend()
            .search(Search::new().collections(vec!["not-a-collection".to_string()]))
            .await
            .unwrap();
        assert_eq!(envelope.number_matched, Some(0));
        assert!(
            backend()
                .collection("not-a-collection")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn item_without_collection() {
        let backend = backend();
        let _ = backend.add_item(json!({"id": "orphan"})).unwrap_err();
        let _ = backend
            .add_item(json!({"id": "orphan", "collection": "not-a-collection"}))
            .unwrap_err();
    }

    #[tokio::test]
    async fn paging() {
        let backend = backend();
        let first = backend.search(Search::new().limit(2)).await.unwrap();
        assert_eq!(first.ids(), vec!["c", "b"]);
        let next = first.next.unwrap();
        let second = backend
            .search(Search::new().limit(2).token(&next))
            .await
            .unwrap();
        assert_eq!(second.ids(), vec!["a"]);
        assert!(second.next.is_none());
        let prev = second.prev.unwrap();
        let back = backend
            .search(Search::new().limit(2).token(prev))
            .await
            .unwrap();
        assert_eq!(back.ids(), vec!["c", "b"]);
    }

    #[tokio::test]
    async fn bad_token() {
        for token in ["garbage", "next:100", "next:-1"] {
            let error = backend()
                .search(Search::new().token(token))
                .await
                .unwrap_err();
            assert!(matches!(error, Error::CursorNotFound(_)));
        }
    }

    #[tokio::test]
    async fn bbox_and_intersects() {
        let search = Search::new().bbox(Bbox::TwoDimensional([-106.0, 41.0, -105.0, 42.0]));
        assert_eq!(backend().search(search).await.unwrap().ids().len(), 3);
        let search = Search::new().bbox(Bbox::TwoDimensional([0.0, 0.0, 1.0, 1.0]));
        assert!(backend().search(search).await.unwrap().features.is_empty());
        let search = Search::new().intersects(geojson::Value::Point(vec![-105.1, 41.1]));
        assert_eq!(backend().search(search).await.unwrap().ids().len(), 3);
    }

    #[tokio::test]
    async fn datetime() {
        let search = Search::new().datetime("2024-01-02T00:00:00Z/..".parse().unwrap());
        assert_eq!(
            backend().search(search).await.unwrap().ids(),
            vec!["c", "b"]
        );
    }

    #[tokio::test]
    async fn query() {
        let mut search = Search::new();
        search.query = Some(r#"{"eo:cloud_cover": {"gte": 50, "lt": 90}}"#.parse().unwrap());
        assert_eq!(backend().search(search).await.unwrap().ids(), vec!["b"]);
    }

    #[tokio::test]
    async fn filter() {
        let filter = Filter::from_str_and_lang(
            "name = 'X' or \"eo:cloud_cover\" > 80",
            Some(FilterLang::Cql2Text),
        )
        .unwrap();
        let search = Search::new().filter(filter).unwrap();
        assert_eq!(backend().search(search).await.unwrap().ids(), vec!["c", "a"]);

        let filter = Filter::from_value_and_lang(
            json!({"op": "not", "args": [{"op": "=", "args": [{"property": "name"}, "X"]}]}),
            None,
        )
        .unwrap();
        let search = Search::new().filter(filter).unwrap();
        assert_eq!(backend().search(search).await.unwrap().ids(), vec!["c", "b"]);
    }

    #[tokio::test]
    async fn unsupported_filter() {
        let filter = Filter::from_value_and_lang(
            json!({"op": "like", "args": [{"property": "name"}, "X%"]}),
            None,
        )
        .unwrap();
        let search = Search::new().filter(filter).unwrap();
        let error = backend().search(search).await.unwrap_err();
        assert!(matches!(error, Error::Upstream { internal: false, .. }));
    }

    #[tokio::test]
    async fn sortby() {
        let search = Search::new().sortby(vec![Sortby::asc("name")]);
        assert_eq!(
            backend().search(search).await.unwrap().ids(),
            vec!["a", "b", "c"]
        );
        let search = Search::new().sortby(vec![Sortby::asc("not-a-field")]);
        let envelope = backend().search(search).await.unwrap();
        assert_eq!(envelope.ids(), vec!["a", "b", "c"]);
        assert_eq!(envelope.number_matched, Some(3));
    }

    #[tokio::test]
    async fn fields() {
        let search = Search::new().fields(Fields::from_properties(Vec::<String>::new()));
        let envelope = backend().search(search).await.unwrap();
        assert!(
            envelope
                .features
                .iter()
                .all(|feature| !feature.contains_key("properties"))
        );

        let search = Search::new().fields(Fields::from_properties(["name"]));
        let envelope = backend().search(search).await.unwrap();
        let feature = &envelope.features[0];
        assert_eq!(feature["properties"], json!({"name": "Z"}));
        assert_eq!(feature["id"], "c");
        assert_eq!(feature["geometry"]["type"], "Point");
        assert!(!feature.contains_key("links"));
    }

    #[tokio::test]
    async fn item_lookup() {
        let item = backend().item("a-collection", "b").await.unwrap().unwrap();
        assert_eq!(item["properties"]["name"], "Y");
        assert!(
            backend()
                .item("another-collection", "b")
                .await
                .unwrap()
                .is_none()
        );
    }
}
