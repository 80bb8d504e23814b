use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A feature as returned by a backend.
///
/// Features may not be complete items when fields have been excluded, so
/// they are kept as JSON objects.
pub type Item = Map<String, Value>;

/// A backend's search result: one page of features and its cursors.
///
/// The cursors are opaque. They are minted by the backend and only ever
/// passed back to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The features on this page, in backend order.
    pub features: Vec<Item>,

    /// The number of features matching the search, if the backend counted.
    #[serde(rename = "numberMatched", skip_serializing_if = "Option::is_none")]
    pub number_matched: Option<u64>,

    /// The cursor for the next page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,

    /// The cursor for the previous page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
}

impl Envelope {
    /// Returns the number of features on this page.
    pub fn number_returned(&self) -> usize {
        self.features.len()
    }

    /// Returns the ids of the features on this page, in order.
    ///
    /// # Examples
    ///
    /// ```
    /// use pgfeatures::Envelope;
    /// use serde_json::json;
    ///
    /// let envelope: Envelope = serde_json::from_value(json!({
    ///     "features": [{"id": "a"}, {"id": "b"}],
    ///     "numberMatched": 2,
    /// })).unwrap();
    /// assert_eq!(envelope.ids(), vec!["a", "b"]);
    /// ```
    pub fn ids(&self) -> Vec<&str> {
        self.features
            .iter()
            .filter_map(|feature| feature.get("id").and_then(Value::as_str))
            .collect()
    }
}
