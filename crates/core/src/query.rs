use crate::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// A comparison operator of the `query` extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    /// Equal
    Eq,
    /// Not equal
    Neq,
    /// Less than
    Lt,
    /// Less than or equal
    Lte,
    /// Greater than
    Gt,
    /// Greater than or equal
    Gte,
}

/// A `query` parameter: property name to operator-value comparisons.
///
/// # Examples
///
/// ```
/// use pgfeatures::{Operator, Query};
///
/// let query: Query = r#"{"eo:cloud_cover": {"lt": 10}}"#.parse().unwrap();
/// let (property, comparison) = query.iter().next().unwrap();
/// assert_eq!(property, "eo:cloud_cover");
/// assert_eq!(comparison[&Operator::Lt], 10);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Query(IndexMap<String, IndexMap<Operator, Value>>);

impl Query {
    /// Iterates over the property comparisons.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &IndexMap<Operator, Value>)> {
        self.0.iter()
    }

    /// Returns true if there are no comparisons.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reads a query from a JSON value.
    ///
    /// Every property must have at least one comparison.
    pub fn from_value(value: Value) -> Result<Query> {
        let map: IndexMap<String, IndexMap<Operator, Value>> =
            serde_json::from_value(value).map_err(|err| Error::InvalidQuery(err.to_string()))?;
        if let Some((property, _)) = map.iter().find(|(_, comparison)| comparison.is_empty()) {
            return Err(Error::InvalidQuery(format!(
                "no comparison for property: {property}"
            )));
        }
        Ok(Query(map))
    }
}

impl FromStr for Query {
    type Err = Error;

    /// Parses a JSON query string.
    ///
    /// Clients sometimes percent-encode the JSON before it is placed into
    /// the query string, so an undecoded value is decoded once more.
    fn from_str(s: &str) -> Result<Query> {
        let value = match serde_json::from_str(s) {
            Ok(value) => value,
            Err(err) => {
                let decoded = decode_component(s);
                if decoded == s {
                    return Err(Error::InvalidQuery(err.to_string()));
                }
                serde_json::from_str(&decoded).map_err(|err| Error::InvalidQuery(err.to_string()))?
            }
        };
        Query::from_value(value)
    }
}

fn decode_component(s: &str) -> String {
    url::form_urlencoded::parse(s.as_bytes())
        .map(|(key, value)| {
            if value.is_empty() {
                key.into_owned()
            } else {
                format!("{key}={value}")
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}
