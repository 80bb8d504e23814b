use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Top-level keys of a feature that are never qualified with `properties.`.
const TOP_LEVEL_KEYS: [&str; 9] = [
    "id",
    "collection",
    "geometry",
    "bbox",
    "type",
    "links",
    "assets",
    "stac_version",
    "stac_extensions",
];

/// Include or exclude fields from the returned features.
///
/// Paths are dot-separated, e.g. `properties.datetime`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fields {
    /// Fields to include.
    #[serde(default, skip_serializing_if = "IndexSet::is_empty")]
    pub include: IndexSet<String>,

    /// Fields to exclude.
    #[serde(default, skip_serializing_if = "IndexSet::is_empty")]
    pub exclude: IndexSet<String>,
}

impl Fields {
    /// Builds a projection from a list of property names.
    ///
    /// Bare names are qualified as `properties.<name>`. An empty list means
    /// "no properties at all", which is expressed as excluding the
    /// `properties` member, since an empty include list means "everything"
    /// to a backend.
    ///
    /// # Examples
    ///
    /// ```
    /// use pgfeatures::Fields;
    ///
    /// let fields = Fields::from_properties(["name", "properties.kind", "geometry"]);
    /// assert!(fields.include.contains("properties.name"));
    /// assert!(fields.include.contains("properties.kind"));
    /// assert!(fields.include.contains("geometry"));
    ///
    /// let fields = Fields::from_properties(Vec::<String>::new());
    /// assert!(fields.include.is_empty());
    /// assert!(fields.exclude.contains("properties"));
    /// ```
    pub fn from_properties<I, S>(properties: I) -> Fields
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let include: IndexSet<String> = properties
            .into_iter()
            .map(|name| name.as_ref().trim().to_string())
            .filter(|name| !name.is_empty())
            .map(|name| {
                if name.contains('.') || TOP_LEVEL_KEYS.contains(&name.as_str()) {
                    name
                } else {
                    format!("properties.{name}")
                }
            })
            .collect();
        if include.is_empty() {
            Fields {
                include,
                exclude: IndexSet::from(["properties".to_string()]),
            }
        } else {
            Fields {
                include,
                exclude: IndexSet::new(),
            }
        }
    }

    /// Returns true if neither include nor exclude are set.
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}
