use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The metadata of a feature collection.
///
/// Known fields are typed; everything else a backend stores on a collection
/// (extension fields, links, summaries, ...) lands in `additional_fields`.
///
/// # Examples
///
/// ```
/// use pgfeatures::CollectionDescriptor;
/// use serde_json::json;
///
/// let collection: CollectionDescriptor = serde_json::from_value(json!({
///     "id": "noaa-emergency-response",
///     "title": "NOAA Emergency Response Imagery",
///     "license": "public-domain",
/// })).unwrap();
/// assert_eq!(collection.title(), "NOAA Emergency Response Imagery");
/// assert_eq!(collection.additional_fields["license"], "public-domain");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDescriptor {
    /// The collection id.
    pub id: String,

    /// A short title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// A longer description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Spatial and temporal extents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extent: Option<Value>,

    /// The STAC version of the stored collection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stac_version: Option<String>,

    /// STAC extensions used by the collection.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stac_extensions: Vec<String>,

    /// The collection's queryables, as a JSON schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queryables: Option<Map<String, Value>>,

    /// All other fields.
    #[serde(flatten)]
    pub additional_fields: Map<String, Value>,
}

impl CollectionDescriptor {
    /// Creates a descriptor with only an id.
    pub fn new(id: impl ToString) -> CollectionDescriptor {
        CollectionDescriptor {
            id: id.to_string(),
            title: None,
            description: None,
            extent: None,
            stac_version: None,
            stac_extensions: Vec::new(),
            queryables: None,
            additional_fields: Map::new(),
        }
    }

    /// Returns the title, or the id if there is no title.
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }

    /// Returns the description, falling back to the title.
    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or_else(|| self.title())
    }
}
