use pgfeatures::{Envelope, Item};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A page of search results, as returned by `pgstac.search`.
#[derive(Debug, Deserialize, Serialize)]
pub struct Page {
    /// The features on this page.
    ///
    /// Field projection can drop required item fields, so these are plain
    /// JSON objects.
    #[serde(default)]
    pub features: Vec<Item>,

    /// The next cursor, without its `next:` prefix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,

    /// The previous cursor, without its `prev:` prefix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,

    /// The search context of pgstac before v0.9.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,

    /// The number of matching items.
    #[serde(rename = "numberMatched", skip_serializing_if = "Option::is_none")]
    pub number_matched: Option<u64>,

    /// The number of features on this page, since pgstac v0.9.
    #[serde(rename = "numberReturned", skip_serializing_if = "Option::is_none")]
    pub number_returned: Option<usize>,

    /// Pagination links, since pgstac v0.9.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,

    /// Additional fields.
    #[serde(flatten)]
    pub additional_fields: Map<String, Value>,
}

/// The search context of older pgstac versions.
#[derive(Debug, Deserialize, Serialize)]
pub struct Context {
    /// The number of matching items, if pgstac counted them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<u64>,

    /// The number of returned items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returned: Option<u64>,

    /// The page size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

/// A pagination link of newer pgstac versions.
#[derive(Debug, Deserialize, Serialize)]
pub struct Link {
    /// The relation type, e.g. `next`.
    pub rel: String,

    /// The link target.
    pub href: String,

    /// Additional fields.
    #[serde(flatten)]
    pub additional_fields: Map<String, Value>,
}

impl Page {
    /// Returns this page's next token, if it has one.
    pub fn next_token(&self) -> Option<String> {
        self.token("next", self.next.as_deref())
    }

    /// Returns this page's prev token, if it has one.
    pub fn prev_token(&self) -> Option<String> {
        self.token("prev", self.prev.as_deref())
    }

    /// Returns the matched count, wherever this pgstac version put it.
    pub fn number_matched(&self) -> Option<u64> {
        self.number_matched
            .or_else(|| self.context.as_ref().and_then(|context| context.matched))
    }

    /// Converts this page into a backend-neutral envelope.
    pub fn into_envelope(self) -> Envelope {
        Envelope {
            number_matched: self.number_matched(),
            next: self.next_token(),
            prev: self.prev_token(),
            features: self.features,
        }
    }

    fn token(&self, rel: &str, bare: Option<&str>) -> Option<String> {
        if let Some(bare) = bare {
            return Some(format!("{rel}:{bare}"));
        }
        let link = self.links.iter().find(|link| link.rel == rel)?;
        let (_, query) = link.href.split_once('?')?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, value)| key == "token" && !value.is_empty())
            .map(|(_, token)| token.into_owned())
    }
}
