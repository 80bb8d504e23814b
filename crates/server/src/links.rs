//! Navigation links and the urls they point to.

use crate::{Error, Result};
use pgfeatures::Envelope;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::{Url, form_urlencoded};

/// Query parameters that carry the pagination cursor on GET routes.
const CURSOR_KEYS: [&str; 2] = ["offset", "token"];

/// A navigation link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// The link target.
    pub href: String,

    /// The relation type.
    pub rel: String,

    /// The media type of the target.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,

    /// A human-readable title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// The HTTP method to follow this link with, if not GET.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// The request body to follow this link with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Link {
    /// Creates a new link.
    ///
    /// # Examples
    ///
    /// ```
    /// use pgfeatures_server::Link;
    ///
    /// let link = Link::new("http://pgfeatures.test/search", "self").r#type("application/geo+json");
    /// assert_eq!(link.rel, "self");
    /// ```
    pub fn new(href: impl ToString, rel: impl ToString) -> Link {
        Link {
            href: href.to_string(),
            rel: rel.to_string(),
            r#type: None,
            title: None,
            method: None,
            body: None,
        }
    }

    /// Sets the media type.
    pub fn r#type(mut self, r#type: impl ToString) -> Link {
        self.r#type = Some(r#type.to_string());
        self
    }

    /// Sets the title.
    pub fn title(mut self, title: impl ToString) -> Link {
        self.title = Some(title.to_string());
        self
    }

    /// Turns this into a POST link with the given body.
    pub fn post(mut self, body: Value) -> Link {
        self.method = Some("POST".to_string());
        self.body = Some(body);
        self
    }
}

/// Builds the api's urls from its root.
#[derive(Debug, Clone)]
pub struct UrlBuilder {
    root: Url,
}

impl UrlBuilder {
    /// Creates a new url builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use pgfeatures_server::UrlBuilder;
    ///
    /// let url_builder = UrlBuilder::new("http://pgfeatures.test/api").unwrap();
    /// assert_eq!(
    ///     url_builder.items("a collection").as_str(),
    ///     "http://pgfeatures.test/api/collections/a%20collection/items"
    /// );
    /// ```
    pub fn new(root: &str) -> Result<UrlBuilder> {
        let root = Url::parse(root)?;
        if root.cannot_be_a_base() {
            return Err(Error::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase));
        }
        Ok(UrlBuilder { root })
    }

    /// Returns the root url.
    pub fn root(&self) -> &Url {
        &self.root
    }

    /// Returns a collection's url.
    pub fn collection(&self, id: &str) -> Url {
        self.join(&["collections", id])
    }

    /// Returns a collection's items url.
    pub fn items(&self, id: &str) -> Url {
        self.join(&["collections", id, "items"])
    }

    /// Returns an item's url.
    pub fn item(&self, collection_id: &str, item_id: &str) -> Url {
        self.join(&["collections", collection_id, "items", item_id])
    }

    /// Returns the search url.
    pub fn search(&self) -> Url {
        self.join(&["search"])
    }

    fn join(&self, segments: &[&str]) -> Url {
        let mut url = self.root.clone();
        url.set_query(None);
        if let Ok(mut path) = url.path_segments_mut() {
            let _ = path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// How a listing request was made, which decides how its links are built.
#[derive(Debug, Clone, Copy)]
pub enum Pagination<'a> {
    /// A GET request, with its raw query string.
    Get {
        /// The request url, without a query.
        url: &'a Url,

        /// The query string exactly as it arrived.
        query: Option<&'a str>,
    },

    /// A POST request, with its body.
    Post {
        /// The request url.
        url: &'a Url,

        /// The request body.
        body: &'a Value,
    },
}

impl Pagination<'_> {
    /// Returns the `self` link, then `next` and `prev` if the envelope has
    /// cursors for them.
    pub fn links(&self, envelope: &Envelope, r#type: &str) -> Vec<Link> {
        let mut links = vec![self.self_link().r#type(r#type)];
        if let Some(next) = envelope.next.as_deref() {
            links.push(self.cursor_link("next", next).r#type(r#type));
        }
        if let Some(prev) = envelope.prev.as_deref() {
            links.push(self.cursor_link("prev", prev).r#type(r#type));
        }
        links
    }

    fn self_link(&self) -> Link {
        match self {
            Pagination::Get { url, query } => {
                let mut url = (*url).clone();
                url.set_query(query.filter(|query| !query.is_empty()));
                Link::new(url, "self")
            }
            Pagination::Post { url, body } => Link::new(url, "self").post((*body).clone()),
        }
    }

    fn cursor_link(&self, rel: &str, cursor: &str) -> Link {
        match self {
            Pagination::Get { url, query } => {
                let mut url = (*url).clone();
                url.set_query(Some(&with_cursor(*query, cursor)));
                Link::new(url, rel)
            }
            Pagination::Post { url, body } => {
                let mut body = match body {
                    Value::Object(object) => object.clone(),
                    _ => Map::new(),
                };
                let _ = body.insert("token".to_string(), cursor.into());
                Link::new(url, rel).post(Value::Object(body))
            }
        }
    }
}

/// Replaces the cursor in a raw query string.
///
/// Every other parameter is kept verbatim and in order. The first cursor
/// parameter keeps its key and position; if there is none, `offset` is
/// appended.
///
/// # Examples
///
/// ```
/// use pgfeatures_server::links::with_cursor;
///
/// assert_eq!(with_cursor(Some("limit=1&token=a&f=json"), "next:b"), "limit=1&token=next%3Ab&f=json");
/// assert_eq!(with_cursor(Some("limit=1"), "next:b"), "limit=1&offset=next%3Ab");
/// ```
pub fn with_cursor(query: Option<&str>, cursor: &str) -> String {
    let cursor = form_urlencoded::byte_serialize(cursor.as_bytes()).collect::<String>();
    let mut replaced = false;
    let mut parts = Vec::new();
    for part in query.unwrap_or_default().split('&') {
        if part.is_empty() {
            continue;
        }
        let key = part.split_once('=').map(|(key, _)| key).unwrap_or(part);
        if CURSOR_KEYS.contains(&key) {
            if !replaced {
                parts.push(format!("{key}={cursor}"));
                replaced = true;
            }
        } else {
            parts.push(part.to_string());
        }
    }
    if !replaced {
        parts.push(format!("offset={cursor}"));
    }
    parts.join("&")
}
