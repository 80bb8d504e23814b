//! Turns envelopes into response bodies.

use crate::{Error, Link, OutputFormat, Result, UrlBuilder};
use bytes::Bytes;
use pgfeatures::{CollectionDescriptor, Envelope, Item};
use serde_json::{Map, Value};
use wkt::ToWkt;

/// How geometries are written in flat records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryEncoding {
    /// The GeoJSON geometry object, as stored.
    GeoJson,

    /// Well-known text.
    Wkt,
}

/// A rendered response body.
#[derive(Debug)]
pub enum Body {
    /// One JSON document.
    Json(Value),

    /// Chunks to stream, one record or feature each.
    Chunks(Vec<Bytes>),

    /// An html page.
    Html(String),
}

/// A rendered response.
#[derive(Debug)]
pub struct Rendered {
    /// The response `Content-Type`.
    pub content_type: &'static str,

    /// The response `Content-Disposition`, if any.
    pub disposition: Option<&'static str>,

    /// The body.
    pub body: Body,
}

/// A page of features with everything needed to render it.
#[derive(Debug)]
pub struct Listing<'a> {
    /// The backend's page.
    pub envelope: Envelope,

    /// Top-level links, in order.
    pub links: Vec<Link>,

    /// Members written before `features` in a FeatureCollection.
    pub metadata: Map<String, Value>,

    /// Builds each feature's links.
    pub url_builder: &'a UrlBuilder,

    /// How flat formats write geometry.
    pub geometry: GeometryEncoding,
}

impl Listing<'_> {
    /// Renders this listing in a format.
    pub fn render(self, format: OutputFormat) -> Result<Rendered> {
        let Listing {
            envelope,
            links,
            metadata,
            url_builder,
            geometry,
        } = self;
        let body = match format {
            OutputFormat::GeoJson | OutputFormat::Html => {
                let number_returned = envelope.number_returned();
                let features: Vec<Value> = envelope
                    .features
                    .into_iter()
                    .map(|feature| Value::Object(with_item_links(feature, url_builder, false)))
                    .collect();
                let mut collection = Map::new();
                let _ = collection.insert("type".into(), "FeatureCollection".into());
                collection.extend(metadata);
                let _ = collection.insert("features".into(), features.into());
                let _ = collection.insert("links".into(), serde_json::to_value(links)?);
                if let Some(number_matched) = envelope.number_matched {
                    let _ = collection.insert("numberMatched".into(), number_matched.into());
                }
                let _ = collection.insert("numberReturned".into(), number_returned.into());
                let collection = Value::Object(collection);
                if format == OutputFormat::Html {
                    Body::Html(html(&collection)?)
                } else {
                    Body::Json(collection)
                }
            }
            OutputFormat::GeoJsonSeq => Body::Chunks(
                envelope
                    .features
                    .into_iter()
                    .map(|feature| line(&with_item_links(feature, url_builder, false)))
                    .collect::<Result<_>>()?,
            ),
            OutputFormat::Json => Body::Json(Value::Array(
                envelope
                    .features
                    .iter()
                    .map(|feature| flatten(feature, geometry).map(Value::Object))
                    .collect::<Result<_>>()?,
            )),
            OutputFormat::NdJson => Body::Chunks(
                envelope
                    .features
                    .iter()
                    .map(|feature| line(&flatten(feature, geometry)?))
                    .collect::<Result<_>>()?,
            ),
            OutputFormat::Csv => Body::Chunks(csv(
                &envelope
                    .features
                    .iter()
                    .map(|feature| flatten(feature, geometry))
                    .collect::<Result<Vec<_>>>()?,
            )?),
        };
        Ok(Rendered::new(format, body))
    }
}

/// Renders a single feature, with `collection` and `self` links.
pub fn item(item: Item, url_builder: &UrlBuilder, format: OutputFormat) -> Result<Rendered> {
    let body = match format {
        OutputFormat::GeoJson => Body::Json(Value::Object(with_item_links(item, url_builder, true))),
        OutputFormat::Html => Body::Html(html(&Value::Object(with_item_links(
            item,
            url_builder,
            true,
        )))?),
        OutputFormat::GeoJsonSeq => Body::Chunks(vec![line(&with_item_links(
            item,
            url_builder,
            true,
        ))?]),
        OutputFormat::Json => Body::Json(Value::Object(flatten(&item, GeometryEncoding::GeoJson)?)),
        OutputFormat::NdJson => Body::Chunks(vec![line(&flatten(
            &item,
            GeometryEncoding::GeoJson,
        )?)?]),
        OutputFormat::Csv => Body::Chunks(csv(&[flatten(&item, GeometryEncoding::GeoJson)?])?),
    };
    Ok(Rendered::new(format, body))
}

impl Rendered {
    fn new(format: OutputFormat, body: Body) -> Rendered {
        Rendered {
            content_type: format.content_type(),
            disposition: format.disposition(),
            body,
        }
    }
}

/// Replaces a feature's links with links to its collection and to itself.
fn with_item_links(mut feature: Item, url_builder: &UrlBuilder, is_self: bool) -> Item {
    let collection_id = feature
        .get("collection")
        .and_then(Value::as_str)
        .map(String::from);
    let item_id = feature.get("id").and_then(Value::as_str).map(String::from);
    let mut links = Vec::new();
    if let Some(collection_id) = collection_id.as_deref() {
        links.push(
            Link::new(url_builder.collection(collection_id), "collection")
                .r#type(mime::APPLICATION_JSON),
        );
        if let Some(item_id) = item_id.as_deref() {
            links.push(
                Link::new(
                    url_builder.item(collection_id, item_id),
                    if is_self { "self" } else { "item" },
                )
                .r#type(OutputFormat::GeoJson.content_type()),
            );
        }
    }
    match serde_json::to_value(links) {
        Ok(links) => {
            let _ = feature.insert("links".into(), links);
        }
        Err(err) => tracing::warn!("could not serialize feature links: {err}"),
    }
    feature
}

/// Flattens a feature to `{collectionId, itemId, ...properties, geometry?}`.
fn flatten(feature: &Item, geometry: GeometryEncoding) -> Result<Map<String, Value>> {
    let mut record = Map::new();
    let _ = record.insert(
        "collectionId".into(),
        feature.get("collection").cloned().unwrap_or(Value::Null),
    );
    let _ = record.insert(
        "itemId".into(),
        feature.get("id").cloned().unwrap_or(Value::Null),
    );
    if let Some(Value::Object(properties)) = feature.get("properties") {
        record.extend(properties.clone());
    }
    if let Some(value) = feature.get("geometry").filter(|value| !value.is_null()) {
        let value = match geometry {
            GeometryEncoding::GeoJson => value.clone(),
            GeometryEncoding::Wkt => Value::String(to_wkt(value)?),
        };
        let _ = record.insert("geometry".into(), value);
    }
    Ok(record)
}

fn to_wkt(value: &Value) -> Result<String> {
    let geometry: geojson::Geometry = serde_json::from_value(value.clone())?;
    let geometry: geo_types::Geometry = geometry.try_into().map_err(Box::new)?;
    Ok(geometry.wkt_string())
}

fn line<T: serde::Serialize>(value: &T) -> Result<Bytes> {
    let mut bytes = serde_json::to_vec(value)?;
    bytes.push(b'\n');
    Ok(Bytes::from(bytes))
}

/// Writes a header row, from the first record's keys, and one row per record.
fn csv(records: &[Map<String, Value>]) -> Result<Vec<Bytes>> {
    let Some(first) = records.first() else {
        return Ok(Vec::new());
    };
    let header: Vec<&str> = first.keys().map(String::as_str).collect();
    let mut chunks = vec![csv_row(header.iter().copied())?];
    for record in records {
        let cells: Vec<String> = header
            .iter()
            .map(|key| match record.get(*key) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(value) => value.to_string(),
            })
            .collect();
        chunks.push(csv_row(cells.iter())?);
    }
    Ok(chunks)
}

fn csv_row<I, T>(cells: I) -> Result<Bytes>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(cells)?;
    let bytes = writer
        .into_inner()
        .map_err(|err| Error::Io(err.into_error()))?;
    Ok(Bytes::from(bytes))
}

fn html(value: &Value) -> Result<String> {
    let json = serde_json::to_string_pretty(value)?;
    let title = value
        .get("title")
        .or_else(|| value.get("id"))
        .and_then(Value::as_str)
        .unwrap_or("pgfeatures");
    Ok(format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n<pre>{}</pre>\n</body>\n</html>\n",
        html_escape::encode_text(title),
        html_escape::encode_text(&json)
    ))
}

/// Returns the metadata members of a collection's item listing.
pub fn items_metadata(collection: &CollectionDescriptor) -> Map<String, Value> {
    let mut metadata = Map::new();
    let _ = metadata.insert("id".into(), collection.id.clone().into());
    let _ = metadata.insert("title".into(), collection.title().into());
    let _ = metadata.insert("description".into(), collection.description().into());
    metadata
}

/// Returns the metadata members of a search response.
pub fn search_metadata(title: &str) -> Map<String, Value> {
    let mut metadata = Map::new();
    let _ = metadata.insert("id".into(), "search".into());
    let _ = metadata.insert("title".into(), title.into());
    metadata
}
