//! Output formats and content negotiation.

use crate::{Error, Result};
use std::{fmt::Display, str::FromStr};

/// The `application/geo+json-seq` media type.
pub const GEOJSON_SEQ: &str = "application/geo+json-seq";

/// The `application/ndjson` media type.
pub const NDJSON: &str = "application/ndjson";

/// A response format.
///
/// Variants are declared in negotiation order: when two `Accept` entries
/// have the same weight, the earlier variant wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum OutputFormat {
    /// A GeoJSON FeatureCollection, or a Feature.
    #[default]
    GeoJson,

    /// One GeoJSON Feature per line.
    GeoJsonSeq,

    /// A JSON array of flat records.
    Json,

    /// Comma-separated flat records with a header row.
    Csv,

    /// One flat JSON record per line.
    NdJson,

    /// A minimal HTML page.
    Html,
}

impl OutputFormat {
    /// Returns this format's `Content-Type`.
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::GeoJson => "application/geo+json",
            OutputFormat::GeoJsonSeq => GEOJSON_SEQ,
            OutputFormat::Json => "application/json",
            OutputFormat::Csv => "text/csv",
            OutputFormat::NdJson => NDJSON,
            OutputFormat::Html => "text/html",
        }
    }

    /// Returns the `Content-Disposition` of streamed download formats.
    pub fn disposition(&self) -> Option<&'static str> {
        match self {
            OutputFormat::Csv => Some("attachment;filename=items.csv"),
            OutputFormat::NdJson => Some("attachment;filename=items.ndjson"),
            OutputFormat::GeoJsonSeq => Some("attachment;filename=items.geojson"),
            OutputFormat::GeoJson | OutputFormat::Json | OutputFormat::Html => None,
        }
    }

    /// Returns true if features are flattened to records in this format.
    pub fn is_flat(&self) -> bool {
        matches!(
            self,
            OutputFormat::Json | OutputFormat::Csv | OutputFormat::NdJson
        )
    }

    /// Picks a format from the `f` parameter and the `Accept` header.
    ///
    /// An explicit, non-empty `f` wins and must name a known format. Otherwise
    /// the highest-weighted acceptable media type is used, falling back to
    /// GeoJSON.
    ///
    /// # Examples
    ///
    /// ```
    /// use pgfeatures_server::OutputFormat;
    ///
    /// let format = OutputFormat::negotiate(None, Some("text/csv;q=1.0, application/json;q=0.4")).unwrap();
    /// assert_eq!(format, OutputFormat::Csv);
    /// let format = OutputFormat::negotiate(Some("ndjson"), Some("text/csv")).unwrap();
    /// assert_eq!(format, OutputFormat::NdJson);
    /// ```
    pub fn negotiate(f: Option<&str>, accept: Option<&str>) -> Result<OutputFormat> {
        if let Some(f) = f.map(str::trim).filter(|f| !f.is_empty()) {
            return f.parse();
        }
        let Some(accept) = accept else {
            return Ok(OutputFormat::default());
        };
        let best = accept
            .split(',')
            .filter_map(|entry| {
                let mut parts = entry.split(';');
                let media_type = parts.next()?.trim().to_ascii_lowercase();
                let quality = parts
                    .filter_map(|param| param.trim().strip_prefix("q="))
                    .find_map(|q| q.trim().parse::<f32>().ok())
                    .unwrap_or(1.0);
                let format = OutputFormat::from_media_type(&media_type)?;
                (quality > 0.0).then_some((quality, format))
            })
            .reduce(|best, candidate| {
                if candidate.0 > best.0 || (candidate.0 == best.0 && candidate.1 < best.1) {
                    candidate
                } else {
                    best
                }
            });
        Ok(best.map(|(_, format)| format).unwrap_or_default())
    }

    fn from_media_type(media_type: &str) -> Option<OutputFormat> {
        match media_type {
            "*/*" | "application/*" | "application/geo+json" => Some(OutputFormat::GeoJson),
            GEOJSON_SEQ => Some(OutputFormat::GeoJsonSeq),
            "application/json" => Some(OutputFormat::Json),
            "text/*" | "text/csv" => Some(OutputFormat::Csv),
            NDJSON | "application/x-ndjson" => Some(OutputFormat::NdJson),
            "text/html" => Some(OutputFormat::Html),
            _ => None,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<OutputFormat> {
        match s.to_ascii_lowercase().as_str() {
            "geojson" | "geo+json" => Ok(OutputFormat::GeoJson),
            "geojsonseq" | "geojson-seq" | "geo+json-seq" => Ok(OutputFormat::GeoJsonSeq),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "ndjson" => Ok(OutputFormat::NdJson),
            "html" => Ok(OutputFormat::Html),
            other => OutputFormat::from_media_type(other)
                .filter(|_| other.contains('/') && !other.contains('*'))
                .ok_or_else(|| Error::UnsupportedFormat(s.to_string())),
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::GeoJson => f.write_str("geojson"),
            OutputFormat::GeoJsonSeq => f.write_str("geojsonseq"),
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Csv => f.write_str("csv"),
            OutputFormat::NdJson => f.write_str("ndjson"),
            OutputFormat::Html => f.write_str("html"),
        }
    }
}
