use crate::{Error, Result};
use serde::{Serialize, Serializer};
use std::str::FromStr;

/// A validated bounding box in WGS84.
///
/// The two-dimensional form is `[xmin, ymin, xmax, ymax]` and the
/// three-dimensional form is `[xmin, ymin, zmin, xmax, ymax, zmax]`.
///
/// # Examples
///
/// ```
/// use pgfeatures::Bbox;
///
/// let bbox: Bbox = "-180,-90,180,90".parse().unwrap();
/// assert_eq!(bbox.xy(), [-180.0, -90.0, 180.0, 90.0]);
/// assert!("10,0,0,10".parse::<Bbox>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bbox {
    /// A two-dimensional bounding box.
    TwoDimensional([f64; 4]),

    /// A three-dimensional bounding box.
    ThreeDimensional([f64; 6]),
}

impl Bbox {
    /// Returns the horizontal extent as `[xmin, ymin, xmax, ymax]`.
    pub fn xy(&self) -> [f64; 4] {
        match self {
            Bbox::TwoDimensional(bbox) => *bbox,
            Bbox::ThreeDimensional([xmin, ymin, _, xmax, ymax, _]) => [*xmin, *ymin, *xmax, *ymax],
        }
    }

    /// Returns the values of this bbox as a slice.
    pub fn as_slice(&self) -> &[f64] {
        match self {
            Bbox::TwoDimensional(bbox) => bbox,
            Bbox::ThreeDimensional(bbox) => bbox,
        }
    }

    fn validate(self) -> Result<Bbox> {
        let invalid = |reason| Error::InvalidBbox {
            bbox: self.as_slice().to_vec(),
            reason,
        };
        if self.as_slice().iter().any(|value| !value.is_finite()) {
            return Err(invalid("values must be finite numbers"));
        }
        let [xmin, ymin, xmax, ymax] = self.xy();
        if xmax < xmin {
            return Err(invalid(
                "maximum longitude must be greater than minimum longitude",
            ));
        }
        if ymax < ymin {
            return Err(invalid(
                "maximum latitude must be greater than minimum latitude",
            ));
        }
        if let Bbox::ThreeDimensional([_, _, zmin, _, _, zmax]) = self {
            if zmax < zmin {
                return Err(invalid(
                    "maximum elevation must be greater than minimum elevation",
                ));
            }
        }
        if xmin < -180.0 || ymin < -90.0 || xmax > 180.0 || ymax > 90.0 {
            return Err(invalid("bounding box must be within (-180, -90, 180, 90)"));
        }
        Ok(self)
    }
}

impl TryFrom<Vec<f64>> for Bbox {
    type Error = Error;

    fn try_from(values: Vec<f64>) -> Result<Bbox> {
        let bbox = match values.as_slice() {
            [xmin, ymin, xmax, ymax] => Bbox::TwoDimensional([*xmin, *ymin, *xmax, *ymax]),
            [xmin, ymin, zmin, xmax, ymax, zmax] => {
                Bbox::ThreeDimensional([*xmin, *ymin, *zmin, *xmax, *ymax, *zmax])
            }
            _ => {
                return Err(Error::InvalidBbox {
                    bbox: values,
                    reason: "a bbox must have 4 or 6 values",
                });
            }
        };
        bbox.validate()
    }
}

impl FromStr for Bbox {
    type Err = Error;

    fn from_str(s: &str) -> Result<Bbox> {
        let values = s
            .split(',')
            .map(|value| value.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()?;
        values.try_into()
    }
}

impl Serialize for Bbox {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.as_slice().serialize(serializer)
    }
}
