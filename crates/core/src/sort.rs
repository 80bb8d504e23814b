//! Sort specifications.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

/// A single sort instruction.
///
/// Field names are not checked here. A field that does not exist is passed
/// through, and the backend decides what to do with it.
///
/// # Examples
///
/// ```
/// use pgfeatures::{Direction, Sortby};
///
/// let sortby: Sortby = "-datetime".parse().unwrap();
/// assert_eq!(sortby, Sortby::desc("datetime"));
/// assert_eq!(sortby.to_string(), "-datetime");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sortby {
    /// The field to sort by.
    pub field: String,

    /// The sort direction.
    #[serde(default)]
    pub direction: Direction,
}

/// The direction of sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Ascending
    #[default]
    Asc,

    /// Descending
    Desc,
}

/// Sortby as supplied in a request body: a compact string, one object, or a
/// list of objects.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SortbyInput {
    /// `"+a,-b"`
    Text(String),

    /// `{"field": "a", "direction": "desc"}`
    One(Sortby),

    /// `[{"field": "a"}, {"field": "b", "direction": "desc"}]`
    Many(Vec<Sortby>),
}

impl Sortby {
    /// Creates a new ascending sortby for the field.
    pub fn asc(field: impl ToString) -> Sortby {
        Sortby {
            field: field.to_string(),
            direction: Direction::Asc,
        }
    }

    /// Creates a new descending sortby for the field.
    pub fn desc(field: impl ToString) -> Sortby {
        Sortby {
            field: field.to_string(),
            direction: Direction::Desc,
        }
    }
}

/// Parses a comma-delimited sort string, e.g. `+collection,-datetime`.
///
/// Empty tokens are skipped. A `+` that arrived as a space after query
/// string decoding is accepted.
///
/// # Examples
///
/// ```
/// use pgfeatures::{sort, Sortby};
///
/// let sortby = sort::parse_list("collection,-datetime").unwrap();
/// assert_eq!(sortby, vec![Sortby::asc("collection"), Sortby::desc("datetime")]);
/// ```
pub fn parse_list(s: &str) -> Result<Vec<Sortby>> {
    s.split(',')
        .filter(|token| !token.trim().is_empty())
        .map(str::parse)
        .collect()
}

impl SortbyInput {
    /// Converts this input into a list of sort instructions.
    pub fn into_list(self) -> Result<Vec<Sortby>> {
        match self {
            SortbyInput::Text(s) => parse_list(&s),
            SortbyInput::One(sortby) => Ok(vec![sortby]),
            SortbyInput::Many(sortby) => Ok(sortby),
        }
    }
}

impl FromStr for Sortby {
    type Err = Error;

    fn from_str(s: &str) -> Result<Sortby> {
        let s = s.trim();
        let (direction, field) = if let Some(field) = s.strip_prefix('-') {
            (Direction::Desc, field)
        } else if let Some(field) = s.strip_prefix('+') {
            (Direction::Asc, field)
        } else {
            (Direction::Asc, s)
        };
        if field.is_empty() || field.starts_with(['+', '-']) {
            Err(Error::InvalidSortby(s.to_string()))
        } else {
            Ok(Sortby {
                field: field.to_string(),
                direction,
            })
        }
    }
}

impl Display for Sortby {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.direction {
            Direction::Asc => write!(f, "{}", self.field),
            Direction::Desc => write!(f, "-{}", self.field),
        }
    }
}
