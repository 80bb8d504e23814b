use crate::{Error, Result};
use cql2::Expr;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt::Display, str::FromStr};

/// The language of a filter expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterLang {
    /// [CQL2 text](https://docs.ogc.org/is/21-065r2/21-065r2.html#cql2-text)
    #[serde(rename = "cql2-text")]
    Cql2Text,

    /// [CQL2 JSON](https://docs.ogc.org/is/21-065r2/21-065r2.html#cql2-json)
    #[serde(rename = "cql2-json")]
    Cql2Json,
}

/// A CQL2 filter, as received from a caller.
///
/// Backends only ever see the JSON form: see [Filter::into_cql2_json].
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// A text expression, e.g. `name = 'X'`.
    Cql2Text(String),

    /// A JSON expression, e.g. `{"op": "=", "args": [{"property": "name"}, "X"]}`.
    Cql2Json(Map<String, Value>),
}

impl Filter {
    /// Builds a filter from a GET-style string and an optional language.
    ///
    /// Without a language, the string is read as CQL2 text.
    ///
    /// # Examples
    ///
    /// ```
    /// use pgfeatures::{Filter, FilterLang};
    ///
    /// let filter = Filter::from_str_and_lang(r#"{"op":"isNull","args":[{"property":"a"}]}"#, Some(FilterLang::Cql2Json)).unwrap();
    /// assert!(matches!(filter, Filter::Cql2Json(_)));
    /// ```
    pub fn from_str_and_lang(s: &str, lang: Option<FilterLang>) -> Result<Filter> {
        match lang.unwrap_or(FilterLang::Cql2Text) {
            FilterLang::Cql2Text => Ok(Filter::Cql2Text(s.to_string())),
            FilterLang::Cql2Json => Filter::from_value(serde_json::from_str(s)?),
        }
    }

    /// Builds a filter from a JSON value and an optional language.
    ///
    /// Without a language, strings are CQL2 text and objects are CQL2 JSON.
    pub fn from_value_and_lang(value: Value, lang: Option<FilterLang>) -> Result<Filter> {
        match (lang, value) {
            (None | Some(FilterLang::Cql2Text), Value::String(s)) => Ok(Filter::Cql2Text(s)),
            (Some(FilterLang::Cql2Json), Value::String(s)) => {
                Filter::from_value(serde_json::from_str(&s)?)
            }
            (None | Some(FilterLang::Cql2Json), value) => Filter::from_value(value),
            (Some(FilterLang::Cql2Text), value) => Err(Error::InvalidFilter(format!(
                "expected a cql2-text string, got {value}"
            ))),
        }
    }

    fn from_value(value: Value) -> Result<Filter> {
        match value {
            Value::Object(map) => Ok(Filter::Cql2Json(map)),
            value => Err(Error::InvalidFilter(format!(
                "expected a cql2-json object, got {value}"
            ))),
        }
    }

    /// Parses this filter into a cql2 expression.
    pub fn expr(&self) -> Result<Expr> {
        match self {
            Filter::Cql2Text(text) => cql2::parse_text(text).map_err(Error::from),
            Filter::Cql2Json(map) => {
                serde_json::from_value(Value::Object(map.clone())).map_err(Error::from)
            }
        }
    }

    /// Converts this filter to its canonical CQL2 JSON form.
    ///
    /// Both surface syntaxes go through the same expression tree, so
    /// equivalent text and JSON filters produce identical output.
    ///
    /// # Examples
    ///
    /// ```
    /// use pgfeatures::Filter;
    ///
    /// let text = Filter::Cql2Text("name = 'X'".to_string()).into_cql2_json().unwrap();
    /// assert!(matches!(text, Filter::Cql2Json(_)));
    /// ```
    pub fn into_cql2_json(self) -> Result<Filter> {
        let expr = self.expr()?;
        match serde_json::to_value(expr)? {
            Value::Object(map) if is_predicate(&map) => Ok(Filter::Cql2Json(map)),
            value => Err(Error::InvalidFilter(format!(
                "filter is not a predicate: {value}"
            ))),
        }
    }

    /// Returns this filter's language.
    pub fn lang(&self) -> FilterLang {
        match self {
            Filter::Cql2Text(_) => FilterLang::Cql2Text,
            Filter::Cql2Json(_) => FilterLang::Cql2Json,
        }
    }
}

/// A predicate is an operation with arguments. The operands of `and`, `or`
/// and `not` must be predicates too.
fn is_predicate(map: &Map<String, Value>) -> bool {
    let (Some(Value::String(op)), Some(Value::Array(args))) = (map.get("op"), map.get("args"))
    else {
        return false;
    };
    if matches!(op.as_str(), "and" | "or" | "not") {
        !args.is_empty()
            && args.iter().all(|arg| match arg {
                Value::Object(map) => is_predicate(map),
                _ => false,
            })
    } else {
        true
    }
}

impl FromStr for FilterLang {
    type Err = Error;

    fn from_str(s: &str) -> Result<FilterLang> {
        match s.to_ascii_lowercase().as_str() {
            "cql2-text" | "cql-text" => Ok(FilterLang::Cql2Text),
            "cql2-json" | "cql-json" => Ok(FilterLang::Cql2Json),
            _ => Err(Error::InvalidFilterLang(s.to_string())),
        }
    }
}

impl Display for FilterLang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterLang::Cql2Text => f.write_str("cql2-text"),
            FilterLang::Cql2Json => f.write_str("cql2-json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Filter, FilterLang};
    use crate::Error;
    use rstest::rstest;
    use serde_json::json;

    fn json_map(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn text_and_json_are_identical() {
        let text = Filter::Cql2Text("name = 'X'".to_string())
            .into_cql2_json()
            .unwrap();
        let json = Filter::Cql2Json(json_map(
            json!({"op": "=", "args": [{"property": "name"}, "X"]}),
        ))
        .into_cql2_json()
        .unwrap();
        assert_eq!(text, json);
        assert_eq!(
            serde_json::to_string(&match text {
                Filter::Cql2Json(map) => map,
                Filter::Cql2Text(_) => unreachable!(),
            })
            .unwrap(),
            serde_json::to_string(&match json {
                Filter::Cql2Json(map) => map,
                Filter::Cql2Text(_) => unreachable!(),
            })
            .unwrap()
        );
    }

    #[test]
    fn boolean_combination() {
        let filter = Filter::Cql2Text("name = 'X' AND kind = 'Y'".to_string())
            .into_cql2_json()
            .unwrap();
        let Filter::Cql2Json(map) = filter else {
            panic!("not json");
        };
        assert_eq!(map["op"], "and");
    }

    #[rstest]
    #[case("name = ")]
    #[case("name")]
    #[case("name = 'X' AND kind")]
    fn invalid_text(#[case] text: &str) {
        let error = Filter::Cql2Text(text.to_string())
            .into_cql2_json()
            .unwrap_err();
        assert!(matches!(error, Error::InvalidFilter(_) | Error::Cql2(_)), "{error:?}");
    }

    #[test]
    fn bare_property_json() {
        let error = Filter::Cql2Json(json_map(json!({"property": "name"})))
            .into_cql2_json()
            .unwrap_err();
        assert!(matches!(error, Error::InvalidFilter(_)));
    }

    #[test]
    fn from_str_and_lang() {
        assert_eq!(
            Filter::from_str_and_lang("a = 1", None).unwrap().lang(),
            FilterLang::Cql2Text
        );
        let _ = Filter::from_str_and_lang("a = 1", Some(FilterLang::Cql2Json)).unwrap_err();
        let _ = Filter::from_str_and_lang("[1]", Some(FilterLang::Cql2Json)).unwrap_err();
    }

    #[test]
    fn from_value_and_lang() {
        assert_eq!(
            Filter::from_value_and_lang(json!("a = 1"), None)
                .unwrap()
                .lang(),
            FilterLang::Cql2Text
        );
        assert_eq!(
            Filter::from_value_and_lang(json!({"op": "isNull", "args": [{"property": "a"}]}), None)
                .unwrap()
                .lang(),
            FilterLang::Cql2Json
        );
        assert_eq!(
            Filter::from_value_and_lang(
                json!(r#"{"op":"isNull","args":[{"property":"a"}]}"#),
                Some(FilterLang::Cql2Json)
            )
            .unwrap()
            .lang(),
            FilterLang::Cql2Json
        );
        let _ = Filter::from_value_and_lang(json!({"op": "="}), Some(FilterLang::Cql2Text))
            .unwrap_err();
    }

    #[test]
    fn filter_lang() {
        assert_eq!("cql2-json".parse::<FilterLang>().unwrap(), FilterLang::Cql2Json);
        assert_eq!("CQL-TEXT".parse::<FilterLang>().unwrap(), FilterLang::Cql2Text);
        let _ = "sql".parse::<FilterLang>().unwrap_err();
        assert_eq!(FilterLang::Cql2Json.to_string(), "cql2-json");
    }
}
