//! Per-endpoint response contracts
//!
//! Each validator takes the raw provider body and returns the payload to store, or
//! the reason the body does not meet the endpoint's contract. "No results" (an empty
//! list under the expected key) is valid; a missing key is not.

use serde_json::{Map, Value, json};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShapeError {
    /// Rate-limit or premium notice in place of data.
    #[error("provider notice: {0}")]
    Notice(String),
    /// Provider rejected the request, e.g. an unknown symbol.
    #[error("provider error: {0}")]
    Rejected(String),
    #[error("missing expected field `{0}`")]
    MissingField(String),
}

impl ShapeError {
    /// Notices are temporary conditions that say nothing about the requested
    /// symbol.
    pub fn is_transient(&self) -> bool {
        matches!(self, ShapeError::Notice(_))
    }
}

pub type Validated = Result<Value, ShapeError>;

fn missing(body: &Value, field: &str) -> ShapeError {
    let text = |key: &str| body.get(key).and_then(Value::as_str).map(str::to_string);
    if let Some(msg) = text("Error Message") {
        ShapeError::Rejected(msg)
    } else if let Some(msg) = text("Note").or_else(|| text("Information")) {
        ShapeError::Notice(msg)
    } else {
        ShapeError::MissingField(field.to_string())
    }
}

fn has_array(body: &Value, field: &str) -> bool {
    body.get(field).is_some_and(Value::is_array)
}

fn has_text(object: &Value, field: &str) -> bool {
    object
        .get(field)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty())
}

pub fn top_gainers_losers(body: Value) -> Validated {
    for field in ["top_gainers", "top_losers"] {
        if !has_array(&body, field) {
            return Err(missing(&body, field));
        }
    }
    Ok(body)
}

pub fn company_overview(body: Value) -> Validated {
    if has_text(&body, "Symbol") {
        Ok(body)
    } else {
        Err(missing(&body, "Symbol"))
    }
}

/// Unwraps `Global Quote`; the nested object is what gets cached and served.
pub fn global_quote(mut body: Value) -> Validated {
    let valid = body
        .get("Global Quote")
        .is_some_and(|quote| quote.is_object() && has_text(quote, "01. symbol"));
    if !valid {
        return Err(missing(&body, "Global Quote"));
    }
    Ok(body["Global Quote"].take())
}

/// Accepts the body when the function-specific series container is present.
pub fn time_series(body: Value, container: &str) -> Validated {
    if body.get(container).is_some_and(Value::is_object) {
        Ok(body)
    } else {
        Err(missing(&body, container))
    }
}

/// Renames `feed` to `items` and keeps the sentiment legends.
pub fn news_feed(mut body: Value) -> Validated {
    if !has_array(&body, "feed") {
        return Err(missing(&body, "feed"));
    }
    let mut normalized = Map::new();
    normalized.insert("items".to_string(), body["feed"].take());
    for legend in ["sentiment_score_definition", "relevance_score_definition"] {
        if let Some(value) = body.get_mut(legend) {
            normalized.insert(legend.to_string(), value.take());
        }
    }
    Ok(Value::Object(normalized))
}

/// Search results never fail validation; a body without matches means none.
pub fn search_matches(mut body: Value) -> Value {
    match body.get_mut("bestMatches") {
        Some(matches) if matches.is_array() => matches.take(),
        _ => json!([]),
    }
}
