//! Lenient field decoders for bundled source records.
//!
//! The bundled datasets encode lists as comma-separated strings, integers as
//! strings and booleans as `"yes"`/`"no"`. These helpers normalize them while
//! deserializing so entities only ever hold typed values.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum ListRepr {
    Joined(String),
    Items(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntRepr {
    Number(i64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagRepr {
    Bool(bool),
    Text(String),
}

/// Split a comma-separated string into trimmed, non-empty tokens.
pub fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse an integer, falling back to `0` when the text is not a number.
pub fn parse_int_or_zero(s: &str) -> i32 {
    match s.trim().parse::<i32>() {
        Ok(n) => n,
        Err(_) => {
            tracing::warn!(value = %s, "Unparsable integer in source record, using 0");
            0
        }
    }
}

pub fn parse_flag(s: &str) -> bool {
    match s.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "y" | "1" => true,
        "no" | "false" | "n" | "0" | "" => false,
        other => {
            tracing::warn!(value = %other, "Unrecognized flag in source record, using false");
            false
        }
    }
}

pub fn list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<ListRepr>::deserialize(deserializer)? {
        Some(ListRepr::Joined(s)) => split_list(&s),
        Some(ListRepr::Items(items)) => items
            .iter()
            .map(|item| item.trim())
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    })
}

pub fn int<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match IntRepr::deserialize(deserializer)? {
        IntRepr::Number(n) => i32::try_from(n).unwrap_or_else(|_| {
            tracing::warn!(value = n, "Out-of-range integer in source record, using 0");
            0
        }),
        IntRepr::Text(s) => parse_int_or_zero(&s),
    })
}

pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<FlagRepr>::deserialize(deserializer)? {
        Some(FlagRepr::Bool(b)) => b,
        Some(FlagRepr::Text(s)) => parse_flag(&s),
        None => false,
    })
}

/// Treat empty or whitespace-only strings as absent.
pub fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}
