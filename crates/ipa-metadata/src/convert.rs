//! Property list to JSON conversion.

use std::time::SystemTime;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, SecondsFormat, Utc};
use plist::Value as Plist;
use serde_json::Value as Json;

/// Converts a property list value into JSON, keeping dictionary key order.
///
/// Types JSON lacks are mapped to strings or numbers: data becomes base64,
/// dates become RFC 3339 (UTC, second precision), UIDs become integers.
/// Non-finite reals become `null`.
pub fn plist_to_json(value: &Plist) -> Json {
    match value {
        Plist::Dictionary(dict) => Json::Object(
            dict.iter()
                .map(|(key, value)| (key.clone(), plist_to_json(value)))
                .collect(),
        ),
        Plist::Array(items) => Json::Array(items.iter().map(plist_to_json).collect()),
        Plist::Boolean(b) => Json::Bool(*b),
        Plist::Integer(i) => i
            .as_signed()
            .map(Json::from)
            .or_else(|| i.as_unsigned().map(Json::from))
            .unwrap_or(Json::Null),
        Plist::Real(f) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Plist::String(s) => Json::String(s.clone()),
        Plist::Data(bytes) => Json::String(STANDARD.encode(bytes)),
        Plist::Date(date) => {
            let time: SystemTime = (*date).into();
            Json::String(DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Secs, true))
        }
        Plist::Uid(uid) => Json::from(uid.get()),
        _ => Json::Null,
    }
}
