//! 🔍 Chunk parsing and validation: customs at the airport.
//!
//! Textual chunks get decoded, structured chunks get inspected, and only the
//! ones carrying `_index`, `_type` and `_id` (checked in that order) get their
//! passport stamped as a [`Record`]. Everyone else is turned away with a
//! field-specific [`WriterError`].

use serde_json::{Map, Value};

use super::WriterError;
use crate::common::{Chunk, Record};

/// 🛂 Turn a raw chunk into a validated record, or say exactly why not.
///
/// Routing fields are looked up under their bulk names (`_index`), and only
/// when that key is absent under their bare names (`index`). A present but
/// empty `_index` is a missing index. A missing or null `data` becomes `{}`.
pub(crate) fn parse_chunk(chunk: Chunk) -> Result<Record, WriterError> {
    let value = match chunk {
        Chunk::Structured(value) => value,
        Chunk::Encoded(text) => {
            serde_json::from_str(&text).map_err(|source| WriterError::Parse { source })?
        }
    };

    let Value::Object(mut fields) = value else {
        return Err(WriterError::InvalidMessage);
    };

    let index = routing_field(&fields, "_index", "index").ok_or(WriterError::InvalidIndex)?;
    let doc_type = routing_field(&fields, "_type", "type").ok_or(WriterError::InvalidType)?;
    let id = routing_field(&fields, "_id", "id").ok_or(WriterError::InvalidId)?;

    let data = match fields.remove("data") {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(data) => data,
    };

    Ok(Record {
        index,
        doc_type,
        id,
        data,
    })
}

// -- 🔧 the bulk name wins whenever it is present, even when its value is junk.
// -- non-empty strings pass, numbers pass as their decimal text, anything else is missing.
fn routing_field(fields: &Map<String, Value>, name: &str, fallback: &str) -> Option<String> {
    let key = if fields.contains_key(name) { name } else { fallback };
    match fields.get(key) {
        Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    }
}
