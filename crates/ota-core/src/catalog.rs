//! Catalog deserialization: Mesu property lists and Pallas JWT responses
//!
//! Both formats carry an `Assets` array of dictionaries, one per update
//! package. Pallas responses are signed JWTs; the payload is only decoded,
//! the signature is not checked.

use crate::error::{Error, Result};
use crate::record::{RawRecord, Value};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

/// Parse a Mesu catalog from raw property list bytes (XML or binary)
pub fn parse_mesu_bytes(bytes: &[u8], name: &str) -> Result<Vec<RawRecord>> {
    let root = plist::Value::from_reader(Cursor::new(bytes)).map_err(|e| Error::Plist {
        name: name.to_string(),
        source: e,
    })?;

    assets(Value::from(root), name)
}

/// Parse a Mesu catalog from a local property list file
pub fn parse_mesu_file<P: AsRef<Path>>(path: P) -> Result<Vec<RawRecord>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_mesu_bytes(&bytes, &path.display().to_string())
}

/// Parse the body of a Pallas response: a JWT whose payload lists the assets
pub fn parse_pallas_response(body: &str, name: &str) -> Result<Vec<RawRecord>> {
    let malformed = |message: &str| Error::MalformedCatalog {
        name: name.to_string(),
        message: message.to_string(),
    };

    let payload = body
        .trim()
        .split('.')
        .nth(1)
        .ok_or_else(|| malformed("response is not a JWT"))?;
    let decoded = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| malformed(&format!("undecodable JWT payload: {e}")))?;
    let json: serde_json::Value = serde_json::from_slice(&decoded)?;

    parse_pallas_json(json, name)
}

/// Parse a decoded Pallas payload. Each record is stamped with the
/// payload's `PostingDate` unless it carries its own. A payload without
/// `Assets` offers no updates.
pub fn parse_pallas_json(json: serde_json::Value, name: &str) -> Result<Vec<RawRecord>> {
    if json.is_object() && json.get("Assets").is_none() {
        debug!(catalog = name, "no assets offered");
        return Ok(Vec::new());
    }

    let posting_date = json
        .get("PostingDate")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);

    let mut records = assets(Value::from(json), name)?;

    if let Some(date) = posting_date {
        for record in &mut records {
            if !record.contains_key("PostingDate") {
                record.insert("PostingDate", Value::String(date.clone()));
            }
        }
    }

    Ok(records)
}

fn assets(root: Value, name: &str) -> Result<Vec<RawRecord>> {
    let malformed = |message: &str| Error::MalformedCatalog {
        name: name.to_string(),
        message: message.to_string(),
    };

    let Value::Dictionary(mut root) = root else {
        return Err(malformed("root is not a dictionary"));
    };

    let items = match root.remove("Assets") {
        Some(Value::Array(items)) => items,
        Some(_) => return Err(malformed("'Assets' is not an array")),
        None => return Err(malformed("no 'Assets' array")),
    };

    let total = items.len();
    let records: Vec<RawRecord> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Dictionary(record) => Some(record),
            _ => None,
        })
        .collect();

    if records.len() < total {
        warn!(catalog = name, skipped = total - records.len(), "non-dictionary assets skipped");
    }
    debug!(catalog = name, assets = records.len(), "catalog parsed");

    Ok(records)
}
