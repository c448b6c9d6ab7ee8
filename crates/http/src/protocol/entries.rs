//! Ordered `(key, value)` entry providers.
//!
//! Providers keep every entry they find, duplicates included, in source order. Collapsing
//! repeated keys is left to the consumer.

use crate::protocol::HttpError;
use http::{HeaderMap, Uri};

/// Ordered key/value pairs as produced by a provider.
pub type Entries = Vec<(String, String)>;

/// Lists the headers of `headers`, one entry per header name.
///
/// Repeated values of one name are joined with `", "` in the order they were received. Names
/// come out lower case, as [`HeaderMap`] stores them. A value that is not visible ASCII is
/// rejected.
pub fn header_entries(headers: &HeaderMap) -> Result<Entries, HttpError> {
    let mut entries = Vec::with_capacity(headers.keys_len());

    for name in headers.keys() {
        let mut joined = String::new();
        for (i, value) in headers.get_all(name).iter().enumerate() {
            let value = value.to_str().map_err(|e| HttpError::invalid_header(format!("{name}: {e}")))?;
            if i > 0 {
                joined.push_str(", ");
            }
            joined.push_str(value);
        }
        entries.push((name.as_str().to_owned(), joined));
    }

    Ok(entries)
}

/// Decodes the query string of `uri` as `application/x-www-form-urlencoded` pairs.
pub fn query_entries(uri: &Uri) -> Result<Entries, HttpError> {
    match uri.query() {
        None | Some("") => Ok(Vec::new()),
        Some(query) => serde_urlencoded::from_str::<Entries>(query).map_err(HttpError::invalid_query),
    }
}
