//! Tag codec.
//!
//! NetBox stores tags as a flat list of strings. Callers work with a
//! key/value mapping, so a pair like `name: "web"` travels as `"name=web"`.
//! Nothing is escaped: a key or value containing `=` will not survive a
//! round trip.

use std::collections::BTreeMap;

/// Tags as seen by callers
pub type TagMap = BTreeMap<String, String>;

/// Keys every allocation must carry
pub const REQUIRED_TAGS: [&str; 2] = ["name", "unique"];

/// Encode a tag map into its `key=value` wire form
pub fn encode_tags(tags: &TagMap) -> Vec<String> {
    tags.iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect()
}

/// Decode the wire form back into a map.
///
/// Only entries with exactly one `=` are kept. Anything else is skipped,
/// so upstream tags that do not follow the pattern are invisible here.
pub fn decode_tags<S: AsRef<str>>(wire: &[S]) -> TagMap {
    let mut tags = TagMap::new();
    for entry in wire {
        let entry = entry.as_ref();
        match entry.split_once('=') {
            Some((key, value)) if !value.contains('=') => {
                tags.insert(key.to_string(), value.to_string());
            }
            _ => {
                log::debug!("Ignoring tag '{}' that is not of the form key=value", entry);
            }
        }
    }
    tags
}

/// Required keys absent from `tags`, in declaration order
pub fn missing_required_tags(tags: &TagMap) -> Vec<&'static str> {
    REQUIRED_TAGS
        .iter()
        .copied()
        .filter(|key| !tags.contains_key(*key))
        .collect()
}

/// Whether `tags` carries every required key (values may be empty)
pub fn is_tag_map_valid(tags: &TagMap) -> bool {
    missing_required_tags(tags).is_empty()
}

/// Parse a single `key=value` argument, as given on the command line
pub fn parse_tag_arg(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("tag '{}' must be of the form key=value", arg)),
    }
}
