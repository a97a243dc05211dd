//! PAN resolution and normalization
//!
//! A profile has no fixed schema, so its PAN is whichever field is named
//! "pan" or "pan number" (any case). When several sections carry such a field
//! the first one in iteration order wins.
//!
//! `normalize` is the only comparison form for PAN values. The write path
//! (uniqueness check) and the read path (report lookup) both go through it.

use crate::sections::{OrderedMap, ProfileDetails};
use serde::Deserialize;

/// True when a field name designates the profile's PAN
pub fn is_pan_field(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower == "pan" || lower == "pan number"
}

/// Value of the first PAN field, scanning sections then fields in order.
pub fn find_pan(details: &ProfileDetails) -> Option<&str> {
    details.values().find_map(|fields| {
        fields
            .iter()
            .find(|(name, _)| is_pan_field(name))
            .map(|(_, value)| value.as_str())
    })
}

/// Uppercase and strip surrounding whitespace.
pub fn normalize(value: &str) -> String {
    value.to_uppercase().trim().to_string()
}

/// Normalized PAN of a details map, if one is asserted.
///
/// A PAN that normalizes to the empty string counts as not asserted.
pub fn resolve_normalized(details: &ProfileDetails) -> Option<String> {
    find_pan(details)
        .map(normalize)
        .filter(|pan| !pan.is_empty())
}

/// Section shape that tolerates sections which are not objects
#[derive(Deserialize)]
#[serde(untagged)]
enum LooseSection {
    Fields(OrderedMap<serde_json::Value>),
    Other(#[allow(dead_code)] serde_json::Value),
}

/// Resolve a PAN from raw JSON text.
///
/// Used on stored documents that predate typed writes. Anything that is not a
/// section/field object yields `None` rather than an error, as does a PAN field
/// holding a non-string value.
pub fn find_pan_in_json(raw: &str) -> Option<String> {
    let sections: OrderedMap<LooseSection> = serde_json::from_str(raw).ok()?;
    let found = sections.values().find_map(|section| match section {
        LooseSection::Fields(fields) => fields
            .iter()
            .find(|(name, _)| is_pan_field(name))
            .map(|(_, value)| value.as_str().map(str::to_string)),
        LooseSection::Other(_) => None,
    });
    found?
}

/// Normalized PAN of a raw stored document, if one is asserted.
pub fn resolve_normalized_json(raw: &str) -> Option<String> {
    find_pan_in_json(raw)
        .map(|value| normalize(&value))
        .filter(|pan| !pan.is_empty())
}

/// Mask a PAN for logging, keeping the last four characters.
pub fn mask(pan: &str) -> String {
    let chars: Vec<char> = pan.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}
