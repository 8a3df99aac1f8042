//! Best-effort location of the JSON object inside free model text.

/// Returns the slice from the first `{` to the last `}` of `raw`, which drops
/// code fences and any prose the model wrapped around its answer.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}
