use regex::Regex;
use serde_json::Value;

#[inline]
pub fn capture_group_1<'a>(re: &Regex, input: &'a str) -> Option<&'a str> {
    re.captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Walk a JSON value by object keys and return the string at the end, if any.
#[inline]
pub fn json_get_str<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |v, key| v.get(*key))
        .and_then(Value::as_str)
}

#[inline]
pub fn json_get_str_owned(value: &Value, path: &[&str]) -> Option<String> {
    json_get_str(value, path).map(ToOwned::to_owned)
}

/// Array at `pointer`, or an empty slice when it is missing or not an array.
#[inline]
pub fn json_array<'a>(value: &'a Value, pointer: &str) -> &'a [Value] {
    value
        .pointer(pointer)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Truncate `text` to at most `max_len` bytes on a char boundary, marking the cut.
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated)", &text[..end])
}
