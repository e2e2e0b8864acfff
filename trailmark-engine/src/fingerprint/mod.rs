//! Browser fingerprint normalization, hashing, and confidence scoring
//!
//! Raw client-supplied signal maps are canonicalized into a stable,
//! privacy-reduced attribute set, hashed deterministically, and scored for
//! reliability. Unknown or malformed signals are ignored, never an error:
//! these functions must not fail on arbitrary client input.

pub mod device_info;

pub use device_info::DeviceInfo;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Normalize raw fingerprint components into the recognized attribute set.
///
/// Picks a fixed subset of signal keys, sorts list-valued signals, and
/// rounds screen metrics for privacy. Output key order does not matter;
/// hashing sorts keys canonically.
pub fn normalize(raw: &Map<String, Value>) -> Map<String, Value> {
    let mut normalized = Map::new();

    if let Some(ua) = raw.get("userAgent").and_then(Value::as_str) {
        normalized.insert("user_agent".to_string(), Value::String(ua.to_string()));
    }

    if let Some(lang) = raw.get("language").and_then(Value::as_str) {
        normalized.insert("language".to_string(), Value::String(lang.to_string()));
    }

    if let Some(langs) = raw.get("languages").and_then(Value::as_array) {
        if let Some(sorted) = sorted_strings(langs) {
            normalized.insert("languages".to_string(), sorted);
        }
    }

    // Screen resolution rounded to the nearest 100px per axis for privacy
    if let Some(res) = raw.get("screenResolution").and_then(Value::as_array) {
        if let (Some(w), Some(h)) = (
            res.first().and_then(Value::as_f64),
            res.get(1).and_then(Value::as_f64),
        ) {
            normalized.insert("screen_width".to_string(), json_i64(round_to_100(w)));
            normalized.insert("screen_height".to_string(), json_i64(round_to_100(h)));
        }
    }

    if let Some(depth) = raw.get("colorDepth").cloned() {
        if depth.is_number() {
            normalized.insert("color_depth".to_string(), depth);
        }
    }

    if let Some(ratio) = raw.get("pixelRatio").and_then(Value::as_f64) {
        let rounded = (ratio * 10.0).round() / 10.0;
        if let Some(n) = serde_json::Number::from_f64(rounded) {
            normalized.insert("pixel_ratio".to_string(), Value::Number(n));
        }
    }

    if let Some(tz) = raw.get("timezone").and_then(Value::as_str) {
        normalized.insert("timezone".to_string(), Value::String(tz.to_string()));
    }

    if let Some(platform) = raw.get("platform").and_then(Value::as_str) {
        normalized.insert("platform".to_string(), Value::String(platform.to_string()));
    }

    if let Some(cores) = raw.get("hardwareConcurrency").cloned() {
        if cores.is_number() {
            normalized.insert("cpu_cores".to_string(), cores);
        }
    }

    if let Some(mem) = raw.get("deviceMemory").cloned() {
        if mem.is_number() {
            normalized.insert("device_memory".to_string(), mem);
        }
    }

    if let Some(canvas) = raw.get("canvas").and_then(Value::as_str) {
        normalized.insert("canvas".to_string(), Value::String(canvas.to_string()));
    }

    if let Some(webgl) = raw.get("webgl").and_then(Value::as_object) {
        let vendor = webgl.get("vendor").and_then(Value::as_str).unwrap_or("");
        let renderer = webgl.get("renderer").and_then(Value::as_str).unwrap_or("");
        normalized.insert("webgl_vendor".to_string(), Value::String(vendor.to_string()));
        normalized.insert("webgl_renderer".to_string(), Value::String(renderer.to_string()));
    }

    if let Some(fonts) = raw.get("fonts").and_then(Value::as_array) {
        if let Some(sorted) = sorted_strings(fonts) {
            normalized.insert("fonts".to_string(), sorted);
        }
    }

    if let Some(plugins) = raw.get("plugins").and_then(Value::as_array) {
        if let Some(sorted) = sorted_strings(plugins) {
            normalized.insert("plugins".to_string(), sorted);
        }
    }

    normalized
}

/// Generate the stable 256-bit recognition hash for a raw component map.
///
/// Identical raw input, irrespective of key ordering, always yields the
/// identical 64-hex-char hash. This is the basis of exact-match recognition.
pub fn hash(raw: &Map<String, Value>) -> String {
    let normalized = normalize(raw);
    let canonical = to_canonical_json(&Value::Object(normalized));

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Score how reliable a match on this fingerprint would be (0-100).
///
/// Additive per present signal, capped at 100. Adding a signal never
/// lowers the score.
pub fn confidence(raw: &Map<String, Value>) -> u8 {
    let mut score: i64 = 0;

    if raw.contains_key("userAgent") {
        score += 10;
    }
    if raw.contains_key("language") {
        score += 5;
    }
    // Screen resolution is highly identifying
    if raw.contains_key("screenResolution") {
        score += 15;
    }
    if raw.contains_key("timezone") {
        score += 10;
    }
    if raw.contains_key("hardwareConcurrency") {
        score += 10;
    }
    if raw.contains_key("deviceMemory") {
        score += 10;
    }
    // Canvas signature is the strongest single signal
    if raw.contains_key("canvas") {
        score += 20;
    }
    if raw.contains_key("webgl") {
        score += 15;
    }
    if let Some(fonts) = raw.get("fonts").and_then(Value::as_array) {
        score += ((fonts.len() as i64) / 10).min(10);
    }
    if raw.contains_key("plugins") {
        score += 5;
    }

    score.min(100) as u8
}

/// Convert JSON to canonical form (lexicographically sorted keys, no whitespace)
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut pairs: Vec<_> = map.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let items: Vec<String> = pairs
                .into_iter()
                .map(|(k, v)| format!("\"{}\":{}", k, to_canonical_json(v)))
                .collect();
            format!("{{{}}}", items.join(","))
        }
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
    }
}

/// Sort an array of strings; None when the array holds no strings.
/// Non-string entries are dropped silently.
fn sorted_strings(values: &[Value]) -> Option<Value> {
    let mut strings: Vec<&str> = values.iter().filter_map(Value::as_str).collect();
    if strings.is_empty() && !values.is_empty() {
        return None;
    }
    strings.sort_unstable();
    Some(Value::Array(
        strings
            .into_iter()
            .map(|s| Value::String(s.to_string()))
            .collect(),
    ))
}

fn round_to_100(v: f64) -> i64 {
    ((v / 100.0).round() * 100.0) as i64
}

fn json_i64(v: i64) -> Value {
    Value::Number(serde_json::Number::from(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn components(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn full_fingerprint() -> Map<String, Value> {
        components(json!({
            "userAgent": "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/120.0",
            "language": "en-US",
            "languages": ["en-US", "de-DE", "en"],
            "screenResolution": [1920, 1080],
            "colorDepth": 24,
            "pixelRatio": 1.25,
            "timezone": "Europe/Berlin",
            "platform": "Win32",
            "hardwareConcurrency": 8,
            "deviceMemory": 16,
            "canvas": "c4nv45-s1gn4tur3",
            "webgl": {"vendor": "Google Inc.", "renderer": "ANGLE"},
            "fonts": ["Arial", "Verdana", "Courier"],
            "plugins": ["PDF Viewer"]
        }))
    }

    #[test]
    fn test_hash_deterministic_regardless_of_key_order() {
        let a = components(json!({
            "userAgent": "UA",
            "timezone": "UTC",
            "language": "en"
        }));
        let b = components(json!({
            "language": "en",
            "userAgent": "UA",
            "timezone": "UTC"
        }));
        assert_eq!(hash(&a), hash(&b));
    }

    #[test]
    fn test_hash_shape() {
        let h = hash(&full_fingerprint());
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_changes_with_input() {
        let mut a = full_fingerprint();
        let h1 = hash(&a);
        a.insert("timezone".to_string(), json!("America/Chicago"));
        assert_ne!(h1, hash(&a));
    }

    #[test]
    fn test_list_order_does_not_matter() {
        let a = components(json!({"fonts": ["Arial", "Verdana"], "languages": ["en", "de"]}));
        let b = components(json!({"fonts": ["Verdana", "Arial"], "languages": ["de", "en"]}));
        assert_eq!(hash(&a), hash(&b));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let a = components(json!({"userAgent": "UA"}));
        let b = components(json!({"userAgent": "UA", "batteryLevel": 0.8, "junk": [1, 2]}));
        assert_eq!(hash(&a), hash(&b));
    }

    #[test]
    fn test_malformed_values_ignored_not_fatal() {
        let raw = components(json!({
            "userAgent": 42,
            "screenResolution": "1920x1080",
            "webgl": "not-an-object",
            "languages": [1, 2, 3]
        }));
        let normalized = normalize(&raw);
        assert!(normalized.is_empty());
    }

    #[test]
    fn test_screen_resolution_rounded_for_privacy() {
        let a = components(json!({"screenResolution": [1918, 1082]}));
        let b = components(json!({"screenResolution": [1920, 1080]}));
        assert_eq!(hash(&a), hash(&b));

        let normalized = normalize(&a);
        assert_eq!(normalized["screen_width"], json!(1900));
        assert_eq!(normalized["screen_height"], json!(1100));
    }

    #[test]
    fn test_pixel_ratio_rounded_to_one_decimal() {
        let raw = components(json!({"pixelRatio": 1.2499}));
        let normalized = normalize(&raw);
        assert_eq!(normalized["pixel_ratio"], json!(1.2));
    }

    #[test]
    fn test_confidence_full_set_caps_at_100() {
        assert_eq!(confidence(&full_fingerprint()), 100);
    }

    #[test]
    fn test_confidence_empty_is_zero() {
        assert_eq!(confidence(&Map::new()), 0);
    }

    #[test]
    fn test_confidence_partial() {
        // userAgent 10 + language 5 + screenResolution 15 + timezone 10 = 40
        let raw = components(json!({
            "userAgent": "UA",
            "language": "en",
            "screenResolution": [1280, 720],
            "timezone": "UTC"
        }));
        assert_eq!(confidence(&raw), 40);
    }

    #[test]
    fn test_confidence_monotone_in_added_signals() {
        let mut raw = Map::new();
        let mut last = confidence(&raw);
        let signals = [
            ("userAgent", json!("UA")),
            ("language", json!("en")),
            ("screenResolution", json!([1920, 1080])),
            ("timezone", json!("UTC")),
            ("hardwareConcurrency", json!(8)),
            ("deviceMemory", json!(8)),
            ("canvas", json!("sig")),
            ("webgl", json!({"vendor": "v", "renderer": "r"})),
            ("fonts", Value::Array(vec![json!("Arial"); 25])),
            ("plugins", json!(["p"])),
        ];
        for (key, value) in signals {
            raw.insert(key.to_string(), value);
            let next = confidence(&raw);
            assert!(next >= last, "adding {} lowered the score", key);
            last = next;
        }
    }

    #[test]
    fn test_font_count_scales_confidence() {
        let fonts = |n: usize| {
            let mut raw = Map::new();
            raw.insert("fonts".to_string(), Value::Array(vec![json!("a"); n]));
            raw
        };
        let few = fonts(9);
        let some = fonts(50);
        let many = fonts(500);
        assert_eq!(confidence(&few), 0);
        assert_eq!(confidence(&some), 5);
        assert_eq!(confidence(&many), 10);
    }

    #[test]
    fn test_canonical_json_sorted_and_compact() {
        let value = json!({"z": 1, "a": {"c": 2, "b": 3}});
        assert_eq!(to_canonical_json(&value), r#"{"a":{"b":3,"c":2},"z":1}"#);
    }
}
