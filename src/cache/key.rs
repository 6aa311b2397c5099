//! Key Derivation Module
//!
//! Turns caller lookup parameters into namespace-local entry keys.

use serde_json::Value;

// == Derive Key ==
/// Derives the entry key for a set of lookup parameters.
///
/// A JSON string is used verbatim. Anything else is serialized canonically
/// (object keys in lexicographic order at every depth) and folded through
/// [`rolling_hash`], so two parameter objects with the same fields produce
/// the same key regardless of construction order.
///
/// The hash is 32 bits and non-cryptographic. Collisions between distinct
/// parameter shapes are not detected.
pub fn derive_key(params: &Value) -> String {
    match params {
        Value::String(literal) => literal.clone(),
        other => rolling_hash(&canonical_json(other)),
    }
}

/// Serializes a value with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

// == Rolling Hash ==
/// 32-bit polynomial rolling hash (multiplier 31) over UTF-16 code units,
/// rendered as the absolute value in radix 36.
pub fn rolling_hash(input: &str) -> String {
    let hash = input
        .encode_utf16()
        .fold(0i32, |acc, unit| acc.wrapping_mul(31).wrapping_add(i32::from(unit)));
    to_radix36(hash.unsigned_abs())
}

fn to_radix36(mut n: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_key_is_verbatim() {
        assert_eq!(derive_key(&json!("product_cleaning")), "product_cleaning");
    }

    #[test]
    fn test_field_order_does_not_matter() {
        let mut a = serde_json::Map::new();
        a.insert("waterConsumption".into(), json!("medium"));
        a.insert("cleaningProducts".into(), json!("standard"));

        let mut b = serde_json::Map::new();
        b.insert("cleaningProducts".into(), json!("standard"));
        b.insert("waterConsumption".into(), json!("medium"));

        let (a, b) = (Value::Object(a), Value::Object(b));
        // Plain serialization keeps insertion order, so only the canonical
        // form can make these agree.
        assert_ne!(a.to_string(), b.to_string());
        assert_eq!(canonical_json(&a), canonical_json(&b));
        assert_eq!(derive_key(&a), derive_key(&b));
    }

    #[test]
    fn test_nested_field_order_does_not_matter() {
        let a = json!({"filters": {"region": "eu", "tier": 2}, "year": 2024});
        let b = json!({"year": 2024, "filters": {"tier": 2, "region": "eu"}});

        assert_ne!(a.to_string(), b.to_string());
        assert_eq!(derive_key(&a), derive_key(&b));
    }

    #[test]
    fn test_different_values_differ() {
        let a = derive_key(&json!({"cleaningProducts": "standard", "waterConsumption": "medium"}));
        let b = derive_key(&json!({"cleaningProducts": "standard", "waterConsumption": "high"}));
        assert_ne!(a, b);
    }

    #[test]
    fn test_canonical_json_sorts_nested_objects() {
        let value = json!({"b": {"z": 1, "a": [true, null]}, "a": "x"});
        assert_eq!(canonical_json(&value), r#"{"a":"x","b":{"a":[true,null],"z":1}}"#);
    }

    #[test]
    fn test_rolling_hash_known_values() {
        assert_eq!(rolling_hash(""), "0");
        // 'a' = 97 = 2*36 + 25
        assert_eq!(rolling_hash("a"), "2p");
        // "ab" = 97*31 + 98 = 3105 = 2*1296 + 14*36 + 9
        assert_eq!(rolling_hash("ab"), "2e9");
    }

    #[test]
    fn test_rolling_hash_wraps_without_panicking() {
        let long = "x".repeat(10_000);
        let key = rolling_hash(&long);
        assert!(!key.is_empty());
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
