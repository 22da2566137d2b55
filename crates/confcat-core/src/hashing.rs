//! Canonical serialization and content hashing.
//!
//! Canonical form:
//! - object keys sorted by UTF-16 code units
//! - numbers rendered with the ECMAScript `Number.prototype.toString` rules,
//!   so `1.0` and `1` produce the same bytes
//! - UTF-8, no whitespace
//!
//! The content hash is SHA-512 over the canonical bytes, hex encoded.

use serde_json::{Map, Value};
use sha2::{Digest, Sha512};

use crate::error::Error;
use crate::object::ObjectKind;

/// Serialize a JSON value into canonical bytes.
pub fn to_canonical_bytes(value: &Value) -> Result<Vec<u8>, Error> {
    let mut out = Vec::with_capacity(128);
    write_value(value, &mut out)?;
    Ok(out)
}

/// Serialize a JSON value into a canonical string.
pub fn to_canonical_string(value: &Value) -> Result<String, Error> {
    let bytes = to_canonical_bytes(value)?;
    String::from_utf8(bytes).map_err(|e| Error::Serialization(e.to_string()))
}

/// Hash raw bytes with SHA-512 and return lowercase hex.
pub fn sha512_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha512::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Content hash of a catalog object's semantic fields.
pub fn content_hash(
    kind: ObjectKind,
    version: &str,
    spec: &Value,
    description: &str,
) -> Result<String, Error> {
    let mut envelope = Map::new();
    envelope.insert("description".into(), Value::String(description.to_string()));
    envelope.insert("kind".into(), Value::String(kind.as_str().to_string()));
    envelope.insert("spec".into(), spec.clone());
    envelope.insert("version".into(), Value::String(version.to_string()));
    let bytes = to_canonical_bytes(&Value::Object(envelope))?;
    Ok(sha512_hex(&bytes))
}

fn write_value(value: &Value, out: &mut Vec<u8>) -> Result<(), Error> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => {
            let f = n
                .as_f64()
                .ok_or_else(|| Error::Serialization(format!("unrepresentable number {}", n)))?;
            out.extend_from_slice(format_number(f)?.as_bytes());
        }
        Value::String(s) => write_string(s, out)?,
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));
            out.push(b'{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(key, out)?;
                out.push(b':');
                write_value(&map[key], out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn write_string(s: &str, out: &mut Vec<u8>) -> Result<(), Error> {
    serde_json::to_writer(&mut *out, s).map_err(|e| Error::Serialization(e.to_string()))
}

/// Render a finite `f64` the way ECMAScript `Number.prototype.toString` does.
pub fn format_number(value: f64) -> Result<String, Error> {
    if !value.is_finite() {
        return Err(Error::Serialization(format!(
            "non-finite number {} has no canonical form",
            value
        )));
    }
    if value == 0.0 {
        return Ok("0".to_string());
    }
    if value < 0.0 {
        return Ok(format!("-{}", format_number(-value)?));
    }

    // `{:e}` yields the shortest round-trip digits, e.g. "1.2345e6".
    let sci = format!("{:e}", value);
    let (mantissa, exponent) = sci
        .split_once('e')
        .ok_or_else(|| Error::Serialization(format!("unexpected float format {}", sci)))?;
    let exponent: i32 = exponent
        .parse()
        .map_err(|_| Error::Serialization(format!("unexpected float format {}", sci)))?;
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    let n = exponent + 1;

    let rendered = if k <= n && n <= 21 {
        let mut s = digits;
        s.extend(std::iter::repeat('0').take((n - k) as usize));
        s
    } else if 0 < n && n <= 21 {
        format!("{}.{}", &digits[..n as usize], &digits[n as usize..])
    } else if -6 < n && n <= 0 {
        format!("0.{}{}", "0".repeat((-n) as usize), digits)
    } else {
        let e = n - 1;
        let sign = if e < 0 { '-' } else { '+' };
        if k == 1 {
            format!("{}e{}{}", digits, sign, e.abs())
        } else {
            format!("{}.{}e{}{}", &digits[..1], &digits[1..], sign, e.abs())
        }
    };
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_formatting_matches_ecmascript() {
        let cases: &[(f64, &str)] = &[
            (0.0, "0"),
            (-0.0, "0"),
            (1.0, "1"),
            (-1.5, "-1.5"),
            (100.0, "100"),
            (0.1, "0.1"),
            (123.456, "123.456"),
            (0.000001, "0.000001"),
            (0.0000001, "1e-7"),
            (1.5e-7, "1.5e-7"),
            (1e21, "1e+21"),
            (1.2345e21, "1.2345e+21"),
            (1e20, "100000000000000000000"),
            (9007199254740991.0, "9007199254740991"),
            (5e-324, "5e-324"),
            (1.7976931348623157e308, "1.7976931348623157e+308"),
        ];
        for (value, expected) in cases {
            assert_eq!(format_number(*value).unwrap(), *expected, "value {}", value);
        }
        assert!(format_number(f64::NAN).is_err());
        assert!(format_number(f64::INFINITY).is_err());
    }

    #[test]
    fn test_integral_float_and_integer_agree() {
        let a = to_canonical_bytes(&json!({"max": 10.0})).unwrap();
        let b = to_canonical_bytes(&json!({"max": 10})).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_keys_sorted_and_no_whitespace() {
        let value = json!({"b": [1, {"z": true, "a": null}], "a": "x\ny"});
        assert_eq!(
            to_canonical_string(&value).unwrap(),
            r#"{"a":"x\ny","b":[1,{"a":null,"z":true}]}"#
        );
    }

    #[test]
    fn test_key_order_uses_utf16_units() {
        // U+FB01 sorts after U+1F600 in UTF-16 but before it in UTF-8.
        let value = json!({"\u{1F600}": 1, "\u{FB01}": 2});
        let s = to_canonical_string(&value).unwrap();
        assert!(s.find('\u{1F600}').unwrap() < s.find('\u{FB01}').unwrap());
    }

    #[test]
    fn test_content_hash_is_stable() {
        let spec = json!({"dataType": "Integer", "validation": {"maxValue": 10, "minValue": 0}});
        let reordered = json!({"validation": {"minValue": 0.0, "maxValue": 10}, "dataType": "Integer"});

        let h1 = content_hash(ObjectKind::ParameterSchema, "v1", &spec, "retries").unwrap();
        let h2 = content_hash(ObjectKind::ParameterSchema, "v1", &reordered, "retries").unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 128);

        let other_kind = content_hash(ObjectKind::CollectionSchema, "v1", &spec, "retries").unwrap();
        let other_desc = content_hash(ObjectKind::ParameterSchema, "v1", &spec, "").unwrap();
        assert_ne!(h1, other_kind);
        assert_ne!(h1, other_desc);
    }

    #[test]
    fn test_sha512_known_vector() {
        assert_eq!(
            sha512_hex(b"abc"),
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
    }
}
