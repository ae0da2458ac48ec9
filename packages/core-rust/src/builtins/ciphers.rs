//! Built-in reversible encodings.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::registry::{Cipher, CipherError};
use crate::types::Value;

/// Bytes of a string or binary value; anything else is unsupported.
fn plain_bytes(cipher: &'static str, value: &Value) -> Result<Vec<u8>, CipherError> {
    match value {
        Value::String(s) => Ok(s.as_bytes().to_vec()),
        Value::Bytes(b) => Ok(b.clone()),
        other => Err(CipherError::UnsupportedValue {
            cipher,
            kind: other.kind(),
        }),
    }
}

fn encoded_text<'a>(cipher: &'static str, value: &'a Value) -> Result<&'a str, CipherError> {
    value.as_str().ok_or(CipherError::UnsupportedValue {
        cipher,
        kind: value.kind(),
    })
}

/// Decoded bytes become a string when they are valid UTF-8.
fn from_bytes(bytes: Vec<u8>) -> Value {
    match String::from_utf8(bytes) {
        Ok(text) => Value::String(text),
        Err(err) => Value::Bytes(err.into_bytes()),
    }
}

/// Standard-alphabet, padded base64.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Cipher;

impl Cipher for Base64Cipher {
    fn encode(&self, value: &Value) -> Result<Value, CipherError> {
        plain_bytes("base64", value).map(|bytes| Value::String(BASE64.encode(bytes)))
    }

    fn decode(&self, value: &Value) -> Result<Value, CipherError> {
        let text = encoded_text("base64", value)?;
        BASE64
            .decode(text.trim())
            .map(from_bytes)
            .map_err(|err| CipherError::Malformed {
                cipher: "base64",
                reason: err.to_string(),
            })
    }
}

/// Lowercase hexadecimal.
#[derive(Debug, Clone, Copy, Default)]
pub struct HexCipher;

impl Cipher for HexCipher {
    fn encode(&self, value: &Value) -> Result<Value, CipherError> {
        plain_bytes("hex", value).map(|bytes| Value::String(hex::encode(bytes)))
    }

    fn decode(&self, value: &Value) -> Result<Value, CipherError> {
        let text = encoded_text("hex", value)?;
        hex::decode(text.trim())
            .map(from_bytes)
            .map_err(|err| CipherError::Malformed {
                cipher: "hex",
                reason: err.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_round_trips_text() {
        let encoded = Base64Cipher.encode(&Value::from("hi")).unwrap();
        assert_eq!(encoded, Value::from("aGk="));
        assert_eq!(Base64Cipher.decode(&encoded).unwrap(), Value::from("hi"));
    }

    #[test]
    fn base64_keeps_binary_as_bytes() {
        let encoded = Base64Cipher.encode(&Value::Bytes(vec![0xff, 0x00])).unwrap();
        assert_eq!(Base64Cipher.decode(&encoded).unwrap(), Value::Bytes(vec![0xff, 0x00]));
    }

    #[test]
    fn base64_rejects_malformed_input() {
        assert!(matches!(
            Base64Cipher.decode(&Value::from("not base64!")),
            Err(CipherError::Malformed { cipher: "base64", .. })
        ));
        assert_eq!(
            Base64Cipher.encode(&Value::from(5)),
            Err(CipherError::UnsupportedValue {
                cipher: "base64",
                kind: "int"
            })
        );
    }

    #[test]
    fn hex_round_trips_text() {
        let encoded = HexCipher.encode(&Value::from("ok")).unwrap();
        assert_eq!(encoded, Value::from("6f6b"));
        assert_eq!(HexCipher.decode(&encoded).unwrap(), Value::from("ok"));
        assert!(HexCipher.decode(&Value::from("zz")).is_err());
    }
}
