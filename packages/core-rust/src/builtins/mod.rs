//! Field types and ciphers shipped with the crate.
//!
//! | name      | kind   | accepts                                         |
//! |-----------|--------|-------------------------------------------------|
//! | `int`     | type   | integers, whole floats, numeric strings, bools  |
//! | `float`   | type   | numbers and numeric strings                     |
//! | `bool`    | type   | bools, `0`/`1`, `true`/`yes`/`on`/...           |
//! | `string`  | type   | strings and scalars                             |
//! | `time`    | type   | RFC 3339, `YYYY-MM-DD HH:MM:SS`, unix seconds   |
//! | `json`    | type   | objects, arrays, strings holding either         |
//! | `ints`    | type   | arrays or comma-separated integer lists         |
//! | `strings` | type   | arrays or comma-separated string lists          |
//! | `base64`  | cipher | strings and bytes                               |
//! | `hex`     | cipher | strings and bytes                               |

mod ciphers;
mod types;

use std::sync::Arc;

pub use ciphers::{Base64Cipher, HexCipher};
pub use types::{
    BoolType, FloatType, IntType, IntsType, JsonType, StringType, StringsType, TimeType,
};

use crate::registry::{CryptoRegistry, TypeRegistry};

/// Registers every built-in field type.
pub fn register_types(registry: &TypeRegistry) {
    registry.register("int", Arc::new(IntType));
    registry.register("float", Arc::new(FloatType));
    registry.register("bool", Arc::new(BoolType));
    registry.register("string", Arc::new(StringType));
    registry.register("time", Arc::new(TimeType));
    registry.register("json", Arc::new(JsonType));
    registry.register("ints", Arc::new(IntsType));
    registry.register("strings", Arc::new(StringsType));
}

/// Registers every built-in cipher.
pub fn register_ciphers(registry: &CryptoRegistry) {
    registry.register("base64", Arc::new(Base64Cipher));
    registry.register("hex", Arc::new(HexCipher));
}
