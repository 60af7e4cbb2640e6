//! Canonical JSON for hashing and signing
//!
//! Block hashes and transaction signatures are computed over JSON text, so the
//! exact bytes are part of the wire contract between nodes. Values go through
//! serde_json with [`CanonicalFormatter`], which pins the two places the
//! default formatter disagrees with what peers hash: `f32` values print in
//! their shortest form (`1`, not `1.0`), and `<`, `>`, `&`, U+2028 and U+2029
//! are written as unicode escapes.

use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};
use std::io::{self, Write};

/// serde_json formatter producing the bytes block hashes and signatures cover.
#[derive(Debug, Default, Clone, Copy)]
pub struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
    fn write_f32<W>(&mut self, writer: &mut W, value: f32) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        writer.write_all(format_f32(value).as_bytes())
    }

    // serde_json already escapes quotes, backslashes and control characters
    // before handing over a fragment; only the HTML-sensitive set is left.
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        let mut start = 0;
        for (index, c) in fragment.char_indices() {
            let escaped = match c {
                '<' => "\\u003c",
                '>' => "\\u003e",
                '&' => "\\u0026",
                '\u{2028}' => "\\u2028",
                '\u{2029}' => "\\u2029",
                _ => continue,
            };
            writer.write_all(fragment[start..index].as_bytes())?;
            writer.write_all(escaped.as_bytes())?;
            start = index + c.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

/// Serializes `value` with [`CanonicalFormatter`].
///
/// The hashing views in this crate are plain structs of strings, integers,
/// floats and sequences; serializing them into memory cannot fail.
pub fn to_canonical_vec<T>(value: &T) -> Vec<u8>
where
    T: ?Sized + Serialize,
{
    let mut out = Vec::with_capacity(128);
    let mut serializer = Serializer::with_formatter(&mut out, CanonicalFormatter);
    value
        .serialize(&mut serializer)
        .expect("canonical JSON serialization into memory should never fail");
    out
}

/// Shortest decimal that round-trips through f32.
///
/// Magnitudes below 1e-6 or at/above 1e21 switch to exponent form with an
/// explicit sign on positive exponents (`1e+21`, `1.5e-7`). serde_json never
/// passes NaN or the infinities here; they serialize as `null`.
pub fn format_f32(value: f32) -> String {
    let abs = value.abs();
    if abs != 0.0 && (abs < 1e-6 || abs >= 1e21) {
        let formatted = format!("{value:e}");
        match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => formatted,
        }
    } else {
        format!("{value}")
    }
}
