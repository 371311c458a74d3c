use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{self, Write as _};

/// A SHA-256 digest rendered as 64 lowercase hex characters.
///
/// Content hashes are computed over canonical text forms, never over in-memory
/// layouts, so two values with the same meaning always share the same hash
/// regardless of how they were constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hashes the given canonical text.
    pub fn of(text: &str) -> Self {
        let digest = Sha256::digest(text.as_bytes());
        let mut hex = String::with_capacity(64);
        for byte in digest.iter() {
            let _ = write!(hex, "{byte:02x}");
        }
        Self(hex)
    }

    /// Returns the full 64-character hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the 16-character prefix used in store filenames.
    pub fn short(&self) -> &str {
        &self.0[..16]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Renders a coordinate for hashing: fixed-point with six decimal places,
/// with negative zero collapsed to zero.
///
/// Six decimals of an Angstrom is well below the convergence thresholds of the
/// external programs, so geometries that differ only by solver noise at the
/// seventh decimal place hash identically.
pub fn canonical_coordinate(value: f64) -> String {
    let text = format!("{value:.6}");
    if text == "-0.000000" {
        "0.000000".to_string()
    } else {
        text
    }
}

/// Renders a method-option float for hashing: scientific notation with six
/// significant decimals, with negative zero collapsed to zero.
pub fn canonical_float(value: f64) -> String {
    if value == 0.0 {
        return "0.000000e0".to_string();
    }
    format!("{value:.6e}")
}

/// Renders a keyword string for hashing: trimmed and lowercased.
pub fn canonical_keyword(value: &str) -> String {
    value.trim().to_lowercase()
}
