// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Tagged scalar values and the numeric coercion rules.
//!
//! Every port carries a [`Value`]. Only the numeric variants participate in
//! computation; strings are pass-through and never reach an arithmetic path.
//! Coercion is applied uniformly at edge writes, node reads, and node writes:
//! int→float and f32↔f64 use standard IEEE-754 conversion, float→int
//! truncates toward zero (saturating at the integer bounds). Precision loss
//! is silent and deterministic, never an error.
//!
//! Change detection is bitwise-by-value ([`Value::bits_eq`]): `i32` by `==`,
//! floats by `to_bits()`, strings by byte equality. A NaN therefore compares
//! equal to itself and does not propagate forever, and `0.0` vs `-0.0`
//! counts as a change.

use std::fmt;

use serde::Serialize;

/// Declared data type of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// 32-bit signed integer.
    I32,
    /// 32-bit IEEE-754 float.
    F32,
    /// 64-bit IEEE-754 float.
    F64,
    /// UTF-8 string. Load-time only; never on a compute path.
    Str,
}

impl DType {
    /// Parses a document type spelling.
    ///
    /// Accepts the canonical names (`i32`, `f32`, `f64`, `str`) and the
    /// legacy spellings used by the original flow files (`int`, `float`,
    /// `double`, `string`), with an optional `async_` prefix stripped.
    #[must_use]
    pub fn parse(spelling: &str) -> Option<Self> {
        let base = spelling.strip_prefix("async_").unwrap_or(spelling);
        match base {
            "i32" | "int" => Some(Self::I32),
            "f32" | "float" => Some(Self::F32),
            "f64" | "double" => Some(Self::F64),
            "str" | "string" => Some(Self::Str),
            _ => None,
        }
    }

    /// Returns `true` for the numeric types.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::Str)
    }

    /// Canonical lowercase name, as exposed by descriptor tables.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::I32 => "i32",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Str => "str",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A tagged scalar carried on a port.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// 32-bit signed integer.
    I32(i32),
    /// 32-bit float.
    F32(f32),
    /// 64-bit float.
    F64(f64),
    /// UTF-8 string (pass-through only).
    Str(String),
}

impl Value {
    /// The type tag of this value.
    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            Self::I32(_) => DType::I32,
            Self::F32(_) => DType::F32,
            Self::F64(_) => DType::F64,
            Self::Str(_) => DType::Str,
        }
    }

    /// The type-appropriate zero (`0`, `0.0`, `0.0`, `""`).
    #[must_use]
    pub fn zero(dtype: DType) -> Self {
        match dtype {
            DType::I32 => Self::I32(0),
            DType::F32 => Self::F32(0.0),
            DType::F64 => Self::F64(0.0),
            DType::Str => Self::Str(String::new()),
        }
    }

    /// Reads this value as `f64`. Strings read as zero.
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::I32(v) => f64::from(*v),
            Self::F32(v) => f64::from(*v),
            Self::F64(v) => *v,
            Self::Str(_) => 0.0,
        }
    }

    /// Reads this value as `f32`. Strings read as zero.
    #[must_use]
    pub fn as_f32(&self) -> f32 {
        match self {
            Self::I32(v) => *v as f32,
            Self::F32(v) => *v,
            Self::F64(v) => *v as f32,
            Self::Str(_) => 0.0,
        }
    }

    /// Reads this value as `i32`, truncating toward zero. Strings read as
    /// zero.
    #[must_use]
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::I32(v) => *v,
            Self::F32(v) => *v as i32,
            Self::F64(v) => *v as i32,
            Self::Str(_) => 0,
        }
    }

    /// Coerces this value into `target`.
    ///
    /// Numeric targets apply the conversion rules above. A `Str` target
    /// passes a string through unchanged; a numeric value asked to become a
    /// string yields the empty string (such an edge is rejected at load, so
    /// this is a defensive default, not a reachable conversion).
    #[must_use]
    pub fn coerce_to(&self, target: DType) -> Self {
        match target {
            DType::I32 => Self::I32(self.as_i32()),
            DType::F32 => Self::F32(self.as_f32()),
            DType::F64 => Self::F64(self.as_f64()),
            DType::Str => match self {
                Self::Str(s) => Self::Str(s.clone()),
                _ => Self::Str(String::new()),
            },
        }
    }

    /// Bitwise-by-value equality used for change detection.
    ///
    /// Values of different type tags never compare equal.
    #[must_use]
    pub fn bits_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::I32(a), Self::I32(b)) => a == b,
            (Self::F32(a), Self::F32(b)) => a.to_bits() == b.to_bits(),
            (Self::F64(a), Self::F64(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
        }
    }
}
