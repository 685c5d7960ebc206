//! Scalar element types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Element type of a scalar argument or of an array's items.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScalarType {
    /// Boolean (1 byte).
    Bool,
    /// 8-bit signed integer.
    Int8,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 8-bit unsigned integer.
    UInt8,
    /// 16-bit unsigned integer.
    UInt16,
    /// 32-bit unsigned integer.
    UInt32,
    /// 64-bit unsigned integer.
    UInt64,
    /// 32-bit floating point (single precision).
    Float32,
    /// 64-bit floating point (double precision).
    Float64,
    /// Complex number (single precision).
    Complex64,
    /// Complex number (double precision).
    Complex128,
}

impl ScalarType {
    /// The type's name in the host runtime's signature language.
    #[must_use]
    pub const fn ndt_name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Complex64 => "complex64",
            Self::Complex128 => "complex128",
        }
    }

    /// The default C spelling of the type.
    #[must_use]
    pub const fn c_type(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8_t",
            Self::Int16 => "int16_t",
            Self::Int32 => "int32_t",
            Self::Int64 => "int64_t",
            Self::UInt8 => "uint8_t",
            Self::UInt16 => "uint16_t",
            Self::UInt32 => "uint32_t",
            Self::UInt64 => "uint64_t",
            Self::Float32 => "float",
            Self::Float64 => "double",
            Self::Complex64 => "float complex",
            Self::Complex128 => "double complex",
        }
    }

    /// Returns the size in bytes of this type.
    #[must_use]
    pub const fn size_bytes(self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 | Self::Complex64 => 8,
            Self::Complex128 => 16,
        }
    }

    /// Returns true if this is a floating-point or complex type.
    #[must_use]
    pub const fn is_inexact(self) -> bool {
        matches!(
            self,
            Self::Float32 | Self::Float64 | Self::Complex64 | Self::Complex128
        )
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ndt_name())
    }
}

/// Error returned when a type name is not recognised.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown scalar type `{0}`")]
pub struct UnknownScalarType(pub String);

impl FromStr for ScalarType {
    type Err = UnknownScalarType;

    /// Accepts the signature names plus the common C spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s.trim() {
            "bool" => Self::Bool,
            "int8" | "int8_t" | "char" | "signed char" => Self::Int8,
            "int16" | "int16_t" | "short" => Self::Int16,
            "int32" | "int32_t" | "int" => Self::Int32,
            "int64" | "int64_t" | "long" | "long long" => Self::Int64,
            "uint8" | "uint8_t" | "unsigned char" => Self::UInt8,
            "uint16" | "uint16_t" | "unsigned short" => Self::UInt16,
            "uint32" | "uint32_t" | "unsigned" | "unsigned int" => Self::UInt32,
            "uint64" | "uint64_t" | "unsigned long" => Self::UInt64,
            "float32" | "float" => Self::Float32,
            "float64" | "double" => Self::Float64,
            "complex64" | "float complex" => Self::Complex64,
            "complex128" | "double complex" => Self::Complex128,
            other => return Err(UnknownScalarType(other.to_string())),
        };
        Ok(ty)
    }
}

impl TryFrom<String> for ScalarType {
    type Error = UnknownScalarType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScalarType> for String {
    fn from(value: ScalarType) -> Self {
        value.ndt_name().to_string()
    }
}
