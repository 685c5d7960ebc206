//! Memory layout kinds and array kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Physical memory arrangement a wrapper expects for its array arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LayoutKind {
    /// Row-major contiguous (C order).
    #[serde(rename = "c", alias = "C", alias = "row-major")]
    RowMajor,
    /// Column-major contiguous (Fortran order).
    #[serde(rename = "fortran", alias = "Fortran", alias = "column-major")]
    ColumnMajor,
    /// Arbitrary strides, driven by the host's strided loop.
    #[serde(rename = "strided", alias = "Strided")]
    Strided,
    /// The host's opaque container type, passed whole.
    #[serde(rename = "xnd", alias = "Xnd", alias = "container")]
    Container,
}

impl LayoutKind {
    /// All layout kinds, in table-field order.
    pub const ALL: [Self; 4] = [
        Self::RowMajor,
        Self::ColumnMajor,
        Self::Strided,
        Self::Container,
    ];

    /// Field name of this kind in a kernel-table row, also used in
    /// wrapper entry-point names.
    #[must_use]
    pub const fn table_field(self) -> &'static str {
        match self {
            Self::RowMajor => "C",
            Self::ColumnMajor => "Fortran",
            Self::Strided => "Strided",
            Self::Container => "Xnd",
        }
    }

    /// Upper-case tag used in unimplemented-combination sentinels.
    #[must_use]
    pub const fn sentinel_tag(self) -> &'static str {
        match self {
            Self::RowMajor => "C",
            Self::ColumnMajor => "F",
            Self::Strided => "STRIDED",
            Self::Container => "XND",
        }
    }
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_field())
    }
}

/// Error returned when a layout name is not recognised.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown layout kind `{0}` (expected one of: c, fortran, strided, xnd)")]
pub struct UnknownLayoutKind(pub String);

impl FromStr for LayoutKind {
    type Err = UnknownLayoutKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "c" | "row-major" => Ok(Self::RowMajor),
            "fortran" | "f" | "column-major" => Ok(Self::ColumnMajor),
            "strided" => Ok(Self::Strided),
            "xnd" | "container" => Ok(Self::Container),
            _ => Err(UnknownLayoutKind(s.to_string())),
        }
    }
}

/// How array dimensions are described in a kernel's signature.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayKind {
    /// Fixed dimensions: literals stay literal, names become symbols.
    #[default]
    Symbolic,
    /// Variable dimensions: every dimension renders as `var`.
    Variable,
}

impl ArrayKind {
    /// Name used inside wrapper entry-point names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Symbolic => "symbolic",
            Self::Variable => "variable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_layouts() {
        assert_eq!("C".parse::<LayoutKind>(), Ok(LayoutKind::RowMajor));
        assert_eq!("fortran".parse::<LayoutKind>(), Ok(LayoutKind::ColumnMajor));
        assert_eq!("Xnd".parse::<LayoutKind>(), Ok(LayoutKind::Container));
        assert!("tiled".parse::<LayoutKind>().is_err());
    }

    #[test]
    fn test_serde_names() {
        let kinds: Vec<LayoutKind> = serde_json::from_str(r#"["c", "Fortran", "xnd"]"#).unwrap();
        assert_eq!(
            kinds,
            vec![LayoutKind::RowMajor, LayoutKind::ColumnMajor, LayoutKind::Container]
        );
        assert_eq!(
            serde_json::to_string(&LayoutKind::Strided).unwrap(),
            "\"strided\""
        );
    }
}
