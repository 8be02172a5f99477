//! # Render Error Types
//!
//! All recoverable errors of the render layer. Lifetime and sizing defects
//! are not errors: they panic where they are detected.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Binding category inside a bind table, in write order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BindingCategory {
    /// Vertex buffer bindings.
    VertexBuffer = 0,
    /// Constant (uniform) buffer bindings.
    ConstantBuffer = 1,
    /// Read-only texture or buffer bindings.
    Read = 2,
    /// Read-write texture or buffer bindings.
    ReadWrite = 3,
    /// Sampler bindings.
    Sampler = 4,
}

impl BindingCategory {
    /// All categories in their fixed write order.
    pub const ALL: [Self; 5] = [
        Self::VertexBuffer,
        Self::ConstantBuffer,
        Self::Read,
        Self::ReadWrite,
        Self::Sampler,
    ];
}

impl fmt::Display for BindingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::VertexBuffer => "vertex buffer",
            Self::ConstantBuffer => "constant buffer",
            Self::Read => "read",
            Self::ReadWrite => "read-write",
            Self::Sampler => "sampler",
        })
    }
}

/// Errors from encoding or decoding a bind table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindTableError {
    /// Fewer bindings were written than the header declared.
    #[error("bind table underfilled: {filled} of {declared} {category} bindings written")]
    Underfilled {
        /// The short category.
        category: BindingCategory,
        /// Count declared in the header.
        declared: u16,
        /// Count actually written.
        filled: u16,
    },

    /// The aux bytes are shorter than the layout requires.
    #[error("bind table truncated: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes the layout needs.
        needed: usize,
        /// Bytes available.
        available: usize,
    },

    /// The table was never validated by its filler.
    #[error("bind table was not validated")]
    NotValidated,
}

/// Errors of the render layer.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Configuration text is not valid TOML for [`RenderConfig`](crate::RenderConfig).
    #[error("invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// The file that failed.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// Configuration values are out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A bind table failed validation.
    #[error(transparent)]
    BindTable(#[from] BindTableError),
}

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_underfilled_message_names_category() {
        let err = BindTableError::Underfilled {
            category: BindingCategory::Sampler,
            declared: 2,
            filled: 1,
        };
        assert_eq!(
            err.to_string(),
            "bind table underfilled: 1 of 2 sampler bindings written"
        );
    }

    #[test]
    fn test_bind_table_error_converts() {
        let err: RenderError = BindTableError::NotValidated.into();
        assert!(matches!(err, RenderError::BindTable(BindTableError::NotValidated)));
    }
}
