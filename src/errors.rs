//! Crate-level error type.
//!
//! Mirrors the taxonomy in SPEC_FULL.md §7: invariant violations and I/O
//! failures are fatal and get a typed variant here; "structural rejections"
//! (tangle too big, zero safe crossings, ...) are never represented as an
//! `Err` — callers log a warning and skip the record instead.

use std::fmt;

#[derive(Debug)]
pub enum AssemblyError {
    /// A programmer-visible invariant was violated (mapping cardinality,
    /// union-find root consistency, negative betweenness, an impossible
    /// doublestrand self-merge, an out-of-range path index, ...).
    Invariant(String),
    /// File missing, truncated stream, or codec mismatch.
    Io(std::io::Error),
}

impl fmt::Display for AssemblyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssemblyError::Invariant(msg) => write!(f, "invariant violation: {msg}"),
            AssemblyError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for AssemblyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AssemblyError::Invariant(_) => None,
            AssemblyError::Io(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for AssemblyError {
    fn from(err: std::io::Error) -> Self {
        AssemblyError::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, AssemblyError>;

/// Shorthand for raising an invariant violation with a formatted message.
macro_rules! bail_invariant {
    ($($arg:tt)*) => {
        return Err($crate::errors::AssemblyError::Invariant(format!($($arg)*)))
    };
}
pub(crate) use bail_invariant;
