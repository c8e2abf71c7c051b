mod board;
mod mill;
mod partner;
mod user;

pub use board::*;
pub use mill::*;
pub use partner::*;
pub use user::*;

/// A stored enum value that does not match any known variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Deserialize a field that distinguishes "absent" from "explicitly null".
///
/// Used with `#[serde(default, deserialize_with = "double_option")]` on
/// `Option<Option<T>>` patch fields.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    serde::Deserialize::deserialize(deserializer).map(Some)
}
