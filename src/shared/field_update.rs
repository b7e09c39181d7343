//! Explicit field presence for partial updates.
//!
//! `FieldUpdate<T>` distinguishes "leave as is" from "clear" from "set", which
//! a plain `Option<T>` cannot do for nullable fields.
//!
//! In JSON: a missing key is `Unchanged`, `null` is `Clear`, a value is `Set`.
//! Pair with `#[serde(default)]` on the containing struct field.

use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldUpdate<T> {
    #[default]
    Unchanged,
    Clear,
    Set(T),
}

impl<T> FieldUpdate<T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }

    pub fn as_ref(&self) -> FieldUpdate<&T> {
        match self {
            Self::Unchanged => FieldUpdate::Unchanged,
            Self::Clear => FieldUpdate::Clear,
            Self::Set(v) => FieldUpdate::Set(v),
        }
    }
}

impl<T> From<Option<T>> for FieldUpdate<T> {
    /// `None` maps to `Clear`; use `FieldUpdate::Unchanged` explicitly for "absent".
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Set(v),
            None => Self::Clear,
        }
    }
}

impl<'de, T> Deserialize<'de> for FieldUpdate<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Only reached when the key is present; absent keys hit `Default`.
        Option::<T>::deserialize(deserializer).map(FieldUpdate::from)
    }
}
