//! Serde helpers for the scheduler's wire format.

use serde::{Deserialize, Deserializer};

/// Deserialize a value that the scheduler may send as `null`, substituting
/// the type's default.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
