//! Serde support for partial-update payloads.
//!
//! A patch field of type `Option<Option<T>>` reads as:
//! - `None`: key absent, leave the column alone.
//! - `Some(None)`: key present with `null`, clear the column.
//! - `Some(Some(v))`: key present, write `v`.

use serde::{Deserialize, Deserializer};

/// Keeps a present-but-null key distinguishable from an absent one.
///
/// Pair with `#[serde(default)]` so absent keys become `None`.
pub fn deserialize_present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "super::deserialize_present")]
        due_date: Option<Option<String>>,
    }

    #[test]
    fn absent_null_and_value_are_distinct() {
        let absent: Probe = serde_json::from_str("{}").unwrap();
        let null: Probe = serde_json::from_str(r#"{"due_date":null}"#).unwrap();
        let value: Probe = serde_json::from_str(r#"{"due_date":"2024-01-15"}"#).unwrap();

        assert_eq!(absent.due_date, None);
        assert_eq!(null.due_date, Some(None));
        assert_eq!(value.due_date, Some(Some("2024-01-15".to_string())));
    }
}
