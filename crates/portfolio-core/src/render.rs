//! Serialization helpers for API-facing records.

use serde::Serializer;

/// Serialize a nullable text column as `""` when it is NULL.
pub fn or_empty<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(value.as_deref().unwrap_or_default())
}

/// Interpret a nullable `0`/`1` column; only `1` is true.
#[must_use]
pub fn flag(value: Option<i64>) -> bool {
    value == Some(1)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Row {
        #[serde(serialize_with = "or_empty")]
        tagline: Option<String>,
    }

    #[test]
    fn null_text_renders_empty() {
        let json = serde_json::to_string(&Row { tagline: None }).unwrap();
        assert_eq!(json, r#"{"tagline":""}"#);
        let json = serde_json::to_string(&Row {
            tagline: Some("hi".into()),
        })
        .unwrap();
        assert_eq!(json, r#"{"tagline":"hi"}"#);
    }

    #[test]
    fn flags_are_strict() {
        assert!(flag(Some(1)));
        assert!(!flag(Some(0)));
        assert!(!flag(Some(2)));
        assert!(!flag(None));
    }
}
