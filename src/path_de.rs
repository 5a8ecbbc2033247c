//! Path-aware deserialization: errors name the JSON path of the node
//! that failed to match.
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(into_error)
}

pub fn from_slice_with_path<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize::<_, T>(de).map_err(into_error)
}

/// Deserialize a node of a larger document found at `at` (`$.a[0]`).
pub fn from_value_at<T: DeserializeOwned>(value: &serde_json::Value, at: &str) -> Result<T> {
    serde_path_to_error::deserialize::<_, T>(value.clone()).map_err(|err| located(at, err))
}

fn into_error(err: serde_path_to_error::Error<serde_json::Error>) -> Error {
    located("$", err)
}

fn located(at: &str, err: serde_path_to_error::Error<serde_json::Error>) -> Error {
    let path = match err.path().to_string() {
        p if p == "." => at.to_string(),
        p if p.starts_with('[') => format!("{at}{p}"),
        p => format!("{at}.{p}"),
    };
    Error::Manifest { path, message: err.into_inner().to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::HandlerDescriptor;

    #[test]
    fn error_names_the_failing_node() {
        let src = r#"[{ "name": "getEvent", "method": "FETCH", "path": "/events" }]"#;
        let err = from_str_with_path::<Vec<HandlerDescriptor>>(src).unwrap_err();
        match err {
            Error::Manifest { path, .. } => {
                assert!(path.starts_with("$[0]"));
                assert!(path.ends_with("method"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn message_is_plain_text() {
        let err = from_str_with_path::<Vec<HandlerDescriptor>>(r#"[{ "name": 1 }]"#).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("manifest error at JSON path $[0]"), "{message}");
        assert!(message.is_ascii(), "{message}");
    }
}
