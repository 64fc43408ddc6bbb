//! Decrypted notification payloads.
//!
//! Senders put the displayable fields either at the top level of the JSON
//! object or under a `notification` member, with application data under
//! `data`. Both layouts parse to the same [`Notification`]; the full JSON
//! object is kept in [`Notification::raw`] for consumers that need more.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A decrypted notification.
///
/// # Examples
///
/// ```
/// use pushframe::notification::Notification;
///
/// let n = Notification::from_json(br#"{"title":"Hi","body":"there","data":{"k":1}}"#)
///     .expect("valid JSON");
/// assert_eq!(n.title, "Hi");
/// assert_eq!(n.data["k"], 1);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Notification {
    /// Notification title, empty when absent.
    pub title: String,
    /// Notification body, empty when absent.
    pub body: String,
    /// Application key/value data.
    pub data: BTreeMap<String, Value>,
    /// The decrypted JSON document as received.
    pub raw: Value,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct Displayable {
    title: Option<String>,
    body: Option<String>,
}

#[derive(Deserialize)]
struct Wire {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    notification: Option<Displayable>,
    #[serde(default)]
    data: Option<BTreeMap<String, Value>>,
}

impl Notification {
    /// Parse a decrypted plaintext.
    ///
    /// # Errors
    ///
    /// Returns an error if `plaintext` is not a JSON object.
    pub fn from_json(plaintext: &[u8]) -> Result<Self, serde_json::Error> {
        let raw: Value = serde_json::from_slice(plaintext)?;
        let wire = Wire::deserialize(&raw)?;
        let nested = wire.notification.unwrap_or_default();
        Ok(Self {
            title: nested.title.or(wire.title).unwrap_or_default(),
            body: nested.body.or(wire.body).unwrap_or_default(),
            data: wire.data.unwrap_or_default(),
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case::flat(json!({"title": "T", "body": "B", "data": {"id": "7"}}))]
    #[case::nested(json!({"notification": {"title": "T", "body": "B"}, "data": {"id": "7"}}))]
    fn both_layouts_parse_alike(#[case] doc: Value) {
        let bytes = serde_json::to_vec(&doc).expect("serialise");
        let n = Notification::from_json(&bytes).expect("parse");
        assert_eq!(n.title, "T");
        assert_eq!(n.body, "B");
        assert_eq!(n.data.get("id"), Some(&json!("7")));
        assert_eq!(n.raw, doc);
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let n = Notification::from_json(b"{}").expect("parse");
        assert_eq!(n.title, "");
        assert_eq!(n.body, "");
        assert!(n.data.is_empty());
    }

    #[rstest]
    #[case(b"not json".as_slice())]
    #[case(b"[1, 2]".as_slice())]
    #[case(b"{\"data\": 5}".as_slice())]
    fn non_object_payloads_fail(#[case] bytes: &[u8]) {
        assert!(Notification::from_json(bytes).is_err());
    }
}
