//! Bookmark model and its JSON exchange format.
//!
//! A [`BookmarkSet`] is what gets stored in the library's `#bookmarks`
//! column. The serialized form is pretty-printed JSON with a four-space
//! indent and a single `bookmarks` list, one object per bookmark keyed by
//! the device's column names.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::BookmarkError;

// ---------------------------------------------------------------------------
// Device flag
// ---------------------------------------------------------------------------

/// A boolean-like device column (`Hidden`, `Published`).
///
/// The device stores these as the text `'true'` / `'false'`. Older exports
/// and other tools may carry real booleans or integers, so all three are
/// accepted on input; output is always the text form. A NULL column is
/// exported as `null` and reads as false, the same as the column default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceFlag(pub bool);

impl DeviceFlag {
    pub const TRUE: DeviceFlag = DeviceFlag(true);
    pub const FALSE: DeviceFlag = DeviceFlag(false);

    /// The text representation written to the device and to JSON.
    pub fn as_str(self) -> &'static str {
        if self.0 {
            "true"
        } else {
            "false"
        }
    }

    /// Parse the device's text representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(Self::TRUE),
            "false" | "0" | "" => Some(Self::FALSE),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DeviceFlag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DeviceFlag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FlagVisitor;

        impl<'de> Visitor<'de> for FlagVisitor {
            type Value = DeviceFlag;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("\"true\", \"false\", a boolean, an integer or null")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<DeviceFlag, E> {
                Ok(DeviceFlag(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<DeviceFlag, E> {
                Ok(DeviceFlag(v != 0))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<DeviceFlag, E> {
                Ok(DeviceFlag(v != 0))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<DeviceFlag, E> {
                DeviceFlag::parse(v).ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
            }

            fn visit_unit<E: de::Error>(self) -> Result<DeviceFlag, E> {
                Ok(DeviceFlag::FALSE)
            }

            fn visit_none<E: de::Error>(self) -> Result<DeviceFlag, E> {
                Ok(DeviceFlag::FALSE)
            }
        }

        deserializer.deserialize_any(FlagVisitor)
    }
}

// ---------------------------------------------------------------------------
// Bookmark
// ---------------------------------------------------------------------------

/// One highlight or annotation inside a book.
///
/// Location fields are opaque device identifiers and are copied verbatim.
/// `content_id` is relative to the book's own path on the device.
///
/// Equality is structural over every field, so a difference in metadata
/// alone (e.g. `date_modified`) makes two versions unequal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    #[serde(rename = "BookmarkID")]
    pub bookmark_id: String,
    #[serde(rename = "ContentID")]
    pub content_id: String,
    #[serde(rename = "StartContainerPath")]
    pub start_container_path: String,
    #[serde(rename = "StartContainerChildIndex")]
    pub start_container_child_index: i64,
    #[serde(rename = "StartOffset")]
    pub start_offset: i64,
    #[serde(rename = "EndContainerPath")]
    pub end_container_path: String,
    #[serde(rename = "EndContainerChildIndex")]
    pub end_container_child_index: i64,
    #[serde(rename = "EndOffset")]
    pub end_offset: i64,
    #[serde(rename = "Text", deserialize_with = "nullable")]
    pub text: Option<String>,
    #[serde(rename = "Annotation", deserialize_with = "nullable")]
    pub annotation: Option<String>,
    #[serde(rename = "DateCreated", deserialize_with = "nullable")]
    pub date_created: Option<String>,
    #[serde(rename = "ChapterProgress")]
    pub chapter_progress: f64,
    #[serde(rename = "Hidden")]
    pub hidden: DeviceFlag,
    #[serde(rename = "Version", deserialize_with = "nullable")]
    pub version: Option<String>,
    #[serde(rename = "DateModified", deserialize_with = "nullable")]
    pub date_modified: Option<String>,
    #[serde(rename = "Creator", deserialize_with = "nullable")]
    pub creator: Option<String>,
    #[serde(rename = "UUID", deserialize_with = "nullable")]
    pub uuid: Option<String>,
    #[serde(rename = "UserID", deserialize_with = "nullable")]
    pub user_id: Option<String>,
    #[serde(rename = "SyncTime", deserialize_with = "nullable")]
    pub sync_time: Option<String>,
    #[serde(rename = "Published")]
    pub published: DeviceFlag,
    /// Added to the export after the first release; absent in old blobs.
    #[serde(rename = "ContextString", default)]
    pub context_string: Option<String>,
    #[serde(rename = "Type", default)]
    pub kind: Option<String>,
}

impl Bookmark {
    /// Render this bookmark alone in the exchange format.
    pub fn to_json(&self) -> Result<String, BookmarkError> {
        to_pretty_json(self)
    }
}

/// Deserialize a key that must be present but may be `null`.
///
/// Using `deserialize_with` suppresses serde's implicit default for
/// `Option` fields, so a missing key is still an error.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)
}

// ---------------------------------------------------------------------------
// BookmarkSet
// ---------------------------------------------------------------------------

/// All bookmarks of one book on one side (device or library), in order.
///
/// Bookmark IDs are expected to be unique within a set but this is not
/// enforced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookmarkSet {
    #[serde(deserialize_with = "null_as_empty")]
    pub bookmarks: Vec<Bookmark>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Bookmark>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Bookmark>>::deserialize(deserializer)?.unwrap_or_default())
}

impl BookmarkSet {
    pub fn new(bookmarks: Vec<Bookmark>) -> Self {
        Self { bookmarks }
    }

    /// Parse a set from its stored JSON text.
    pub fn from_json(text: &str) -> Result<Self, BookmarkError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize to the canonical exchange format.
    pub fn to_json(&self) -> Result<String, BookmarkError> {
        to_pretty_json(self)
    }

    /// Linear lookup by bookmark ID.
    pub fn find(&self, bookmark_id: &str) -> Option<&Bookmark> {
        self.bookmarks.iter().find(|b| b.bookmark_id == bookmark_id)
    }

    pub fn contains(&self, bookmark_id: &str) -> bool {
        self.find(bookmark_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.bookmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookmarks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bookmark> {
        self.bookmarks.iter()
    }

    /// Bookmark IDs in set order.
    pub fn ids(&self) -> Vec<&str> {
        self.bookmarks.iter().map(|b| b.bookmark_id.as_str()).collect()
    }
}

impl From<Vec<Bookmark>> for BookmarkSet {
    fn from(bookmarks: Vec<Bookmark>) -> Self {
        Self::new(bookmarks)
    }
}

impl<'a> IntoIterator for &'a BookmarkSet {
    type Item = &'a Bookmark;
    type IntoIter = std::slice::Iter<'a, Bookmark>;

    fn into_iter(self) -> Self::IntoIter {
        self.bookmarks.iter()
    }
}

/// Pretty-print with a four-space indent, leaving non-ASCII text as is.
fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, BookmarkError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser).map_err(BookmarkError::EncodeError)?;
    String::from_utf8(buf)
        .map_err(|e| BookmarkError::EncodeError(serde::ser::Error::custom(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_bookmark() -> Bookmark {
        Bookmark {
            bookmark_id: "5f1c0b1e-0000-4c4e-9a3e-1b2c3d4e5f60".into(),
            content_id: "!OEBPS!chapter01.xhtml".into(),
            start_container_path: "span#kobo\\.12\\.1".into(),
            start_container_child_index: -99,
            start_offset: 4,
            end_container_path: "span#kobo\\.12\\.3".into(),
            end_container_child_index: -99,
            end_offset: 17,
            text: Some("Il était une fois…".into()),
            annotation: Some("note".into()),
            date_created: Some("2020-04-01T10:00:00.000".into()),
            chapter_progress: 0.25,
            hidden: DeviceFlag::FALSE,
            version: Some("".into()),
            date_modified: Some("2020-04-02T10:00:00Z".into()),
            creator: None,
            uuid: None,
            user_id: Some("adobe_user".into()),
            sync_time: None,
            published: DeviceFlag::FALSE,
            context_string: Some("once upon".into()),
            kind: Some("highlight".into()),
        }
    }

    #[test]
    fn test_round_trip_preserves_every_field() {
        let set = BookmarkSet::new(vec![full_bookmark(), Bookmark::default()]);
        let json = set.to_json().unwrap();
        let parsed = BookmarkSet::from_json(&json).unwrap();
        assert_eq!(parsed, set);
        // Stable for identical input.
        assert_eq!(parsed.to_json().unwrap(), json);
    }

    #[test]
    fn test_output_shape() {
        let json = BookmarkSet::new(vec![full_bookmark()]).to_json().unwrap();
        assert!(json.starts_with("{\n    \"bookmarks\": [\n        {\n"));
        assert!(json.contains("\"Hidden\": \"false\""));
        assert!(json.contains("\"Creator\": null"));
        assert!(json.contains("Il était une fois…"));

        let order = [
            "BookmarkID",
            "ContentID",
            "StartContainerPath",
            "StartContainerChildIndex",
            "StartOffset",
            "EndContainerPath",
            "EndContainerChildIndex",
            "EndOffset",
            "Text",
            "Annotation",
            "DateCreated",
            "ChapterProgress",
            "Hidden",
            "Version",
            "DateModified",
            "Creator",
            "UUID",
            "UserID",
            "SyncTime",
            "Published",
            "ContextString",
            "Type",
        ];
        let positions: Vec<usize> = order
            .iter()
            .map(|k| json.find(&format!("\"{}\":", k)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_parses_blob_without_late_fields() {
        let text = r#"{
    "bookmarks": [
        {
            "BookmarkID": "a",
            "ContentID": "!ch1.html",
            "StartContainerPath": "p",
            "StartContainerChildIndex": 1,
            "StartOffset": 0,
            "EndContainerPath": "p",
            "EndContainerChildIndex": 1,
            "EndOffset": 5,
            "Text": "hello",
            "Annotation": null,
            "DateCreated": null,
            "ChapterProgress": 0,
            "Hidden": "false",
            "Version": null,
            "DateModified": null,
            "Creator": null,
            "UUID": null,
            "UserID": null,
            "SyncTime": null,
            "Published": "false"
        }
    ]
}"#;
        let set = BookmarkSet::from_json(text).unwrap();
        assert_eq!(set.len(), 1);
        let b = &set.bookmarks[0];
        assert_eq!(b.text.as_deref(), Some("hello"));
        assert_eq!(b.chapter_progress, 0.0);
        assert_eq!(b.context_string, None);
        assert_eq!(b.kind, None);
    }

    #[test]
    fn test_missing_required_key_is_error() {
        let mut value = serde_json::to_value(BookmarkSet::new(vec![full_bookmark()])).unwrap();
        value["bookmarks"][0]
            .as_object_mut()
            .unwrap()
            .remove("Annotation");
        let err = BookmarkSet::from_json(&value.to_string()).unwrap_err();
        assert!(err.to_string().contains("Annotation"));
    }

    #[test]
    fn test_malformed_text_is_error() {
        assert!(BookmarkSet::from_json("not json").is_err());
        assert!(BookmarkSet::from_json("{}").is_err());
        assert!(BookmarkSet::from_json(r#"{"bookmarks": [{"BookmarkID": "x"}]}"#).is_err());
    }

    #[test]
    fn test_null_list_parses_as_empty() {
        let set = BookmarkSet::from_json(r#"{"bookmarks": null}"#).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_flag_accepts_legacy_forms() {
        let flags: Vec<DeviceFlag> = serde_json::from_str(r#"["true", "false", true, 0, 1]"#).unwrap();
        assert_eq!(
            flags,
            vec![
                DeviceFlag::TRUE,
                DeviceFlag::FALSE,
                DeviceFlag::TRUE,
                DeviceFlag::FALSE,
                DeviceFlag::TRUE
            ]
        );
        assert!(serde_json::from_str::<DeviceFlag>(r#""maybe""#).is_err());
        assert_eq!(serde_json::from_str::<DeviceFlag>("null").unwrap(), DeviceFlag::FALSE);
    }

    #[test]
    fn test_null_flags_in_stored_blob() {
        let mut value = serde_json::to_value(BookmarkSet::new(vec![full_bookmark()])).unwrap();
        let entry = value["bookmarks"][0].as_object_mut().unwrap();
        entry.insert("Published".into(), serde_json::Value::Null);
        entry.insert("Hidden".into(), serde_json::Value::Null);

        let set = BookmarkSet::from_json(&value.to_string()).unwrap();
        assert_eq!(set.bookmarks[0].published, DeviceFlag::FALSE);
        assert_eq!(set.bookmarks[0].hidden, DeviceFlag::FALSE);
        assert_eq!(set.bookmarks[0].text, full_bookmark().text);
    }

    #[test]
    fn test_flag_key_is_still_required() {
        let mut value = serde_json::to_value(BookmarkSet::new(vec![full_bookmark()])).unwrap();
        value["bookmarks"][0]
            .as_object_mut()
            .unwrap()
            .remove("Published");
        let err = BookmarkSet::from_json(&value.to_string()).unwrap_err();
        assert!(err.to_string().contains("Published"));
    }

    #[test]
    fn test_encoding_failure_is_an_error() {
        let mut map = std::collections::BTreeMap::new();
        map.insert((1, 2), "tuple keys are not valid JSON object keys");
        assert!(matches!(
            to_pretty_json(&map),
            Err(BookmarkError::EncodeError(_))
        ));
    }

    #[test]
    fn test_find() {
        let mut other = full_bookmark();
        other.bookmark_id = "b".into();
        let set = BookmarkSet::new(vec![full_bookmark(), other]);
        assert_eq!(set.find("b").map(|b| b.bookmark_id.as_str()), Some("b"));
        assert!(set.find("missing").is_none());
        assert_eq!(set.ids(), vec!["5f1c0b1e-0000-4c4e-9a3e-1b2c3d4e5f60", "b"]);
    }

    #[test]
    fn test_equality_is_strict() {
        let a = full_bookmark();
        let mut b = full_bookmark();
        assert_eq!(a, b);
        b.date_modified = Some("2021-01-01T00:00:00Z".into());
        assert_ne!(a, b);
    }
}
