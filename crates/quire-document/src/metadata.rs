// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document-level metadata: reading /Info dictionaries and merging them into
// the exported document.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object};
use serde::{Deserialize, Serialize};

/// The standard /Info keys handled as named fields.
const KNOWN_KEYS: [&[u8]; 5] = [b"Title", b"Author", b"Subject", b"Keywords", b"Creator"];

/// Document information merged into the export output.
///
/// Values set on the output take precedence over anything recovered from a
/// source document; among sources, the first to supply a value wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    /// Non-standard /Info entries, keyed by their PDF name.
    pub custom: BTreeMap<String, String>,
}

impl DocumentMetadata {
    /// Read the /Info dictionary of a loaded document. Absent or malformed
    /// entries are simply skipped.
    pub fn from_document(document: &Document) -> Self {
        let mut metadata = Self::default();
        let Some(info) = info_dictionary(document) else {
            return metadata;
        };

        for (key, value) in info.iter() {
            let Some(text) = string_value(value, document) else {
                continue;
            };
            match key.as_slice() {
                b"Title" => metadata.title = Some(text),
                b"Author" => metadata.author = Some(text),
                b"Subject" => metadata.subject = Some(text),
                b"Keywords" => metadata.keywords = Some(text),
                b"Creator" => metadata.creator = Some(text),
                b"Producer" | b"CreationDate" | b"ModDate" => {}
                other => {
                    metadata
                        .custom
                        .insert(String::from_utf8_lossy(other).into_owned(), text);
                }
            }
        }
        metadata
    }

    /// Fill any unset field from `other`, leaving existing values untouched.
    pub fn merge_missing_from(&mut self, other: &DocumentMetadata) {
        if self.title.is_none() {
            self.title = other.title.clone();
        }
        if self.author.is_none() {
            self.author = other.author.clone();
        }
        if self.subject.is_none() {
            self.subject = other.subject.clone();
        }
        if self.keywords.is_none() {
            self.keywords = other.keywords.clone();
        }
        if self.creator.is_none() {
            self.creator = other.creator.clone();
        }
        for (key, value) in &other.custom {
            self.custom
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    /// Build the /Info dictionary for the output document, stamping the
    /// producer and modification date.
    pub fn to_info_dictionary(&self, producer: &str) -> Dictionary {
        let mut info = Dictionary::new();
        for (key, value) in [
            ("Title", &self.title),
            ("Author", &self.author),
            ("Subject", &self.subject),
            ("Keywords", &self.keywords),
            ("Creator", &self.creator),
        ] {
            if let Some(text) = value {
                info.set(key, Object::string_literal(text.as_str()));
            }
        }
        for (key, value) in &self.custom {
            info.set(key.as_bytes().to_vec(), Object::string_literal(value.as_str()));
        }
        info.set("Producer", Object::string_literal(producer));
        let stamp = chrono::Utc::now().format("D:%Y%m%d%H%M%SZ").to_string();
        info.set("ModDate", Object::string_literal(stamp.as_str()));
        info
    }
}

fn info_dictionary(document: &Document) -> Option<&Dictionary> {
    match document.trailer.get(b"Info").ok()? {
        Object::Reference(id) => match document.get_object(*id).ok()? {
            Object::Dictionary(dict) => Some(dict),
            _ => None,
        },
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn string_value(value: &Object, document: &Document) -> Option<String> {
    match value {
        Object::String(bytes, _) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Object::Reference(id) => match document.get_object(*id).ok()? {
            Object::String(bytes, _) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_existing_values() {
        let mut primary = DocumentMetadata {
            title: Some("Assembled".into()),
            ..Default::default()
        };
        let source = DocumentMetadata {
            title: Some("Original".into()),
            author: Some("Someone".into()),
            ..Default::default()
        };
        primary.merge_missing_from(&source);
        assert_eq!(primary.title.as_deref(), Some("Assembled"));
        assert_eq!(primary.author.as_deref(), Some("Someone"));
    }

    #[test]
    fn merge_keeps_first_custom_value() {
        let mut primary = DocumentMetadata::default();
        primary.custom.insert("Department".into(), "Sales".into());
        let mut source = DocumentMetadata::default();
        source.custom.insert("Department".into(), "Legal".into());
        source.custom.insert("Revision".into(), "7".into());
        primary.merge_missing_from(&source);
        assert_eq!(primary.custom["Department"], "Sales");
        assert_eq!(primary.custom["Revision"], "7");
    }

    #[test]
    fn info_dictionary_contains_set_fields_and_producer() {
        let metadata = DocumentMetadata {
            title: Some("Report".into()),
            ..Default::default()
        };
        let info = metadata.to_info_dictionary("quire 0.2");
        assert!(info.get(b"Title").is_ok());
        assert!(info.get(b"Producer").is_ok());
        assert!(info.get(b"ModDate").is_ok());
        assert!(info.get(b"Author").is_err());
    }

    #[test]
    fn round_trip_through_a_document() {
        let mut doc = Document::with_version("1.5");
        let metadata = DocumentMetadata {
            title: Some("Quarterly".into()),
            author: Some("Quill".into()),
            ..Default::default()
        };
        let info_id = doc.add_object(Object::Dictionary(metadata.to_info_dictionary("test")));
        doc.trailer.set("Info", Object::Reference(info_id));

        let read = DocumentMetadata::from_document(&doc);
        assert_eq!(read.title.as_deref(), Some("Quarterly"));
        assert_eq!(read.author.as_deref(), Some("Quill"));
    }
}
