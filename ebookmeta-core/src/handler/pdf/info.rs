//! Document information dictionary

use crate::error::{ParseError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};

/// Info keys holding PDF dates
pub const DATE_KEYS: &[&str] = &["CreationDate", "ModDate", "SourceModified"];

/// Decode a PDF text string: UTF-16BE with BOM, otherwise PDFDocEncoding
/// (treated as Latin-1)
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(utf8) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(utf8).into_owned();
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// Encode a text string: ASCII as a literal, anything else as UTF-16BE with BOM
pub fn encode_text(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Object id of the Info dictionary when it is an indirect object
fn info_reference(document: &Document) -> Option<ObjectId> {
    document
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|o| o.as_reference().ok())
}

fn info_dictionary(document: &Document) -> Option<&Dictionary> {
    let info = document.trailer.get(b"Info").ok()?;
    match info {
        Object::Reference(id) => document.get_object(*id).ok()?.as_dict().ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// Info entries with string values, in dictionary order
pub fn read_info(document: &Document) -> Vec<(String, String)> {
    let Some(dict) = info_dictionary(document) else {
        return Vec::new();
    };
    dict.iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Object::Reference(id) => document.get_object(*id).ok()?,
                direct => direct,
            };
            match value {
                Object::String(bytes, _) => Some((
                    String::from_utf8_lossy(key).into_owned(),
                    decode_text(bytes),
                )),
                Object::Name(name) => Some((
                    String::from_utf8_lossy(key).into_owned(),
                    String::from_utf8_lossy(name).into_owned(),
                )),
                _ => None,
            }
        })
        .collect()
}

/// Replace the Info dictionary contents with `entries`
///
/// Keys present before but absent from `entries` are removed.
pub fn write_info(document: &mut Document, entries: &[(String, Object)]) -> Result<()> {
    let dict = match info_reference(document) {
        Some(id) => document
            .get_object_mut(id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| ParseError::InvalidPdf(format!("Info dictionary: {e}")))?,
        None => {
            let existing = match document.trailer.get(b"Info") {
                Ok(Object::Dictionary(dict)) => dict.clone(),
                _ => Dictionary::new(),
            };
            let id = document.add_object(Object::Dictionary(existing));
            document.trailer.set("Info", Object::Reference(id));
            document
                .get_object_mut(id)
                .and_then(Object::as_dict_mut)
                .map_err(|e| ParseError::InvalidPdf(format!("Info dictionary: {e}")))?
        }
    };

    let stale: Vec<Vec<u8>> = dict
        .iter()
        .map(|(key, _)| key.clone())
        .filter(|key| !entries.iter().any(|(k, _)| k.as_bytes() == key.as_slice()))
        .collect();
    for key in stale {
        tracing::debug!("Removing Info key {}", String::from_utf8_lossy(&key));
        dict.remove(&key);
    }
    for (key, value) in entries {
        dict.set(key.as_str(), value.clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_decode_latin1_and_utf16() {
        assert_eq!(decode_text(b"Caf\xe9"), "Café");
        assert_eq!(decode_text(&[0xFE, 0xFF, 0x00, 0x41, 0x00, 0xE4]), "Aä");
    }

    #[test]
    fn test_encode_text_picks_representation() {
        match encode_text("Plain") {
            Object::String(bytes, StringFormat::Literal) => assert_eq!(bytes, b"Plain"),
            other => panic!("unexpected {other:?}"),
        }
        match encode_text("Ärger") {
            Object::String(bytes, _) => assert_eq!(decode_text(&bytes), "Ärger"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_write_info_removes_stale_keys() {
        let mut document = Document::with_version("1.5");
        let info = document.add_object(dictionary! {
            "Title" => Object::string_literal("Old"),
            "Producer" => Object::string_literal("Tool"),
        });
        document.trailer.set("Info", info);

        write_info(
            &mut document,
            &[("Title".to_string(), Object::string_literal("New"))],
        )
        .unwrap();

        let entries = read_info(&document);
        assert_eq!(entries, vec![("Title".to_string(), "New".to_string())]);
    }

    #[test]
    fn test_write_info_creates_dictionary() {
        let mut document = Document::with_version("1.5");
        write_info(
            &mut document,
            &[("Author".to_string(), encode_text("Jürgen"))],
        )
        .unwrap();
        assert_eq!(
            read_info(&document),
            vec![("Author".to_string(), "Jürgen".to_string())]
        );
    }
}
