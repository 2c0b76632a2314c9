//! FictionBook documents packed in a zip (`.fb2.zip`).
//!
//! The cover is a base64 `<binary>` referenced from
//! `description/title-info/coverpage/image/@href`.

use super::{Archive, BookMetadata, ContainerResolver, CoverResult, Resolution, path};
use crate::error::InspectError;
use base64::{Engine, engine::general_purpose::STANDARD};
use roxmltree::{Document, Node};

/// Resolver for zipped FictionBook files.
pub struct Fb2Resolver;

impl ContainerResolver for Fb2Resolver {
    fn resolve(&self, archive: &mut Archive) -> Result<Resolution, InspectError> {
        let entry = super::candidate_entries(archive)
            .into_iter()
            .find(|e| path::extension(&e.name).as_deref() == Some("fb2"))
            .ok_or_else(|| InspectError::MissingPackageDocument("*.fb2".into()))?;

        let text = super::read_entry_text(archive, &entry.name)?
            .ok_or_else(|| InspectError::MissingPackageDocument(entry.name.clone()))?;
        let doc = super::parse_xml(&text)?;

        Ok(Resolution {
            metadata: metadata(&doc),
            cover: cover(&doc),
        })
    }
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.tag_name().name() == name)
}

fn find_path<'a, 'input>(doc: &'a Document<'input>, names: &[&str]) -> Option<Node<'a, 'input>> {
    names
        .iter()
        .try_fold(doc.root_element(), |node, name| child(node, name))
}

fn text_at(doc: &Document<'_>, names: &[&str]) -> Option<String> {
    find_path(doc, names).map(super::text_content)
}

fn metadata(doc: &Document<'_>) -> BookMetadata {
    let creator = find_path(doc, &["description", "title-info", "author"]).map(|author| {
        ["first-name", "middle-name", "last-name"]
            .iter()
            .filter_map(|part| child(author, part).map(super::text_content))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    });

    let creator = match creator {
        Some(name) if name.is_empty() => {
            text_at(doc, &["description", "title-info", "author", "nickname"])
        }
        other => other,
    };

    BookMetadata {
        title: text_at(doc, &["description", "title-info", "book-title"]),
        creator,
        identifier: text_at(doc, &["description", "document-info", "id"]),
        language: text_at(doc, &["description", "title-info", "lang"]),
        publisher: text_at(doc, &["description", "publish-info", "publisher"]),
        subject: text_at(doc, &["description", "title-info", "genre"]),
        description: text_at(doc, &["description", "title-info", "annotation"]),
        date: text_at(doc, &["description", "title-info", "date"]),
        cover: None,
    }
}

fn binary_id(node: &Node<'_, '_>) -> String {
    node.attribute("id").unwrap_or_default().to_string()
}

fn cover(doc: &Document<'_>) -> Result<CoverResult, InspectError> {
    let declared = find_path(doc, &["description", "title-info", "coverpage", "image"])
        .and_then(|image| image.attributes().find(|a| a.name() == "href"))
        .map(|href| href.value().trim_start_matches('#').to_string());

    let binaries: Vec<Node<'_, '_>> = doc
        .root_element()
        .children()
        .filter(|n| n.tag_name().name() == "binary")
        .collect();

    let binary = declared
        .as_deref()
        .and_then(|id| binaries.iter().find(|b| binary_id(b) == id))
        .or_else(|| binaries.iter().find(|b| binary_id(b).to_lowercase().contains("cover")))
        .or_else(|| {
            binaries.iter().find(|b| {
                b.attribute("content-type")
                    .is_some_and(|ct| ct.starts_with("image/"))
            })
        })
        .ok_or(InspectError::CoverNotResolved)?;

    let encoded: String = binary
        .text()
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| InspectError::InvalidBinary(format!("{}: {}", binary_id(binary), e)))?;

    let mime_type = binary
        .attribute("content-type")
        .filter(|ct| ct.starts_with("image/"))
        .map(String::from)
        .unwrap_or_else(|| super::image_mime(&binary_id(binary)).to_string());

    Ok(CoverResult { bytes, mime_type })
}
