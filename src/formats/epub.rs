//! EPUB cover and metadata resolution.
//!
//! `META-INF/container.xml` names the package document; the package
//! document's manifest names the cover image relative to its own directory.

use super::{Archive, BookMetadata, ContainerResolver, CoverResult, Resolution, path};
use crate::error::InspectError;
use roxmltree::{Document, Node};

/// Fixed location of the container descriptor.
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

const DC_NAMESPACE: &str = "http://purl.org/dc/elements/1.1/";

/// Resolver for EPUB (OCF) containers.
pub struct EpubResolver;

impl ContainerResolver for EpubResolver {
    fn resolve(&self, archive: &mut Archive) -> Result<Resolution, InspectError> {
        let container = super::read_entry_text(archive, CONTAINER_PATH)?
            .ok_or(InspectError::MissingContainerDescriptor)?;
        let package_path = package_path(&container)?;

        let package_text = super::read_entry_text(archive, &package_path)?
            .ok_or_else(|| InspectError::MissingPackageDocument(package_path.clone()))?;
        let package = PackageDocument::parse(&package_path, &package_text)?;

        let cover = package.cover_entry().and_then(|entry| {
            let bytes = super::read_entry(archive, &entry)?
                .ok_or_else(|| InspectError::CoverEntryMissing(entry.clone()))?;
            Ok(CoverResult {
                bytes,
                mime_type: super::image_mime(&entry).to_string(),
            })
        });

        Ok(Resolution {
            metadata: package.metadata,
            cover,
        })
    }
}

/// Package document path from the first `rootfile` of the container descriptor.
pub fn package_path(container_xml: &str) -> Result<String, InspectError> {
    let doc = super::parse_xml(container_xml)
        .map_err(|e| InspectError::MalformedContainerDescriptor(e.to_string()))?;

    let rootfile = doc
        .descendants()
        .find(|n| n.tag_name().name() == "rootfile")
        .ok_or_else(|| InspectError::MalformedContainerDescriptor("no rootfile element".into()))?;

    rootfile
        .attribute("full-path")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(path::normalize)
        .ok_or_else(|| {
            InspectError::MalformedContainerDescriptor("rootfile without full-path".into())
        })
}

/// One `manifest/item` of a package document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    /// Item id, empty when undeclared.
    pub id: String,
    /// Location relative to the package document.
    pub href: String,
    /// Declared media type, empty when undeclared.
    pub media_type: String,
    /// Space-separated EPUB 3 properties.
    pub properties: Option<String>,
}

/// A `metadata/meta` element in its EPUB 2 `name`/`content` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaTag {
    /// `name` attribute.
    pub name: Option<String>,
    /// `content` attribute.
    pub content: Option<String>,
}

/// The parts of an OPF package document used for resolution.
#[derive(Debug, Clone, Default)]
pub struct PackageDocument {
    /// Archive path of the package document itself.
    pub path: String,
    /// Manifest items in document order.
    pub manifest: Vec<ManifestItem>,
    /// Meta tags in document order.
    pub metas: Vec<MetaTag>,
    /// Dublin Core fields.
    pub metadata: BookMetadata,
}

impl PackageDocument {
    /// Parse a package document located at `path` inside the archive.
    pub fn parse(path: &str, xml: &str) -> Result<Self, InspectError> {
        let doc = super::parse_xml(xml)?;

        let manifest = element_children(&doc, "manifest", "item")
            .filter_map(|item| {
                Some(ManifestItem {
                    id: item.attribute("id").unwrap_or_default().to_string(),
                    href: item.attribute("href")?.to_string(),
                    media_type: item.attribute("media-type").unwrap_or_default().to_string(),
                    properties: item.attribute("properties").map(String::from),
                })
            })
            .collect();

        let metas = element_children(&doc, "metadata", "meta")
            .map(|meta| MetaTag {
                name: meta.attribute("name").map(String::from),
                content: meta.attribute("content").map(String::from),
            })
            .collect();

        Ok(Self {
            path: path.to_string(),
            manifest,
            metas,
            metadata: dublin_core(&doc),
        })
    }

    /// Directory against which manifest hrefs are resolved.
    pub fn base_dir(&self) -> &str {
        path::parent(&self.path)
    }

    /// The manifest item chosen by the first matching [`CoverStrategy`].
    pub fn cover_item(&self) -> Option<&ManifestItem> {
        COVER_STRATEGIES
            .iter()
            .find_map(|strategy| strategy.find(self))
    }

    /// Archive path of the cover image.
    pub fn cover_entry(&self) -> Result<String, InspectError> {
        let item = self.cover_item().ok_or(InspectError::CoverNotResolved)?;
        Ok(path::resolve(self.base_dir(), &item.href))
    }
}

/// Ways a package document can declare its cover image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverStrategy {
    /// EPUB 2: `<meta name="cover" content="{item id}"/>`.
    MetaCover,
    /// EPUB 3: manifest item with `properties="cover-image"`.
    CoverImageProperty,
    /// Manifest item whose id contains "cover", case-insensitive.
    IdContainsCover,
}

/// Order in which cover strategies are tried. The first hit wins.
pub const COVER_STRATEGIES: [CoverStrategy; 3] = [
    CoverStrategy::MetaCover,
    CoverStrategy::CoverImageProperty,
    CoverStrategy::IdContainsCover,
];

impl CoverStrategy {
    /// Find the manifest item this strategy designates.
    pub fn find(self, package: &PackageDocument) -> Option<&ManifestItem> {
        match self {
            CoverStrategy::MetaCover => {
                let id = package
                    .metas
                    .iter()
                    .find(|meta| meta.name.as_deref() == Some("cover"))?
                    .content
                    .as_deref()?
                    .trim();
                package.manifest.iter().find(|item| item.id == id)
            }
            CoverStrategy::CoverImageProperty => package
                .manifest
                .iter()
                .find(|item| item.properties.as_deref() == Some("cover-image")),
            CoverStrategy::IdContainsCover => package
                .manifest
                .iter()
                .find(|item| item.id.to_lowercase().contains("cover")),
        }
    }
}

/// Children named `child` of every element named `parent`, by local name.
fn element_children<'a, 'input>(
    doc: &'a Document<'input>,
    parent: &'static str,
    child: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    doc.descendants()
        .filter(move |n| n.tag_name().name() == parent)
        .flat_map(move |n| n.descendants().filter(move |c| c.tag_name().name() == child))
}

/// Read the Dublin Core fields. The first occurrence of each element wins.
fn dublin_core(doc: &Document<'_>) -> BookMetadata {
    let dc = |name: &str| {
        doc.descendants()
            .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(DC_NAMESPACE))
            .map(super::text_content)
    };

    let description = dc("description").or_else(|| {
        doc.descendants()
            .find(|n| n.is_element() && n.tag_name().name() == "description")
            .map(super::text_content)
    });

    BookMetadata {
        title: dc("title"),
        creator: dc("creator"),
        identifier: dc("identifier"),
        language: dc("language"),
        publisher: dc("publisher"),
        subject: dc("subject"),
        description,
        date: dc("date"),
        cover: None,
    }
}
