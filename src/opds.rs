//! OPDS catalog generation.

use crate::library::{Book, SortMode};
use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Cursor;

/// Content type of an acquisition feed.
pub const ACQUISITION_MIME: &str =
    "application/atom+xml;charset=utf-8;profile=opds-catalog;kind=acquisition";

const NAVIGATION_LINK_TYPE: &str = "application/atom+xml;profile=opds-catalog;kind=acquisition";

/// OPDS feed link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Link relation type (e.g., "self", "http://opds-spec.org/acquisition").
    pub rel: String,
    /// URL of the linked resource.
    pub href: String,
    /// MIME type of the linked resource.
    pub link_type: String,
    /// Optional title for the link.
    pub title: Option<String>,
    /// Whether this link is the active facet.
    pub active_facet: bool,
}

impl Link {
    fn new(rel: &str, href: String, link_type: &str) -> Self {
        Self {
            rel: rel.to_string(),
            href,
            link_type: link_type.to_string(),
            title: None,
            active_facet: false,
        }
    }
}

/// OPDS feed entry.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Unique identifier for the entry.
    pub id: String,
    /// Entry title.
    pub title: String,
    /// Last update timestamp.
    pub updated: DateTime<Utc>,
    /// Short summary text.
    pub summary: Option<String>,
    /// Format label, written as `dc:format`.
    pub format: Option<String>,
    /// Links associated with this entry.
    pub links: Vec<Link>,
}

/// OPDS feed builder.
pub struct FeedBuilder {
    id: String,
    title: String,
    updated: DateTime<Utc>,
    author_name: Option<String>,
    links: Vec<Link>,
    entries: Vec<Entry>,
}

impl FeedBuilder {
    /// Create a new feed builder.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            updated: Utc::now(),
            author_name: None,
            links: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Set the feed author.
    pub fn author(mut self, name: impl Into<String>) -> Self {
        self.author_name = Some(name.into());
        self
    }

    /// Add a self link.
    pub fn self_link(mut self, href: impl Into<String>) -> Self {
        self.links
            .push(Link::new("self", href.into(), NAVIGATION_LINK_TYPE));
        self
    }

    /// Add a start link.
    pub fn start_link(mut self, href: impl Into<String>) -> Self {
        self.links
            .push(Link::new("start", href.into(), NAVIGATION_LINK_TYPE));
        self
    }

    /// Add one facet link per sort mode.
    pub fn sort_facets(mut self, base_url: &str, current: SortMode) -> Self {
        let modes = [
            (SortMode::DateDesc, "Newest first"),
            (SortMode::DateAsc, "Oldest first"),
            (SortMode::NameAsc, "Title A-Z"),
            (SortMode::NameDesc, "Title Z-A"),
        ];

        for (mode, title) in modes {
            let mut link = Link::new(
                "http://opds-spec.org/facet",
                format!("{}/?sort={}", base_url, mode.as_str()),
                NAVIGATION_LINK_TYPE,
            );
            link.title = Some(title.to_string());
            link.active_facet = mode == current;
            self.links.push(link);
        }
        self
    }

    /// Add a book entry.
    pub fn book_entry(mut self, book: &Book, base_url: &str) -> Self {
        let url_path = book.url_path();

        let mut download = Link::new(
            "http://opds-spec.org/acquisition",
            format!("{}/book/download/{}", base_url, url_path),
            &book.mime_type,
        );
        download.title = Some("Download".to_string());
        let mut links = vec![download];

        if book.has_cover() {
            let cover_href = format!("{}/book/cover/{}", base_url, url_path);
            links.push(Link::new(
                "http://opds-spec.org/image",
                cover_href.clone(),
                "image/*",
            ));
            links.push(Link::new(
                "http://opds-spec.org/image/thumbnail",
                cover_href,
                "image/*",
            ));
        }

        links.push(Link::new(
            "alternate",
            format!("{}/book/info/{}", base_url, url_path),
            "text/html",
        ));

        self.entries.push(Entry {
            id: format!("urn:uuid:{}", book.id()),
            title: book.title.clone(),
            updated: book.modified,
            summary: Some(format!(
                "{} - {}",
                book.label(),
                crate::library::format_size(book.size)
            )),
            format: Some(book.label()),
            links,
        });
        self
    }

    /// Build the XML feed.
    pub fn build(self) -> String {
        let mut writer = Writer::new(Cursor::new(Vec::new()));

        // Writing to a Vec can't fail
        let _ = writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)));

        let mut feed = BytesStart::new("feed");
        feed.push_attribute(("xmlns", "http://www.w3.org/2005/Atom"));
        feed.push_attribute(("xmlns:opds", "http://opds-spec.org/2010/catalog"));
        feed.push_attribute(("xmlns:dc", "http://purl.org/dc/terms/"));
        let _ = writer.write_event(Event::Start(feed));

        write_text_element(&mut writer, "id", &self.id);
        write_text_element(&mut writer, "title", &self.title);
        write_text_element(&mut writer, "updated", &self.updated.to_rfc3339());

        if let Some(name) = &self.author_name {
            let _ = writer.write_event(Event::Start(BytesStart::new("author")));
            write_text_element(&mut writer, "name", name);
            let _ = writer.write_event(Event::End(BytesEnd::new("author")));
        }

        for link in &self.links {
            write_link(&mut writer, link);
        }

        for entry in &self.entries {
            write_entry(&mut writer, entry);
        }

        let _ = writer.write_event(Event::End(BytesEnd::new("feed")));

        String::from_utf8(writer.into_inner().into_inner()).unwrap_or_default()
    }
}

/// Build the acquisition feed listing every book.
pub fn acquisition_feed(title: &str, base_url: &str, books: &[Book], sort: SortMode) -> String {
    let mut feed = FeedBuilder::new("urn:opdshelf:root", title)
        .author("opdshelf")
        .self_link(format!("{}/?sort={}", base_url, sort.as_str()))
        .start_link(format!("{}/", base_url))
        .sort_facets(base_url, sort);

    for book in books {
        feed = feed.book_entry(book, base_url);
    }

    feed.build()
}

fn write_text_element<W: std::io::Write>(writer: &mut Writer<W>, name: &str, text: &str) {
    let _ = writer.write_event(Event::Start(BytesStart::new(name)));
    let _ = writer.write_event(Event::Text(BytesText::new(text)));
    let _ = writer.write_event(Event::End(BytesEnd::new(name)));
}

fn write_link<W: std::io::Write>(writer: &mut Writer<W>, link: &Link) {
    let mut elem = BytesStart::new("link");
    elem.push_attribute(("rel", link.rel.as_str()));
    elem.push_attribute(("href", link.href.as_str()));
    elem.push_attribute(("type", link.link_type.as_str()));
    if let Some(title) = &link.title {
        elem.push_attribute(("title", title.as_str()));
    }
    if link.active_facet {
        elem.push_attribute(("opds:activeFacet", "true"));
    }
    let _ = writer.write_event(Event::Empty(elem));
}

fn write_entry<W: std::io::Write>(writer: &mut Writer<W>, entry: &Entry) {
    let _ = writer.write_event(Event::Start(BytesStart::new("entry")));

    write_text_element(writer, "id", &entry.id);
    write_text_element(writer, "title", &entry.title);
    write_text_element(writer, "updated", &entry.updated.to_rfc3339());

    if let Some(format) = &entry.format {
        write_text_element(writer, "dc:format", format);
    }

    if let Some(summary) = &entry.summary {
        let mut elem = BytesStart::new("summary");
        elem.push_attribute(("type", "text"));
        let _ = writer.write_event(Event::Start(elem));
        let _ = writer.write_event(Event::Text(BytesText::new(summary)));
        let _ = writer.write_event(Event::End(BytesEnd::new("summary")));
    }

    for link in &entry.links {
        write_link(writer, link);
    }

    let _ = writer.write_event(Event::End(BytesEnd::new("entry")));
}
