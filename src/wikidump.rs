//! `DocumentSource` over a bzip2-compressed MediaWiki export-0.10 dump.
//! Consumes only `<page>{id, title, revision/text}</page>` triples in one
//! forward, streaming pass.

use crate::document::{Document, DocumentSource, MarkupStripper, MediaWikiMarkupStripper};
use crate::error::{EsaError, EsaResult};
use bzip2::read::BzDecoder;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Streams `Document` records out of a bzip2-compressed MediaWiki XML dump.
pub struct WikidumpSource<R: Read> {
    reader: Reader<BufReader<R>>,
    buf: Vec<u8>,
    path: Vec<String>,
    limit: Option<usize>,
    yielded: usize,
    stripper: Box<dyn MarkupStripper>,
}

impl WikidumpSource<BzDecoder<File>> {
    /// Opens a `.xml.bz2` dump file for streaming decompression and parsing.
    pub fn open(path: &Path, limit: Option<usize>) -> EsaResult<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BzDecoder::new(file), limit))
    }
}

impl<R: Read> WikidumpSource<R> {
    pub fn new(inner: R, limit: Option<usize>) -> Self {
        let mut reader = Reader::from_reader(BufReader::new(inner));
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::with_capacity(8 * 1024),
            path: Vec::new(),
            limit,
            yielded: 0,
            stripper: Box::new(MediaWikiMarkupStripper),
        }
    }

    pub fn with_stripper(mut self, stripper: Box<dyn MarkupStripper>) -> Self {
        self.stripper = stripper;
        self
    }

    fn local_name(qname: &[u8]) -> String {
        let s = String::from_utf8_lossy(qname);
        s.rsplit(':').next().unwrap_or(&s).to_string()
    }

    /// Parses one `<page>` element (already opened) and returns the
    /// assembled `Document`, or a recoverable parse error that the caller
    /// logs and skips without ending the stream.
    fn parse_page(&mut self) -> EsaResult<Document> {
        let mut doc_id: Option<u32> = None;
        let mut title: Option<String> = None;
        let mut text: Option<String> = None;

        loop {
            self.buf.clear();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .map_err(|e| EsaError::SourceDecode(e.to_string()))?;

            match event {
                Event::Start(e) => {
                    self.path.push(Self::local_name(e.name().as_ref()));
                }
                Event::Empty(e) => {
                    // Self-closing tag: push then immediately pop again so
                    // path tracking stays balanced.
                    self.path.push(Self::local_name(e.name().as_ref()));
                    self.path.pop();
                }
                Event::Text(e) => {
                    let text_value = e
                        .unescape()
                        .map_err(|err| EsaError::DocumentParse(err.to_string()))?
                        .into_owned();
                    match self.current_field() {
                        Some("page.id") if doc_id.is_none() => {
                            doc_id = text_value.trim().parse().ok();
                        }
                        Some("page.title") => title = Some(text_value),
                        Some("page.revision.text") => text = Some(text_value),
                        _ => {}
                    }
                }
                Event::End(e) => {
                    let name = Self::local_name(e.name().as_ref());
                    if self.path.last().map(|s| s.as_str()) == Some(name.as_str()) {
                        self.path.pop();
                    }
                    if name == "page" {
                        break;
                    }
                }
                Event::Eof => {
                    return Err(EsaError::DocumentParse(
                        "unexpected end of stream inside <page>".to_string(),
                    ));
                }
                _ => {}
            }
        }

        let doc_id = doc_id.ok_or_else(|| EsaError::DocumentParse("missing <id>".to_string()))?;
        let title = title.ok_or_else(|| EsaError::DocumentParse("missing <title>".to_string()))?;
        let raw_text = text.unwrap_or_default();
        let body = self.stripper.strip(&raw_text);

        Ok(Document {
            doc_id,
            title,
            body,
        })
    }

    fn current_field(&self) -> Option<&str> {
        // Only the dotted paths the parser cares about need to resolve;
        // everything else is irrelevant noise inside a <page>.
        match self.path.as_slice() {
            [a, b] if a == "page" && b == "id" => Some("page.id"),
            [a, b] if a == "page" && b == "title" => Some("page.title"),
            [a, b, c] if a == "page" && b == "revision" && c == "text" => {
                Some("page.revision.text")
            }
            _ => None,
        }
    }
}

impl<R: Read> DocumentSource for WikidumpSource<R> {
    fn next_document(&mut self) -> EsaResult<Option<Document>> {
        if let Some(limit) = self.limit {
            if self.yielded >= limit {
                return Ok(None);
            }
        }

        loop {
            self.buf.clear();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .map_err(|e| EsaError::SourceDecode(e.to_string()))?;

            match event {
                Event::Eof => return Ok(None),
                Event::Start(e) if Self::local_name(e.name().as_ref()) == "page" => {
                    self.path.push("page".to_string());
                    match self.parse_page() {
                        Ok(doc) => {
                            self.yielded += 1;
                            return Ok(Some(doc));
                        }
                        Err(EsaError::DocumentParse(msg)) => {
                            tracing::warn!(error = %msg, "skipping unparsable <page>");
                            continue;
                        }
                        Err(other) => return Err(other),
                    }
                }
                _ => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<mediawiki xmlns="http://www.mediawiki.org/xml/export-0.10/">
        <page>
            <title>Apple</title>
            <id>1</id>
            <revision>
                <id>100</id>
                <text>Apple is a [[Fruit|fruit]]. {{stub}}</text>
            </revision>
        </page>
        <page>
            <title>Broken</title>
            <revision><text>no id here</text></revision>
        </page>
        <page>
            <title>Banana</title>
            <id>2</id>
            <revision><text>Banana is also a fruit.</text></revision>
        </page>
    </mediawiki>"#;

    #[test]
    fn streams_pages_and_skips_unparsable_ones() {
        let mut source = WikidumpSource::new(SAMPLE.as_bytes(), None);
        let first = source.next_document().unwrap().unwrap();
        assert_eq!(first.doc_id, 1);
        assert_eq!(first.title, "Apple");
        assert!(first.body.contains("fruit"));
        assert!(!first.body.contains("stub"));

        let second = source.next_document().unwrap().unwrap();
        assert_eq!(second.doc_id, 2);
        assert_eq!(second.title, "Banana");

        assert!(source.next_document().unwrap().is_none());
    }

    #[test]
    fn limit_caps_yielded_documents() {
        let mut source = WikidumpSource::new(SAMPLE.as_bytes(), Some(1));
        assert!(source.next_document().unwrap().is_some());
        assert!(source.next_document().unwrap().is_none());
    }
}
