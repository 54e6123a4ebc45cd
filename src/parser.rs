use crate::models::Page;
use anyhow::{Context, Result};
use bzip2::read::BzDecoder;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const READ_BUFFER_BYTES: usize = 256 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    None,
    Title,
    Text,
}

/// Streams `<page>` elements out of a MediaWiki XML export, plain or `.bz2`.
///
/// Redirect pages and pages without text are not yielded.
pub struct WikiReader {
    reader: Reader<Box<dyn BufRead>>,
    buf: Vec<u8>,
    pages_read: u64,
}

impl WikiReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open wiki dump: {}", path.display()))?;
        let is_bz2 = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("bz2"));

        let inner: Box<dyn BufRead> = if is_bz2 {
            Box::new(BufReader::with_capacity(
                READ_BUFFER_BYTES,
                BzDecoder::new(file),
            ))
        } else {
            Box::new(BufReader::with_capacity(READ_BUFFER_BYTES, file))
        };
        Ok(Self::from_reader(inner))
    }

    pub fn from_reader(inner: Box<dyn BufRead>) -> Self {
        let mut reader = Reader::from_reader(inner);
        reader.trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            pages_read: 0,
        }
    }

    /// `<page>` elements seen so far, including the ones not yielded.
    pub fn pages_read(&self) -> u64 {
        self.pages_read
    }

    fn next_page(&mut self) -> Result<Option<Page>> {
        let mut in_page = false;
        let mut field = Field::None;
        let mut title = String::new();
        let mut text = String::new();
        let mut redirect = false;

        loop {
            self.buf.clear();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .with_context(|| {
                    format!(
                        "Malformed XML at byte {}",
                        self.reader.buffer_position()
                    )
                })?;

            match event {
                Event::Start(e) => match e.name().as_ref() {
                    b"page" => {
                        in_page = true;
                        title.clear();
                        text.clear();
                        redirect = false;
                    }
                    b"title" if in_page => field = Field::Title,
                    b"text" if in_page => field = Field::Text,
                    b"redirect" if in_page => redirect = true,
                    _ => {}
                },
                Event::Empty(e) => {
                    if in_page && e.name().as_ref() == b"redirect" {
                        redirect = true;
                    }
                }
                Event::Text(e) => {
                    let value = e.unescape().context("Invalid XML escape in page")?;
                    match field {
                        Field::Title => title.push_str(&value),
                        Field::Text => text.push_str(&value),
                        Field::None => {}
                    }
                }
                Event::CData(e) => {
                    if field == Field::Text {
                        text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                    }
                }
                Event::End(e) => match e.name().as_ref() {
                    b"title" | b"text" => field = Field::None,
                    b"page" if in_page => {
                        in_page = false;
                        self.pages_read += 1;
                        if redirect || text.trim().is_empty() {
                            continue;
                        }
                        return Ok(Some(Page::new(
                            std::mem::take(&mut title),
                            std::mem::take(&mut text),
                        )));
                    }
                    _ => {}
                },
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }
}

impl Iterator for WikiReader {
    type Item = Result<Page>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_page().transpose()
    }
}
