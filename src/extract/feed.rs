//! Streaming scan of feed documents

use super::ExtractError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::Cursor;

/// Pulls text nodes nested two levels deep in the `image`/`url` tag pair
pub(super) struct FeedScanner {
    reader: Reader<Cursor<Vec<u8>>>,
    buf: Vec<u8>,
    depth: usize,
}

impl FeedScanner {
    pub(super) fn new(body: Vec<u8>) -> Self {
        Self {
            reader: Reader::from_reader(Cursor::new(body)),
            buf: Vec::new(),
            depth: 0,
        }
    }

    /// Returns the next matching text, or `None` at end of input
    pub(super) fn next_text(&mut self) -> Result<Option<String>, ExtractError> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(start) if is_cover_tag(start.local_name().as_ref()) => {
                    self.depth += 1;
                }
                Event::End(end) if is_cover_tag(end.local_name().as_ref()) => {
                    self.depth = self.depth.saturating_sub(1);
                }
                Event::Text(text) if self.depth == 2 => {
                    let text = text.unescape()?;
                    let text = text.trim();
                    if !text.is_empty() {
                        return Ok(Some(text.to_string()));
                    }
                }
                Event::CData(data) if self.depth == 2 => {
                    let text = String::from_utf8_lossy(&data);
                    let text = text.trim();
                    if !text.is_empty() {
                        return Ok(Some(text.to_string()));
                    }
                }
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }
}

fn is_cover_tag(name: &[u8]) -> bool {
    name == b"image" || name == b"url"
}
