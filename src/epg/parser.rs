//! XMLTV loader
//! Streaming quick-xml parser producing one [`SourceDocument`] per file.
//! Supports both plain XML and gzip-compressed (.xml.gz) files

use crate::error::ParseError;
use crate::models::{
    ChannelRecord, Credit, CreditRole, EpisodeNum, LangText, ProgrammeRecord, Rating,
    SourceDocument,
};
use flate2::read::GzDecoder;
use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::borrow::Cow;
use std::collections::HashSet;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{info, warn};

/// Parser state
#[derive(Debug, Clone, Copy, PartialEq)]
enum ParserState {
    Root,
    Channel,
    DisplayName,
    Programme,
    Title,
    SubTitle,
    Desc,
    Category,
    Date,
    EpisodeNum,
    Credits,
    Credit(CreditRole),
    Rating,
    RatingValue,
}

impl ParserState {
    /// State to return to when the current element closes
    fn parent(self) -> ParserState {
        match self {
            ParserState::Root | ParserState::Channel | ParserState::Programme => ParserState::Root,
            ParserState::DisplayName => ParserState::Channel,
            ParserState::Credit(_) => ParserState::Credits,
            ParserState::RatingValue => ParserState::Rating,
            _ => ParserState::Programme,
        }
    }

    fn collects_text(self) -> bool {
        !matches!(
            self,
            ParserState::Root
                | ParserState::Channel
                | ParserState::Programme
                | ParserState::Credits
                | ParserState::Rating
        )
    }
}

/// How an open element is handled when its end tag arrives
#[derive(Debug, Clone, Copy, PartialEq)]
enum OpenKind {
    Root,
    Tracked,
    Ignored,
}

/// Accumulates records while events stream past
struct DocumentBuilder {
    doc: SourceDocument,
    seen_channels: HashSet<String>,
    state: ParserState,
    channel: Option<ChannelRecord>,
    programme: Option<ProgrammeRecord>,
    text_buf: String,
    text_lang: Option<String>,
    credit: Option<(CreditRole, Option<String>)>,
    rating: Option<Rating>,
    episode_system: Option<String>,
}

impl DocumentBuilder {
    fn new(path: &Path) -> Self {
        Self {
            doc: SourceDocument::new(path),
            seen_channels: HashSet::new(),
            state: ParserState::Root,
            channel: None,
            programme: None,
            text_buf: String::new(),
            text_lang: None,
            credit: None,
            rating: None,
            episode_system: None,
        }
    }

    /// Handle a start tag. Returns false when the element is not tracked.
    fn open<F>(&mut self, name: &[u8], attr: F) -> Result<bool, ParseError>
    where
        F: Fn(&[u8]) -> Result<Option<String>, ParseError>,
    {
        let next = match (self.state, name) {
            (ParserState::Root, b"channel") => {
                self.channel = Some(ChannelRecord {
                    id: attr(b"id")?.unwrap_or_default(),
                    display_names: Vec::new(),
                    icon: None,
                });
                ParserState::Channel
            }
            (ParserState::Root, b"programme") => {
                self.programme = Some(ProgrammeRecord {
                    channel_id: attr(b"channel")?.unwrap_or_default(),
                    start: attr(b"start")?,
                    stop: attr(b"stop")?,
                    ..Default::default()
                });
                ParserState::Programme
            }
            (ParserState::Channel, b"display-name") => ParserState::DisplayName,
            (ParserState::Channel, b"icon") => {
                if let (Some(src), Some(chan)) = (attr(b"src")?, self.channel.as_mut()) {
                    if chan.icon.is_none() && !src.is_empty() {
                        chan.icon = Some(src);
                    }
                }
                return Ok(false);
            }
            (ParserState::Programme, b"title") => ParserState::Title,
            (ParserState::Programme, b"sub-title") => ParserState::SubTitle,
            (ParserState::Programme, b"desc") => ParserState::Desc,
            (ParserState::Programme, b"category") => ParserState::Category,
            (ParserState::Programme, b"date") => ParserState::Date,
            (ParserState::Programme, b"episode-num") => {
                self.episode_system = attr(b"system")?;
                ParserState::EpisodeNum
            }
            (ParserState::Programme, b"credits") => ParserState::Credits,
            (ParserState::Programme, b"rating") => {
                self.rating = Some(Rating {
                    system: attr(b"system")?,
                    value: String::new(),
                });
                ParserState::Rating
            }
            (ParserState::Programme, b"icon") => {
                if let (Some(src), Some(prog)) = (attr(b"src")?, self.programme.as_mut()) {
                    prog.icon = Some(src);
                }
                return Ok(false);
            }
            (ParserState::Credits, tag) => match CreditRole::from_tag(tag) {
                Some(role) => {
                    let character = match role {
                        CreditRole::Actor => attr(b"role")?,
                        _ => None,
                    };
                    self.credit = Some((role, character));
                    ParserState::Credit(role)
                }
                None => return Ok(false),
            },
            (ParserState::Rating, b"value") => ParserState::RatingValue,
            _ => return Ok(false),
        };

        if next.collects_text() {
            self.text_buf.clear();
            self.text_lang = attr(b"lang")?;
        }
        self.state = next;
        Ok(true)
    }

    fn push_text(&mut self, text: &str) {
        if self.state.collects_text() {
            self.text_buf.push_str(text);
        }
    }

    /// Finish the element tracked by the current state and return to its parent
    fn close(&mut self) {
        let text = self.text_buf.trim().to_string();
        let lang = self.text_lang.take();
        self.text_buf.clear();

        match self.state {
            ParserState::Channel => {
                if let Some(channel) = self.channel.take() {
                    if channel.id.is_empty() {
                        warn!("{}: skipping channel without id", self.doc.file_name());
                    } else if self.seen_channels.insert(channel.id.clone()) {
                        self.doc.channels.push(channel);
                    } else {
                        warn!(
                            "{}: duplicate channel id '{}', keeping the first",
                            self.doc.file_name(),
                            channel.id
                        );
                    }
                }
            }
            ParserState::Programme => {
                if let Some(programme) = self.programme.take() {
                    if !programme.channel_id.is_empty() {
                        self.doc.programmes.push(programme);
                    }
                }
            }
            ParserState::DisplayName => {
                if let Some(chan) = self.channel.as_mut() {
                    if !text.is_empty() {
                        chan.display_names.push(text);
                    }
                }
            }
            ParserState::Credit(_) => {
                if let (Some((role, character)), Some(prog)) =
                    (self.credit.take(), self.programme.as_mut())
                {
                    if !text.is_empty() {
                        prog.credits.push(Credit {
                            role,
                            name: text,
                            character: character.filter(|c| !c.is_empty()),
                        });
                    }
                }
            }
            ParserState::RatingValue => {
                if let Some(rating) = self.rating.as_mut() {
                    rating.value = text;
                }
            }
            ParserState::Rating => {
                if let (Some(rating), Some(prog)) = (self.rating.take(), self.programme.as_mut()) {
                    if !rating.value.is_empty() {
                        prog.ratings.push(rating);
                    }
                }
            }
            ParserState::EpisodeNum => {
                let system = self.episode_system.take();
                if let Some(prog) = self.programme.as_mut() {
                    if !text.is_empty() && prog.episode_num.is_none() {
                        prog.episode_num = Some(EpisodeNum { value: text, system });
                    }
                }
            }
            ParserState::Title
            | ParserState::SubTitle
            | ParserState::Desc
            | ParserState::Category
            | ParserState::Date => {
                if let Some(prog) = self.programme.as_mut() {
                    if !text.is_empty() {
                        let value = LangText { text, lang };
                        // First occurrence wins for single-valued fields
                        match self.state {
                            ParserState::Title => {
                                prog.title.get_or_insert(value);
                            }
                            ParserState::SubTitle => {
                                prog.sub_title.get_or_insert(value);
                            }
                            ParserState::Desc => {
                                prog.description.get_or_insert(value);
                            }
                            ParserState::Category => prog.categories.push(value),
                            _ => {
                                prog.date.get_or_insert(value.text);
                            }
                        }
                    }
                }
            }
            ParserState::Root | ParserState::Credits => {}
        }

        self.state = self.state.parent();
    }
}

/// XMLTV loader - streaming, memory efficient
pub struct EpgParser;

impl EpgParser {
    /// Parse a document held in memory
    pub fn parse(xml: &str, path: impl AsRef<Path>) -> Result<SourceDocument, ParseError> {
        Self::parse_reader(SanitizingBufReader::new(xml.as_bytes()), path)
    }

    /// Parse from a reader - streaming, handles large files
    pub fn parse_reader<R: BufRead>(
        reader: R,
        path: impl AsRef<Path>,
    ) -> Result<SourceDocument, ParseError> {
        let mut xml_reader = Reader::from_reader(reader);
        // Text is trimmed per element so entity references keep their surrounding spaces
        xml_reader.config_mut().trim_text(false);

        let mut builder = DocumentBuilder::new(path.as_ref());
        let mut buf = Vec::with_capacity(8192);
        let mut open: Vec<(Vec<u8>, OpenKind)> = Vec::new();
        let mut ignored_depth = 0usize;
        let mut saw_root = false;

        loop {
            let position = xml_reader.buffer_position();
            let decoder = xml_reader.decoder();

            let event = xml_reader
                .read_event_into(&mut buf)
                .map_err(|e| ParseError::Xml {
                    position,
                    message: e.to_string(),
                })?;

            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let is_empty = matches!(event, Event::Empty(_));
                    let name = e.name();
                    let name_bytes = name.as_ref();

                    let kind = if open.is_empty() {
                        if saw_root || name_bytes != b"tv" {
                            return Err(ParseError::MissingRoot);
                        }
                        saw_root = true;
                        OpenKind::Root
                    } else if ignored_depth == 0
                        && builder.open(name_bytes, |key| get_attribute(e, key, decoder, position))?
                    {
                        if is_empty {
                            // <title/> and friends close immediately
                            builder.close();
                        }
                        OpenKind::Tracked
                    } else {
                        OpenKind::Ignored
                    };

                    if !is_empty {
                        if kind == OpenKind::Ignored {
                            ignored_depth += 1;
                        }
                        open.push((name_bytes.to_vec(), kind));
                    }
                }
                Event::Text(ref e) => {
                    let raw = decode_bytes(decoder, e.as_ref(), position)?;
                    builder.push_text(&decode_xml_entities(&raw));
                }
                Event::CData(ref e) => {
                    let raw = decode_bytes(decoder, e.as_ref(), position)?;
                    builder.push_text(&raw);
                }
                Event::GeneralRef(ref e) => {
                    let name = decode_bytes(decoder, e.as_ref(), position)?;
                    builder.push_text(&decode_xml_entities(&format!("&{};", name)));
                }
                Event::End(ref e) => {
                    let name = e.name();
                    let Some((open_name, kind)) = open.pop() else {
                        return Err(ParseError::Xml {
                            position,
                            message: format!(
                                "unexpected </{}>",
                                String::from_utf8_lossy(name.as_ref())
                            ),
                        });
                    };
                    if open_name != name.as_ref() {
                        return Err(ParseError::Xml {
                            position,
                            message: format!(
                                "expected </{}>, found </{}>",
                                String::from_utf8_lossy(&open_name),
                                String::from_utf8_lossy(name.as_ref())
                            ),
                        });
                    }
                    match kind {
                        OpenKind::Tracked => builder.close(),
                        OpenKind::Ignored => ignored_depth -= 1,
                        OpenKind::Root => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if let Some((unclosed, _)) = open.pop() {
            return Err(ParseError::Unclosed(String::from_utf8_lossy(&unclosed).into_owned()));
        }
        if !saw_root {
            return Err(ParseError::MissingRoot);
        }

        Ok(builder.doc)
    }

    /// Parse from a file path - auto-detects gzip compression
    pub fn parse_file(path: &Path) -> Result<SourceDocument, ParseError> {
        let file = std::fs::File::open(path)?;
        let mut reader = BufReader::with_capacity(64 * 1024, file);

        // Read first 2 bytes to check for gzip magic number (1f 8b)
        let mut magic = [0u8; 2];
        let is_gzip = match reader.read_exact(&mut magic) {
            Ok(()) => magic == GZIP_MAGIC,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => false,
            Err(e) => return Err(e.into()),
        };
        reader.seek(SeekFrom::Start(0))?;

        let doc = if is_gzip {
            let decoder = GzDecoder::new(reader);
            let buf_reader = BufReader::with_capacity(64 * 1024, decoder);
            Self::parse_reader(SanitizingBufReader::new(buf_reader), path)?
        } else {
            Self::parse_reader(SanitizingBufReader::new(reader), path)?
        };

        info!(
            "Loaded {}: {} channels, {} programmes",
            doc.file_name(),
            doc.channels.len(),
            doc.programmes.len()
        );
        Ok(doc)
    }
}

/// Gzip magic bytes
pub(crate) const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// BufReader wrapper that filters out illegal XML 1.0 characters on read
/// Legal XML 1.0: #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
/// Also escapes bare ampersands that do not start an entity, except inside
/// CDATA sections, which pass through untouched
struct SanitizingBufReader<R> {
    inner: R,
    buffer: Vec<u8>,
    /// Bytes held back because an entity or CDATA marker might continue in
    /// the next chunk
    carry: Vec<u8>,
    out_buffer: Vec<u8>,
    pos: usize,
    eof: bool,
    in_cdata: bool,
}

const CDATA_OPEN: &[u8] = b"<![CDATA[";
const CDATA_CLOSE: &[u8] = b"]]>";

/// Longest entity we look ahead for, e.g. `&#x10FFFF;`
const MAX_ENTITY_LEN: usize = 12;

impl<R: Read> SanitizingBufReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: vec![0u8; 64 * 1024],
            carry: Vec::with_capacity(MAX_ENTITY_LEN),
            out_buffer: Vec::with_capacity(96 * 1024), // Slightly larger for escapes
            pos: 0,
            eof: false,
            in_cdata: false,
        }
    }

    fn sanitize_byte(b: u8) -> u8 {
        match b {
            0x09 | 0x0A | 0x0D => b, // Tab, LF, CR - keep
            0x00..=0x1F => 0x20,     // Control chars -> space
            0x7F => 0x20,            // DEL -> space
            _ => b,
        }
    }

    fn refill_buffer(&mut self) -> std::io::Result<()> {
        self.out_buffer.clear();
        self.pos = 0;

        while self.out_buffer.is_empty() && !(self.eof && self.carry.is_empty()) {
            let mut chunk = std::mem::take(&mut self.carry);
            if !self.eof {
                let n = loop {
                    match self.inner.read(&mut self.buffer) {
                        Ok(n) => break n,
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(e) => return Err(e),
                    }
                };
                if n == 0 {
                    self.eof = true;
                }
                chunk.extend_from_slice(&self.buffer[..n]);
            }

            let mut i = 0;
            while i < chunk.len() {
                let b = Self::sanitize_byte(chunk[i]);
                let marker = match b {
                    b']' if self.in_cdata => Some(CDATA_CLOSE),
                    b'<' if !self.in_cdata => Some(CDATA_OPEN),
                    _ => None,
                };
                if let Some(marker) = marker {
                    match Self::marker_status(&chunk[i..], marker, self.eof) {
                        EntityStatus::Valid => {
                            self.out_buffer.extend_from_slice(marker);
                            self.in_cdata = !self.in_cdata;
                            i += marker.len();
                            continue;
                        }
                        EntityStatus::Incomplete => {
                            self.carry.extend_from_slice(&chunk[i..]);
                            break;
                        }
                        EntityStatus::Bare => self.out_buffer.push(b),
                    }
                } else if b == b'&' && !self.in_cdata {
                    match Self::entity_status(&chunk[i..], self.eof) {
                        EntityStatus::Valid => self.out_buffer.push(b),
                        EntityStatus::Bare => self.out_buffer.extend_from_slice(b"&amp;"),
                        EntityStatus::Incomplete => {
                            self.carry.extend_from_slice(&chunk[i..]);
                            break;
                        }
                    }
                } else {
                    self.out_buffer.push(b);
                }
                i += 1;
            }
        }
        Ok(())
    }

    /// Whether `bytes` starts with `marker`, or may once more input arrives
    fn marker_status(bytes: &[u8], marker: &[u8], at_eof: bool) -> EntityStatus {
        if bytes.starts_with(marker) {
            EntityStatus::Valid
        } else if bytes.len() < marker.len() && marker.starts_with(bytes) && !at_eof {
            EntityStatus::Incomplete
        } else {
            EntityStatus::Bare
        }
    }

    /// Check if bytes starting with & look like a valid XML entity
    fn entity_status(bytes: &[u8], at_eof: bool) -> EntityStatus {
        let mut end = 1;
        while end < bytes.len() && end < MAX_ENTITY_LEN {
            match bytes[end] {
                b';' => {
                    return if end > 1 {
                        EntityStatus::Valid
                    } else {
                        EntityStatus::Bare
                    }
                }
                b'#' if end == 1 => end += 1,
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' => end += 1,
                _ => return EntityStatus::Bare,
            }
        }
        if end == bytes.len() && end < MAX_ENTITY_LEN && !at_eof {
            EntityStatus::Incomplete
        } else {
            EntityStatus::Bare
        }
    }
}

enum EntityStatus {
    Valid,
    Bare,
    Incomplete,
}

impl<R: Read> Read for SanitizingBufReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let available = self.fill_buf()?;
        let to_copy = available.len().min(buf.len());
        buf[..to_copy].copy_from_slice(&available[..to_copy]);
        self.consume(to_copy);
        Ok(to_copy)
    }
}

impl<R: Read> BufRead for SanitizingBufReader<R> {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        if self.pos >= self.out_buffer.len() {
            self.refill_buffer()?;
        }
        Ok(&self.out_buffer[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.out_buffer.len());
    }
}

/// Decode XML entities back to normal characters
pub(crate) fn decode_xml_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find('&') {
        result.push_str(&rest[..start]);
        let candidate = &rest[start..];
        let decoded = candidate
            .find(';')
            .filter(|&end| end <= MAX_ENTITY_LEN)
            .and_then(|end| resolve_entity(&candidate[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                result.push(c);
                rest = &candidate[end + 1..];
            }
            None => {
                result.push('&');
                rest = &candidate[1..];
            }
        }
    }
    result.push_str(rest);
    result
}

fn resolve_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

fn decode_bytes(decoder: Decoder, bytes: &[u8], position: u64) -> Result<Cow<'_, str>, ParseError> {
    decoder.decode(bytes).map_err(|err| ParseError::Encoding {
        position,
        message: err.to_string(),
    })
}

/// Get attribute value from XML element
fn get_attribute(
    e: &BytesStart,
    name: &[u8],
    decoder: Decoder,
    position: u64,
) -> Result<Option<String>, ParseError> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == name {
            let raw = decode_bytes(decoder, attr.value.as_ref(), position)?;
            return Ok(Some(decode_xml_entities(&raw)));
        }
    }
    Ok(None)
}
