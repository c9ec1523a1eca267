//! XML parser implementation

use indexmap::IndexMap;

use crate::error::{ParseError, ParseErrorKind, Pos, Span};
use crate::lexer::Cursor;
use crate::xml::model::{qualified_name, Content, Document, Element};

type Result<T> = std::result::Result<T, ParseError>;

/// Namespace permanently bound to the `xml` prefix
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Configuration for the XML parser
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Maximum element nesting depth (0 means unlimited)
    pub max_depth: u16,
    /// Maximum input size in bytes (0 means unlimited)
    pub max_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: 256,
            max_size: 16 * 1024 * 1024, // 16 MB default
        }
    }
}

impl Config {
    /// Create a new config with unlimited depth and size
    pub const fn unlimited() -> Self {
        Self {
            max_depth: 0,
            max_size: 0,
        }
    }

    /// Create a new config with specific limits
    pub const fn new(max_depth: u16, max_size: usize) -> Self {
        Self {
            max_depth,
            max_size,
        }
    }
}

/// A namespace declaration in scope; `prefix` is `None` for the default namespace
#[derive(Clone, Debug)]
struct Binding {
    prefix: Option<String>,
    uri: String,
}

/// XML parser producing a namespace-qualified element tree
#[derive(Debug)]
pub struct Parser<'a> {
    cursor: Cursor<'a>,
    config: Config,
    depth: u16,
    namespaces: Vec<Binding>,
}

impl<'a> Parser<'a> {
    /// Create a new XML parser with default configuration
    pub fn new(input: &'a [u8]) -> Self {
        Self::with_config(input, Config::default())
    }

    /// Create a new XML parser with custom configuration
    pub const fn with_config(input: &'a [u8], config: Config) -> Self {
        Self {
            cursor: Cursor::new(input),
            config,
            depth: 0,
            namespaces: Vec::new(),
        }
    }

    /// Parse an XML document
    pub fn parse(&mut self) -> Result<Document> {
        let size = self.cursor.remaining().len();
        if self.config.max_size != 0 && size > self.config.max_size {
            return Err(ParseError::at(
                ParseErrorKind::MaxSizeExceeded {
                    max: self.config.max_size,
                },
                self.cursor.position(),
            ));
        }

        if self.cursor.starts_with(BOM) {
            self.cursor.advance_by(BOM.len());
        }

        self.skip_misc(true)?;
        if self.cursor.is_eof() {
            return Err(self.error_kind(ParseErrorKind::UnexpectedEof));
        }
        let root = self.parse_element()?;
        self.skip_misc(false)?;

        if !self.cursor.is_eof() {
            return Err(self.error_kind(ParseErrorKind::TrailingContent));
        }

        Ok(Document { root })
    }

    /// Skip whitespace, comments and processing instructions outside the root
    fn skip_misc(&mut self, allow_doctype: bool) -> Result<()> {
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.starts_with(b"<?") {
                self.skip_processing_instruction()?;
            } else if self.cursor.starts_with(b"<!--") {
                self.skip_comment()?;
            } else if allow_doctype && self.cursor.starts_with(b"<!DOCTYPE") {
                self.skip_doctype()?;
            } else {
                return Ok(());
            }
        }
    }

    fn parse_element(&mut self) -> Result<Element> {
        let start = self.cursor.position();
        self.expect_byte(b'<')?;

        self.depth = self.depth.saturating_add(1);
        if self.config.max_depth != 0 && self.depth > self.config.max_depth {
            return Err(ParseError::at(
                ParseErrorKind::MaxDepthExceeded {
                    max: self.config.max_depth,
                },
                start,
            ));
        }

        let raw_name = self.parse_name()?;
        let raw_attributes = self.parse_attributes()?;

        let mark = self.namespaces.len();
        let mut plain = Vec::with_capacity(raw_attributes.len());
        for (name, value) in raw_attributes {
            if name == "xmlns" {
                self.namespaces.push(Binding { prefix: None, uri: value });
            } else if let Some(prefix) = name.strip_prefix("xmlns:") {
                self.namespaces.push(Binding {
                    prefix: Some(prefix.to_string()),
                    uri: value,
                });
            } else {
                plain.push((name, value));
            }
        }

        let name = self.qualify(&raw_name, true, start)?;
        let mut attributes = IndexMap::with_capacity(plain.len());
        for (raw, value) in plain {
            let qualified = self.qualify(&raw, false, start)?;
            if attributes.contains_key(&qualified) {
                return Err(ParseError::at(
                    ParseErrorKind::DuplicateAttribute { name: qualified },
                    start,
                ));
            }
            attributes.insert(qualified, value);
        }

        let children = if self.cursor.consume(b'/') {
            self.expect_byte(b'>')?;
            Vec::new()
        } else {
            self.expect_byte(b'>')?;
            self.parse_children(&raw_name)?
        };

        self.namespaces.truncate(mark);
        self.depth = self.depth.saturating_sub(1);

        Ok(Element {
            name,
            attributes,
            children,
        })
    }

    fn parse_children(&mut self, open_name: &str) -> Result<Vec<Content>> {
        let mut children = Vec::new();
        loop {
            if self.cursor.starts_with(b"</") {
                let pos = self.cursor.position();
                self.cursor.advance_by(2);
                let close_name = self.parse_name()?;
                if close_name != open_name {
                    return Err(ParseError::at(
                        ParseErrorKind::MismatchedTag {
                            expected: open_name.to_string(),
                            found: close_name,
                        },
                        pos,
                    ));
                }
                self.cursor.skip_whitespace();
                self.expect_byte(b'>')?;
                return Ok(children);
            }

            if self.cursor.starts_with(b"<!--") {
                self.skip_comment()?;
            } else if self.cursor.starts_with(b"<![CDATA[") {
                self.cursor.advance_by(9);
                let pos = self.cursor.position();
                let raw = self.read_until(b"]]>")?;
                let text = bytes_to_string(raw, pos)?;
                if !text.trim().is_empty() {
                    children.push(Content::Text(text));
                }
            } else if self.cursor.starts_with(b"<?") {
                self.skip_processing_instruction()?;
            } else if self.cursor.starts_with(b"<!") {
                return Err(self.error_here("unexpected markup declaration"));
            } else if self.cursor.current() == Some(b'<') {
                let child = self.parse_element()?;
                children.push(Content::Element(child));
            } else if self.cursor.is_eof() {
                return Err(self.error_kind(ParseErrorKind::UnexpectedEof));
            } else if let Some(text) = self.parse_text()? {
                children.push(Content::Text(text));
            }
        }
    }

    /// Rewrite a raw `prefix:local` name into Clark notation
    fn qualify(&self, raw: &str, is_element: bool, pos: Pos) -> Result<String> {
        match raw.split_once(':') {
            Some((prefix, local)) => {
                let uri = if prefix == "xml" {
                    XML_NAMESPACE
                } else {
                    self.lookup(Some(prefix)).ok_or_else(|| {
                        ParseError::at(
                            ParseErrorKind::UnboundPrefix {
                                prefix: prefix.to_string(),
                            },
                            pos,
                        )
                    })?
                };
                Ok(qualified_name(uri, local))
            }
            None if is_element => match self.lookup(None) {
                Some(uri) => Ok(qualified_name(uri, raw)),
                None => Ok(raw.to_string()),
            },
            None => Ok(raw.to_string()),
        }
    }

    /// Find the innermost binding for a prefix; an empty URI undeclares it
    fn lookup(&self, prefix: Option<&str>) -> Option<&str> {
        self.namespaces
            .iter()
            .rev()
            .find(|binding| binding.prefix.as_deref() == prefix)
            .map(|binding| binding.uri.as_str())
            .filter(|uri| !uri.is_empty())
    }

    fn parse_attributes(&mut self) -> Result<Vec<(String, String)>> {
        let mut attrs: Vec<(String, String)> = Vec::new();

        loop {
            self.cursor.skip_whitespace();
            match self.cursor.current() {
                Some(b'/') | Some(b'>') => break,
                Some(_) => {}
                None => return Err(self.error_kind(ParseErrorKind::UnexpectedEof)),
            }

            let pos = self.cursor.position();
            let name = self.parse_name()?;
            self.cursor.skip_whitespace();
            self.expect_byte(b'=')?;
            self.cursor.skip_whitespace();
            let value = self.parse_attribute_value()?;

            if attrs.iter().any(|(existing, _)| *existing == name) {
                return Err(ParseError::at(
                    ParseErrorKind::DuplicateAttribute { name },
                    pos,
                ));
            }
            attrs.push((name, value));
        }

        Ok(attrs)
    }

    fn parse_attribute_value(&mut self) -> Result<String> {
        let quote = match self.cursor.current() {
            Some(b'"') => b'"',
            Some(b'\'') => b'\'',
            _ => return Err(self.error_here("expected quoted attribute value")),
        };
        self.cursor.advance();

        let pos = self.cursor.position();
        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if b == quote {
                let raw = self.cursor.slice_from(start);
                self.cursor.advance();
                let text = bytes_to_string(raw, pos)?;
                let normalized = text.replace(['\t', '\n', '\r'], " ");
                return decode_entities(&normalized, pos);
            }
            if b == b'<' {
                return Err(self.error_here("'<' not allowed in attribute value"));
            }
            self.cursor.advance();
        }

        Err(self.error_kind(ParseErrorKind::UnexpectedEof))
    }

    fn parse_text(&mut self) -> Result<Option<String>> {
        let pos = self.cursor.position();
        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if b == b'<' {
                break;
            }
            self.cursor.advance();
        }

        let raw = self.cursor.slice_from(start);
        let text = bytes_to_string(raw, pos)?;

        if text.trim().is_empty() {
            Ok(None)
        } else {
            decode_entities(&text, pos).map(Some)
        }
    }

    fn parse_name(&mut self) -> Result<String> {
        let start_pos = self.cursor.position();
        let start = self.cursor.pos();

        let Some(first) = self.cursor.current() else {
            return Err(self.error_kind(ParseErrorKind::UnexpectedEof));
        };
        if !is_name_start(first) {
            return Err(ParseError::at(ParseErrorKind::InvalidToken, start_pos));
        }

        self.cursor.advance();
        while let Some(b) = self.cursor.current() {
            if is_name_char(b) {
                self.cursor.advance();
            } else {
                break;
            }
        }

        let raw = self.cursor.slice_from(start);
        bytes_to_string(raw, start_pos)
    }

    fn skip_comment(&mut self) -> Result<()> {
        // cursor currently at "<!--"
        self.cursor.advance_by(4);
        self.read_until(b"-->").map(|_| ())
    }

    fn skip_processing_instruction(&mut self) -> Result<()> {
        // cursor currently at "<?"
        self.cursor.advance_by(2);
        self.read_until(b"?>").map(|_| ())
    }

    fn skip_doctype(&mut self) -> Result<()> {
        // cursor currently at "<!DOCTYPE"; an internal subset may nest '<' '>'
        self.cursor.advance_by(9);
        let mut brackets = 0usize;
        let mut quote = None;
        while let Some(b) = self.cursor.current() {
            self.cursor.advance();
            match (quote, b) {
                (Some(q), _) if b == q => quote = None,
                (Some(_), _) => {}
                (None, b'"' | b'\'') => quote = Some(b),
                (None, b'[') => brackets += 1,
                (None, b']') => brackets = brackets.saturating_sub(1),
                (None, b'>') if brackets == 0 => return Ok(()),
                (None, _) => {}
            }
        }
        Err(self.error_kind(ParseErrorKind::UnexpectedEof))
    }

    /// Consume input up to and including `pattern`, returning what came before it
    fn read_until(&mut self, pattern: &[u8]) -> Result<&'a [u8]> {
        let start = self.cursor.pos();
        while !self.cursor.is_eof() {
            if self.cursor.starts_with(pattern) {
                let body = self.cursor.slice_from(start);
                self.cursor.advance_by(pattern.len());
                return Ok(body);
            }
            self.cursor.advance();
        }
        Err(self.error_here("unterminated markup"))
    }

    fn expect_byte(&mut self, expected: u8) -> Result<()> {
        if self.cursor.consume(expected) {
            Ok(())
        } else if self.cursor.is_eof() {
            Err(self.error_kind(ParseErrorKind::UnexpectedEof))
        } else {
            Err(self.error_here(&format!("expected '{}'", char::from(expected))))
        }
    }

    fn error_kind(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::at(kind, self.cursor.position())
    }

    fn error_here(&self, message: &str) -> ParseError {
        let pos = self.cursor.position();
        ParseError::with_message(ParseErrorKind::InvalidToken, Span::at(pos), message)
    }
}

fn bytes_to_string(bytes: &[u8], pos: Pos) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(ToString::to_string)
        .map_err(|_| ParseError::at(ParseErrorKind::InvalidUtf8, pos))
}

fn is_name_start(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'_' | b':') || b >= 0x80
}

fn is_name_char(b: u8) -> bool {
    is_name_start(b) || matches!(b, b'0'..=b'9' | b'-' | b'.')
}

fn decode_entities(input: &str, pos: Pos) -> Result<String> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch != '&' {
            result.push(ch);
            continue;
        }

        let mut entity = String::new();
        let mut terminated = false;
        for next in chars.by_ref() {
            if next == ';' {
                terminated = true;
                break;
            }
            entity.push(next);
        }

        let decoded = if terminated {
            match entity.as_str() {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => decode_numeric_entity(&entity),
            }
        } else {
            None
        };

        match decoded {
            Some(ch) => result.push(ch),
            None => {
                return Err(ParseError::at(
                    ParseErrorKind::InvalidEntity { entity },
                    pos,
                ));
            }
        }
    }

    Ok(result)
}

fn decode_numeric_entity(entity: &str) -> Option<char> {
    if let Some(hex) = entity.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
    } else if let Some(dec) = entity.strip_prefix('#') {
        dec.parse::<u32>().ok().and_then(char::from_u32)
    } else {
        None
    }
}
