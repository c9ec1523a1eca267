//! Error types for zcml-tree

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Position in source code
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pos {
    pub offset: usize,
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.offset, self.line, self.col)
    }
}

impl Pos {
    pub const fn new(offset: usize, line: u32, col: u32) -> Self {
        Self { offset, line, col }
    }
}

/// Span representing a range in source code
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub start: Pos,
    pub end: Pos,
}

impl Span {
    pub const fn new(start: Pos, end: Pos) -> Self {
        Self { start, end }
    }

    pub const fn at(pos: Pos) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }
}

/// What went wrong while reading XML markup
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnexpectedEof,
    InvalidToken,
    InvalidUtf8,
    InvalidEntity { entity: String },
    MismatchedTag { expected: String, found: String },
    DuplicateAttribute { name: String },
    UnboundPrefix { prefix: String },
    TrailingContent,
    MaxDepthExceeded { max: u16 },
    MaxSizeExceeded { max: usize },
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => write!(f, "unexpected end of input"),
            Self::InvalidToken => write!(f, "invalid token"),
            Self::InvalidUtf8 => write!(f, "invalid utf-8"),
            Self::InvalidEntity { entity } => write!(f, "invalid xml entity: &{entity};"),
            Self::MismatchedTag { expected, found } => {
                write!(f, "mismatched closing tag: expected </{expected}>, found </{found}>")
            }
            Self::DuplicateAttribute { name } => write!(f, "duplicate attribute: {name}"),
            Self::UnboundPrefix { prefix } => write!(f, "unbound namespace prefix: {prefix}"),
            Self::TrailingContent => write!(f, "content after root element"),
            Self::MaxDepthExceeded { max } => write!(f, "max depth exceeded: {max}"),
            Self::MaxSizeExceeded { max } => write!(f, "max size exceeded: {max}"),
        }
    }
}

/// Syntax error raised by the XML parser
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("error at {}: {message}", .span.start)]
pub struct ParseError {
    kind: ParseErrorKind,
    span: Span,
    message: String,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, span: Span) -> Self {
        let message = kind.to_string();
        Self {
            kind,
            span,
            message,
        }
    }

    pub fn with_message(kind: ParseErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
        }
    }

    /// Create error at specific position
    pub fn at(kind: ParseErrorKind, pos: Pos) -> Self {
        Self::new(kind, Span::at(pos))
    }

    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }
}

/// Main error type for zcml-tree
#[derive(Error, Debug)]
pub enum Error {
    /// A file the walker decided to visit could not be read
    #[error("cannot read {}: {source}", .path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A file was read but is not well-formed XML
    #[error("malformed document {}: {source}", .path.display())]
    MalformedDocument {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    /// No search-path entry holds the package's initializer
    #[error("could not find package {package}")]
    PackageNotFound { package: String },

    /// Writing a tree line to the output sink failed
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

impl Error {
    /// Whether the walker recovers from this error by rendering a leaf
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::PackageNotFound { .. })
    }
}

/// Result type alias for zcml-tree
pub type Result<T> = std::result::Result<T, Error>;
