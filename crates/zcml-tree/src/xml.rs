//! XML parser module

pub mod model;
pub mod parser;

use std::fs;
use std::path::Path;

use tracing::{debug, instrument};

use crate::error::{Error, ParseError, Result};

pub use model::{qualified_name, Content, Document, Element};
pub use parser::{Config, Parser, XML_NAMESPACE};

/// Parse an XML document held in memory
pub fn parse_str(s: &str) -> std::result::Result<Document, ParseError> {
    Parser::new(s.as_bytes()).parse()
}

/// Read and parse the XML file at `path`
pub fn load(path: &Path) -> Result<Document> {
    load_with_config(path, Config::default())
}

/// Read and parse the XML file at `path` with custom parser limits
#[instrument(level = "debug", skip(config))]
pub fn load_with_config(path: &Path, config: Config) -> Result<Document> {
    let bytes = fs::read(path).map_err(|source| Error::FileAccess {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(bytes = bytes.len(), "read {}", path.display());

    Parser::with_config(&bytes, config)
        .parse()
        .map_err(|source| Error::MalformedDocument {
            path: path.to_path_buf(),
            source,
        })
}
