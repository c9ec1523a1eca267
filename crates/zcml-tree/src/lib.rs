//! zcml-tree - render the include tree of ZCML configuration
//!
//! Starting from a root file, every `<include>` directive is followed into
//! its target file, resolving `package` attributes against a search path the
//! way an interpreter locates modules. Each file is printed once, indented by
//! include depth and annotated with its accumulated `zcml:condition`s.
//!
//! # Quick Start
//!
//! ```no_run
//! use zcml_tree::{SearchPath, TreeOptions};
//! # fn main() -> Result<(), zcml_tree::Error> {
//! let search_path = SearchPath::new(["/srv/app/src"]);
//! let mut out = Vec::new();
//! let summary = zcml_tree::print_tree(
//!     &search_path,
//!     TreeOptions::default(),
//!     Some("app"),
//!     "configure.zcml",
//!     &mut out,
//! )?;
//! assert!(summary.visited >= 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub use error::{Error, ParseError, ParseErrorKind, Pos, Result, Span};

pub mod lexer;

pub mod xml;
pub use xml::{load, Document as XmlDocument, Element as XmlElement};

pub mod package;
pub use package::{resolve_package, SearchPath, DEFAULT_INIT_FILE};

pub mod tree;
pub use tree::{
    Directive, Scope, Status, Summary, TreeLine, TreeOptions, TreeWalker, Visited,
    DEFAULT_FILENAME, ZCML_NAMESPACE, ZOPE_NAMESPACE,
};

use std::io::Write;

/// Print the include tree of `filename` into `out`, resolving bare filenames
/// against the current directory
pub fn print_tree<W: Write>(
    search_path: &SearchPath,
    options: TreeOptions,
    package: Option<&str>,
    filename: &str,
    out: W,
) -> Result<Summary> {
    TreeWalker::new(search_path, options, out)?.print_tree(package, filename)
}

/// Render the include tree of `filename` to a string
pub fn render_tree(
    search_path: &SearchPath,
    options: TreeOptions,
    package: Option<&str>,
    filename: &str,
) -> Result<String> {
    let mut out = Vec::new();
    print_tree(search_path, options, package, filename, &mut out)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}
