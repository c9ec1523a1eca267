//! Include-tree walker
//!
//! Renders one line per visited file, nested by include depth:
//!
//! ```text
//! app:configure.zcml
//!   app.ui:configure.zcml [conditional on installed app.ui]
//!     app.ui:meta.zcml
//!   extras:configure.zcml [not found]
//! ```

use std::collections::HashSet;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::package::{resolve_package, SearchPath};
use crate::xml::{self, qualified_name, Element};

/// Namespace of the `configure` and `include` directives
pub const ZOPE_NAMESPACE: &str = "http://namespaces.zope.org/zope";

/// Namespace of the `condition` attribute
pub const ZCML_NAMESPACE: &str = "http://namespaces.zope.org/zcml";

/// File an include falls back to when it names no `file`
pub const DEFAULT_FILENAME: &str = "configure.zcml";

const INDENT: &str = "  ";

/// Files already printed during one run, keyed by absolute path
pub type Visited = HashSet<PathBuf>;

/// Display options for a run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TreeOptions {
    /// Print `[seen]` lines for files reached again
    pub show_seen: bool,
    /// Print absolute paths instead of `package:filename`
    pub full_filenames: bool,
}

impl TreeOptions {
    pub const fn new(show_seen: bool, full_filenames: bool) -> Self {
        Self {
            show_seen,
            full_filenames,
        }
    }
}

/// Structural role of an element
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Directive {
    Configure,
    Include,
    Other,
}

impl Directive {
    pub fn of(element: &Element) -> Self {
        let Some(local) = element
            .name
            .strip_prefix('{')
            .and_then(|rest| rest.strip_prefix(ZOPE_NAMESPACE))
            .and_then(|rest| rest.strip_prefix('}'))
        else {
            return Self::Other;
        };
        match local {
            "configure" => Self::Configure,
            "include" => Self::Include,
            _ => Self::Other,
        }
    }
}

/// Package and accumulated conditions in effect for a subtree
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Scope {
    pub package: Option<String>,
    pub conditions: Vec<String>,
}

impl Scope {
    pub fn new(package: Option<&str>) -> Self {
        Self {
            package: package.filter(|p| !p.is_empty()).map(ToString::to_string),
            conditions: Vec::new(),
        }
    }

    /// Scope for the subtree of a configure or include element
    pub fn enter(&self, element: &Element, condition_attr: &str) -> Self {
        let mut conditions = self.conditions.clone();
        if let Some(condition) = element.attribute(condition_attr) {
            conditions.push(condition.to_string());
        }
        Self {
            package: resolve_package(element.attribute("package"), self.package.as_deref()),
            conditions,
        }
    }
}

/// Annotation closing a tree line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Visited,
    Seen,
    NotFound,
}

/// One rendered line of the tree
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeLine<'a> {
    pub level: usize,
    pub label: Label<'a>,
    pub conditions: &'a [String],
    pub status: Status,
}

/// What a line names: `package:filename`, or a resolved path
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Label<'a> {
    File {
        package: Option<&'a str>,
        filename: &'a str,
    },
    Path(&'a Path),
}

impl fmt::Display for Label<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File {
                package: Some(package),
                filename,
            } => write!(f, "{package}:{filename}"),
            Self::File {
                package: None,
                filename,
            } => f.write_str(filename),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

impl fmt::Display for TreeLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for _ in 0..self.level {
            f.write_str(INDENT)?;
        }
        write!(f, "{}", self.label)?;
        if !self.conditions.is_empty() {
            write!(f, " [conditional on {}]", self.conditions.join(" and "))?;
        }
        match self.status {
            Status::Visited => Ok(()),
            Status::Seen => f.write_str(" [seen]"),
            Status::NotFound => f.write_str(" [not found]"),
        }
    }
}

/// Counts gathered while printing a tree
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub visited: usize,
    pub seen: usize,
    pub not_found: usize,
}

/// Walks include directives and writes the tree to `out`
#[derive(Debug)]
pub struct TreeWalker<'a, W> {
    search_path: &'a SearchPath,
    options: TreeOptions,
    working_dir: PathBuf,
    xml_config: xml::Config,
    condition_attr: String,
    summary: Summary,
    out: W,
}

impl<'a, W: Write> TreeWalker<'a, W> {
    /// Create a walker resolving package-less filenames against the current directory
    pub fn new(search_path: &'a SearchPath, options: TreeOptions, out: W) -> Result<Self> {
        let working_dir = std::env::current_dir().map_err(|source| Error::FileAccess {
            path: PathBuf::from("."),
            source,
        })?;
        Ok(Self::with_working_dir(search_path, options, working_dir, out))
    }

    /// Create a walker resolving package-less filenames against `working_dir`
    pub fn with_working_dir(
        search_path: &'a SearchPath,
        options: TreeOptions,
        working_dir: impl Into<PathBuf>,
        out: W,
    ) -> Self {
        Self {
            search_path,
            options,
            working_dir: working_dir.into(),
            xml_config: xml::Config::default(),
            condition_attr: qualified_name(ZCML_NAMESPACE, "condition"),
            summary: Summary::default(),
            out,
        }
    }

    /// Use custom parser limits for every file read
    pub fn with_xml_config(mut self, config: xml::Config) -> Self {
        self.xml_config = config;
        self
    }

    /// Consume the walker, returning the output sink
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Print the whole tree below `filename` with a fresh visited set
    pub fn print_tree(&mut self, package: Option<&str>, filename: &str) -> Result<Summary> {
        let mut visited = Visited::new();
        self.summary = Summary::default();
        self.print_include_tree(&Scope::new(package), filename, 0, &mut visited)?;
        info!(
            visited = self.summary.visited,
            seen = self.summary.seen,
            not_found = self.summary.not_found,
            "include tree complete"
        );
        Ok(self.summary)
    }

    /// Print one file and, unless already visited, everything it includes
    #[instrument(level = "debug", skip(self, scope, visited), fields(package = ?scope.package))]
    pub fn print_include_tree(
        &mut self,
        scope: &Scope,
        filename: &str,
        level: usize,
        visited: &mut Visited,
    ) -> Result<()> {
        let package = scope.package.as_deref();
        let file_label = Label::File { package, filename };

        let resolved = match self.search_path.resolve_file(package, filename) {
            Ok(resolved) => self.working_dir.join(resolved),
            Err(err) if err.is_recoverable() => {
                debug!("{err}");
                self.summary.not_found += 1;
                return self.emit(level, file_label, scope, Status::NotFound);
            }
            Err(err) => return Err(err),
        };

        let label = if self.options.full_filenames {
            Label::Path(&resolved)
        } else {
            file_label
        };

        if visited.contains(&resolved) {
            debug!("already visited {}", resolved.display());
            self.summary.seen += 1;
            if self.options.show_seen {
                self.emit(level, label, scope, Status::Seen)?;
            }
            return Ok(());
        }

        self.emit(level, label, scope, Status::Visited)?;
        self.summary.visited += 1;
        visited.insert(resolved.clone());

        let document = xml::load_with_config(&resolved, self.xml_config)?;
        self.walk(&document.root, scope, level, visited)
    }

    /// Depth-first traversal of one parsed file
    fn walk(
        &mut self,
        element: &Element,
        scope: &Scope,
        level: usize,
        visited: &mut Visited,
    ) -> Result<()> {
        let directive = Directive::of(element);
        let entered;
        let scope = match directive {
            Directive::Configure | Directive::Include => {
                entered = scope.enter(element, &self.condition_attr);
                &entered
            }
            Directive::Other => scope,
        };

        if directive == Directive::Include {
            let filename = element
                .attribute("file")
                .filter(|file| !file.is_empty())
                .unwrap_or(DEFAULT_FILENAME);
            self.print_include_tree(scope, filename, level + 1, visited)?;
        }

        for child in element.elements() {
            self.walk(child, scope, level, visited)?;
        }
        Ok(())
    }

    fn emit(&mut self, level: usize, label: Label<'_>, scope: &Scope, status: Status) -> Result<()> {
        let line = TreeLine {
            level,
            label,
            conditions: &scope.conditions,
            status,
        };
        writeln!(self.out, "{line}")?;
        Ok(())
    }
}
