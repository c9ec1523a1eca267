//! Dotted package names: relative resolution and search-path lookup

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Initializer file whose presence marks a directory as a package
pub const DEFAULT_INIT_FILE: &str = "__init__.py";

/// Resolve a possibly relative package specifier against the current package.
///
/// An absent or empty specifier inherits `current`. A specifier without a
/// leading dot is absolute. Otherwise every dot after the first climbs one
/// dotted component out of `current`, and the remaining `.suffix` is
/// appended. Climbing to or past the top keeps the leading dots, so the
/// result may be `"."` or start with a dot; [`SearchPath`] never finds such
/// names and reports them as [`Error::PackageNotFound`].
///
/// ```
/// use zcml_tree::resolve_package;
///
/// assert_eq!(resolve_package(Some(".views"), Some("app.ui")).as_deref(), Some("app.ui.views"));
/// assert_eq!(resolve_package(Some("..core"), Some("app.ui")).as_deref(), Some("app.core"));
/// assert_eq!(resolve_package(None, Some("app.ui")).as_deref(), Some("app.ui"));
/// assert_eq!(resolve_package(Some(".."), Some("app")).as_deref(), Some("."));
/// ```
pub fn resolve_package(specifier: Option<&str>, current: Option<&str>) -> Option<String> {
    match specifier {
        None | Some("") => current.filter(|package| !package.is_empty()).map(ToString::to_string),
        Some(absolute) if !absolute.starts_with('.') => Some(absolute.to_string()),
        Some(relative) => {
            let mut rest = relative;
            let mut base = current.unwrap_or_default();
            while let Some(next) = rest.strip_prefix('.').filter(|r| r.starts_with('.')) {
                rest = next;
                base = base.rsplit_once('.').map_or("", |(parent, _)| parent);
            }
            if rest == "." && !base.is_empty() {
                Some(base.to_string())
            } else {
                Some(format!("{base}{rest}"))
            }
        }
    }
}

/// Ordered list of directories consulted to locate packages
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
    init_file: String,
}

impl Default for SearchPath {
    fn default() -> Self {
        Self {
            dirs: Vec::new(),
            init_file: DEFAULT_INIT_FILE.to_string(),
        }
    }
}

impl SearchPath {
    /// Create a search path over `dirs`, consulted in order
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Use a different initializer filename
    pub fn with_init_file(mut self, init_file: impl Into<String>) -> Self {
        self.init_file = init_file.into();
        self
    }

    /// Append a directory after the existing entries
    pub fn push(&mut self, dir: impl Into<PathBuf>) {
        self.dirs.push(dir.into());
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub fn init_file(&self) -> &str {
        &self.init_file
    }

    /// Find the directory of an absolute dotted package.
    ///
    /// The first search-path entry containing `a/b/c/<init file>` wins.
    pub fn locate(&self, package: &str) -> Result<PathBuf> {
        let not_found = || Error::PackageNotFound {
            package: package.to_string(),
        };

        if package.is_empty() || package.split('.').any(str::is_empty) {
            debug!(package, "refusing to locate relative or empty package name");
            return Err(not_found());
        }

        let relative: PathBuf = package.split('.').collect();
        let init = relative.join(&self.init_file);
        for dir in &self.dirs {
            let candidate = dir.join(&init);
            trace!("checking {}", candidate.display());
            if candidate.exists() {
                let location = dir.join(&relative);
                debug!(package, "located in {}", location.display());
                return Ok(location);
            }
        }

        Err(not_found())
    }

    /// Turn `(package, filename)` into the path of the file to read.
    ///
    /// Without a package the filename is returned unchanged. The joined path
    /// is not checked for existence.
    pub fn resolve_file(&self, package: Option<&str>, filename: &str) -> Result<PathBuf> {
        match package.filter(|p| !p.is_empty()) {
            None => Ok(PathBuf::from(filename)),
            Some(package) => self
                .locate(package)
                .map(|location| location.join(Path::new(filename))),
        }
    }
}
