use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use zcml_tree::{xml, Error, ParseErrorKind, SearchPath, Summary, TreeOptions, TreeWalker, DEFAULT_INIT_FILE};

/// A throwaway source tree holding packages and their ZCML files
struct Fixture {
    root: TempDir,
}

impl Fixture {
    fn new() -> io::Result<Self> {
        Ok(Self {
            root: tempfile::tempdir()?,
        })
    }

    fn path(&self) -> &Path {
        self.root.path()
    }

    fn package_dir(&self, dotted: &str) -> PathBuf {
        dotted
            .split('.')
            .fold(self.path().to_path_buf(), |dir, part| dir.join(part))
    }

    /// Create the package (and its parents) with initializer files
    fn package(&self, dotted: &str) -> io::Result<PathBuf> {
        let mut dir = self.path().to_path_buf();
        for part in dotted.split('.') {
            dir = dir.join(part);
            fs::create_dir_all(&dir)?;
            fs::write(dir.join(DEFAULT_INIT_FILE), "")?;
        }
        Ok(dir)
    }

    /// Write `body` wrapped in a root `<configure>` declaring both namespaces
    fn zcml(&self, dotted: &str, filename: &str, body: &str) -> io::Result<PathBuf> {
        let dir = self.package(dotted)?;
        let path = dir.join(filename);
        fs::write(&path, wrap(body))?;
        Ok(path)
    }

    fn search_path(&self) -> SearchPath {
        SearchPath::new([self.path()])
    }

    fn run(
        &self,
        package: Option<&str>,
        filename: &str,
        options: TreeOptions,
    ) -> zcml_tree::Result<(String, Summary)> {
        let search_path = self.search_path();
        let mut walker =
            TreeWalker::with_working_dir(&search_path, options, self.path(), Vec::new());
        let summary = walker.print_tree(package, filename)?;
        let output = String::from_utf8_lossy(&walker.into_inner()).into_owned();
        Ok((output, summary))
    }

    fn render(&self, package: &str, options: TreeOptions) -> zcml_tree::Result<String> {
        self.run(Some(package), "configure.zcml", options)
            .map(|(output, _)| output)
    }
}

fn wrap(body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
         <configure xmlns=\"http://namespaces.zope.org/zope\"\n\
         \x20          xmlns:zcml=\"http://namespaces.zope.org/zcml\">\n\
         {body}\n\
         </configure>\n"
    )
}

fn lines(expected: &[&str]) -> String {
    let mut text = expected.join("\n");
    text.push('\n');
    text
}

fn show_seen() -> TreeOptions {
    TreeOptions::new(true, false)
}

#[test]
fn nested_includes_are_indented_with_package_prefixes() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    fx.zcml(
        "app",
        "configure.zcml",
        r#"<include package="app.ui" />
           <include file="meta.zcml" />"#,
    )?;
    fx.zcml("app.ui", "configure.zcml", r#"<include package=".views" />"#)?;
    fx.zcml("app.ui.views", "configure.zcml", "<!-- nothing -->")?;
    fx.zcml("app", "meta.zcml", "")?;

    let (output, summary) = fx.run(Some("app"), "configure.zcml", TreeOptions::default())?;
    assert_eq!(
        output,
        lines(&[
            "app:configure.zcml",
            "  app.ui:configure.zcml",
            "    app.ui.views:configure.zcml",
            "  app:meta.zcml",
        ])
    );
    assert_eq!(
        summary,
        Summary {
            visited: 4,
            seen: 0,
            not_found: 0
        }
    );
    Ok(())
}

#[test]
fn three_levels_deep_uses_six_spaces() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    fx.zcml("a", "configure.zcml", r#"<include package="b" />"#)?;
    fx.zcml("b", "configure.zcml", r#"<include package="c" />"#)?;
    fx.zcml("c", "configure.zcml", r#"<include package="d" />"#)?;
    fx.zcml("d", "configure.zcml", "")?;

    let output = fx.render("a", TreeOptions::default())?;
    let last = output.lines().last().unwrap_or_default();
    assert_eq!(last, "      d:configure.zcml");
    Ok(())
}

#[test]
fn cycle_prints_each_file_once() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    fx.zcml("a", "configure.zcml", r#"<include package="b" />"#)?;
    fx.zcml("b", "configure.zcml", r#"<include package="a" />"#)?;

    let output = fx.render("a", TreeOptions::default())?;
    assert_eq!(output, lines(&["a:configure.zcml", "  b:configure.zcml"]));

    let output = fx.render("a", show_seen())?;
    assert_eq!(
        output,
        lines(&[
            "a:configure.zcml",
            "  b:configure.zcml",
            "    a:configure.zcml [seen]",
        ])
    );
    Ok(())
}

#[test]
fn self_include_terminates() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    fx.zcml("a", "configure.zcml", r#"<include file="configure.zcml" />"#)?;

    let (output, summary) = fx.run(Some("a"), "configure.zcml", show_seen())?;
    assert_eq!(
        output,
        lines(&["a:configure.zcml", "  a:configure.zcml [seen]"])
    );
    assert_eq!(summary.seen, 1);
    Ok(())
}

#[test]
fn diamond_prints_shared_file_once() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    fx.zcml(
        "a",
        "configure.zcml",
        r#"<include package="b" />
           <include package="c" />"#,
    )?;
    fx.zcml("b", "configure.zcml", r#"<include package="d" />"#)?;
    fx.zcml("c", "configure.zcml", r#"<include package="d" />"#)?;
    fx.zcml("d", "configure.zcml", "")?;

    let output = fx.render("a", TreeOptions::default())?;
    assert_eq!(
        output,
        lines(&[
            "a:configure.zcml",
            "  b:configure.zcml",
            "    d:configure.zcml",
            "  c:configure.zcml",
        ])
    );
    assert_eq!(output.matches("d:configure.zcml").count(), 1);

    let output = fx.render("a", show_seen())?;
    assert!(output.ends_with("  c:configure.zcml\n    d:configure.zcml [seen]\n"));
    Ok(())
}

#[test]
fn missing_package_is_a_leaf_and_siblings_continue() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    fx.zcml(
        "a",
        "configure.zcml",
        r#"<include package="not.installed" />
           <include package="b" />"#,
    )?;
    fx.zcml("b", "configure.zcml", "")?;

    let (output, summary) = fx.run(Some("a"), "configure.zcml", TreeOptions::default())?;
    assert_eq!(
        output,
        lines(&[
            "a:configure.zcml",
            "  not.installed:configure.zcml [not found]",
            "  b:configure.zcml",
        ])
    );
    assert_eq!(summary.not_found, 1);
    assert_eq!(summary.visited, 2);
    Ok(())
}

#[test]
fn ascent_to_the_top_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    fx.zcml(
        "a",
        "configure.zcml",
        r#"<include package=".." />
           <include package="...x" />
           <include package="b" />"#,
    )?;
    fx.zcml("b", "configure.zcml", "")?;

    let (output, summary) = fx.run(Some("a"), "configure.zcml", TreeOptions::default())?;
    assert_eq!(
        output,
        lines(&[
            "a:configure.zcml",
            "  .:configure.zcml [not found]",
            "  .x:configure.zcml [not found]",
            "  b:configure.zcml",
        ])
    );
    assert_eq!(summary.not_found, 2);
    Ok(())
}

#[test]
fn empty_file_attribute_means_configure_zcml() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    fx.zcml("a", "configure.zcml", r#"<include package="b" file="" />"#)?;
    fx.zcml("b", "configure.zcml", "")?;

    let output = fx.render("a", TreeOptions::default())?;
    assert_eq!(output, lines(&["a:configure.zcml", "  b:configure.zcml"]));
    Ok(())
}

#[test]
fn directory_without_initializer_is_not_a_package() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    fx.zcml("a", "configure.zcml", r#"<include package="plain" />"#)?;
    let plain = fx.package_dir("plain");
    fs::create_dir_all(&plain)?;
    fs::write(plain.join("configure.zcml"), wrap(""))?;

    let output = fx.render("a", TreeOptions::default())?;
    assert_eq!(
        output,
        lines(&["a:configure.zcml", "  plain:configure.zcml [not found]"])
    );
    Ok(())
}

#[test]
fn conditions_accumulate_through_configure() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    fx.zcml(
        "a",
        "configure.zcml",
        r#"<configure zcml:condition="X">
             <include package="b" zcml:condition="Y" />
             <include package="c" />
           </configure>
           <include package="d" />"#,
    )?;
    fx.zcml("b", "configure.zcml", "")?;
    fx.zcml("c", "configure.zcml", r#"<include package="e" />"#)?;
    fx.zcml("d", "configure.zcml", "")?;
    fx.zcml("e", "configure.zcml", "")?;

    let output = fx.render("a", TreeOptions::default())?;
    assert_eq!(
        output,
        lines(&[
            "a:configure.zcml",
            "  b:configure.zcml [conditional on X and Y]",
            "  c:configure.zcml [conditional on X]",
            "    e:configure.zcml [conditional on X]",
            "  d:configure.zcml",
        ])
    );
    Ok(())
}

#[test]
fn condition_is_kept_on_not_found_and_seen_lines() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    fx.zcml(
        "a",
        "configure.zcml",
        r#"<include package="missing" zcml:condition="installed missing" />
           <include package="a" zcml:condition="again" />"#,
    )?;

    let output = fx.render("a", show_seen())?;
    assert_eq!(
        output,
        lines(&[
            "a:configure.zcml",
            "  missing:configure.zcml [conditional on installed missing] [not found]",
            "  a:configure.zcml [conditional on again] [seen]",
        ])
    );
    Ok(())
}

#[test]
fn configure_package_scope_is_restored_for_siblings() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    fx.zcml(
        "app",
        "configure.zcml",
        r#"<configure package=".ui">
             <include file="ui.zcml" />
             <configure package="..core">
               <include />
             </configure>
             <include file="more.zcml" />
           </configure>
           <include file="meta.zcml" />"#,
    )?;
    fx.zcml("app.ui", "ui.zcml", "")?;
    fx.zcml("app.ui", "more.zcml", "")?;
    fx.zcml("app.core", "configure.zcml", "")?;
    fx.zcml("app", "meta.zcml", "")?;

    let output = fx.render("app", TreeOptions::default())?;
    assert_eq!(
        output,
        lines(&[
            "app:configure.zcml",
            "  app.ui:ui.zcml",
            "  app.core:configure.zcml",
            "  app.ui:more.zcml",
            "  app:meta.zcml",
        ])
    );
    Ok(())
}

#[test]
fn unrelated_elements_are_transparent() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    fx.zcml(
        "a",
        "configure.zcml",
        r#"<adapter factory=".adapters.Thing" />
           <browser:page xmlns:browser="http://namespaces.zope.org/browser" name="index">
             <include package="b" />
           </browser:page>
           <other xmlns="urn:other"><include package="c" /></other>"#,
    )?;
    fx.zcml("b", "configure.zcml", "")?;
    fx.zcml("c", "configure.zcml", "")?;

    let output = fx.render("a", TreeOptions::default())?;
    assert_eq!(output, lines(&["a:configure.zcml", "  b:configure.zcml"]));
    Ok(())
}

#[test]
fn root_without_package_is_read_from_working_dir() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    fs::write(fx.path().join("site.zcml"), wrap(r#"<include package="a" />"#))?;
    fx.zcml("a", "configure.zcml", "")?;

    let (output, _) = fx.run(None, "site.zcml", TreeOptions::default())?;
    assert_eq!(output, lines(&["site.zcml", "  a:configure.zcml"]));
    Ok(())
}

#[test]
fn full_filenames_show_resolved_paths() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    let root = fx.zcml(
        "a",
        "configure.zcml",
        r#"<include package="b" zcml:condition="X" />
           <include package="gone" />"#,
    )?;
    let child = fx.zcml("b", "configure.zcml", "")?;

    let output = fx.render("a", TreeOptions::new(false, true))?;
    let root_line = root.display().to_string();
    let child_line = format!("  {} [conditional on X]", child.display());
    assert_eq!(
        output,
        lines(&[
            root_line.as_str(),
            child_line.as_str(),
            "  gone:configure.zcml [not found]",
        ])
    );
    Ok(())
}

#[test]
fn earliest_search_path_entry_wins() -> Result<(), Box<dyn std::error::Error>> {
    let first = Fixture::new()?;
    let second = Fixture::new()?;
    first.zcml("shared", "configure.zcml", "")?;
    second.zcml("shared", "configure.zcml", r#"<include package="never" />"#)?;

    let search_path = SearchPath::new([first.path(), second.path()]);
    let mut walker = TreeWalker::with_working_dir(
        &search_path,
        TreeOptions::default(),
        first.path(),
        Vec::new(),
    );
    walker.print_tree(Some("shared"), "configure.zcml")?;
    let output = String::from_utf8(walker.into_inner())?;
    assert_eq!(output, lines(&["shared:configure.zcml"]));
    Ok(())
}

#[test]
fn malformed_included_file_is_fatal() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    fx.zcml("a", "configure.zcml", r#"<include package="b" />"#)?;
    let broken = fx.package("b")?.join("configure.zcml");
    fs::write(&broken, "<configure><include></configure>")?;

    let err = fx.render("a", TreeOptions::default()).err();
    assert!(
        matches!(&err, Some(Error::MalformedDocument { path, .. }) if *path == broken),
        "unexpected result: {err:?}"
    );
    Ok(())
}

#[test]
fn missing_file_in_existing_package_is_fatal() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    fx.zcml("a", "configure.zcml", r#"<include file="absent.zcml" />"#)?;

    let absent = fx.package_dir("a").join("absent.zcml");
    let err = fx.render("a", TreeOptions::default()).err();
    assert!(
        matches!(&err, Some(Error::FileAccess { path, .. }) if *path == absent),
        "unexpected result: {err:?}"
    );
    Ok(())
}

#[test]
fn parser_limits_apply_to_every_file() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    fx.zcml("a", "configure.zcml", r#"<include package="b" />"#)?;
    fx.zcml("b", "configure.zcml", "<configure><configure/></configure>")?;

    let search_path = fx.search_path();
    let mut walker =
        TreeWalker::with_working_dir(&search_path, TreeOptions::default(), fx.path(), Vec::new())
            .with_xml_config(xml::Config::new(3, 0));

    let err = walker.print_tree(Some("a"), "configure.zcml").err();
    assert!(
        matches!(
            &err,
            Some(Error::MalformedDocument { source, .. })
                if source.kind() == &ParseErrorKind::MaxDepthExceeded { max: 3 }
        ),
        "unexpected result: {err:?}"
    );
    Ok(())
}

#[test]
fn render_tree_collects_output() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    fx.zcml("a", "configure.zcml", r#"<include package="b" zcml:condition="have b" />"#)?;
    fx.zcml("b", "configure.zcml", "")?;

    let output = zcml_tree::render_tree(
        &fx.search_path(),
        TreeOptions::default(),
        Some("a"),
        "configure.zcml",
    )?;
    assert_eq!(
        output,
        lines(&["a:configure.zcml", "  b:configure.zcml [conditional on have b]"])
    );
    Ok(())
}
