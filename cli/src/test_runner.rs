use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use rendering::wikimacro::split_front_matter;
use rendering::{
    DocumentReference, MacroDiagnostic, MemoryStore, PipelineError, RenderingConfig, Right,
    StoredDocument, WikiMacroState,
};
use rendering::config::UserConfig;
use xdom::Syntax;

use crate::session::Session;

const FIXTURE_SUFFIX: &str = ".test.txt";

#[derive(Debug, Deserialize)]
pub struct ExpectedFailure {
    /// Kind of the macro failure, e.g. `unknown-macro`.
    #[serde(default)]
    pub kind: Option<String>,

    /// Substring that must appear in the failure message.
    #[serde(default)]
    pub contains: Option<String>,
}

/// A page of the fixture's wiki. Pages with front matter define wiki macros.
#[derive(Debug, Deserialize)]
pub struct FixtureDocument {
    pub reference: String,
    pub content: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default = "default_input")]
    pub syntax: Syntax,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Syntax of the source below the front matter.
    #[serde(default = "default_input")]
    pub syntax: Syntax,

    /// Syntax the source is rendered to.
    #[serde(default = "default_output")]
    pub output: Syntax,

    /// Render in a restricted frame.
    #[serde(default)]
    pub restricted: bool,

    /// User the source is rendered for, also its author.
    #[serde(default)]
    pub user: Option<String>,

    /// Highest right of each user. Everything is allowed when empty.
    #[serde(default)]
    pub rights: BTreeMap<String, Right>,

    /// Pages saved before rendering.
    #[serde(default)]
    pub documents: Vec<FixtureDocument>,

    /// Expected exact output (trimmed comparison).
    #[serde(default)]
    pub expect_output: Option<String>,

    /// If true, the test expects parsing to fail.
    #[serde(default)]
    pub expect_parse_error: bool,

    /// Expected macro failures, in order. If present (even empty), their
    /// count and content are checked.
    #[serde(default)]
    pub expect_failures: Option<Vec<ExpectedFailure>>,
}

fn default_input() -> Syntax {
    Syntax::XWiki21
}

fn default_output() -> Syntax {
    Syntax::Xhtml10
}

/// Parse a `.test.txt` file into its TOML config and source.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');
    let (front_matter, source) =
        split_front_matter(content).ok_or("missing --- frontmatter delimiters")?;
    let config: TestConfig =
        toml::from_str(front_matter).map_err(|e| format!("TOML parse error: {}", e))?;
    Ok((config, source))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

/// Build the session a fixture renders in: its pages are saved to the store
/// and offered to the wiki macro manager.
fn fixture_session(config: &TestConfig) -> Result<Session, String> {
    let rendering = RenderingConfig {
        users: config
            .rights
            .iter()
            .map(|(user, right)| (user.clone(), UserConfig { right: *right }))
            .collect(),
        ..RenderingConfig::default()
    };

    let store = Arc::new(MemoryStore::new());
    let mut definitions = Vec::new();
    for document in &config.documents {
        let reference = DocumentReference::parse(&document.reference, &rendering.wiki)
            .ok_or_else(|| format!("invalid document reference '{}'", document.reference))?;
        store.save(StoredDocument {
            reference: reference.clone(),
            content: document.content.clone(),
            syntax: document.syntax,
            author: document.author.clone(),
        });
        definitions.push((reference, document));
    }

    let session = Session::new(rendering, store);
    for (reference, document) in definitions {
        let state = session
            .manager
            .on_document_saved(&reference, document.author.as_deref(), &document.content);
        if let WikiMacroState::Failed(reason) = state {
            return Err(format!("wiki macro in {} not registered: {}", reference, reason));
        }
    }
    Ok(session)
}

fn run_single_test(path: &Path) -> TestResult {
    let fail = |description: Option<String>, reason: String| TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Fail(reason),
    };

    // 1. Read file
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return fail(None, format!("cannot read file: {}", e)),
    };

    // 2. Parse frontmatter
    let (config, source) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => return fail(None, format!("frontmatter error: {}", e)),
    };
    let description = config.description.clone();

    // 3. Set up the wiki
    let session = match fixture_session(&config) {
        Ok(session) => session,
        Err(reason) => return fail(description, reason),
    };

    // 4. Render
    let mut context = session.context(config.user.clone());
    let document = DocumentReference::new(
        session.config.wiki.clone(),
        rendering::model::DEFAULT_SPACE,
        "Test",
    );
    let frame = session.frame(config.syntax, Some(document), config.user.clone(), config.restricted);
    let mut output = Vec::new();
    let result = session.pipeline.render(
        source,
        0,
        config.syntax,
        config.output,
        &mut context,
        frame,
        &mut output,
    );

    // 5. Handle expect_parse_error
    if config.expect_parse_error {
        return match result {
            Err(PipelineError::Parse(_)) => TestResult {
                path: path.to_path_buf(),
                description,
                outcome: TestOutcome::Pass,
            },
            Err(error) => fail(description, format!("expected parse error, got: {}", error)),
            Ok(_) => fail(description, "expected parse error, but parsing succeeded".into()),
        };
    }

    let diagnostics = match result {
        Ok(diagnostics) => diagnostics,
        Err(PipelineError::Parse(errors)) => {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            return fail(description, format!("unexpected parse error: {}", msgs.join("; ")));
        }
        Err(error) => return fail(description, format!("rendering failed: {}", error)),
    };

    // 6. Check output
    if let Some(expected_output) = &config.expect_output {
        let actual = String::from_utf8_lossy(&output);
        let actual_trimmed = actual.trim();
        let expected_trimmed = expected_output.trim();
        if actual_trimmed != expected_trimmed {
            return fail(
                description,
                format!(
                    "output mismatch\n  expected: {}\n  actual:   {}",
                    expected_trimmed, actual_trimmed
                ),
            );
        }
    }

    // 7. Check macro failures
    if let Some(expected_failures) = &config.expect_failures
        && let Some(reason) = check_failures(&diagnostics, expected_failures)
    {
        return fail(description, reason);
    }

    TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Pass,
    }
}

/// Check that actual failures match expectations. Returns `Some(reason)` on mismatch.
fn check_failures(diagnostics: &[MacroDiagnostic], expected: &[ExpectedFailure]) -> Option<String> {
    if diagnostics.len() != expected.len() {
        let actual_msgs: Vec<String> = diagnostics.iter().map(|d| format!("  - {}", d)).collect();
        return Some(format!(
            "expected {} failure(s), got {}\n  actual failures:\n{}",
            expected.len(),
            diagnostics.len(),
            if actual_msgs.is_empty() {
                "    (none)".to_string()
            } else {
                actual_msgs.join("\n")
            }
        ));
    }

    for (i, (actual, expected)) in diagnostics.iter().zip(expected.iter()).enumerate() {
        if let Some(kind) = &expected.kind
            && actual.kind.name() != kind
        {
            return Some(format!(
                "failure[{}]: expected kind {}, got: {}",
                i, kind, actual
            ));
        }
        if let Some(contains) = &expected.contains
            && !actual.message.contains(contains.as_str())
        {
            return Some(format!(
                "failure[{}]: expected message containing \"{}\", got: {}",
                i, contains, actual
            ));
        }
    }

    None
}

/// Discover fixture files grouped by category (subfolder relative to root).
/// Files directly in `root` get category "" (uncategorized).
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, root, out);
        } else if let Some(name) = path.file_name().and_then(|n| n.to_str())
            && name.ends_with(FIXTURE_SUFFIX)
        {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
        return;
    }

    eprintln!("available categories:");
    for (cat, files) in &categories {
        let label = if cat.is_empty() { "(root)" } else { cat.as_str() };
        eprintln!("  {} ({} tests)", label, files.len());
    }
}

fn pass_label(no_color: bool) -> &'static str {
    if no_color { "PASS" } else { "\x1b[32mPASS\x1b[0m" }
}

fn fail_label(no_color: bool) -> &'static str {
    if no_color { "FAIL" } else { "\x1b[31mFAIL\x1b[0m" }
}

fn bold(s: &str, no_color: bool) -> String {
    if no_color {
        s.to_string()
    } else {
        format!("\x1b[1m{}\x1b[0m", s)
    }
}

fn label_of<'a>(result: &'a TestResult) -> &'a str {
    result.description.as_deref().unwrap_or_else(|| {
        result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_suffix(FIXTURE_SUFFIX))
            .unwrap_or("?")
    })
}

fn print_failures(failures: &[TestResult]) {
    eprintln!();
    eprintln!("failures:");
    for f in failures {
        eprintln!();
        eprintln!("  --- {} ---", f.path.display());
        if let TestOutcome::Fail(reason) = &f.outcome {
            for line in reason.lines() {
                eprintln!("  {}", line);
            }
        }
    }
}

fn print_summary(passed: usize, failed: usize, no_color: bool) {
    eprintln!();
    if failed == 0 {
        let ok = if no_color { "ok" } else { "\x1b[32mok\x1b[0m" };
        eprintln!("test result: {}. {} passed, 0 failed", ok, passed);
    } else {
        let label = if no_color { "FAILED" } else { "\x1b[31mFAILED\x1b[0m" };
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            label,
            passed,
            failed,
            passed + failed
        );
    }
}

/// Run all fixture files under `path` (or a single file).
/// If `categories` is non-empty, only run tests in those categories.
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let run_categories: BTreeMap<String, Vec<PathBuf>> = if path.is_file() {
        BTreeMap::from([(String::new(), vec![path.to_path_buf()])])
    } else {
        let all_categories = discover_categorized(path);
        if all_categories.is_empty() {
            eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
            return 1;
        }
        filter_categories(all_categories, categories)
    };

    if run_categories.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (cat, files) in &run_categories {
        if !path.is_file() {
            let header = if cat.is_empty() { "(root)" } else { cat.as_str() };
            eprintln!();
            eprintln!("{}", bold(header, no_color));
        }

        for file in files {
            let result = run_single_test(file);
            match &result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", pass_label(no_color), label_of(&result));
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", fail_label(no_color), label_of(&result));
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        print_failures(&failures);
    }
    print_summary(passed, failures.len(), no_color);
    if failures.is_empty() { 0 } else { 1 }
}

fn filter_categories(
    all_categories: BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<String, Vec<PathBuf>> {
    if requested.is_empty() {
        return all_categories;
    }
    let mut filtered = BTreeMap::new();
    for requested in requested {
        let req = requested.trim_matches('/');
        let mut found = false;
        for (cat, files) in &all_categories {
            if cat == req || cat.starts_with(&format!("{}/", req)) {
                filtered.insert(cat.clone(), files.clone());
                found = true;
            }
        }
        if !found {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                req,
                all_categories
                    .keys()
                    .map(|k| if k.is_empty() { "(root)" } else { k.as_str() })
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    filtered
}
