//! Feature file reader.
//!
//! Reads the Gherkin subset stepwright runs:
//!
//! ```text
//! @smoke
//! Feature: Checkout
//!   Background:
//!     Given I store "eu" as "Region"
//!
//!   Scenario: pay by card
//!     When I resolve the locator "$pay" into "Pay"
//!     Then "Pay" should be set
//!
//!   Scenario Outline: shipping to <country>
//!     Given I store "<country>" as "Country"
//!     Examples:
//!       | country |
//!       | fr      |
//!       | de      |
//! ```
//!
//! Background steps are prepended to every scenario of the feature. Each
//! `Examples` row of an outline becomes its own test, with `<column>`
//! placeholders substituted in the title and in every step.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::result::{StepwrightError, StepwrightResult};

const STEP_KEYWORDS: [&str; 6] = ["Given", "When", "Then", "And", "But", "*"];

/// A step as written in a feature file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    /// `Given`, `When`, `Then`, `And`, `But` or `*`
    pub keyword: String,
    /// Text after the keyword
    pub text: String,
    /// 1-based line in the feature file
    pub line: usize,
    /// Attached `"""` block, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_string: Option<String>,
    /// Attached `| a | b |` rows, if any
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub table: Vec<Vec<String>>,
}

impl Step {
    /// `keyword text`
    #[must_use]
    pub fn display(&self) -> String {
        format!("{} {}", self.keyword, self.text)
    }
}

/// A runnable test: one scenario or one outline example row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCase {
    /// Scenario title
    pub title: String,
    /// Feature tags plus scenario tags
    pub tags: Vec<String>,
    /// Background steps followed by the scenario's own
    pub steps: Vec<Step>,
    /// Line of the `Scenario` header, or of the `Examples` row for an outline
    pub line: usize,
}

/// One feature file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suite {
    /// Feature title
    pub title: String,
    /// Source file
    pub file: PathBuf,
    /// Feature-level tags
    pub tags: Vec<String>,
    /// Tests in file order
    pub tests: Vec<TestCase>,
}

impl Suite {
    /// `"<suite>: <test>"`, the name results are reported under
    #[must_use]
    pub fn full_title(&self, test: &TestCase) -> String {
        format!("{}: {}", self.title, test.title)
    }
}

/// Read a feature file from disk.
///
/// # Errors
///
/// [`StepwrightError::Discovery`] naming the file when it is unreadable or
/// not UTF-8, or the file and line when it is malformed.
pub fn read_feature(path: &Path) -> StepwrightResult<Suite> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| StepwrightError::discovery(format!("{}: {e}", path.display())))?;
    parse_feature(&source, path)
}

/// Parse feature source text.
///
/// # Errors
///
/// [`StepwrightError::Discovery`] naming the file and line of the first
/// malformed construct.
pub fn parse_feature(source: &str, file: &Path) -> StepwrightResult<Suite> {
    let mut parser = FeatureParser::new(file);
    let mut lines = source.lines().enumerate();
    while let Some((index, raw)) = lines.next() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.starts_with("\"\"\"") || trimmed.starts_with("```") {
            let fence = &trimmed[..3];
            let indent = raw.chars().take_while(|c| c.is_whitespace()).count();
            let mut body = Vec::new();
            let mut closed = false;
            for (_, doc_line) in lines.by_ref() {
                if doc_line.trim() == fence {
                    closed = true;
                    break;
                }
                body.push(strip_indent(doc_line, indent));
            }
            if !closed {
                return Err(parser.error(line, "unterminated doc string"));
            }
            parser.doc_string(line, body.join("\n"))?;
            continue;
        }
        parser.line(line, trimmed)?;
    }
    parser.finish()
}

/// Drop up to `indent` leading whitespace characters
fn strip_indent(line: &str, indent: usize) -> String {
    let start = line
        .char_indices()
        .take(indent)
        .find(|(_, c)| !c.is_whitespace())
        .map_or_else(
            || line.char_indices().nth(indent).map_or(line.len(), |(i, _)| i),
            |(i, _)| i,
        );
    line[start..].to_string()
}

fn table_row(line: &str) -> Vec<String> {
    let inner = line.trim().trim_start_matches('|').trim_end_matches('|');
    inner.split('|').map(|cell| cell.trim().to_string()).collect()
}

fn keyword_title<'a>(line: &'a str, keywords: &[&str]) -> Option<&'a str> {
    keywords.iter().find_map(|k| {
        line.strip_prefix(k)
            .and_then(|rest| rest.strip_prefix(':'))
            .map(str::trim)
    })
}

#[derive(Debug, PartialEq, Eq)]
enum Section {
    Header,
    Background,
    Scenario,
    Outline,
    Examples,
}

#[derive(Debug, Default)]
struct Outline {
    title: String,
    tags: Vec<String>,
    steps: Vec<Step>,
    line: usize,
    header: Option<Vec<String>>,
    rows: Vec<(usize, Vec<String>)>,
}

struct FeatureParser<'a> {
    file: &'a Path,
    title: Option<String>,
    feature_tags: Vec<String>,
    pending_tags: Vec<String>,
    background: Vec<Step>,
    tests: Vec<TestCase>,
    outline: Option<Outline>,
    section: Section,
}

impl<'a> FeatureParser<'a> {
    fn new(file: &'a Path) -> Self {
        Self {
            file,
            title: None,
            feature_tags: Vec::new(),
            pending_tags: Vec::new(),
            background: Vec::new(),
            tests: Vec::new(),
            outline: None,
            section: Section::Header,
        }
    }

    fn error(&self, line: usize, message: &str) -> StepwrightError {
        StepwrightError::discovery(format!("{}:{line}: {message}", self.file.display()))
    }

    fn line(&mut self, line: usize, text: &str) -> StepwrightResult<()> {
        if text.is_empty() || text.starts_with('#') {
            return Ok(());
        }
        if text.starts_with('@') {
            self.pending_tags
                .extend(text.split_whitespace().map(str::to_string));
            return Ok(());
        }
        if let Some(title) = keyword_title(text, &["Feature"]) {
            if self.title.is_some() {
                return Err(self.error(line, "a file may hold only one Feature"));
            }
            self.title = Some(title.to_string());
            self.feature_tags = std::mem::take(&mut self.pending_tags);
            return Ok(());
        }
        if keyword_title(text, &["Background"]).is_some() {
            self.require_feature(line)?;
            if !self.tests.is_empty() || self.outline.is_some() {
                return Err(self.error(line, "Background must come before any Scenario"));
            }
            self.section = Section::Background;
            return Ok(());
        }
        if let Some(title) = keyword_title(text, &["Scenario Outline", "Scenario Template"]) {
            self.require_feature(line)?;
            self.close_outline()?;
            self.outline = Some(Outline {
                title: title.to_string(),
                tags: self.take_tags(),
                line,
                ..Outline::default()
            });
            self.section = Section::Outline;
            return Ok(());
        }
        if let Some(title) = keyword_title(text, &["Scenario", "Example"]) {
            self.require_feature(line)?;
            self.close_outline()?;
            let tags = self.take_tags();
            self.tests.push(TestCase {
                title: title.to_string(),
                tags,
                steps: Vec::new(),
                line,
            });
            self.section = Section::Scenario;
            return Ok(());
        }
        if keyword_title(text, &["Examples", "Scenarios"]).is_some() {
            if self.outline.is_none() {
                return Err(self.error(line, "Examples outside a Scenario Outline"));
            }
            // tags on an Examples block are accepted and ignored
            self.pending_tags.clear();
            self.section = Section::Examples;
            return Ok(());
        }
        if text.starts_with('|') {
            return self.table_line(line, text);
        }
        if let Some(step) = parse_step(text, line) {
            return self.push_step(step);
        }
        // free-form description under a header
        if self.steps_mut().is_some_and(|steps| !steps.is_empty()) {
            return Err(self.error(line, &format!("unexpected line '{text}'")));
        }
        Ok(())
    }

    fn require_feature(&self, line: usize) -> StepwrightResult<()> {
        if self.title.is_none() {
            return Err(self.error(line, "expected 'Feature:' before scenarios"));
        }
        Ok(())
    }

    fn take_tags(&mut self) -> Vec<String> {
        let mut tags = self.feature_tags.clone();
        tags.append(&mut self.pending_tags);
        tags
    }

    fn steps_mut(&mut self) -> Option<&mut Vec<Step>> {
        match self.section {
            Section::Header | Section::Examples => None,
            Section::Background => Some(&mut self.background),
            Section::Scenario => self.tests.last_mut().map(|t| &mut t.steps),
            Section::Outline => self.outline.as_mut().map(|o| &mut o.steps),
        }
    }

    fn push_step(&mut self, step: Step) -> StepwrightResult<()> {
        let line = step.line;
        match self.steps_mut() {
            Some(steps) => {
                steps.push(step);
                Ok(())
            }
            None => Err(self.error(line, "step outside a Scenario or Background")),
        }
    }

    fn table_line(&mut self, line: usize, text: &str) -> StepwrightResult<()> {
        let row = table_row(text);
        if self.section == Section::Examples {
            let mut ragged = false;
            if let Some(outline) = self.outline.as_mut() {
                if let Some(header) = &outline.header {
                    ragged = header.len() != row.len();
                    if !ragged {
                        outline.rows.push((line, row));
                    }
                } else {
                    outline.header = Some(row);
                }
            }
            if ragged {
                return Err(self.error(line, "Examples row width differs from header"));
            }
            return Ok(());
        }
        match self.steps_mut().and_then(|steps| steps.last_mut()) {
            Some(step) => {
                step.table.push(row);
                Ok(())
            }
            None => Err(self.error(line, "table without a preceding step")),
        }
    }

    fn doc_string(&mut self, line: usize, body: String) -> StepwrightResult<()> {
        match self.steps_mut().and_then(|steps| steps.last_mut()) {
            Some(step) if step.doc_string.is_none() => {
                step.doc_string = Some(body);
                Ok(())
            }
            _ => Err(self.error(line, "doc string without a preceding step")),
        }
    }

    fn close_outline(&mut self) -> StepwrightResult<()> {
        let Some(outline) = self.outline.take() else {
            return Ok(());
        };
        let Some(header) = outline.header else {
            if outline.rows.is_empty() && !outline.steps.is_empty() {
                return Err(self.error(outline.line, "Scenario Outline has no Examples"));
            }
            return Ok(());
        };
        for (row_line, row) in &outline.rows {
            let substitute = |text: &str| {
                header.iter().zip(row).fold(text.to_string(), |acc, (name, value)| {
                    acc.replace(&format!("<{name}>"), value)
                })
            };
            let steps = outline
                .steps
                .iter()
                .map(|step| Step {
                    text: substitute(&step.text),
                    doc_string: step.doc_string.as_deref().map(substitute),
                    table: step
                        .table
                        .iter()
                        .map(|cells| cells.iter().map(|c| substitute(c.as_str())).collect())
                        .collect(),
                    ..step.clone()
                })
                .collect();
            let title = substitute(&outline.title);
            let title = if title == outline.title {
                format!("{title} ({})", row.join(", "))
            } else {
                title
            };
            self.tests.push(TestCase {
                title,
                tags: outline.tags.clone(),
                steps,
                line: *row_line,
            });
        }
        Ok(())
    }

    fn finish(mut self) -> StepwrightResult<Suite> {
        self.close_outline()?;
        let Some(title) = self.title.take() else {
            return Err(StepwrightError::discovery(format!(
                "{}: no 'Feature:' found",
                self.file.display()
            )));
        };
        let background = self.background;
        let tests = self
            .tests
            .into_iter()
            .map(|mut test| {
                let mut steps = background.clone();
                steps.append(&mut test.steps);
                test.steps = steps;
                test
            })
            .collect();
        Ok(Suite {
            title,
            file: self.file.to_path_buf(),
            tags: self.feature_tags,
            tests,
        })
    }
}

fn parse_step(text: &str, line: usize) -> Option<Step> {
    STEP_KEYWORDS.iter().find_map(|keyword| {
        let rest = text.strip_prefix(keyword)?;
        let rest = rest.strip_prefix(' ')?;
        Some(Step {
            keyword: (*keyword).to_string(),
            text: rest.trim().to_string(),
            line,
            doc_string: None,
            table: Vec::new(),
        })
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn parse(source: &str) -> StepwrightResult<Suite> {
        parse_feature(source, Path::new("features/sample.feature"))
    }

    mod structure_tests {
        use super::*;

        #[test]
        fn test_scenarios_and_steps() {
            let suite = parse(
                "Feature: Login\n\
                 \n\
                 # comment\n\
                 Scenario: valid user\n\
                   Given I open the login page\n\
                   When I sign in\n\
                   Then I see the dashboard\n\
                 Scenario: locked user\n\
                   * I sign in\n",
            )
            .unwrap();
            assert_eq!(suite.title, "Login");
            assert_eq!(suite.tests.len(), 2);
            assert_eq!(suite.tests[0].steps.len(), 3);
            assert_eq!(suite.tests[0].steps[1].keyword, "When");
            assert_eq!(suite.tests[0].steps[1].text, "I sign in");
            assert_eq!(suite.tests[0].steps[1].line, 6);
            assert_eq!(suite.tests[1].steps[0].keyword, "*");
            assert_eq!(suite.full_title(&suite.tests[1]), "Login: locked user");
        }

        #[test]
        fn test_background_prepended() {
            let suite = parse(
                "Feature: Cart\n\
                 Background:\n\
                   Given I store \"1\" as \"qty\"\n\
                 Scenario: a\n\
                   Then \"qty\" should equal \"1\"\n\
                 Scenario: b\n",
            )
            .unwrap();
            assert_eq!(suite.tests[0].steps.len(), 2);
            assert_eq!(suite.tests[0].steps[0].keyword, "Given");
            assert_eq!(suite.tests[1].steps.len(), 1);
        }

        #[test]
        fn test_tags_inherit() {
            let suite = parse(
                "@web\n\
                 Feature: Tags\n\
                 @smoke @fast\n\
                 Scenario: tagged\n\
                   Given x\n\
                 Scenario: plain\n",
            )
            .unwrap();
            assert_eq!(suite.tags, vec!["@web"]);
            assert_eq!(suite.tests[0].tags, vec!["@web", "@smoke", "@fast"]);
            assert_eq!(suite.tests[1].tags, vec!["@web"]);
        }

        #[test]
        fn test_descriptions_ignored() {
            let suite = parse(
                "Feature: Described\n\
                   As a shopper I want things.\n\
                 Scenario: s\n\
                   Some words about it.\n\
                   Given x\n",
            )
            .unwrap();
            assert_eq!(suite.tests[0].steps.len(), 1);
        }
    }

    mod outline_tests {
        use super::*;

        #[test]
        fn test_outline_expands_rows() {
            let suite = parse(
                "Feature: Shipping\n\
                 Scenario Outline: ship to <country>\n\
                   Given I store \"<country>\" as \"Country\"\n\
                   Then \"Country\" should equal \"<country>\"\n\
                 Examples:\n\
                   | country |\n\
                   | fr      |\n\
                   | de      |\n",
            )
            .unwrap();
            let titles: Vec<&str> = suite.tests.iter().map(|t| t.title.as_str()).collect();
            assert_eq!(titles, vec!["ship to fr", "ship to de"]);
            assert_eq!(suite.tests[1].steps[0].text, r#"I store "de" as "Country""#);
        }

        #[test]
        fn test_outline_rows_keep_their_lines() {
            let suite = parse(
                "Feature: F\n\
                 Scenario Outline: same\n\
                   Given <a>\n\
                 Examples:\n\
                   | a |\n\
                   | 1 |\n\
                   | 1 |\n",
            )
            .unwrap();
            let lines: Vec<usize> = suite.tests.iter().map(|t| t.line).collect();
            assert_eq!(lines, vec![6, 7]);
        }

        #[test]
        fn test_outline_title_without_placeholder_gets_values() {
            let suite = parse(
                "Feature: F\n\
                 Scenario Outline: sums\n\
                   Given <a> and <b>\n\
                 Examples:\n\
                   | a | b |\n\
                   | 1 | 2 |\n",
            )
            .unwrap();
            assert_eq!(suite.tests[0].title, "sums (1, 2)");
            assert_eq!(suite.tests[0].steps[0].text, "1 and 2");
        }

        #[test]
        fn test_outline_without_examples_is_error() {
            let err = parse(
                "Feature: F\n\
                 Scenario Outline: lonely\n\
                   Given <a>\n",
            )
            .unwrap_err();
            assert!(err.to_string().contains("no Examples"));
        }

        #[test]
        fn test_ragged_examples_row() {
            let err = parse(
                "Feature: F\n\
                 Scenario Outline: o\n\
                   Given <a>\n\
                 Examples:\n\
                   | a | b |\n\
                   | 1 |\n",
            )
            .unwrap_err();
            assert!(err.to_string().contains("sample.feature:6"));
        }
    }

    mod attachment_tests {
        use super::*;

        #[test]
        fn test_doc_string_attached() {
            let suite = parse(
                "Feature: F\n\
                 Scenario: s\n\
                   Given the payload\n\
                     \"\"\"\n\
                     {\"a\": 1}\n\
                     \"\"\"\n\
                   Then done\n",
            )
            .unwrap();
            let steps = &suite.tests[0].steps;
            assert_eq!(steps[0].doc_string.as_deref(), Some("{\"a\": 1}"));
            assert_eq!(steps.len(), 2);
        }

        #[test]
        fn test_data_table_attached() {
            let suite = parse(
                "Feature: F\n\
                 Scenario: s\n\
                   Given users\n\
                     | name | role  |\n\
                     | ann  | admin |\n",
            )
            .unwrap();
            assert_eq!(
                suite.tests[0].steps[0].table,
                vec![vec!["name", "role"], vec!["ann", "admin"]]
            );
        }

        #[test]
        fn test_doc_string_keeps_wide_space_indent() {
            let suite = parse(
                "Feature: F\nScenario: s\n  Given the payload\n    \"\"\"\n\u{3000}\u{3000}body\n      deeper\n    \"\"\"\n",
            )
            .unwrap();
            assert_eq!(
                suite.tests[0].steps[0].doc_string.as_deref(),
                Some("body\n  deeper")
            );
        }

        #[test]
        fn test_doc_string_short_indent_line() {
            let suite =
                parse("Feature: F\nScenario: s\n  Given x\n    \"\"\"\n  a\n    \"\"\"\n").unwrap();
            assert_eq!(suite.tests[0].steps[0].doc_string.as_deref(), Some("a"));
        }

        #[test]
        fn test_unterminated_doc_string() {
            let err = parse("Feature: F\nScenario: s\n  Given x\n  \"\"\"\n  body\n").unwrap_err();
            assert!(err.to_string().contains("unterminated"));
        }
    }

    mod error_tests {
        use super::*;

        #[test]
        fn test_missing_feature() {
            assert!(parse("Scenario: s\n").is_err());
            assert!(parse("").is_err());
        }

        #[test]
        fn test_step_before_scenario() {
            let err = parse("Feature: F\nGiven x\n").unwrap_err();
            assert!(err.to_string().contains("sample.feature:2"));
        }

        #[test]
        fn test_junk_after_steps() {
            let err = parse("Feature: F\nScenario: s\n  Given x\n  Gven y\n").unwrap_err();
            assert!(err.to_string().contains("Gven y"));
            assert_eq!(err.phase(), Some(crate::result::Phase::Discovery));
        }

        #[test]
        fn test_second_feature_rejected() {
            assert!(parse("Feature: A\nFeature: B\n").is_err());
        }

        #[test]
        fn test_non_utf8_file_is_discovery_error() {
            let dir = tempfile::TempDir::new().unwrap();
            let path = dir.path().join("binary.feature");
            std::fs::write(&path, [0x46, 0xff]).unwrap();
            let err = read_feature(&path).unwrap_err();
            assert_eq!(err.phase(), Some(crate::result::Phase::Discovery));
            assert!(err.to_string().contains("binary.feature"));
        }

        #[test]
        fn test_missing_file_is_discovery_error() {
            let dir = tempfile::TempDir::new().unwrap();
            let err = read_feature(&dir.path().join("gone.feature")).unwrap_err();
            assert!(matches!(err, StepwrightError::Discovery { .. }));
        }
    }
}
