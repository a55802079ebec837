//! Human-readable output of test outcomes.
//!
//! The reporter is driven from a single thread, one test at a time and in
//! submission order, and is the only owner of the cross-test counters.

use std::io;

use difference::{Changeset, Difference};
use termcolor::{Color, ColorSpec, WriteColor};
use unicode_width::UnicodeWidthStr;

use crate::config::{Mode, ValuesDisplay};
use crate::errors::{ChartTestError, Result};
use crate::manifest::Item;
use crate::test_case::TestCase;
use crate::update::UpdateType;

const SEPARATOR_MAJOR: &str = "=============================================";
const SEPARATOR_MINOR: &str = "---------------------------------------------";
const SEPARATOR_ITEM: &str = "· · · · · · ·";

/// Context lines around each hunk of a unified diff.
pub const DIFF_CONTEXT: usize = 3;

/// Counts of update outcomes across a suite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateStats {
    pub none: usize,
    pub formatting: usize,
    pub semantic: usize,
}

impl UpdateStats {
    pub fn record(&mut self, update: UpdateType) {
        match update {
            UpdateType::None => self.none += 1,
            UpdateType::Formatting => self.formatting += 1,
            UpdateType::Semantic => self.semantic += 1,
        }
    }

    pub fn updated(&self) -> usize {
        self.formatting + self.semantic
    }
}

/// Aggregates over every finalized test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SuiteStats {
    pub total: usize,
    pub successful: usize,
    pub updates: UpdateStats,
}

/// Writes per-test results and the final summary.
pub struct Reporter<W: WriteColor> {
    out: W,
    mode: Mode,
    values: ValuesDisplay,
    name_width: usize,
    stats: SuiteStats,
}

impl<W: WriteColor> Reporter<W> {
    pub fn new(out: W, mode: Mode, values: ValuesDisplay) -> Self {
        Self {
            out,
            mode,
            values,
            name_width: 0,
            stats: SuiteStats::default(),
        }
    }

    /// Pads result banners so outcomes line up after the longest name.
    pub fn with_name_width(mut self, width: usize) -> Self {
        self.name_width = width;
        self
    }

    pub fn stats(&self) -> SuiteStats {
        self.stats
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Records a finished test and prints its result.
    pub fn finalize(&mut self, test: &TestCase) -> Result<()> {
        self.stats.total += 1;
        if test.is_successful() {
            self.stats.successful += 1;
        }
        if test.is_update {
            self.stats.updates.record(test.update_type);
        }
        self.print_result(test).map_err(write_error)
    }

    /// Prints the closing summary line.
    pub fn print_summary(&mut self) -> Result<()> {
        let (message, color) = summary_message(self.mode, &self.stats);
        self.print_summary_line(&message, color).map_err(write_error)
    }

    fn print_summary_line(&mut self, message: &str, color: Color) -> io::Result<()> {
        writeln!(self.out, "{SEPARATOR_MAJOR}")?;
        self.colored(Some(color), true, message)?;
        writeln!(self.out)?;
        writeln!(self.out, "{SEPARATOR_MAJOR}")?;
        self.out.flush()
    }

    fn print_result(&mut self, test: &TestCase) -> io::Result<()> {
        writeln!(self.out, "{SEPARATOR_MAJOR}")?;
        self.print_banner(test)?;

        let failed = !test.is_successful();
        let show_values = self.values.shows(failed) && test.values.is_some();
        let has_details = failed || show_values || !test.ignored_lines.is_empty();
        if !has_details {
            return self.out.flush();
        }
        writeln!(self.out, "{SEPARATOR_MINOR}")?;

        let mut first = true;
        for item in &test.different {
            self.section_break(&mut first)?;
            self.print_different(item)?;
        }
        for item in &test.extra {
            self.section_break(&mut first)?;
            self.print_heading("Unexpected", &item.source)?;
            writeln!(self.out, "{}", item.actual)?;
        }
        for item in &test.missing {
            self.section_break(&mut first)?;
            self.print_heading("Missing", &item.source)?;
            writeln!(self.out, "{}", item.expected)?;
        }
        for finding in &test.validation_errors {
            self.section_break(&mut first)?;
            self.print_heading("Invalid", &finding.signature)?;
            writeln!(self.out, "{}", finding.error)?;
        }
        if show_values {
            if let Some(values) = &test.values {
                self.section_break(&mut first)?;
                self.colored(None, true, "Values:")?;
                writeln!(self.out)?;
                match values.to_yaml_string() {
                    Ok(yaml) => writeln!(self.out, "{yaml}")?,
                    Err(err) => {
                        self.colored(Some(Color::Red), false, &format!("cannot display values: {err}"))?;
                        writeln!(self.out)?;
                    }
                }
            }
        }
        if !test.ignored_lines.is_empty() {
            self.section_break(&mut first)?;
            for line in &test.ignored_lines {
                self.colored(Some(Color::Cyan), false, "Ignored line:")?;
                writeln!(self.out, " {line}")?;
            }
        }
        self.out.flush()
    }

    fn print_banner(&mut self, test: &TestCase) -> io::Result<()> {
        let padding = self.name_width.saturating_sub(test.name.width()) + 1;
        write!(self.out, "{}{}", test.name, " ".repeat(padding))?;

        if test.is_update {
            let (label, color) = match test.update_type {
                UpdateType::None => ("Nothing to update in expected file", Color::Green),
                UpdateType::Formatting => ("Normalized formatting in expected file", Color::Cyan),
                UpdateType::Semantic => ("Updated expected file with content changes", Color::Yellow),
            };
            self.colored(Some(color), true, label)?;
        } else if test.is_same {
            self.colored(Some(Color::Green), true, "✓ Passed")?;
        } else {
            self.colored(Some(Color::Red), true, "✗ Failed")?;
        }
        if !test.is_valid {
            write!(self.out, " ")?;
            self.colored(Some(Color::Red), true, "✗ Invalid")?;
        }
        writeln!(self.out)
    }

    fn print_different(&mut self, item: &Item) -> io::Result<()> {
        self.print_heading("Different", &item.source)?;
        for line in unified_diff(&item.expected, &item.actual, DIFF_CONTEXT) {
            match line {
                DiffLine::Header(text) => {
                    self.colored(None, true, &text)?;
                }
                DiffLine::Hunk(text) => {
                    self.colored(Some(Color::Yellow), false, &text)?;
                }
                DiffLine::Context(text) => {
                    write!(self.out, " {text}")?;
                }
                DiffLine::Removed(text) => {
                    self.colored(Some(Color::Green), false, &format!("-{text}"))?;
                }
                DiffLine::Added(text) => {
                    self.colored(Some(Color::Red), false, &format!("+{text}"))?;
                }
            }
            writeln!(self.out)?;
        }
        Ok(())
    }

    fn print_heading(&mut self, label: &str, subject: &str) -> io::Result<()> {
        self.colored(None, true, label)?;
        writeln!(self.out, " {subject:?}:")
    }

    fn section_break(&mut self, first: &mut bool) -> io::Result<()> {
        if !*first {
            writeln!(self.out, "{SEPARATOR_ITEM}")?;
        }
        *first = false;
        Ok(())
    }

    fn colored(&mut self, color: Option<Color>, bold: bool, text: &str) -> io::Result<()> {
        self.out.set_color(ColorSpec::new().set_fg(color).set_bold(bold))?;
        write!(self.out, "{text}")?;
        self.out.reset()
    }
}

// ============================================================================
// SUMMARY
// ============================================================================

fn write_error(err: io::Error) -> ChartTestError {
    ChartTestError::io("writing report", err)
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}

/// Final summary text for a suite.
pub fn summary_message(mode: Mode, stats: &SuiteStats) -> (String, Color) {
    match mode {
        Mode::Update => {
            let updates = &stats.updates;
            let updated = updates.updated();
            if stats.total == 0 {
                return ("No expected files to update".to_string(), Color::Yellow);
            }
            if updated == 0 {
                return (
                    format!("All {} unchanged", plural(stats.total, "expected file")),
                    Color::Green,
                );
            }
            let mut message = match (updates.semantic, updates.formatting) {
                (semantic, 0) => format!(
                    "Updated {} with content changes",
                    plural(semantic, "expected file")
                ),
                (0, formatting) => format!(
                    "Normalized formatting in {}",
                    plural(formatting, "expected file")
                ),
                (semantic, formatting) => format!(
                    "Updated {} ({} content, {} formatting)",
                    plural(updated, "expected file"),
                    semantic,
                    formatting
                ),
            };
            if updates.none > 0 {
                message.push_str(&format!(", {} unchanged", updates.none));
            }
            (message, Color::Cyan)
        }
        Mode::Run => {
            if stats.total == 0 {
                ("No tests were run".to_string(), Color::Yellow)
            } else if stats.successful == stats.total {
                (format!("All {} passed", plural(stats.total, "test")), Color::Green)
            } else {
                (
                    format!(
                        "{} failed out of {}",
                        plural(stats.total - stats.successful, "test"),
                        stats.total
                    ),
                    Color::Red,
                )
            }
        }
    }
}

// ============================================================================
// UNIFIED DIFF
// ============================================================================

/// One line of a unified diff, without its leading marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    Header(String),
    Hunk(String),
    Context(String),
    Removed(String),
    Added(String),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Tag {
    Same,
    Removed,
    Added,
}

struct Line<'a> {
    tag: Tag,
    text: &'a str,
    /// Expected lines before this one.
    old: usize,
    /// Actual lines before this one.
    new: usize,
}

/// Line-based unified diff of `expected` against `actual`.
pub fn unified_diff(expected: &str, actual: &str, context: usize) -> Vec<DiffLine> {
    let changeset = Changeset::new(expected, actual, "\n");

    let mut lines = Vec::new();
    let (mut old, mut new) = (0, 0);
    for diff in &changeset.diffs {
        let (tag, chunk) = match diff {
            Difference::Same(chunk) => (Tag::Same, chunk),
            Difference::Rem(chunk) => (Tag::Removed, chunk),
            Difference::Add(chunk) => (Tag::Added, chunk),
        };
        for text in chunk.split('\n') {
            lines.push(Line { tag, text, old, new });
            if tag != Tag::Added {
                old += 1;
            }
            if tag != Tag::Removed {
                new += 1;
            }
        }
    }

    let mut hunks: Vec<(usize, usize)> = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        if line.tag == Tag::Same {
            continue;
        }
        let start = index.saturating_sub(context);
        let end = (index + context + 1).min(lines.len());
        match hunks.last_mut() {
            Some((_, last_end)) if start <= *last_end => *last_end = end,
            _ => hunks.push((start, end)),
        }
    }

    if hunks.is_empty() {
        return Vec::new();
    }

    let mut output = vec![
        DiffLine::Header("--- expected".to_string()),
        DiffLine::Header("+++ actual".to_string()),
    ];
    for (start, end) in hunks {
        let hunk = &lines[start..end];
        let old_len = hunk.iter().filter(|l| l.tag != Tag::Added).count();
        let new_len = hunk.iter().filter(|l| l.tag != Tag::Removed).count();
        let old_start = hunk[0].old + usize::from(old_len > 0);
        let new_start = hunk[0].new + usize::from(new_len > 0);
        output.push(DiffLine::Hunk(format!(
            "@@ -{old_start},{old_len} +{new_start},{new_len} @@"
        )));
        for line in hunk {
            let text = line.text.to_string();
            output.push(match line.tag {
                Tag::Same => DiffLine::Context(text),
                Tag::Removed => DiffLine::Removed(text),
                Tag::Added => DiffLine::Added(text),
            });
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_case::TestCase;
    use termcolor::Buffer;

    fn render(mode: Mode, values: ValuesDisplay, tests: &[TestCase]) -> String {
        let width = tests.iter().map(|t| t.name.width()).max().unwrap_or(0);
        let mut reporter = Reporter::new(Buffer::no_color(), mode, values).with_name_width(width);
        for test in tests {
            reporter.finalize(test).unwrap();
        }
        reporter.print_summary().unwrap();
        String::from_utf8(reporter.into_inner().into_inner()).unwrap()
    }

    #[test]
    fn diff_has_hunk_header_and_context() {
        let expected = "a\nb\nc\nd\ne\nf\ng\nh";
        let actual = "a\nb\nc\nd\nE\nf\ng\nh";
        let lines = unified_diff(expected, actual, 3);
        assert_eq!(
            lines,
            vec![
                DiffLine::Header("--- expected".into()),
                DiffLine::Header("+++ actual".into()),
                DiffLine::Hunk("@@ -2,7 +2,7 @@".into()),
                DiffLine::Context("b".into()),
                DiffLine::Context("c".into()),
                DiffLine::Context("d".into()),
                DiffLine::Removed("e".into()),
                DiffLine::Added("E".into()),
                DiffLine::Context("f".into()),
                DiffLine::Context("g".into()),
                DiffLine::Context("h".into()),
            ]
        );
    }

    #[test]
    fn distant_changes_get_separate_hunks() {
        let expected: Vec<String> = (0..20).map(|i| format!("line{i}")).collect();
        let mut actual = expected.clone();
        actual[1] = "changed1".into();
        actual[18] = "changed18".into();
        let lines = unified_diff(&expected.join("\n"), &actual.join("\n"), 3);
        let hunks = lines.iter().filter(|l| matches!(l, DiffLine::Hunk(_))).count();
        assert_eq!(hunks, 2);
    }

    #[test]
    fn identical_text_has_no_diff() {
        assert!(unified_diff("a\nb", "a\nb", 3).is_empty());
    }

    #[test]
    fn passing_test_prints_only_banner() {
        let test = TestCase::new("basic", Mode::Run);
        let out = render(Mode::Run, ValuesDisplay::Never, &[test]);
        assert!(out.contains("basic ✓ Passed\n"));
        assert!(!out.contains(SEPARATOR_MINOR));
        assert!(out.contains("All 1 test passed"));
    }

    #[test]
    fn banners_are_padded_to_longest_name() {
        let tests = [TestCase::new("a", Mode::Run), TestCase::new("longer", Mode::Run)];
        let out = render(Mode::Run, ValuesDisplay::Never, &tests);
        assert!(out.contains("a      ✓ Passed"));
        assert!(out.contains("longer ✓ Passed"));
    }

    #[test]
    fn failing_test_lists_sections_in_order() {
        let mut test = TestCase::new("broken", Mode::Run);
        test.is_same = false;
        test.different.push(Item::different("d.yaml", "a: 1", "a: 2"));
        test.extra.push(Item::extra("x.yaml", "kind: X"));
        test.missing.push(Item::missing("m.yaml", "kind: M"));
        test.add_validation_error("ConfigMap/c", "bad");
        test.values = Some(crate::value::Value::from_yaml_str("replicas: 2").unwrap());
        test.ignored_lines.push("  stamp: 1".into());

        let out = render(Mode::Run, ValuesDisplay::Failing, &[test]);
        let positions: Vec<usize> = [
            "broken ✗ Failed ✗ Invalid",
            "Different \"d.yaml\":",
            "-a: 1",
            "+a: 2",
            "Unexpected \"x.yaml\":",
            "Missing \"m.yaml\":",
            "Invalid \"ConfigMap/c\":",
            "Values:\nreplicas: 2",
            "Ignored line:   stamp: 1",
            "1 test failed out of 1",
        ]
        .iter()
        .map(|needle| out.find(needle).unwrap_or_else(|| panic!("{needle:?} not in {out}")))
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{out}");
    }

    #[test]
    fn values_hidden_for_passing_tests_unless_all() {
        let mut test = TestCase::new("ok", Mode::Run);
        test.values = Some(crate::value::Value::from_yaml_str("a: 1").unwrap());
        let out = render(Mode::Run, ValuesDisplay::Failing, std::slice::from_ref(&test));
        assert!(!out.contains("Values:"));
        let out = render(Mode::Run, ValuesDisplay::All, &[test]);
        assert!(out.contains("Values:\na: 1"));
    }

    #[test]
    fn update_banners_and_summary() {
        let mut none = TestCase::new("a", Mode::Update);
        none.update_type = UpdateType::None;
        let mut formatting = TestCase::new("b", Mode::Update);
        formatting.update_type = UpdateType::Formatting;
        let mut semantic = TestCase::new("c", Mode::Update);
        semantic.is_same = false;
        semantic.update_type = UpdateType::Semantic;

        let out = render(Mode::Update, ValuesDisplay::Never, &[none, formatting, semantic]);
        assert!(out.contains("a Nothing to update in expected file"));
        assert!(out.contains("b Normalized formatting in expected file"));
        assert!(out.contains("c Updated expected file with content changes"));
        assert!(out.contains("Updated 2 expected files (1 content, 1 formatting), 1 unchanged"));
    }

    #[test]
    fn summary_messages() {
        let stats = |total, successful, none, formatting, semantic| SuiteStats {
            total,
            successful,
            updates: UpdateStats {
                none,
                formatting,
                semantic,
            },
        };
        let msg = |mode, s| summary_message(mode, &s).0;
        assert_eq!(msg(Mode::Run, stats(0, 0, 0, 0, 0)), "No tests were run");
        assert_eq!(msg(Mode::Run, stats(3, 3, 0, 0, 0)), "All 3 tests passed");
        assert_eq!(msg(Mode::Run, stats(3, 1, 0, 0, 0)), "2 tests failed out of 3");
        assert_eq!(msg(Mode::Update, stats(0, 0, 0, 0, 0)), "No expected files to update");
        assert_eq!(msg(Mode::Update, stats(2, 2, 2, 0, 0)), "All 2 expected files unchanged");
        assert_eq!(
            msg(Mode::Update, stats(2, 1, 0, 0, 2)),
            "Updated 2 expected files with content changes"
        );
        assert_eq!(
            msg(Mode::Update, stats(3, 3, 2, 1, 0)),
            "Normalized formatting in 1 expected file, 2 unchanged"
        );
    }

    #[test]
    fn stats_are_tallied_on_finalize() {
        let mut reporter = Reporter::new(Buffer::no_color(), Mode::Run, ValuesDisplay::Never);
        let mut failed = TestCase::new("f", Mode::Run);
        failed.is_same = false;
        reporter.finalize(&TestCase::new("ok", Mode::Run)).unwrap();
        reporter.finalize(&failed).unwrap();
        assert_eq!(reporter.stats().total, 2);
        assert_eq!(reporter.stats().successful, 1);
    }
}
