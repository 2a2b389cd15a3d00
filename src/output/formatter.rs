//! Output formatters
//!
//! Renders usage statistics, execution plans, report trees and run
//! summaries as boxed tables, JSON or CSV.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::{relative_uri, Pickle};
use crate::results::{FeatureReport, RunInfo, RunSummary};
use crate::usage::UsageRecord;
use std::path::Path;

/// Matches listed per step definition before the rest are collapsed
const MAX_LISTED_MATCHES: usize = 5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    JsonPretty,
    Csv,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            _ => None,
        }
    }
}

/// One accepted pickle of an execution plan
#[derive(Clone, Debug, Serialize)]
pub struct PlanEntry<'a> {
    pub id: &'a str,
    pub uri: String,
    pub line: u32,
    pub name: &'a str,
    pub tags: Vec<&'a str>,
}

impl<'a> PlanEntry<'a> {
    pub fn new(cwd: &Path, pickle: &'a Pickle) -> Self {
        Self {
            id: &pickle.id,
            uri: relative_uri(cwd, &pickle.uri),
            line: pickle.line(),
            name: &pickle.name,
            tags: pickle.tag_names(),
        }
    }
}

pub struct ResultFormatter {
    format: OutputFormat,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn to_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let json = if self.format == OutputFormat::Json {
            serde_json::to_string(value)
        } else {
            serde_json::to_string_pretty(value)
        };
        json.context("Failed to serialize output")
    }

    /// Usage statistics; the table lists at most five matches per definition
    pub fn format_usage(&self, records: &[UsageRecord]) -> Result<String> {
        match self.format {
            OutputFormat::Table if records.is_empty() => Ok("No step definitions".to_string()),
            OutputFormat::Table => Ok(usage_table(records)),
            OutputFormat::Json | OutputFormat::JsonPretty => self.to_json(records),
            OutputFormat::Csv => usage_csv(records),
        }
    }

    /// Report tree; tables have no rendering of their own and fall back to pretty JSON
    pub fn format_report(&self, features: &[FeatureReport]) -> Result<String> {
        match self.format {
            OutputFormat::Csv => anyhow::bail!("CSV output is not available for reports"),
            _ => self.to_json(features),
        }
    }

    pub fn format_plan(&self, entries: &[PlanEntry<'_>], seed: Option<&str>, rejected: usize) -> Result<String> {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => {
                #[derive(Serialize)]
                struct PlanJson<'a> {
                    seed: Option<&'a str>,
                    rejected: usize,
                    pickles: &'a [PlanEntry<'a>],
                }
                self.to_json(&PlanJson {
                    seed,
                    rejected,
                    pickles: entries,
                })
            }
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_writer(Vec::new());
                writer.write_record(["position", "id", "location", "name", "tags"])?;
                for (i, entry) in entries.iter().enumerate() {
                    writer.write_record([
                        (i + 1).to_string(),
                        entry.id.to_string(),
                        format!("{}:{}", entry.uri, entry.line),
                        entry.name.to_string(),
                        entry.tags.join(" "),
                    ])?;
                }
                csv_string(writer)
            }
            OutputFormat::Table => {
                let rows = entries
                    .iter()
                    .enumerate()
                    .map(|(i, entry)| {
                        [
                            vec![(i + 1).to_string()],
                            vec![entry.name.to_string()],
                            vec![format!("{}:{}", entry.uri, entry.line)],
                        ]
                    })
                    .collect::<Vec<_>>();
                let mut output = render_table(["#", "Scenario", "Location"], &rows);
                output.push_str(&format!(
                    "\n{} accepted, {} rejected\n",
                    entries.len(),
                    rejected
                ));
                if let Some(seed) = seed {
                    output.push_str(&format!("Random order seed: {seed}\n"));
                }
                Ok(output)
            }
        }
    }

    pub fn format_summary(&self, summary: &RunSummary) -> Result<String> {
        match self.format {
            OutputFormat::Table => Ok(summary.to_string()),
            OutputFormat::Json | OutputFormat::JsonPretty => self.to_json(summary),
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_writer(Vec::new());
                writer.write_record(["status", "scenarios", "steps"])?;
                for status in crate::models::Status::summary_order() {
                    let (scenarios, steps) = (summary.scenarios.count(status), summary.steps.count(status));
                    if scenarios + steps > 0 {
                        writer.write_record([status.to_string(), scenarios.to_string(), steps.to_string()])?;
                    }
                }
                csv_string(writer)
            }
        }
    }

    pub fn format_runs(&self, runs: &[RunInfo]) -> Result<String> {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => self.to_json(runs),
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_writer(Vec::new());
                writer.write_record(["id", "created_at", "scenarios", "success"])?;
                for run in runs {
                    writer.write_record([
                        run.id.clone(),
                        run.created_at.to_rfc3339(),
                        run.scenarios.to_string(),
                        run.success.to_string(),
                    ])?;
                }
                csv_string(writer)
            }
            OutputFormat::Table if runs.is_empty() => Ok("No stored runs\n".to_string()),
            OutputFormat::Table => {
                let rows = runs
                    .iter()
                    .map(|run| {
                        [
                            vec![run.id.clone()],
                            vec![run.created_at.format("%Y-%m-%d %H:%M:%S").to_string()],
                            vec![format!(
                                "{} ({})",
                                run.scenarios,
                                if run.success { "passed" } else { "failed" }
                            )],
                        ]
                    })
                    .collect::<Vec<_>>();
                Ok(render_table(["Run", "Created", "Scenarios"], &rows))
            }
        }
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

/// Milliseconds the way a person would write them: `1ms`, `0.5ms`
fn format_ms(ms: f64) -> String {
    format!("{ms}ms")
}

fn usage_table(records: &[UsageRecord]) -> String {
    let rows: Vec<[Vec<String>; 3]> = records
        .iter()
        .map(|record| {
            let mut pattern = vec![record.display_pattern()];
            let mut duration = vec![match (record.is_unused(), record.mean_duration) {
                (true, _) => "UNUSED".to_string(),
                (false, Some(mean)) => format_ms((mean * 100.0).round() / 100.0),
                (false, None) => "-".to_string(),
            }];
            let mut location = vec![format!("{}:{}", record.uri, record.line)];

            for m in record.matches.iter().take(MAX_LISTED_MATCHES) {
                pattern.push(format!("  {}", m.text));
                duration.push(m.duration.map(format_ms).unwrap_or_else(|| "-".to_string()));
                location.push(format!("{}:{}", m.uri, m.line));
            }
            if record.matches.len() > MAX_LISTED_MATCHES {
                pattern.push(format!("  {} more", record.matches.len() - MAX_LISTED_MATCHES));
            }
            [pattern, duration, location]
        })
        .collect();

    render_table(["Pattern / Text", "Duration", "Location"], &rows)
}

fn usage_csv(records: &[UsageRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "pattern",
        "pattern_type",
        "location",
        "mean_duration_ms",
        "match_text",
        "match_location",
        "match_duration_ms",
    ])?;
    let optional = |value: Option<f64>| value.map(|v| v.to_string()).unwrap_or_default();

    for record in records {
        let head = [
            record.pattern.clone(),
            record.pattern_type.to_string(),
            format!("{}:{}", record.uri, record.line),
            optional(record.mean_duration),
        ];
        if record.is_unused() {
            writer.write_record(head.iter().cloned().chain(["".into(), "".into(), "".into()]))?;
            continue;
        }
        for m in &record.matches {
            writer.write_record(head.iter().cloned().chain([
                m.text.clone(),
                format!("{}:{}", m.uri, m.line),
                optional(m.duration),
            ]))?;
        }
    }
    csv_string(writer)
}

fn csv_string(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer.into_inner().context("Failed to flush CSV output")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Draw a boxed table. Cells may span several lines; rows are separated by rules.
fn render_table(head: [&str; 3], rows: &[[Vec<String>; 3]]) -> String {
    let mut widths = head.map(|h| h.chars().count());
    for row in rows {
        for (col, cell) in row.iter().enumerate() {
            for line in cell {
                widths[col] = widths[col].max(line.chars().count());
            }
        }
    }

    let rule = |left: &str, mid: &str, right: &str| {
        let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
        format!("{left}{}{right}\n", segments.join(mid))
    };
    let line = |cells: [&str; 3]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, w)| format!(" {}{} ", cell, " ".repeat(w - cell.chars().count())))
            .collect();
        format!("│{}│\n", padded.join("│"))
    };

    let mut output = rule("┌", "┬", "┐");
    output.push_str(&line(head));
    for row in rows {
        output.push_str(&rule("├", "┼", "┤"));
        let height = row.iter().map(Vec::len).max().unwrap_or(0);
        for i in 0..height {
            let cell = |col: usize| row[col].get(i).map(String::as_str).unwrap_or("");
            output.push_str(&line([cell(0), cell(1), cell(2)]));
        }
    }
    output.push_str(&rule("└", "┴", "┘"));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PatternType;
    use crate::usage::UsageMatch;

    fn record(pattern: &str, pattern_type: PatternType, line: u32, matches: Vec<UsageMatch>) -> UsageRecord {
        let durations: Vec<f64> = matches.iter().filter_map(|m| m.duration).collect();
        let mean_duration = (!durations.is_empty() && durations.len() == matches.len())
            .then(|| durations.iter().sum::<f64>() / durations.len() as f64);
        UsageRecord {
            pattern: pattern.to_string(),
            pattern_type,
            line,
            uri: "steps.rs".to_string(),
            code: String::new(),
            matches,
            mean_duration,
        }
    }

    fn usage_match(text: &str, line: u32, duration: Option<f64>) -> UsageMatch {
        UsageMatch {
            line,
            text: text.to_string(),
            uri: "a.feature".to_string(),
            duration,
        }
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("TABLE"), Some(OutputFormat::Table));
        assert_eq!(OutputFormat::from_str("json-pretty"), Some(OutputFormat::JsonPretty));
        assert_eq!(OutputFormat::from_str("summary"), None);
    }

    #[test]
    fn test_no_step_definitions() {
        let output = ResultFormatter::default().format_usage(&[]).unwrap();
        assert_eq!(output, "No step definitions");
    }

    #[test]
    fn test_unused_definition_table() {
        let records = [record("^abc?$", PatternType::RegularExpression, 1, Vec::new())];
        let output = ResultFormatter::default().format_usage(&records).unwrap();
        assert_eq!(
            output,
            "┌────────────────┬──────────┬────────────┐\n\
             │ Pattern / Text │ Duration │ Location   │\n\
             ├────────────────┼──────────┼────────────┤\n\
             │ /^abc?$/       │ UNUSED   │ steps.rs:1 │\n\
             └────────────────┴──────────┴────────────┘\n"
        );
    }

    #[test]
    fn test_used_definition_table_with_durations() {
        let records = [record(
            "^abc?$",
            PatternType::RegularExpression,
            1,
            vec![usage_match("abc", 3, Some(1.0)), usage_match("ab", 4, Some(0.0))],
        )];
        let output = ResultFormatter::default().format_usage(&records).unwrap();
        assert_eq!(
            output,
            "┌────────────────┬──────────┬─────────────┐\n\
             │ Pattern / Text │ Duration │ Location    │\n\
             ├────────────────┼──────────┼─────────────┤\n\
             │ /^abc?$/       │ 0.5ms    │ steps.rs:1  │\n\
             │   abc          │ 1ms      │ a.feature:3 │\n\
             │   ab           │ 0ms      │ a.feature:4 │\n\
             └────────────────┴──────────┴─────────────┘\n"
        );
    }

    #[test]
    fn test_dry_run_table_and_separators() {
        let records = [
            record("def", PatternType::CucumberExpression, 2, vec![usage_match("def", 4, None)]),
            record("ghi", PatternType::CucumberExpression, 3, Vec::new()),
        ];
        let output = ResultFormatter::default().format_usage(&records).unwrap();
        assert_eq!(
            output,
            "┌────────────────┬──────────┬─────────────┐\n\
             │ Pattern / Text │ Duration │ Location    │\n\
             ├────────────────┼──────────┼─────────────┤\n\
             │ def            │ -        │ steps.rs:2  │\n\
             │   def          │ -        │ a.feature:4 │\n\
             ├────────────────┼──────────┼─────────────┤\n\
             │ ghi            │ UNUSED   │ steps.rs:3  │\n\
             └────────────────┴──────────┴─────────────┘\n"
        );
    }

    #[test]
    fn test_more_than_five_matches_collapse() {
        let matches = (0..7).map(|i| usage_match("x", i + 1, Some(1.0))).collect();
        let records = [record("x", PatternType::CucumberExpression, 1, matches)];
        let output = ResultFormatter::default().format_usage(&records).unwrap();
        assert_eq!(output.matches("a.feature:").count(), 5);
        assert!(output.contains("  2 more"));
    }

    #[test]
    fn test_mean_rounds_to_two_decimals() {
        let matches = vec![
            usage_match("a", 1, Some(1.0)),
            usage_match("b", 2, Some(1.0)),
            usage_match("c", 3, Some(2.0)),
        ];
        let records = [record("x", PatternType::CucumberExpression, 1, matches)];
        let output = ResultFormatter::default().format_usage(&records).unwrap();
        assert!(output.contains("│ 1.33ms "));
    }

    #[test]
    fn test_usage_csv() {
        let records = [
            record("def", PatternType::CucumberExpression, 2, vec![usage_match("def", 4, Some(2.0))]),
            record("ghi", PatternType::CucumberExpression, 3, Vec::new()),
        ];
        let output = ResultFormatter::new(OutputFormat::Csv).format_usage(&records).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "def,CucumberExpression,steps.rs:2,2,def,a.feature:4,2");
        assert_eq!(lines[2], "ghi,CucumberExpression,steps.rs:3,,,,");
    }

    #[test]
    fn test_usage_json_is_wire_format() {
        let records = [record("ghi", PatternType::CucumberExpression, 3, Vec::new())];
        let output = ResultFormatter::new(OutputFormat::Json).format_usage(&records).unwrap();
        assert_eq!(
            output,
            r#"[{"pattern":"ghi","patternType":"CucumberExpression","line":3,"uri":"steps.rs","code":"","matches":[]}]"#
        );
    }

    #[test]
    fn test_report_rejects_csv() {
        assert!(ResultFormatter::new(OutputFormat::Csv).format_report(&[]).is_err());
        assert_eq!(ResultFormatter::new(OutputFormat::Json).format_report(&[]).unwrap(), "[]");
    }

    #[test]
    fn test_plan_table() {
        let pickle = Pickle {
            id: "p1".to_string(),
            uri: "/work/features/a.feature".to_string(),
            name: "my scenario".to_string(),
            language: "en".to_string(),
            locations: vec![4],
            tags: Vec::new(),
            steps: Vec::new(),
        };
        let entries = [PlanEntry::new(Path::new("/work"), &pickle)];
        let output = ResultFormatter::default()
            .format_plan(&entries, Some("42"), 1)
            .unwrap();
        assert!(output.contains("│ 1 │ my scenario │ features/a.feature:4 │"));
        assert!(output.contains("1 accepted, 1 rejected"));
        assert!(output.ends_with("Random order seed: 42\n"));
    }
}
