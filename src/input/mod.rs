//! Input streams
//!
//! The parser envelope stream and the lifecycle stream are NDJSON, one
//! externally tagged message per line. The step definition catalog is a
//! single JSON array. A path of `-` reads standard input.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::models::{Envelope, LifecycleEvent, StepDefinition};

const STDIN_PATH: &str = "-";

async fn open(path: &Path) -> Result<Box<dyn AsyncRead + Unpin + Send>> {
    if path.as_os_str() == STDIN_PATH {
        return Ok(Box::new(tokio::io::stdin()));
    }
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(Box::new(file))
}

async fn read_to_string(path: &Path) -> Result<String> {
    let mut content = String::new();
    open(path)
        .await?
        .read_to_string(&mut content)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(content)
}

/// Parse one NDJSON line; blank lines yield `None`
fn parse_line<T: DeserializeOwned>(line: &str, source: &Path, number: usize) -> Result<Option<T>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .with_context(|| format!("Invalid message at {}:{number}", source.display()))
}

pub fn parse_ndjson<T: DeserializeOwned>(content: &str, source: &Path) -> Result<Vec<T>> {
    let mut messages = Vec::new();
    for (i, line) in content.lines().enumerate() {
        if let Some(message) = parse_line(line, source, i + 1)? {
            messages.push(message);
        }
    }
    Ok(messages)
}

pub async fn read_envelopes(path: &Path) -> Result<Vec<Envelope>> {
    let content = read_to_string(path).await?;
    let envelopes: Vec<Envelope> = parse_ndjson(&content, path)?;
    debug!("Read {} envelopes from {}", envelopes.len(), path.display());
    Ok(envelopes)
}

pub async fn read_step_definitions(path: &Path) -> Result<Vec<StepDefinition>> {
    let content = read_to_string(path).await?;
    let definitions: Vec<StepDefinition> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid step definition catalog {}", path.display()))?;
    debug!("Read {} step definitions from {}", definitions.len(), path.display());
    Ok(definitions)
}

/// Stream lifecycle signals from `path` into `tx` on a separate task.
///
/// The task resolves to the number of signals sent. It stops early, without
/// error, when the receiving side has gone away.
pub fn spawn_signal_reader(path: PathBuf, tx: mpsc::Sender<LifecycleEvent>) -> JoinHandle<Result<usize>> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(open(&path).await?).lines();
        let mut number = 0;
        let mut sent = 0;

        while let Some(line) = lines
            .next_line()
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?
        {
            number += 1;
            let Some(event) = parse_line::<LifecycleEvent>(&line, &path, number)? else {
                continue;
            };
            if tx.send(event).await.is_err() {
                warn!("Signal consumer stopped before {} was fully read", path.display());
                break;
            }
            sent += 1;
        }

        debug!("Sent {sent} signals from {}", path.display());
        Ok(sent)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{signal_channel, ConsistencyMode, EventAggregator};
    use tempfile::tempdir;

    const LIFECYCLE: &str = r#"{"testCasePrepared":{"pickleId":"p1","steps":[{"sourceLocation":{"uri":"a.feature","line":3},"actionLocation":{"uri":"steps.rs","line":1}}]}}
{"testCaseStarted":{"pickleId":"p1","attemptNumber":1}}

{"testStepFinished":{"testCase":{"pickleId":"p1","attemptNumber":1},"index":0,"result":{"status":"passed","duration":1.0}}}
{"testCaseFinished":{"testCase":{"pickleId":"p1","attemptNumber":1},"result":{"status":"passed","duration":1.0}}}
{"testRunFinished":{"success":true}}
"#;

    #[test]
    fn test_parse_ndjson_skips_blank_lines() {
        let events: Vec<LifecycleEvent> = parse_ndjson(LIFECYCLE, Path::new("run.ndjson")).unwrap();
        assert_eq!(events.len(), 5);
        assert_eq!(events[4].name(), "test-run-finished");
    }

    #[test]
    fn test_parse_ndjson_reports_line_number() {
        let err = parse_ndjson::<Envelope>("\n{\"bogus\":{}}\n", Path::new("parse.ndjson")).unwrap_err();
        assert!(err.to_string().contains("parse.ndjson:2"));
    }

    #[tokio::test]
    async fn test_read_envelopes_and_definitions() {
        let dir = tempdir().unwrap();
        let envelopes = dir.path().join("parse.ndjson");
        std::fs::write(
            &envelopes,
            r#"{"source":{"uri":"a.feature","data":"Feature: a"}}
{"gherkinDocument":{"uri":"a.feature"}}
"#,
        )
        .unwrap();
        let definitions = dir.path().join("steps.json");
        std::fs::write(
            &definitions,
            r#"[{"pattern":"abc","patternType":"CucumberExpression","uri":"steps.rs","line":1}]"#,
        )
        .unwrap();

        assert_eq!(read_envelopes(&envelopes).await.unwrap().len(), 2);
        assert_eq!(read_step_definitions(&definitions).await.unwrap()[0].pattern, "abc");
        assert!(read_envelopes(&dir.path().join("missing.ndjson")).await.is_err());
    }

    #[tokio::test]
    async fn test_signal_reader_feeds_aggregator() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.ndjson");
        std::fs::write(&path, LIFECYCLE).unwrap();

        let (tx, rx) = signal_channel(2);
        let reader = spawn_signal_reader(path, tx);
        let aggregator = EventAggregator::new(ConsistencyMode::Strict)
            .consume(rx)
            .await
            .unwrap();

        assert_eq!(reader.await.unwrap().unwrap(), 5);
        assert!(aggregator.is_run_finished());
        assert_eq!(aggregator.final_attempts().len(), 1);
    }

    #[tokio::test]
    async fn test_signal_reader_fails_on_bad_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.ndjson");
        std::fs::write(&path, "{\"testCaseStarted\":42}\n").unwrap();

        let (tx, _rx) = signal_channel(2);
        let err = spawn_signal_reader(path, tx).await.unwrap().unwrap_err();
        assert!(err.to_string().contains("run.ndjson:1"));
    }
}
