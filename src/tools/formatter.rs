// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Background code formatter
//!
//! `format_code` only enqueues a request. A worker task formats the text and
//! writes the result to the open document and back to the project tree.
//! Prettier does the formatting when it is installed; otherwise the built-in
//! formatter takes over.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::error::{KilnError, Result};
use crate::tools::editor::EditorSurface;
use crate::tools::project::ProjectTree;

/// Formatter dialect, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatParser {
    Babel,
    Html,
    Css,
    Json,
    Markdown,
}

impl FormatParser {
    pub fn for_path(path: &str) -> Self {
        let extension = Path::new(path)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "js" | "ts" | "jsx" | "tsx" => FormatParser::Babel,
            "html" => FormatParser::Html,
            "css" | "scss" | "less" => FormatParser::Css,
            "json" => FormatParser::Json,
            "md" => FormatParser::Markdown,
            _ => FormatParser::Babel,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FormatParser::Babel => "babel",
            FormatParser::Html => "html",
            FormatParser::Css => "css",
            FormatParser::Json => "json",
            FormatParser::Markdown => "markdown",
        }
    }
}

/// A code formatting backend
#[async_trait]
pub trait CodeFormatter: Send + Sync {
    async fn format(&self, code: &str, parser: FormatParser) -> Result<String>;
}

/// Formats through an external `prettier` executable, reading the code on
/// stdin. When the executable cannot be spawned the fallback is used.
pub struct PrettierFormatter {
    program: PathBuf,
    args: Vec<String>,
    fallback: Arc<dyn CodeFormatter>,
}

impl PrettierFormatter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            fallback: Arc::new(BasicFormatter),
        }
    }

    /// Arguments placed before `--parser`, e.g. `prettier` when the program
    /// is `npx`
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn CodeFormatter>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for PrettierFormatter {
    fn default() -> Self {
        Self::new("prettier")
    }
}

#[async_trait]
impl CodeFormatter for PrettierFormatter {
    async fn format(&self, code: &str, parser: FormatParser) -> Result<String> {
        let spawned = Command::new(&self.program)
            .args(&self.args)
            .arg("--parser")
            .arg(parser.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(
                    target: "kiln.formatter",
                    program = %self.program.display(),
                    "prettier not found, using built-in formatter"
                );
                return self.fallback.format(code, parser).await;
            }
            Err(e) => {
                return Err(KilnError::ToolEffect(format!(
                    "Failed to start formatter: {}",
                    e
                )))
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            // A formatter that rejects its arguments may exit before reading.
            if let Err(e) = stdin.write_all(code.as_bytes()).await {
                if e.kind() != ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
        }
        let output = child.wait_with_output().await?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(KilnError::ToolEffect(format!(
                "Formatter failed: {}",
                stderr.trim()
            )))
        }
    }
}

/// Built-in fallback: JSON is re-indented, everything else only gets
/// whitespace cleanup.
#[derive(Debug, Default, Clone)]
pub struct BasicFormatter;

#[async_trait]
impl CodeFormatter for BasicFormatter {
    async fn format(&self, code: &str, parser: FormatParser) -> Result<String> {
        match parser {
            FormatParser::Json => {
                let value: serde_json::Value = serde_json::from_str(code)
                    .map_err(|e| KilnError::ToolEffect(format!("Invalid JSON: {}", e)))?;
                let mut out = serde_json::to_string_pretty(&value)?;
                out.push('\n');
                Ok(out)
            }
            _ => Ok(normalize_whitespace(code)),
        }
    }
}

fn normalize_whitespace(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut blank_run = 0;
    for line in code.replace("\r\n", "\n").lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 || out.is_empty() {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    while out.ends_with("\n\n") {
        out.pop();
    }
    out
}

/// A queued formatting job
pub struct FormatRequest {
    pub path: String,
    pub code: String,
    pub parser: FormatParser,
    pub project: Arc<dyn ProjectTree>,
}

/// Outcome reported by the worker after each job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatOutcome {
    Formatted { path: String },
    Failed { path: String, error: String },
}

/// Sending side of the formatter queue
#[derive(Clone)]
pub struct FormatterHandle {
    tx: mpsc::UnboundedSender<FormatRequest>,
}

impl FormatterHandle {
    pub fn submit(&self, request: FormatRequest) -> Result<()> {
        self.tx
            .send(request)
            .map_err(|_| KilnError::ToolEffect("Formatter worker is not running.".to_string()))
    }
}

pub struct FormatterWorker;

impl FormatterWorker {
    /// Spawn the worker on the current runtime. Outcomes are mirrored to
    /// `outcomes` when provided.
    pub fn spawn(
        formatter: Arc<dyn CodeFormatter>,
        editor: Arc<dyn EditorSurface>,
        outcomes: Option<mpsc::UnboundedSender<FormatOutcome>>,
    ) -> FormatterHandle {
        let (tx, mut rx) = mpsc::unbounded_channel::<FormatRequest>();

        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let path = request.path.clone();
                let outcome = match apply(&*formatter, &*editor, request).await {
                    Ok(()) => {
                        tracing::info!(target: "kiln.formatter", path = %path, "file formatted");
                        FormatOutcome::Formatted { path }
                    }
                    Err(e) => {
                        tracing::error!(target: "kiln.formatter", path = %path, error = %e, "formatting failed");
                        FormatOutcome::Failed {
                            path,
                            error: e.to_string(),
                        }
                    }
                };
                if let Some(outcomes) = &outcomes {
                    let _ = outcomes.send(outcome);
                }
            }
        });

        FormatterHandle { tx }
    }
}

async fn apply(
    formatter: &dyn CodeFormatter,
    editor: &dyn EditorSurface,
    request: FormatRequest,
) -> Result<()> {
    let formatted = formatter.format(&request.code, request.parser).await?;
    editor.set_content(&request.path, &formatted);
    request
        .project
        .write(&request.path, formatted.as_bytes())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::editor::InMemoryEditor;
    use crate::tools::project::FsProjectTree;
    use tempfile::TempDir;

    #[test]
    fn test_parser_for_path() {
        assert_eq!(FormatParser::for_path("a/b.tsx"), FormatParser::Babel);
        assert_eq!(FormatParser::for_path("index.html"), FormatParser::Html);
        assert_eq!(FormatParser::for_path("s.scss"), FormatParser::Css);
        assert_eq!(FormatParser::for_path("p.json"), FormatParser::Json);
        assert_eq!(FormatParser::for_path("README.md"), FormatParser::Markdown);
        assert_eq!(FormatParser::for_path("Makefile"), FormatParser::Babel);
        assert_eq!(FormatParser::Markdown.as_str(), "markdown");
    }

    #[tokio::test]
    async fn test_basic_formatter_json() {
        let out = BasicFormatter
            .format(r#"{"b":1,"a":[1,2]}"#, FormatParser::Json)
            .await
            .unwrap();
        assert_eq!(out, "{\n  \"b\": 1,\n  \"a\": [\n    1,\n    2\n  ]\n}\n");
        assert!(BasicFormatter.format("{", FormatParser::Json).await.is_err());
    }

    #[tokio::test]
    async fn test_basic_formatter_whitespace() {
        let out = BasicFormatter
            .format("\n\nlet a = 1;   \r\n\n\n\nlet b = 2;\t\n\n", FormatParser::Babel)
            .await
            .unwrap();
        assert_eq!(out, "let a = 1;\n\nlet b = 2;\n");
    }

    /// Stand-in prettier: checks `--parser <expected>` and breaks the code
    /// after every `{` and `;`.
    #[cfg(unix)]
    fn fake_prettier(dir: &TempDir, expected_parser: &str) -> PrettierFormatter {
        let path = dir.path().join("prettier");
        let script = format!(
            "#!/bin/sh\n[ \"$1\" = \"--parser\" ] && [ \"$2\" = \"{}\" ] || {{ echo \"bad parser $2\" >&2; exit 2; }}\nsed -e 's/{{/{{\\\n/g' -e 's/;/;\\\n/g'\n",
            expected_parser
        );
        std::fs::write(&path, script).unwrap();
        PrettierFormatter::new("sh").with_args([path.to_string_lossy().into_owned()])
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_prettier_reformats_javascript() {
        let temp_dir = TempDir::new().unwrap();
        let formatter = fake_prettier(&temp_dir, "babel");

        let out = formatter
            .format("function f(){return 1;}\n", FormatParser::Babel)
            .await
            .unwrap();
        assert_eq!(out, "function f(){\nreturn 1;\n}\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_prettier_failure_reports_stderr() {
        let temp_dir = TempDir::new().unwrap();
        let formatter = fake_prettier(&temp_dir, "babel");

        let err = formatter
            .format("a{color:red}\n", FormatParser::Css)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Formatter failed: bad parser css");
    }

    #[tokio::test]
    async fn test_missing_prettier_falls_back() {
        let temp_dir = TempDir::new().unwrap();
        let formatter = PrettierFormatter::new(temp_dir.path().join("no-such-prettier"));

        let out = formatter.format(r#"{"k":1}"#, FormatParser::Json).await.unwrap();
        assert_eq!(out, "{\n  \"k\": 1\n}\n");
        assert_eq!(PrettierFormatter::default().program(), Path::new("prettier"));
    }

    #[tokio::test]
    async fn test_worker_writes_editor_and_disk() {
        let temp_dir = TempDir::new().unwrap();
        let tree = Arc::new(FsProjectTree::open(temp_dir.path()).unwrap());
        tree.write("data.json", br#"{"k":true}"#).await.unwrap();

        let editor = Arc::new(InMemoryEditor::new());
        editor.open("data.json", r#"{"k":true}"#);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = FormatterWorker::spawn(Arc::new(BasicFormatter), editor.clone(), Some(tx));
        handle
            .submit(FormatRequest {
                path: "data.json".to_string(),
                code: r#"{"k":true}"#.to_string(),
                parser: FormatParser::Json,
                project: tree.clone(),
            })
            .unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            FormatOutcome::Formatted {
                path: "data.json".to_string()
            }
        );
        let expected = "{\n  \"k\": true\n}\n";
        assert_eq!(editor.content("data.json").as_deref(), Some(expected));
        assert_eq!(tree.read_to_string("data.json").await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_worker_reports_failure_and_leaves_file() {
        let temp_dir = TempDir::new().unwrap();
        let tree = Arc::new(FsProjectTree::open(temp_dir.path()).unwrap());
        tree.write("bad.json", b"{").await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = FormatterWorker::spawn(
            Arc::new(BasicFormatter),
            Arc::new(InMemoryEditor::new()),
            Some(tx),
        );
        handle
            .submit(FormatRequest {
                path: "bad.json".to_string(),
                code: "{".to_string(),
                parser: FormatParser::Json,
                project: tree.clone(),
            })
            .unwrap();

        assert!(matches!(rx.recv().await.unwrap(), FormatOutcome::Failed { .. }));
        assert_eq!(tree.read_to_string("bad.json").await.unwrap(), "{");
    }
}
