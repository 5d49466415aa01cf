//! Drives one `ctags --_interactive` subprocess over its JSON-line protocol.

use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};

use crate::indexer::error::IndexerError;

#[derive(Debug, Serialize)]
struct TagRequest<'a> {
    command: &'a str,
    filename: &'a str,
    size: usize,
}

#[derive(Debug, Deserialize)]
struct HelloMessage {
    name: String,
    #[serde(default)]
    version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEntry {
    #[serde(rename = "_type")]
    pub entry_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub line: i64,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default, rename = "scopeKind")]
    pub scope_kind: String,
}

/// One `ctags` subprocess, reused across many files. Held exclusively by
/// whichever indexer worker currently owns it (see [`super::pool`]).
pub struct Commander {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<tokio::process::ChildStdout>,
}

impl Commander {
    pub async fn spawn(ctags_path: &str) -> Result<Self, IndexerError> {
        let mut child = Command::new(ctags_path)
            .args(["--_interactive", "--fields=*"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| IndexerError::Internal(format!("failed to spawn ctags: {e}")))?;

        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = BufReader::new(child.stdout.take().expect("piped stdout"));

        let mut commander = Self { child, stdin, stdout };
        commander.self_test().await?;
        Ok(commander)
    }

    async fn self_test(&mut self) -> Result<(), IndexerError> {
        let line = self.read_line().await?;
        let hello: HelloMessage = serde_json::from_str(&line)
            .map_err(|e| IndexerError::Internal(format!("bad ctags hello message: {e}")))?;
        if hello.name != "Universal Ctags" {
            return Err(IndexerError::Internal(format!(
                "indexer requires Universal Ctags, found \"{}\"",
                hello.name
            )));
        }
        tracing::debug!(version = %hello.version, "ctags self test passed");
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String, IndexerError> {
        let mut line = String::new();
        let n = self
            .stdout
            .read_line(&mut line)
            .await
            .map_err(|e| IndexerError::Internal(format!("ctags read failed: {e}")))?;
        if n == 0 {
            return Err(IndexerError::Internal("ctags closed its output".into()));
        }
        Ok(line.trim_end().to_string())
    }

    pub async fn index_file(&mut self, file_name: &str, content: &[u8]) -> Result<Vec<ResponseEntry>, IndexerError> {
        let request = TagRequest { command: "generate-tags", filename: file_name, size: content.len() };
        let encoded = serde_json::to_vec(&request)
            .map_err(|e| IndexerError::Internal(format!("request encode failed: {e}")))?;

        self.stdin
            .write_all(&encoded)
            .await
            .map_err(|e| IndexerError::Internal(format!("ctags write failed: {e}")))?;
        self.stdin
            .write_all(b"\n")
            .await
            .map_err(|e| IndexerError::Internal(format!("ctags write failed: {e}")))?;
        self.stdin
            .write_all(content)
            .await
            .map_err(|e| IndexerError::Internal(format!("ctags write failed: {e}")))?;

        let mut entries = Vec::new();
        loop {
            let line = self.read_line().await?;
            let entry: ResponseEntry = serde_json::from_str(&line)
                .map_err(|e| IndexerError::Internal(format!("bad ctags response: {e}")))?;
            if entry.entry_type.is_empty() {
                return Err(IndexerError::Internal("unexpected empty ctags response type".into()));
            }
            if entry.entry_type == "completed" {
                break;
            }
            entries.push(entry);
        }
        Ok(entries)
    }
}

impl Drop for Commander {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_entry_defaults_missing_fields() {
        let json = r#"{"_type":"tag","name":"foo","path":"a.rs","line":3}"#;
        let entry: ResponseEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.name, "foo");
        assert_eq!(entry.line, 3);
        assert_eq!(entry.kind, "");
    }
}
