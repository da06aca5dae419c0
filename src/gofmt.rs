use async_trait::async_trait;
use failure::{Error, Fail};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

#[async_trait]
pub trait SourceFormatter {
    async fn format(&self, src: &str) -> Result<String, Error>;
}

#[derive(Debug, Fail)]
#[fail(display = "formatting generated source with {}: {}", program, stderr)]
pub struct FormatError {
    pub program: String,
    pub stderr: String,
}

/// Pipes source through `gofmt`.
#[derive(Debug, Clone)]
pub struct Gofmt {
    program: PathBuf,
}

impl Gofmt {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Gofmt {
            program: program.into(),
        }
    }
}

impl Default for Gofmt {
    fn default() -> Self {
        Gofmt::new("gofmt")
    }
}

#[async_trait]
impl SourceFormatter for Gofmt {
    async fn format(&self, src: &str) -> Result<String, Error> {
        let program = self.program.display().to_string();
        let mut child = Command::new(&self.program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| FormatError {
                program: program.clone(),
                stderr: e.to_string(),
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| failure::err_msg("gofmt stdin was not captured"))?;

        // stdin is fed while stdout drains, so large sources can't fill the pipe
        let feed = async move {
            let written = stdin.write_all(src.as_bytes()).await;
            drop(stdin);
            written
        };
        let (written, out) = tokio::join!(feed, child.wait_with_output());
        let out = out?;
        debug!(status = ?out.status, "ran {}", program);

        if !out.status.success() {
            return Err(FormatError {
                program,
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            }
            .into());
        }
        written?;
        Ok(String::from_utf8(out.stdout)?)
    }
}

/// Leaves source untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

#[async_trait]
impl SourceFormatter for Identity {
    async fn format(&self, src: &str) -> Result<String, Error> {
        Ok(src.to_string())
    }
}
