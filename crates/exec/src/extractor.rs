use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, warn};

use arcade_config::{AppConfig, SCORE_FILE_SUFFIX};

/// What the extractor produced for one score file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// First non-empty line after the header.
    Line(String),
    /// No data line, or the tool exited abnormally.
    NotFound,
}

/// Turns a game id into the raw text line describing its current best score.
///
/// `Err` is reserved for the tool failing to run at all; everything else is
/// reported through [`Extraction`].
#[async_trait]
pub trait ScoreExtractor: Send + Sync {
    async fn extract(&self, game_id: &str) -> Result<Extraction>;
}

/// Runs `<java> -jar <hi2txt.jar> -ra <score_dir>/<game_id>.hi`.
#[derive(Debug, Clone)]
pub struct Hi2TxtExtractor {
    program: OsString,
    leading_args: Vec<OsString>,
    score_dir: PathBuf,
}

impl Hi2TxtExtractor {
    /// `program` is run with `leading_args` followed by the score file path.
    pub fn new(
        program: impl Into<OsString>,
        leading_args: Vec<OsString>,
        score_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            leading_args,
            score_dir: score_dir.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.system.java_bin,
            vec![
                OsString::from("-jar"),
                OsString::from(&config.system.hi2txt_jar),
                OsString::from("-ra"),
            ],
            &config.system.hi_score_dir,
        )
    }

    pub fn score_file(&self, game_id: &str) -> PathBuf {
        self.score_dir.join(format!("{game_id}{SCORE_FILE_SUFFIX}"))
    }

    async fn run(&self, score_file: &Path) -> Result<Extraction> {
        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.leading_args)
            .arg(score_file)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to start {}", self.program.to_string_lossy()))?;

        let stdout = child.stdout.take().context("child stdout not captured")?;
        let stderr = child.stderr.take().context("child stderr not captured")?;

        // Both pipes are drained together so a chatty stderr cannot stall
        // the child while stdout is being read.
        let (stdout_lines, stderr_lines) = tokio::join!(read_lines(stdout), read_lines(stderr));
        let stdout_lines = stdout_lines?;
        for line in stderr_lines.unwrap_or_default() {
            debug!(%line, "hi2txt stderr");
        }

        let status = child.wait().await?;
        if !status.success() {
            warn!(
                status = %status,
                file = %score_file.display(),
                "hi2txt exited abnormally"
            );
            return Ok(Extraction::NotFound);
        }

        Ok(first_data_line(&stdout_lines)
            .map(|line| Extraction::Line(line.to_string()))
            .unwrap_or(Extraction::NotFound))
    }
}

#[async_trait]
impl ScoreExtractor for Hi2TxtExtractor {
    async fn extract(&self, game_id: &str) -> Result<Extraction> {
        let score_file = self.score_file(game_id);
        debug!(file = %score_file.display(), "running hi2txt");
        self.run(&score_file).await
    }
}

/// Skip the header line and return the first non-empty line after it.
pub fn first_data_line<S: AsRef<str>>(lines: &[S]) -> Option<&str> {
    lines
        .iter()
        .skip(1)
        .map(|line| line.as_ref().trim_end_matches('\r'))
        .find(|line| !line.trim().is_empty())
}

/// Collect every output line.  Bytes are decoded lossily: score tables carry
/// player names in whatever encoding the game used.
async fn read_lines<R>(reader: R) -> std::io::Result<Vec<String>>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut collected = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf)
            .trim_end_matches(['\n', '\r'])
            .to_string();
        debug!(%line, "hi2txt output");
        collected.push(line);
    }
    Ok(collected)
}
