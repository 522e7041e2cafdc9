use super::preprocess::PreprocessedPulse;
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Morphology classifier behind the pipeline.
///
/// Implementations receive one batch of preprocessed pulses and return one
/// label per pulse, in the same order. Labels are 1-based: 1 to 4 are valid
/// morphology classes, 5 marks an artifact.
pub trait PulseClassifier {
    fn classify(&mut self, batch: &[PreprocessedPulse]) -> Result<Vec<u8>>;
}

impl<F> PulseClassifier for F
where
    F: FnMut(&[PreprocessedPulse]) -> Result<Vec<u8>>,
{
    fn classify(&mut self, batch: &[PreprocessedPulse]) -> Result<Vec<u8>> {
        self(batch)
    }
}

#[derive(Serialize)]
struct BatchRequest<'a> {
    pulses: &'a [PreprocessedPulse],
}

/// Runs an external model executable once per batch.
///
/// The batch is written to the child's stdin as `{"pulses": [[...], ...]}`
/// and the child answers on stdout with a JSON array of integer labels.
#[derive(Debug, Clone)]
pub struct CommandClassifier {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandClassifier {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl PulseClassifier for CommandClassifier {
    fn classify(&mut self, batch: &[PreprocessedPulse]) -> Result<Vec<u8>> {
        let payload = serde_json::to_vec(&BatchRequest { pulses: batch })?;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning classifier {}", self.program.display()))?;
        {
            let mut stdin = child
                .stdin
                .take()
                .context("classifier stdin unavailable")?;
            stdin
                .write_all(&payload)
                .context("writing batch to classifier")?;
        }
        let output = child
            .wait_with_output()
            .context("waiting for classifier")?;
        if !output.status.success() {
            bail!(
                "classifier exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let labels: Vec<u8> =
            serde_json::from_slice(&output.stdout).context("parsing classifier labels")?;
        Ok(labels)
    }
}
