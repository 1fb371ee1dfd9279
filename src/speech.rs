//! Dictation support for the console.
//!
//! A [`Recognizer`] pushes transcripts into a channel until it finishes or is
//! told to stop. [`Dictation`] runs one activation in the background and
//! exposes the transcripts as a finite stream.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::Stream;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Sends transcripts until done; must return promptly once `stop` fires.
    async fn listen(&self, transcripts: flume::Sender<String>, stop: CancellationToken) -> Result<()>;
}

/// One activation of a recognizer.
pub struct Dictation {
    stop: CancellationToken,
    transcripts: flume::Receiver<String>,
}

impl Dictation {
    pub fn start(recognizer: Arc<dyn Recognizer>) -> Self {
        let (tx, rx) = flume::unbounded();
        let stop = CancellationToken::new();
        let listener_stop = stop.clone();

        tokio::spawn(async move {
            tracing::debug!("Dictation started");
            if let Err(e) = recognizer.listen(tx, listener_stop).await {
                tracing::warn!(error = %e, "Recognizer failed");
            }
            tracing::debug!("Dictation finished");
        });

        Self {
            stop,
            transcripts: rx,
        }
    }

    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Ends once the recognizer returns, whether on its own or after `stop`.
    pub fn transcripts(&self) -> impl Stream<Item = String> + '_ {
        self.transcripts.stream()
    }
}

impl Drop for Dictation {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

/// Runs an external speech-to-text command through `sh -c` and takes the
/// first non-empty line it prints.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    command: String,
}

impl CommandRecognizer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl Recognizer for CommandRecognizer {
    #[tracing::instrument(skip(self, transcripts, stop), fields(command = %self.command))]
    async fn listen(&self, transcripts: flume::Sender<String>, stop: CancellationToken) -> Result<()> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to start `{}`", self.command))?;

        let stdout = child
            .stdout
            .take()
            .context("speech command has no stdout")?;
        let mut lines = BufReader::new(stdout).lines();

        let transcript = tokio::select! {
            _ = stop.cancelled() => None,
            line = async {
                while let Some(line) = lines.next_line().await? {
                    let line = line.trim();
                    if !line.is_empty() {
                        return Ok::<_, std::io::Error>(Some(line.to_string()));
                    }
                }
                Ok(None)
            } => line?,
        };

        child.kill().await.ok();

        if let Some(transcript) = transcript {
            // The receiver may already be gone if the session ended.
            let _ = transcripts.send_async(transcript).await;
        }
        Ok(())
    }
}

/// Joins dictated text onto an existing draft with a single space.
pub fn append_transcript(draft: &str, transcript: &str) -> String {
    if draft.is_empty() {
        transcript.to_string()
    } else {
        format!("{draft} {transcript}")
    }
}
