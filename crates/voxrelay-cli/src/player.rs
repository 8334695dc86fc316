//! Single-slot audio playback for the terminal client.
//!
//! At most one external player process runs at a time. Starting a new
//! playback stops the previous one and deletes its temporary file first.

use std::path::Path;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use voxrelay_core::config::Config;

pub const DEFAULT_PLAYER_COMMAND: &[&str] = &["ffplay", "-nodisp", "-autoexit", "-loglevel", "quiet"];

struct Playback {
    child: Child,
    // Dropping the handle deletes the file.
    file: NamedTempFile,
}

pub struct Player {
    command: Vec<String>,
    current: Option<Playback>,
}

impl Player {
    /// `command` is the program and its arguments; the audio path is appended.
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            current: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let command = config
            .player
            .as_ref()
            .and_then(|p| p.command.clone())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_PLAYER_COMMAND.iter().map(|s| s.to_string()).collect());
        Self::new(command)
    }

    pub fn program(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or_default()
    }

    /// Path of the audio file currently held, if any.
    pub fn current_file(&self) -> Option<&Path> {
        self.current.as_ref().map(|p| p.file.path())
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// Stop whatever is playing, then play `audio`.
    pub async fn play(&mut self, audio: &[u8]) -> Result<()> {
        self.stop().await;

        let Some((program, args)) = self.command.split_first() else {
            bail!("no player command configured");
        };

        let file = tempfile::Builder::new()
            .prefix("voxrelay-")
            .suffix(".mp3")
            .tempfile()
            .context("failed to create temporary audio file")?;
        let mut writer = tokio::fs::File::create(file.path()).await?;
        writer.write_all(audio).await?;
        writer.flush().await?;
        drop(writer);

        let child = Command::new(program)
            .args(args)
            .arg(file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to start audio player '{program}'"))?;

        debug!(pid = child.id(), file = %file.path().display(), bytes = audio.len(), "Playback started");
        self.current = Some(Playback { child, file });
        Ok(())
    }

    /// Stop the current playback and release its file. Idle is a no-op.
    pub async fn stop(&mut self) {
        let Some(mut playback) = self.current.take() else {
            return;
        };

        // Already exited is fine.
        if let Err(e) = playback.child.start_kill() {
            debug!(error = %e, "Player already exited");
        }
        if let Err(e) = playback.child.wait().await {
            warn!(error = %e, "Failed to reap audio player");
        }

        let path = playback.file.path().to_path_buf();
        if let Err(e) = playback.file.close() {
            warn!(error = %e, file = %path.display(), "Failed to remove audio file");
        }
        debug!("Playback stopped");
    }

    /// Wait for the current playback to finish on its own, then release it.
    pub async fn wait(&mut self) -> Result<()> {
        if let Some(playback) = self.current.as_mut() {
            playback.child.wait().await?;
        }
        self.stop().await;
        Ok(())
    }
}
