use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Host-side writer for encoded audio chunks
///
/// Holds the only handle to the output file. Chunks are appended in the order
/// they are delivered and written through immediately, so a crash loses at
/// most the chunk in flight. Once closed the file is never reopened.
pub struct AudioSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
    bytes_written: AtomicU64,
    chunks_written: AtomicU64,
}

impl AudioSink {
    /// Create (truncate) the output file
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create output directory")?;
        }

        let file = File::create(&path)
            .with_context(|| format!("Failed to create audio file: {:?}", path))?;

        info!("Audio sink opened: {}", path.display());

        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
            bytes_written: AtomicU64::new(0),
            chunks_written: AtomicU64::new(0),
        })
    }

    /// Append one encoded chunk; empty payloads and late chunks are dropped
    pub fn on_chunk(&self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }

        let mut guard = self.lock();
        let Some(file) = guard.as_mut() else {
            debug!("Dropping {} byte chunk after close", bytes.len());
            return Ok(());
        };

        file.write_all(bytes)
            .context("Failed to write audio chunk")?;

        self.bytes_written
            .fetch_add(bytes.len() as u64, Ordering::SeqCst);
        self.chunks_written.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }

    /// Flush and close the file. Safe to call any number of times.
    pub fn on_stopped(&self) -> Result<()> {
        let Some(mut file) = self.lock().take() else {
            return Ok(());
        };

        file.flush().context("Failed to flush audio file")?;
        file.sync_all().context("Failed to sync audio file")?;

        info!(
            "Audio sink closed: {} ({} chunks, {} bytes)",
            self.path.display(),
            self.chunks_written(),
            self.bytes_written()
        );

        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::SeqCst)
    }

    pub fn chunks_written(&self) -> u64 {
        self.chunks_written.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<File>> {
        // A panic mid-write leaves the file usable; keep going with it
        self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for AudioSink {
    fn drop(&mut self) {
        if let Err(e) = self.on_stopped() {
            warn!("Failed to close audio sink on drop: {}", e);
        }
    }
}
