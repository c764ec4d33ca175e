//! Sequential, append-only file sink that bounds its on-disk footprint.
//!
//! A [`RotatingFile`] looks like one always-open destination: callers write
//! opaque byte payloads and the sink caps the live file at a configured
//! size, renames it to a timestamped archive once the cap is reached, and
//! asynchronously prunes archives older than a retention window. Rotation
//! and cleanup are invisible to callers.
//!
//! ```no_run
//! use rollfile::{RotatingFile, RotatingFileOptions};
//!
//! # async fn example() -> rollfile::Result<()> {
//! let options = RotatingFileOptions::new()
//!     .with_max_size(10 * 1024 * 1024)
//!     .with_max_age(7 * 24 * 60 * 60);
//! let file = RotatingFile::new("logs/app.log", options).await?;
//!
//! file.write(b"hello\n").await?;
//! file.close().await?;
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod retention;
mod writer;

pub use error::{Error, Result};
pub use writer::{BufferedBuilder, DirectBuilder, FileWriter, OpenMode, WriterBuilder};

use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::fs;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

use retention::Sweeper;

/// Default cap on the live file: 10 MiB.
const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;

/// Timestamp embedded in archive names, microsecond resolution.
const ARCHIVE_TIMESTAMP: &str = "%Y_%m_%d_%H_%M_%S%.6f";

/// Options for creating a [`RotatingFile`].
pub struct RotatingFileOptions {
    max_size: u64,
    max_age_secs: u64,
    builder: Arc<dyn WriterBuilder>,
}

impl Default for RotatingFileOptions {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            max_age_secs: 0,
            builder: Arc::new(DirectBuilder),
        }
    }
}

impl RotatingFileOptions {
    /// Creates options with the defaults: 10 MiB cap, retention disabled,
    /// direct (unbuffered) writes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the live file at `bytes`. Zero is ignored and the default kept.
    #[must_use]
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        if bytes > 0 {
            self.max_size = bytes;
        }
        self
    }

    /// Deletes archives older than `seconds` on each open and rotation.
    /// Zero (the default) disables retention entirely.
    #[must_use]
    pub const fn with_max_age(mut self, seconds: u64) -> Self {
        self.max_age_secs = seconds;
        self
    }

    /// Replaces the underlying-writer builder. The builder decides how bytes
    /// reach the file; rotation semantics are unaffected.
    #[must_use]
    pub fn with_writer_builder(mut self, builder: Arc<dyn WriterBuilder>) -> Self {
        self.builder = builder;
        self
    }

    /// Batches writes in a `capacity`-byte in-memory buffer that only
    /// touches storage on buffer-full, [`RotatingFile::sync`], or close.
    /// Cuts per-write syscall cost for high-frequency small writes, at the
    /// cost that buffered-but-unflushed bytes are lost if the process dies
    /// without a sync or close.
    #[must_use]
    pub fn with_buffer(self, capacity: usize) -> Self {
        self.with_writer_builder(Arc::new(BufferedBuilder { capacity }))
    }
}

impl fmt::Debug for RotatingFileOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatingFileOptions")
            .field("max_size", &self.max_size)
            .field("max_age_secs", &self.max_age_secs)
            .finish_non_exhaustive()
    }
}

/// State shared by the write path, all behind one exclusive lock.
struct Inner {
    /// The currently-open writer, if any. Replaced wholesale on rotation.
    writer: Option<Box<dyn FileWriter>>,
    /// Bytes this instance has appended to `writer` since it was opened.
    /// Never derived from a stat of the file.
    size: u64,
    closed: bool,
    /// Signal sender for the retention sweeper; dropped on close, which is
    /// the sweeper's termination signal.
    sweep: Option<mpsc::Sender<()>>,
}

/// A size-bounded, self-archiving append-only file.
///
/// All methods take `&self`; the instance is internally synchronized, so it
/// can sit behind an [`Arc`] and serve many concurrent tasks. Writers
/// serialize on a single lock, which keeps every payload contiguous in the
/// file and makes rotation atomic with respect to concurrent writes.
pub struct RotatingFile {
    target: PathBuf,
    dir: PathBuf,
    stem: String,
    extension: String,
    max_size: u64,
    builder: Arc<dyn WriterBuilder>,
    inner: Mutex<Inner>,
}

impl RotatingFile {
    /// Creates a rotating file targeting `path`, creating the parent
    /// directory if absent. The file itself is opened lazily on first write.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `path` is empty, already exists
    /// as a directory, or has a file name that is not valid UTF-8;
    /// [`Error::CreateDirectory`] if the parent directory cannot be created;
    /// [`Error::Io`] if the path cannot be inspected.
    pub async fn new(path: impl Into<PathBuf>, options: RotatingFileOptions) -> Result<Self> {
        let target = path.into();
        if target.as_os_str().is_empty() {
            return Err(Error::Configuration(
                "target path cannot be empty".to_string(),
            ));
        }

        match fs::metadata(&target).await {
            Ok(metadata) if metadata.is_dir() => {
                return Err(Error::Configuration(format!(
                    "a directory already exists at {}",
                    target.display()
                )));
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(Error::Io(e)),
        }

        let base = target
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "target path {} has no usable file name",
                    target.display()
                ))
            })?
            .to_string();
        // Stem cuts at the first dot and the extension at the last, so
        // "app.2024.log" archives as "app-{timestamp}.log".
        let stem = base.split('.').next().unwrap_or(&base).to_string();
        let extension = retention::name_ext(&base).to_string();

        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::CreateDirectory {
                path: dir.clone(),
                source: e,
            })?;

        let RotatingFileOptions {
            max_size,
            max_age_secs,
            builder,
        } = options;

        let sweep = Sweeper::spawn(dir.clone(), base, extension.clone(), max_age_secs);

        Ok(Self {
            target,
            dir,
            stem,
            extension,
            max_size,
            builder,
            inner: Mutex::new(Inner {
                writer: None,
                size: 0,
                closed: false,
                sweep: Some(sweep),
            }),
        })
    }

    /// Appends `payload` to the live file, rotating first when the payload
    /// would push it past the size cap.
    ///
    /// Returns the number of bytes accepted by the underlying writer; a
    /// short count is a short write, not a failure. A payload that is larger
    /// than the cap by itself is written whole into a freshly rotated file,
    /// leaving that file over the nominal limit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] after [`close`](Self::close), otherwise any
    /// I/O failure from opening, rotating, or writing, propagated verbatim.
    /// A failed rotation leaves no writer open, so the next write starts
    /// over from scratch.
    pub async fn write(&self, payload: &[u8]) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(Error::Closed);
        }

        let len = payload.len() as u64;
        let mut writer = match inner.writer.take() {
            Some(writer) => writer,
            None => self.open_or_create(&mut inner, len).await?,
        };

        // The threshold check happens strictly before the bytes land, so a
        // payload never straddles a rotation boundary. On a failed rotation
        // the writer slot stays empty and the next write starts over from
        // open-or-create.
        if inner.size + len > self.max_size {
            writer = self.rotate(&mut inner, Some(writer)).await?;
        }

        let accepted = writer.write(payload).await;
        inner.writer = Some(writer);
        let accepted = accepted?;
        inner.size += accepted as u64;
        Ok(accepted)
    }

    /// Flushes pending bytes and forces them down to storage.
    ///
    /// With no file open yet this is a no-op success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] after [`close`](Self::close), otherwise any
    /// I/O failure from the underlying writer.
    pub async fn sync(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(Error::Closed);
        }
        if let Some(writer) = inner.writer.as_mut() {
            writer.sync().await?;
        }
        Ok(())
    }

    /// Closes the rotating file: flushes and releases the current writer and
    /// stops the retention sweeper.
    ///
    /// Idempotent; every call after the first is a no-op success.
    ///
    /// # Errors
    ///
    /// Returns any I/O failure from flushing the final writer.
    pub async fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Ok(());
        }
        inner.closed = true;
        // Dropping the sender closes the signal channel, which is the
        // sweeper's only termination signal.
        inner.sweep = None;
        Self::close_writer(&mut inner).await
    }

    /// Opens the target for append, creates it fresh, or rotates first when
    /// the on-disk file is already at the cap, returning the open writer.
    async fn open_or_create(
        &self,
        inner: &mut Inner,
        size_hint: u64,
    ) -> Result<Box<dyn FileWriter>> {
        Self::signal_sweep(inner);

        match fs::metadata(&self.target).await {
            Err(e) if e.kind() == ErrorKind::NotFound => self.create(inner).await,
            Err(e) => Err(Error::Io(e)),
            // `>=` here against the write path's `>`: a file already exactly
            // at the cap rotates on open.
            Ok(metadata) if metadata.len() + size_hint >= self.max_size => {
                self.rotate(inner, None).await
            }
            Ok(metadata) => match self.builder.open(&self.target, OpenMode::Append).await {
                Ok(writer) => {
                    inner.size = metadata.len();
                    Ok(writer)
                }
                // Could not reopen for append; start a fresh file rather
                // than failing the write.
                Err(_) => self.create(inner).await,
            },
        }
    }

    async fn create(&self, inner: &mut Inner) -> Result<Box<dyn FileWriter>> {
        let writer = self.builder.open(&self.target, OpenMode::Truncate).await?;
        inner.size = 0;
        Ok(writer)
    }

    /// Closes `current` if present, renames the exhausted target to a
    /// timestamped archive, and opens a fresh target file.
    async fn rotate(
        &self,
        inner: &mut Inner,
        current: Option<Box<dyn FileWriter>>,
    ) -> Result<Box<dyn FileWriter>> {
        if let Some(mut writer) = current {
            writer.close().await?;
        }
        self.archive().await?;
        let writer = self.create(inner).await?;
        Self::signal_sweep(inner);
        Ok(writer)
    }

    /// Renames the target to its archive name. The target unexpectedly
    /// missing is propagated as a rotation failure, not treated as a no-op.
    async fn archive(&self) -> Result<()> {
        fs::metadata(&self.target).await?;
        let archive = self.dir.join(format!(
            "{}-{}{}",
            self.stem,
            Utc::now().format(ARCHIVE_TIMESTAMP),
            self.extension
        ));
        fs::rename(&self.target, &archive).await?;
        debug!(
            "archived {} as {}",
            self.target.display(),
            archive.display()
        );
        Ok(())
    }

    async fn close_writer(inner: &mut Inner) -> Result<()> {
        if let Some(mut writer) = inner.writer.take() {
            writer.close().await?;
        }
        Ok(())
    }

    fn signal_sweep(inner: &Inner) {
        if let Some(sweep) = &inner.sweep {
            // Single-slot and non-blocking: bursts of rotations coalesce
            // into at most one pending sweep and the write path never waits.
            let _ = sweep.try_send(());
        }
    }
}

impl fmt::Debug for RotatingFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatingFile")
            .field("target", &self.target)
            .field("max_size", &self.max_size)
            .finish_non_exhaustive()
    }
}
