//! Pluggable underlying writers for the rotating file.
//!
//! The rotating file only ever talks to its file through the small
//! [`FileWriter`] capability set, and obtains writers through a
//! [`WriterBuilder`]. Two builders ship with the crate: the default
//! [`DirectBuilder`], which performs one write per call, and
//! [`BufferedBuilder`], which batches writes in memory. Swapping the builder
//! changes how bytes reach the file, never when rotation happens.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

/// How a builder should open the target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Open an existing file and append to it. Fails if the file is absent.
    Append,
    /// Create the file, discarding any previous contents.
    Truncate,
}

/// Minimal capability set the rotating file needs from its underlying file.
#[async_trait]
pub trait FileWriter: Send + std::fmt::Debug {
    /// Appends `buf`, returning the number of bytes accepted.
    async fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Forces written bytes down to storage.
    async fn sync(&mut self) -> io::Result<()>;

    /// Flushes any pending bytes and releases the file.
    async fn close(&mut self) -> io::Result<()>;
}

/// Opens underlying writers for a target path.
///
/// The rotating file calls [`open`](Self::open) lazily on first write and
/// again after every rotation.
#[async_trait]
pub trait WriterBuilder: Send + Sync {
    /// Opens `path` in the given mode.
    async fn open(&self, path: &Path, mode: OpenMode) -> io::Result<Box<dyn FileWriter>>;
}

async fn open_file(path: &Path, mode: OpenMode) -> io::Result<File> {
    let mut options = OpenOptions::new();
    match mode {
        OpenMode::Append => {
            options.append(true);
        }
        OpenMode::Truncate => {
            options.create(true).write(true).truncate(true);
        }
    }
    #[cfg(unix)]
    {
        options.mode(0o644);
    }
    options.open(path).await
}

/// The default builder: direct, unbuffered file access.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectBuilder;

#[async_trait]
impl WriterBuilder for DirectBuilder {
    async fn open(&self, path: &Path, mode: OpenMode) -> io::Result<Box<dyn FileWriter>> {
        let file = open_file(path, mode).await?;
        Ok(Box::new(DirectWriter { file }))
    }
}

/// Builder producing writers that batch writes in a fixed-capacity in-memory
/// buffer, touching storage only on buffer-full, sync, or close.
///
/// This amortizes per-write syscall cost for high-frequency small writes.
/// The trade-off: bytes still sitting in the buffer are lost if the process
/// dies without a sync or close.
#[derive(Debug, Clone, Copy)]
pub struct BufferedBuilder {
    /// Buffer capacity in bytes.
    pub capacity: usize,
}

#[async_trait]
impl WriterBuilder for BufferedBuilder {
    async fn open(&self, path: &Path, mode: OpenMode) -> io::Result<Box<dyn FileWriter>> {
        let file = open_file(path, mode).await?;
        Ok(Box::new(BufferedWriter {
            inner: BufWriter::with_capacity(self.capacity, file),
        }))
    }
}

#[derive(Debug)]
struct DirectWriter {
    file: File,
}

#[async_trait]
impl FileWriter for DirectWriter {
    async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf).await
    }

    async fn sync(&mut self) -> io::Result<()> {
        self.file.flush().await?;
        self.file.sync_all().await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.file.flush().await
    }
}

#[derive(Debug)]
struct BufferedWriter {
    inner: BufWriter<File>,
}

#[async_trait]
impl FileWriter for BufferedWriter {
    async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf).await
    }

    async fn sync(&mut self) -> io::Result<()> {
        self.inner.flush().await?;
        self.inner.get_ref().sync_all().await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.sync().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    #[tokio::test]
    async fn append_mode_requires_an_existing_file() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.log");

        let result = DirectBuilder.open(&missing, OpenMode::Append).await;
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn truncate_mode_discards_previous_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.log");
        std::fs::write(&path, b"old contents").unwrap();

        let mut writer = DirectBuilder.open(&path, OpenMode::Truncate).await.unwrap();
        assert_eq!(writer.write(b"new").await.unwrap(), 3);
        writer.close().await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    #[tokio::test]
    async fn buffered_writer_holds_bytes_until_synced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.log");
        let builder = BufferedBuilder { capacity: 64 * 1024 };

        let mut writer = builder.open(&path, OpenMode::Truncate).await.unwrap();
        assert_eq!(writer.write(b"hello").await.unwrap(), 5);
        assert_eq!(std::fs::read(&path).unwrap(), b"");

        writer.sync().await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");

        assert_eq!(writer.write(b" world").await.unwrap(), 6);
        writer.close().await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello world");
    }
}
