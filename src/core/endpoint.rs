//! Local and remote filesystem endpoints.
//!
//! A transfer always runs between two `Endpoint`s: the local machine
//! (tokio::fs) and the remote SFTP session. Both sides expose the same
//! small surface — list a directory, open a source, create a
//! destination, reopen a destination for ranged writes — so the copy
//! engine never cares which direction it is moving bytes.

use crate::core::error::TransferError;
use anyhow::Context as _;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::OpenFlags;
use std::io::SeekFrom;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt, ReadBuf};

/// Minimal file metadata shown in the panes and consumed by the
/// transfer controller.
#[derive(Debug, Clone)]
pub struct FsEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
}

/// One side of a transfer.
#[derive(Clone)]
pub enum Endpoint {
    Local,
    Remote(Arc<SftpSession>),
}

impl Endpoint {
    /// Whether this endpoint supports addressed access to disjoint file
    /// regions (independent handles seeked to their own offsets).
    pub fn supports_positioned(&self) -> bool {
        match self {
            // tokio::fs handles seek independently per open file.
            Endpoint::Local => true,
            // SFTP read/write requests carry explicit offsets.
            Endpoint::Remote(_) => true,
        }
    }

    /// List a directory, directories first, `.`/`..` skipped.
    pub async fn read_dir(&self, path: &str) -> anyhow::Result<Vec<FsEntry>> {
        let mut entries = match self {
            Endpoint::Local => {
                let mut out = Vec::new();
                let mut dir = tokio::fs::read_dir(path)
                    .await
                    .with_context(|| format!("read dir {path}"))?;
                while let Some(entry) = dir.next_entry().await? {
                    let meta = entry.metadata().await?;
                    out.push(FsEntry {
                        name: entry.file_name().to_string_lossy().into_owned(),
                        is_dir: meta.is_dir(),
                        size: meta.len(),
                    });
                }
                out
            }
            Endpoint::Remote(sftp) => {
                let dir = sftp
                    .read_dir(path)
                    .await
                    .with_context(|| format!("read remote dir {path}"))?;
                dir.filter(|e| {
                    let name = e.file_name();
                    name != "." && name != ".."
                })
                .map(|e| {
                    let meta = e.metadata();
                    FsEntry {
                        name: e.file_name(),
                        is_dir: meta.is_dir(),
                        size: meta.size.unwrap_or(0),
                    }
                })
                .collect()
            }
        };

        entries.sort_by(|a, b| {
            b.is_dir
                .cmp(&a.is_dir)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        Ok(entries)
    }

    /// Open an existing file for reading.
    pub async fn open_source(&self, path: &str) -> Result<FileHandle, TransferError> {
        match self {
            Endpoint::Local => tokio::fs::File::open(path)
                .await
                .map(FileHandle::Local)
                .map_err(|e| open_err(path, e)),
            Endpoint::Remote(sftp) => sftp
                .open(path)
                .await
                .map(FileHandle::Remote)
                .map_err(|e| open_err(path, e)),
        }
    }

    /// Create (or truncate) the destination file.
    pub async fn create_dest(&self, path: &str) -> Result<FileHandle, TransferError> {
        match self {
            Endpoint::Local => tokio::fs::File::create(path)
                .await
                .map(FileHandle::Local)
                .map_err(|e| open_err(path, e)),
            Endpoint::Remote(sftp) => sftp
                .open_with_flags(
                    path,
                    OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
                )
                .await
                .map(FileHandle::Remote)
                .map_err(|e| open_err(path, e)),
        }
    }

    /// Reopen an already-created destination for a ranged write, without
    /// truncating what other workers have written.
    pub async fn open_dest_ranged(&self, path: &str) -> Result<FileHandle, TransferError> {
        match self {
            Endpoint::Local => tokio::fs::OpenOptions::new()
                .write(true)
                .open(path)
                .await
                .map(FileHandle::Local)
                .map_err(|e| open_err(path, e)),
            Endpoint::Remote(sftp) => sftp
                .open_with_flags(path, OpenFlags::WRITE)
                .await
                .map(FileHandle::Remote)
                .map_err(|e| open_err(path, e)),
        }
    }

    /// Make sure `path` exists as a directory, creating missing
    /// components. The destination parent must exist before the
    /// destination file is created.
    pub async fn ensure_dir(&self, path: &str) -> Result<(), TransferError> {
        if path.is_empty() || path == "." || path == "/" {
            return Ok(());
        }
        match self {
            Endpoint::Local => {
                tokio::fs::create_dir_all(path)
                    .await
                    .map_err(|e| TransferError::PrepareDestination {
                        path: path.to_string(),
                        detail: e.to_string(),
                    })
            }
            Endpoint::Remote(sftp) => {
                // SFTP has no mkdir -p; walk the prefixes.
                for prefix in dir_prefixes(path) {
                    if sftp.try_exists(&prefix).await.unwrap_or(false) {
                        continue;
                    }
                    sftp.create_dir(&prefix)
                        .await
                        .map_err(|e| TransferError::PrepareDestination {
                            path: prefix.clone(),
                            detail: e.to_string(),
                        })?;
                }
                Ok(())
            }
        }
    }

    /// Join a directory and an entry name in this endpoint's path style.
    pub fn join(&self, dir: &str, name: &str) -> String {
        match self {
            Endpoint::Local => Path::new(dir).join(name).to_string_lossy().into_owned(),
            Endpoint::Remote(_) => remote_join(dir, name),
        }
    }

    /// Parent directory of `path` in this endpoint's path style.
    pub fn parent(&self, path: &str) -> String {
        match self {
            Endpoint::Local => Path::new(path)
                .parent()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Endpoint::Remote(_) => remote_parent(path),
        }
    }
}

/// Remote paths are always `/`-separated, independent of the local OS.
pub fn remote_join(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{name}")
    } else {
        format!("{}/{}", dir.trim_end_matches('/'), name)
    }
}

pub fn remote_parent(path: &str) -> String {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

/// Successive directory prefixes of `path`, shallowest first. An
/// absolute path yields absolute prefixes, a relative one stays
/// relative to the server's starting directory.
fn dir_prefixes(path: &str) -> Vec<String> {
    let mut acc = if path.starts_with('/') {
        "/".to_string()
    } else {
        String::new()
    };
    let mut prefixes = Vec::new();
    for comp in path.split('/').filter(|c| !c.is_empty()) {
        if !acc.is_empty() && !acc.ends_with('/') {
            acc.push('/');
        }
        acc.push_str(comp);
        prefixes.push(acc.clone());
    }
    prefixes
}

fn open_err(path: &str, err: impl std::fmt::Display) -> TransferError {
    TransferError::Open {
        path: path.to_string(),
        detail: err.to_string(),
    }
}

// ── File handle ──────────────────────────────────────────────────────────────

/// An open file on either side of the transfer.
///
/// Both variants are plain tokio async I/O objects, so the copy engine
/// uses the usual `AsyncReadExt`/`AsyncWriteExt`/`AsyncSeekExt` surface
/// regardless of locality.
pub enum FileHandle {
    Local(tokio::fs::File),
    Remote(russh_sftp::client::fs::File),
}

impl FileHandle {
    /// Position the handle at an absolute offset.
    pub async fn seek_to(&mut self, offset: u64) -> std::io::Result<()> {
        self.seek(SeekFrom::Start(offset)).await.map(|_| ())
    }

    /// Flush and close, consuming the handle. Closing is single-shot by
    /// construction: the handle is gone afterwards.
    pub async fn close(mut self) -> Result<(), TransferError> {
        self.shutdown()
            .await
            .map_err(|e| TransferError::Close(e.to_string()))
    }
}

impl AsyncRead for FileHandle {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            FileHandle::Local(f) => Pin::new(f).poll_read(cx, buf),
            FileHandle::Remote(f) => Pin::new(f).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for FileHandle {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            FileHandle::Local(f) => Pin::new(f).poll_write(cx, buf),
            FileHandle::Remote(f) => Pin::new(f).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            FileHandle::Local(f) => Pin::new(f).poll_flush(cx),
            FileHandle::Remote(f) => Pin::new(f).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            FileHandle::Local(f) => Pin::new(f).poll_shutdown(cx),
            FileHandle::Remote(f) => Pin::new(f).poll_shutdown(cx),
        }
    }
}

impl AsyncSeek for FileHandle {
    fn start_seek(self: Pin<&mut Self>, position: SeekFrom) -> std::io::Result<()> {
        match self.get_mut() {
            FileHandle::Local(f) => Pin::new(f).start_seek(position),
            FileHandle::Remote(f) => Pin::new(f).start_seek(position),
        }
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<u64>> {
        match self.get_mut() {
            FileHandle::Local(f) => Pin::new(f).poll_complete(cx),
            FileHandle::Remote(f) => Pin::new(f).poll_complete(cx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn test_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("skiff_test").join("endpoint").join(name);
        let _ = std::fs::create_dir_all(&dir);
        dir
    }

    fn cleanup(path: &std::path::Path) {
        let _ = std::fs::remove_dir_all(path);
    }

    #[tokio::test]
    async fn local_listing_sorts_directories_first() {
        let dir = test_dir("listing");
        std::fs::write(dir.join("b.txt"), b"x").unwrap();
        std::fs::create_dir_all(dir.join("zebra")).unwrap();
        std::fs::write(dir.join("a.txt"), b"xy").unwrap();

        let entries = Endpoint::Local
            .read_dir(dir.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name, "zebra");
        assert!(entries[0].is_dir);
        assert_eq!(entries[1].name, "a.txt");
        assert_eq!(entries[1].size, 2);
        assert_eq!(entries[2].name, "b.txt");

        cleanup(&dir);
    }

    #[tokio::test]
    async fn ranged_open_does_not_truncate() {
        let dir = test_dir("ranged");
        let path = dir.join("data.bin");
        std::fs::write(&path, vec![7u8; 64]).unwrap();

        let handle = Endpoint::Local
            .open_dest_ranged(path.to_str().unwrap())
            .await
            .unwrap();
        handle.close().await.unwrap();

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 64);
        cleanup(&dir);
    }

    #[tokio::test]
    async fn seek_positions_reads() {
        let dir = test_dir("seek");
        let path = dir.join("seek.bin");
        std::fs::write(&path, b"0123456789").unwrap();

        let mut handle = Endpoint::Local
            .open_source(path.to_str().unwrap())
            .await
            .unwrap();
        handle.seek_to(4).await.unwrap();
        let mut buf = [0u8; 3];
        handle.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"456");

        cleanup(&dir);
    }

    #[test]
    fn remote_path_helpers() {
        assert_eq!(remote_join("/", "etc"), "/etc");
        assert_eq!(remote_join("/var/log", "syslog"), "/var/log/syslog");
        assert_eq!(remote_join("/var/log/", "syslog"), "/var/log/syslog");

        assert_eq!(remote_parent("/var/log/syslog"), "/var/log");
        assert_eq!(remote_parent("/etc"), "/");
        assert_eq!(remote_parent("/"), "/");
    }

    #[test]
    fn dir_prefix_walk_keeps_relative_paths_relative() {
        assert_eq!(dir_prefixes("/var/log"), ["/var", "/var/log"]);
        assert_eq!(dir_prefixes("uploads/incoming"), ["uploads", "uploads/incoming"]);
        assert_eq!(dir_prefixes("uploads"), ["uploads"]);
        assert!(dir_prefixes("/").is_empty());
    }
}
