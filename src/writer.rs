//! File writer actor (spec §4.F).
//!
//! Owns all file handles and does the actual positioned writes, off the
//! async event loop via [`tokio::task::spawn_blocking`] — grounded on the
//! disk-IO task pattern in
//! `examples/mandreyel-cratetorrent/cratetorrent/src/disk/io.rs`, and on
//! the split-write logic in `original_source/file_saver.py`'s
//! `FileSaver.write`.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio::task;

use crate::prelude::*;

#[derive(Debug)]
pub enum WriteJob {
    Single {
        file_name: String,
        file_idx: u64,
        bytes: Vec<u8>,
    },
    Fractured {
        first_file: String,
        second_file: String,
        file_idx: u64,
        split_offset: u32,
        bytes: Vec<u8>,
    },
}

#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<WriteJob>,
}

impl WriterHandle {
    pub async fn write(&self, job: WriteJob) -> Result<(), ()> {
        self.tx.send(job).await.map_err(|_| ())
    }

    #[cfg(test)]
    pub fn noop_for_test() -> Self {
        let (tx, mut rx) = mpsc::channel(1);
        tokio::spawn(async move { while rx.recv().await.is_some() {} });
        Self { tx }
    }
}

/// Root for a single-file torrent's one file, or a multi-file torrent's
/// per-file directory tree under the torrent's name.
pub struct FileWriter {
    root: PathBuf,
    single_file: bool,
    rx: mpsc::Receiver<WriteJob>,
}

impl FileWriter {
    pub fn spawn(output_dir: PathBuf, torrent_name: &str, single_file: bool) -> WriterHandle {
        let (tx, rx) = mpsc::channel(256);
        let root = output_dir.join(torrent_name);

        let writer = Self {
            root,
            single_file,
            rx,
        };
        tokio::spawn(writer.run());
        WriterHandle { tx }
    }

    #[instrument(name = "file writer", level = "info", skip_all)]
    async fn run(mut self) {
        if !self.single_file {
            if let Err(err) = tokio::fs::create_dir_all(&self.root).await {
                error!(error = %err, "failed to create output directory, writer shutting down");
                return;
            }
        } else if let Some(parent) = self.root.parent() {
            if let Err(err) = tokio::fs::create_dir_all(parent).await {
                error!(error = %err, "failed to create output directory, writer shutting down");
                return;
            }
        }

        while let Some(job) = self.rx.recv().await {
            if let Err(err) = self.handle_job(job).await {
                error!(error = %err, "write failed");
            }
        }
        debug!("writer channel closed, shutting down");
    }

    async fn handle_job(&mut self, job: WriteJob) -> std::io::Result<()> {
        match job {
            WriteJob::Single {
                file_name,
                file_idx,
                bytes,
            } => {
                let path = self.path_for(&file_name);
                self.write_at(path, file_idx, bytes).await
            }
            WriteJob::Fractured {
                first_file,
                second_file,
                file_idx,
                split_offset,
                mut bytes,
            } => {
                let tail = bytes.split_off(split_offset as usize);
                let first_path = self.path_for(&first_file);
                self.write_at(first_path, file_idx, bytes).await?;
                let second_path = self.path_for(&second_file);
                self.write_at(second_path, 0, tail).await
            }
        }
    }

    fn path_for(&self, file_name: &str) -> PathBuf {
        if self.single_file {
            self.root.clone()
        } else {
            self.root.join(file_name)
        }
    }

    async fn write_at(&mut self, path: PathBuf, offset: u64, bytes: Vec<u8>) -> std::io::Result<()> {
        task::spawn_blocking(move || write_at_blocking(&path, offset, &bytes))
            .await
            .expect("writer blocking task panicked")
    }
}

fn write_at_blocking(path: &Path, offset: u64, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_single_file_at_offset() {
        let dir = std::env::temp_dir().join(format!("leech-test-{:?}", std::thread::current().id()));
        let _ = tokio::fs::create_dir_all(&dir).await;

        let handle = FileWriter::spawn(dir.clone(), "out.bin", true);
        handle
            .write(WriteJob::Single {
                file_name: "out.bin".into(),
                file_idx: 4,
                bytes: vec![1, 2, 3],
            })
            .await
            .unwrap();

        // give the spawned writer task a chance to run.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let written = tokio::fs::read(dir.join("out.bin")).await.unwrap();
        assert_eq!(&written[4..7], &[1, 2, 3]);

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn splits_fractured_piece_across_two_files() {
        let dir = std::env::temp_dir().join(format!("leech-test-frac-{:?}", std::thread::current().id()));
        let _ = tokio::fs::remove_dir_all(&dir).await;

        let handle = FileWriter::spawn(dir.clone(), "archive", false);
        handle
            .write(WriteJob::Fractured {
                first_file: "a.bin".into(),
                second_file: "b.bin".into(),
                file_idx: 0,
                split_offset: 2,
                bytes: vec![1, 2, 3, 4],
            })
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let a = tokio::fs::read(dir.join("archive").join("a.bin")).await.unwrap();
        let b = tokio::fs::read(dir.join("archive").join("b.bin")).await.unwrap();
        assert_eq!(a, vec![1, 2]);
        assert_eq!(b, vec![3, 4]);

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
