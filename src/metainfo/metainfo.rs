use std::path::{Path, PathBuf};

use serde::Deserialize;
use sha1_smol::Sha1;

use crate::error::{EngineError, Result};
use crate::torrent::InfoHash;

use super::info_dict::{InfoDict, PieceHash, RawFileEntry};
use super::tracker_url::TrackerUrl;

/// One file inside a multi-file torrent, with its path relative to the
/// torrent's root directory.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: PathBuf,
    pub length: u64,
}

#[derive(Debug, Clone)]
pub enum Mode {
    Single { length: u64 },
    Multiple { files: Vec<FileEntry> },
}

#[derive(Debug, Deserialize)]
struct RawTorrent {
    announce: TrackerUrl,

    #[serde(rename = "info")]
    info: InfoDict,

    #[serde(default)]
    #[serde(rename = "announce-list")]
    announce_list: Option<Vec<Vec<TrackerUrl>>>,

    #[serde(default)]
    #[serde(rename = "creation date")]
    #[allow(dead_code)]
    creation_date: Option<u64>,

    #[serde(default)]
    #[serde(rename = "created by")]
    #[allow(dead_code)]
    created_by: Option<String>,

    #[serde(default)]
    #[allow(dead_code)]
    comment: Option<String>,

    #[serde(default)]
    #[allow(dead_code)]
    encoding: Option<String>,
}

/// Parsed, immutable metainfo. See spec §4.A / §6.
#[derive(Debug, Clone)]
pub struct Metainfo {
    pub info_hash: InfoHash,
    pub name: String,
    pub piece_length: u64,
    pub piece_hashes: Vec<PieceHash>,
    pub mode: Mode,
    pub(crate) announce: TrackerUrl,
    pub(crate) announce_list: Option<Vec<Vec<TrackerUrl>>>,
}

impl Metainfo {
    pub async fn from_bencode_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path.as_ref())
            .await
            .map_err(EngineError::IoError)?;
        Self::from_bencode_bytes(&bytes)
    }

    pub fn from_bencode_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: RawTorrent = serde_bencode::from_bytes(bytes)
            .map_err(|e| EngineError::MalformedMetainfo(e.to_string()))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawTorrent) -> Result<Self> {
        let info_hash = {
            let info_bytes = serde_bencode::to_bytes(&raw.info)
                .map_err(|e| EngineError::MalformedMetainfo(e.to_string()))?;
            InfoHash::new(Sha1::from(info_bytes).digest().bytes())
        };

        let (name, piece_length, piece_hashes, mode) = match raw.info {
            InfoDict::SingleFile {
                filename,
                length,
                piece_length,
                pieces,
                ..
            } => (filename, piece_length, pieces, Mode::Single { length }),
            InfoDict::MultiFile {
                dirname,
                files,
                piece_length,
                pieces,
                ..
            } => {
                let files = files
                    .into_iter()
                    .map(|RawFileEntry { path, length, .. }| FileEntry {
                        path: path.iter().collect::<PathBuf>(),
                        length,
                    })
                    .collect();
                (dirname, piece_length, pieces, Mode::Multiple { files })
            }
        };

        if piece_length == 0 {
            return Err(EngineError::MalformedMetainfo(
                "piece length must be positive".into(),
            ));
        }
        if piece_hashes.is_empty() {
            return Err(EngineError::MalformedMetainfo(
                "pieces string must not be empty".into(),
            ));
        }

        Ok(Self {
            info_hash,
            name,
            piece_length,
            piece_hashes,
            mode,
            announce: raw.announce,
            announce_list: raw.announce_list,
        })
    }

    pub fn total_length(&self) -> u64 {
        match &self.mode {
            Mode::Single { length } => *length,
            Mode::Multiple { files } => files.iter().map(|f| f.length).sum(),
        }
    }

    pub fn number_of_pieces(&self) -> usize {
        self.piece_hashes.len()
    }

    pub fn piece_hash(&self, index: usize) -> Result<&PieceHash> {
        self.piece_hashes.get(index).ok_or_else(|| {
            EngineError::MalformedMetainfo(format!("piece index {index} out of range"))
        })
    }

    /// One entry per file: `(path, length)`. Single-file mode returns one
    /// entry whose path is just the torrent's name.
    pub fn files(&self) -> Vec<(PathBuf, u64)> {
        match &self.mode {
            Mode::Single { length } => vec![(PathBuf::from(&self.name), *length)],
            Mode::Multiple { files } => files.iter().map(|f| (f.path.clone(), f.length)).collect(),
        }
    }

    /// All tracker URLs to announce to: `announce` plus any `announce-list`
    /// entries, with IPv6-only trackers filtered out. Matches the fallback
    /// behavior of the program this spec was distilled from: when there is
    /// no `announce-list`, the tracker list is just `[announce]`.
    pub fn trackers(&self) -> Vec<TrackerUrl> {
        let mut urls = match &self.announce_list {
            Some(tiers) => tiers.iter().flatten().cloned().collect::<Vec<_>>(),
            None => vec![self.announce.clone()],
        };
        urls.retain(|url| !url.looks_like_ipv6());
        urls
    }
}

impl crate::tracker::request::Requestable for Metainfo {
    fn get_info_hash(&self) -> anyhow::Result<InfoHash> {
        Ok(self.info_hash.clone())
    }

    fn get_request_length(&self) -> usize {
        self.total_length() as usize
    }
}
