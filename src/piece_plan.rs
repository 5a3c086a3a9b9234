//! Piece/block plan derivation (spec §3 "Piece plan", §4.C).
//!
//! Builds the immutable mapping from piece index to its blocks and its
//! location in the on-disk file layout, including fractured pieces that
//! straddle a file boundary in multi-file mode.

use crate::metainfo::{Metainfo, Mode, PieceHash};
use crate::prelude::*;

pub type PieceIndex = usize;

/// A single 16 KiB (except possibly the last) request unit within a piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Piece-local byte offset.
    pub offset: u32,
    pub length: u32,
}

/// Where a piece's bytes live on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileLocation {
    /// The piece lives entirely within one file, at `file_idx` bytes into
    /// it.
    Single { file_name: String, file_idx: u64 },
    /// The piece straddles a file boundary. `split_offset` is the
    /// piece-local byte offset at which bytes stop belonging to
    /// `first_file` and start belonging to `second_file`.
    Fractured {
        first_file: String,
        second_file: String,
        file_idx: u64,
        split_offset: u32,
    },
}

#[derive(Debug, Clone)]
pub struct PieceInfo {
    pub index: PieceIndex,
    pub blocks: Vec<Block>,
    pub hash: PieceHash,
    pub location: FileLocation,
}

impl PieceInfo {
    pub fn piece_length(&self) -> u32 {
        self.blocks.iter().map(|b| b.length).sum()
    }
}

#[derive(Debug, Clone)]
pub struct PiecePlan {
    pub pieces: Vec<PieceInfo>,
}

const BLOCK_SIZE: u64 = 16 * 1024;

impl PiecePlan {
    /// Builds the plan for a parsed [`Metainfo`]. Single-file mode never
    /// fractures; multi-file mode follows the cumulative-offset algorithm
    /// from spec §4.C.
    #[instrument(level = "debug", skip_all)]
    pub fn build(metainfo: &Metainfo) -> Self {
        let piece_length = metainfo.piece_length;
        let total_length = metainfo.total_length();
        let number_of_pieces = metainfo.number_of_pieces();

        let pieces = match &metainfo.mode {
            Mode::Single { .. } => (0..number_of_pieces)
                .map(|index| {
                    let blocks = blocks_for_piece(index, piece_length, total_length);
                    PieceInfo {
                        index,
                        blocks,
                        hash: *metainfo
                            .piece_hash(index)
                            .expect("index bounded by number_of_pieces"),
                        location: FileLocation::Single {
                            file_name: metainfo.name.clone(),
                            file_idx: index as u64 * piece_length,
                        },
                    }
                })
                .collect(),
            Mode::Multiple { files } => {
                build_multi_file_plan(metainfo, files, piece_length, total_length, number_of_pieces)
            }
        };

        Self { pieces }
    }
}

fn blocks_for_piece(index: PieceIndex, piece_length: u64, total_length: u64) -> Vec<Block> {
    let piece_beg = index as u64 * piece_length;
    let this_piece_len = std::cmp::min(piece_length, total_length - piece_beg);

    let mut blocks = Vec::with_capacity(((this_piece_len + BLOCK_SIZE - 1) / BLOCK_SIZE) as usize);
    let mut offset = 0u64;
    while offset < this_piece_len {
        let length = std::cmp::min(BLOCK_SIZE, this_piece_len - offset);
        blocks.push(Block {
            offset: offset as u32,
            length: length as u32,
        });
        offset += length;
    }
    blocks
}

fn file_name(path: &std::path::Path) -> String {
    path.to_string_lossy().into_owned()
}

fn build_multi_file_plan(
    metainfo: &Metainfo,
    files: &[crate::metainfo::FileEntry],
    piece_length: u64,
    total_length: u64,
    number_of_pieces: usize,
) -> Vec<PieceInfo> {
    let file_names: Vec<String> = files.iter().map(|f| file_name(&f.path)).collect();

    // fractures[k] = cumulative end offset of files[0..=k]
    let mut fractures = Vec::with_capacity(files.len());
    let mut running = 0u64;
    for f in files {
        running += f.length;
        fractures.push(running);
    }

    let mut pieces = Vec::with_capacity(number_of_pieces);
    let mut file_iter = 0usize;
    let mut fracture = 0u64;

    for index in 0..number_of_pieces {
        let piece_beg = index as u64 * piece_length;
        let piece_end = piece_beg + piece_length;

        // A file boundary landing at or before this piece's start belongs
        // to earlier bookkeeping, not a fracture of this piece: advance
        // past it silently before classifying.
        while file_iter + 1 < files.len() && fractures[file_iter] <= piece_beg {
            fracture = fractures[file_iter];
            file_iter += 1;
        }

        let file_idx = piece_beg - fracture;

        let location = if fractures.len() > file_iter + 1 && fractures[file_iter] < piece_end {
            let current = file_names[file_iter].clone();
            let next = file_names[file_iter + 1].clone();
            let split_offset = (fractures[file_iter] - piece_beg) as u32;
            fracture = fractures[file_iter];
            file_iter += 1;
            FileLocation::Fractured {
                first_file: current,
                second_file: next,
                file_idx,
                split_offset,
            }
        } else {
            FileLocation::Single {
                file_name: file_names[file_iter].clone(),
                file_idx,
            }
        };

        // A second fracture still inside this same piece means a file
        // shorter than one piece length sits entirely within it — more
        // boundaries than this single-split plan can represent.
        if fractures.len() > file_iter + 1 && fractures[file_iter] < piece_end {
            error!(
                piece = index,
                "future file piece anomaly: a file is shorter than one piece length"
            );
        }

        let blocks = blocks_for_piece(index, piece_length, total_length);
        pieces.push(PieceInfo {
            index,
            blocks,
            hash: *metainfo
                .piece_hash(index)
                .expect("index bounded by number_of_pieces"),
            location,
        });
    }

    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metainfo::{FileEntry, Metainfo, Mode, TrackerUrl};
    use crate::torrent::InfoHash;

    fn dummy_announce() -> TrackerUrl {
        TrackerUrl::new("http://tracker.example:6969/announce").expect("valid url")
    }

    fn metainfo_single(total_length: u64, piece_length: u64) -> Metainfo {
        let number_of_pieces = ((total_length + piece_length - 1) / piece_length) as usize;
        Metainfo {
            info_hash: InfoHash::new([0; 20]),
            name: "file.bin".into(),
            piece_length,
            piece_hashes: vec![[0u8; 20]; number_of_pieces],
            mode: Mode::Single { length: total_length },
            announce: dummy_announce(),
            announce_list: None,
        }
    }

    fn metainfo_multi(files: Vec<(&str, u64)>, piece_length: u64) -> Metainfo {
        let total_length: u64 = files.iter().map(|(_, l)| l).sum();
        let number_of_pieces = ((total_length + piece_length - 1) / piece_length) as usize;
        Metainfo {
            info_hash: InfoHash::new([0; 20]),
            name: "archive".into(),
            piece_length,
            piece_hashes: vec![[0u8; 20]; number_of_pieces],
            mode: Mode::Multiple {
                files: files
                    .into_iter()
                    .map(|(name, length)| FileEntry {
                        path: name.into(),
                        length,
                    })
                    .collect(),
            },
            announce: dummy_announce(),
            announce_list: None,
        }
    }

    #[test]
    fn single_file_exact_multiple() {
        let meta = metainfo_single(32768, 16384);
        let plan = PiecePlan::build(&meta);
        assert_eq!(plan.pieces.len(), 2);
        for piece in &plan.pieces {
            assert_eq!(piece.blocks, vec![Block { offset: 0, length: 16384 }]);
        }
    }

    #[test]
    fn single_file_ragged_tail() {
        let meta = metainfo_single(20000, 16384);
        let plan = PiecePlan::build(&meta);
        assert_eq!(plan.pieces.len(), 2);
        assert_eq!(plan.pieces[0].blocks, vec![Block { offset: 0, length: 16384 }]);
        assert_eq!(plan.pieces[1].blocks, vec![Block { offset: 0, length: 3616 }]);
    }

    #[test]
    fn multi_file_no_fracture() {
        let meta = metainfo_multi(vec![("a", 16384), ("b", 16384)], 16384);
        let plan = PiecePlan::build(&meta);
        assert_eq!(plan.pieces.len(), 2);
        assert_eq!(
            plan.pieces[0].location,
            FileLocation::Single { file_name: "a".into(), file_idx: 0 }
        );
        assert_eq!(
            plan.pieces[1].location,
            FileLocation::Single { file_name: "b".into(), file_idx: 0 }
        );
    }

    #[test]
    fn multi_file_fractured_piece() {
        let meta = metainfo_multi(vec![("a", 10000), ("b", 10000)], 16384);
        let plan = PiecePlan::build(&meta);
        assert_eq!(plan.pieces.len(), 2);
        assert_eq!(
            plan.pieces[0].location,
            FileLocation::Fractured {
                first_file: "a".into(),
                second_file: "b".into(),
                file_idx: 0,
                split_offset: 10000,
            }
        );
        assert_eq!(
            plan.pieces[1].location,
            FileLocation::Single { file_name: "b".into(), file_idx: 6384 }
        );
    }
}
