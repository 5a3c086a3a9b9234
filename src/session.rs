//! Single-owner download session actor (spec §4.E, §5).
//!
//! All piece bookkeeping — what's remaining, what's in flight, what's
//! written — lives in one task that owns it outright; every other task
//! reaches it only through [`SessionHandle`] and an mpsc channel. This
//! replaces the teacher's `piece_picker` lock-pool design: there is nothing
//! here to lock because nothing is shared.
//!
//! Grounded on the teacher's `piece_picker::piece_picker::PiecePicker`
//! for the request/response shape, and on
//! `original_source/pytor.py`'s `DownloadSession.on_block_received` for the
//! re-enqueue-on-hash-failure behavior.

use std::collections::{HashSet, VecDeque};

use sha1_smol::Sha1;
use tokio::sync::{mpsc, oneshot};

use crate::metainfo::PieceHash;
use crate::piece_plan::{FileLocation, PiecePlan};
use crate::prelude::*;
use crate::torrent::Bitslice;
use crate::writer::{WriteJob, WriterHandle};

#[derive(Debug, Clone)]
pub struct PieceAssignment {
    pub index: usize,
    pub length: u32,
    pub hash: PieceHash,
}

enum Command {
    RequestPiece {
        bitfield: crate::torrent::Bitfield,
        respond_to: oneshot::Sender<Option<PieceAssignment>>,
    },
    PieceDone {
        index: usize,
        bytes: Vec<u8>,
    },
    PieceFailed {
        index: usize,
    },
    RoundRollover,
}

#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
}

impl SessionHandle {
    pub async fn request_piece(&self, bitfield: crate::torrent::Bitfield) -> Option<PieceAssignment> {
        let (respond_to, response) = oneshot::channel();
        if self
            .tx
            .send(Command::RequestPiece {
                bitfield,
                respond_to,
            })
            .await
            .is_err()
        {
            return None;
        }
        response.await.unwrap_or(None)
    }

    pub async fn piece_done(&self, index: usize, bytes: Vec<u8>) {
        let _ = self.tx.send(Command::PieceDone { index, bytes }).await;
    }

    pub async fn piece_failed(&self, index: usize) {
        let _ = self.tx.send(Command::PieceFailed { index }).await;
    }

    /// Signals the end of a driver round: pieces that were assigned but
    /// never completed (peer died, timed out, or errored) revert to
    /// PENDING so the next round's peers can pick them up. Per spec §5,
    /// nothing reassigns a failed piece mid-round — only round rollover
    /// does.
    pub async fn round_rollover(&self) {
        let _ = self.tx.send(Command::RoundRollover).await;
    }
}

pub struct DownloadSession {
    plan: PiecePlan,
    remaining: VecDeque<usize>,
    in_flight: HashSet<usize>,
    completed: usize,
    writer: WriterHandle,
    rx: mpsc::Receiver<Command>,
}

impl DownloadSession {
    /// Spawns the session actor and returns a handle to talk to it, plus
    /// the task's join handle so callers can await completion.
    pub fn spawn(plan: PiecePlan, writer: WriterHandle) -> (SessionHandle, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(64);
        let remaining = (0..plan.pieces.len()).collect();
        let session = Self {
            plan,
            remaining,
            in_flight: HashSet::new(),
            completed: 0,
            writer,
            rx,
        };
        let join = tokio::spawn(session.run());
        (SessionHandle { tx }, join)
    }

    fn total(&self) -> usize {
        self.plan.pieces.len()
    }

    fn is_done(&self) -> bool {
        self.completed == self.total()
    }

    #[instrument(name = "download session", level = "info", skip_all)]
    async fn run(mut self) {
        info!(total_pieces = self.total(), "download session started");

        while let Some(cmd) = self.rx.recv().await {
            match cmd {
                Command::RequestPiece {
                    bitfield,
                    respond_to,
                } => {
                    let assignment = self.assign_piece(bitfield.as_bitslice());
                    let _ = respond_to.send(assignment);
                }
                Command::PieceDone { index, bytes } => {
                    self.handle_piece_done(index, bytes).await;
                }
                Command::PieceFailed { index } => {
                    // Left IN_PROGRESS (unavailable for reassignment) until
                    // the next round rollover — failures don't get
                    // rescheduled mid-round.
                    warn!(piece = index, "peer failed to deliver piece, waiting for round rollover");
                }
                Command::RoundRollover => {
                    if !self.in_flight.is_empty() {
                        debug!(count = self.in_flight.len(), "round rollover, reverting in-progress pieces to pending");
                    }
                    for index in self.in_flight.drain() {
                        self.remaining.push_back(index);
                    }
                }
            }

            if self.is_done() {
                info!("all pieces downloaded, closing session");
                break;
            }
        }
    }

    fn assign_piece(&mut self, bitfield: &Bitslice) -> Option<PieceAssignment> {
        let pos = self
            .remaining
            .iter()
            .position(|&index| bitfield.get(index).is_some_and(|bit| *bit))?;
        let index = self.remaining.remove(pos)?;
        self.in_flight.insert(index);

        let piece = &self.plan.pieces[index];
        Some(PieceAssignment {
            index,
            length: piece.piece_length(),
            hash: piece.hash,
        })
    }

    async fn handle_piece_done(&mut self, index: usize, bytes: Vec<u8>) {
        self.in_flight.remove(&index);
        let piece = &self.plan.pieces[index];

        let actual_hash = Sha1::from(&bytes).digest().bytes();
        if actual_hash != piece.hash {
            error!(piece = index, "piece failed hash verification, re-queueing");
            self.remaining.push_front(index);
            return;
        }

        let job = match &piece.location {
            FileLocation::Single { file_name, file_idx } => WriteJob::Single {
                file_name: file_name.clone(),
                file_idx: *file_idx,
                bytes,
            },
            FileLocation::Fractured {
                first_file,
                second_file,
                file_idx,
                split_offset,
            } => WriteJob::Fractured {
                first_file: first_file.clone(),
                second_file: second_file.clone(),
                file_idx: *file_idx,
                split_offset: *split_offset,
                bytes,
            },
        };

        if self.writer.write(job).await.is_err() {
            error!(piece = index, "writer task is gone, dropping piece");
            self.remaining.push_front(index);
            return;
        }

        self.completed += 1;
        info!(
            piece = index,
            completed = self.completed,
            total = self.total(),
            "piece written"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece_plan::{Block, PieceInfo};
    use crate::torrent::Bitfield;
    use bitvec::prelude::*;

    fn plan_of(n: usize) -> PiecePlan {
        PiecePlan {
            pieces: (0..n)
                .map(|index| PieceInfo {
                    index,
                    blocks: vec![Block { offset: 0, length: 16384 }],
                    hash: Sha1::from([index as u8; 16384].as_slice()).digest().bytes(),
                    location: FileLocation::Single {
                        file_name: "f".into(),
                        file_idx: index as u64 * 16384,
                    },
                })
                .collect(),
        }
    }

    #[test]
    fn assigns_only_pieces_peer_has_and_not_in_flight() {
        let mut session = DownloadSession {
            plan: plan_of(3),
            remaining: (0..3).collect(),
            in_flight: HashSet::new(),
            completed: 0,
            writer: WriterHandle::noop_for_test(),
            rx: mpsc::channel(1).1,
        };

        let mut bits: Bitfield = bitvec![u8, bitvec::order::Msb0; 0; 3];
        bits.set(1, true);

        let assignment = session.assign_piece(bits.as_bitslice());
        assert_eq!(assignment.map(|a| a.index), Some(1));
        assert!(session.in_flight.contains(&1));
        assert!(!session.remaining.contains(&1));

        // peer has no other pieces we don't already hold in flight
        assert!(session.assign_piece(bits.as_bitslice()).is_none());
    }
}
