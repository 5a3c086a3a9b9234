//! A single peer connection: handshake, then a request/response loop driven
//! by pieces assigned over a channel by [`crate::session::DownloadSession`].
//!
//! Grounded on the teacher's `peers::download_worker::PeerDownloadWorker`,
//! with the piece-picker-handle calls replaced by session channel messages
//! (spec §4.D, §5) and a retry loop added around the whole connection
//! (spec §4.D "Peer retry behavior").

use futures::{SinkExt, StreamExt};
use sha1_smol::Sha1;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::prelude::*;
use crate::session::{PieceAssignment, SessionHandle};
use crate::torrent::{Bitfield, InfoHash, PeerId};
use std::net::SocketAddrV4;

use super::progress::PieceDownloadProgress;

use crate::peer_protocol::codec::{self, PeerFrames, PeerMessage};
use crate::peer_protocol::handshake::PeerHandshake;

pub struct PeerConnection {
    peer_addr: SocketAddrV4,
    peer_id: PeerId,
    bitfield: Bitfield,
    peer_stream: PeerFrames<TcpStream>,
    peer_is_choked: bool,
    we_are_interested: bool,
    shutdown_token: CancellationToken,
    config: Config,
}

impl PeerConnection {
    #[instrument(name = "handshake", level = "info", skip_all, fields(peer = %peer_addr))]
    async fn handshake(
        peer_addr: SocketAddrV4,
        info_hash: InfoHash,
        peer_id: PeerId,
        config: &Config,
    ) -> anyhow::Result<(TcpStream, PeerId)> {
        info!("connecting to peer");
        let mut stream = timeout(config.connect_timeout, TcpStream::connect(&peer_addr)).await??;

        let handshake = PeerHandshake::new(info_hash.clone(), peer_id);
        let mut bytes = handshake.into_bytes();

        stream.write_all(&bytes).await?;

        timeout(config.handshake_timeout, stream.read_exact(&mut bytes)).await??;

        let handshake = PeerHandshake::from_bytes(bytes);
        if handshake.info_hash != info_hash {
            anyhow::bail!("handshake info-hash mismatch");
        }
        debug!(peer_handshake_reply = ?handshake, "peer handshake received");

        Ok((stream, handshake.peer_id))
    }

    #[instrument(name = "connect", level = "info", skip_all, fields(peer = %peer_addr))]
    pub async fn connect(
        peer_addr: SocketAddrV4,
        info_hash: InfoHash,
        our_peer_id: PeerId,
        shutdown_token: CancellationToken,
        config: Config,
    ) -> anyhow::Result<Self> {
        let (stream, peer_id) =
            Self::handshake(peer_addr, info_hash, our_peer_id, &config).await?;

        let mut peer_stream = codec::upgrade_stream(stream);

        let msg = match timeout(config.read_timeout, peer_stream.next()).await? {
            Some(msg_res) => msg_res?,
            None => anyhow::bail!("peer closed connection before sending a bitfield"),
        };

        type PM = PeerMessage;
        let bitfield = match msg {
            PM::Bitfield(bitfield) => bitfield,
            other => anyhow::bail!("first message sent by peer was not a bitfield: {:?}", other),
        };

        Ok(Self {
            peer_stream,
            peer_addr,
            peer_id,
            bitfield,
            shutdown_token,
            peer_is_choked: true,
            we_are_interested: false,
            config,
        })
    }

    /// Runs the retry loop for this peer: repeatedly asks the session for
    /// the next piece to download and fetches it, until the session reports
    /// there's nothing left, the connection dies, or we're told to shut
    /// down. A single failed piece is not fatal to the connection; repeated
    /// failures up to `max_peer_retries` are tolerated before giving up.
    #[instrument("peer event loop", level = "debug", skip_all, fields(peer = %self.peer_addr))]
    pub async fn run(&mut self, session: SessionHandle) -> anyhow::Result<()> {
        let mut consecutive_failures = 0usize;

        loop {
            if consecutive_failures >= self.config.max_peer_retries {
                warn!("giving up on peer after repeated failures");
                return Ok(());
            }

            let assignment = tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    info!("shutdown signal received");
                    return Ok(());
                }
                assignment = session.request_piece(self.bitfield.clone()) => assignment,
            };

            let Some(assignment) = assignment else {
                debug!("session has no more pieces for this peer, closing connection");
                return Ok(());
            };

            match self.download_piece(&assignment).await {
                Ok(bytes) => {
                    consecutive_failures = 0;
                    session.piece_done(assignment.index, bytes).await;
                }
                Err(err) => {
                    consecutive_failures += 1;
                    warn!(
                        piece = assignment.index,
                        error = %err,
                        "piece download failed, returning it to the session"
                    );
                    session.piece_failed(assignment.index).await;
                }
            }
        }
    }

    #[instrument("download piece", level = "info", skip_all, fields(piece_id = assignment.index))]
    async fn download_piece(&mut self, assignment: &PieceAssignment) -> anyhow::Result<Vec<u8>> {
        let mut progress =
            PieceDownloadProgress::new(assignment.length, self.config.max_in_flight_requests as u32);
        let mut piece = Vec::with_capacity(assignment.length as usize);

        while !progress.is_done() {
            if !self.we_are_interested {
                self.peer_stream.send(PeerMessage::Unchoke).await?;
                self.peer_stream.send(PeerMessage::Interested).await?;
                self.we_are_interested = true;
            }

            if !self.peer_is_choked {
                while let Some((begin, length)) = progress.next_block_info() {
                    let request = PeerMessage::Request {
                        index: assignment.index as u32,
                        begin,
                        length,
                    };
                    self.peer_stream.send(request).await?;
                }
            }

            let msg = tokio::select! {
                msg = timeout(self.config.read_timeout, self.peer_stream.next()) => {
                    match msg {
                        Ok(Some(msg)) => msg?,
                        Ok(None) => anyhow::bail!("peer closed connection mid-piece"),
                        Err(_) => anyhow::bail!("timed out waiting for peer"),
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    anyhow::bail!("shutting down");
                }
            };

            self.handle_peer_message(msg, assignment.index, &mut piece, &mut progress)
                .await?;
        }

        let piece_hash = Sha1::from(&piece).digest().bytes();
        if piece_hash != assignment.hash {
            anyhow::bail!("piece hash check failed");
        }

        Ok(piece)
    }

    async fn handle_peer_message(
        &mut self,
        msg: PeerMessage,
        piece_id: usize,
        piece: &mut Vec<u8>,
        download_progress: &mut PieceDownloadProgress,
    ) -> anyhow::Result<()> {
        type PM = PeerMessage;
        match msg {
            PM::Choke => {
                self.peer_is_choked = true;
                download_progress.reset_progress();
            }
            PM::Unchoke => {
                self.peer_is_choked = false;
            }
            PM::Piece {
                index: recv_index,
                begin,
                piece: block,
            } => {
                if piece_id != recv_index as usize {
                    anyhow::bail!("unrequested piece index received from peer");
                }
                download_progress.update_downloaded(begin, block.len() as u32)?;
                piece.extend(block);
            }
            PM::Have(piece_index) => {
                // parsed but not acted on: we don't re-evaluate endgame
                // assignment mid-piece, see DESIGN.md.
                trace!(piece_index, "peer announced a new piece");
            }
            PM::Bitfield(_) => {
                warn!("bitfield message received after first message, ignoring");
            }
            other => {
                trace!(?other, "ignoring downloader-side message from peer");
            }
        }
        Ok(())
    }
}
