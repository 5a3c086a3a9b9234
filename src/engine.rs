//! Top-level driver loop (spec §4, "Engine"): announce, spawn peer
//! connections, and repeat until every piece is downloaded.
//!
//! Grounded on the teacher's `main.rs`, which does a single non-repeating
//! round of this; this generalizes it into a loop that re-announces and
//! spawns a fresh batch of peer connections each time a round's peers are
//! exhausted but pieces remain outstanding.

use std::collections::HashSet;
use std::net::SocketAddrV4;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::metainfo::{Metainfo, Mode, TrackerUrl};
use crate::peers::PeerConnection;
use crate::piece_plan::PiecePlan;
use crate::prelude::*;
use crate::session::DownloadSession;
use crate::torrent::PeerId;
use crate::tracker::request::{Requestable, TrackerRequest};
use crate::tracker::{Announce, HttpTracker, UdpTracker};
use crate::writer::FileWriter;

pub struct Engine {
    metainfo: Metainfo,
    config: Config,
}

impl Engine {
    pub fn new(metainfo: Metainfo, config: Config) -> Self {
        Self { metainfo, config }
    }

    #[instrument(name = "engine", level = "info", skip_all, fields(torrent = %self.metainfo.name))]
    pub async fn run(self) -> Result<()> {
        let plan = PiecePlan::build(&self.metainfo);
        let total_pieces = plan.pieces.len();
        info!(total_pieces, "starting download");

        let single_file = matches!(self.metainfo.mode, Mode::Single { .. });
        let writer = FileWriter::spawn(self.config.output_dir.clone(), &self.metainfo.name, single_file);
        let (session, session_join) = DownloadSession::spawn(plan, writer);

        let peer_id = PeerId::random();
        let http_client = reqwest::Client::new();
        let shutdown_token = CancellationToken::new();

        let mut round = 0usize;
        loop {
            round += 1;
            debug!(round, "starting announce round");

            let peer_addrs = self.announce(&http_client, &peer_id).await?;
            if peer_addrs.is_empty() {
                warn!("no peers returned by any tracker this round");
            }

            let mut peer_tasks = JoinSet::new();
            for addr in peer_addrs {
                let info_hash = self.metainfo.info_hash.clone();
                let peer_id = peer_id.clone();
                let session = session.clone();
                let config = self.config.clone();
                let peer_shutdown = shutdown_token.child_token();

                peer_tasks.spawn(async move {
                    match PeerConnection::connect(addr, info_hash, peer_id, peer_shutdown, config).await
                    {
                        Ok(mut conn) => {
                            if let Err(err) = conn.run(session).await {
                                warn!(peer = %addr, error = %err, "peer connection ended with an error");
                            }
                        }
                        Err(err) => {
                            warn!(peer = %addr, error = %err, "failed to connect to peer");
                        }
                    }
                });
            }

            tokio::select! {
                _ = drain(&mut peer_tasks) => {}
                _ = session_is_done(&session_join) => {}
            }

            if session_join.is_finished() {
                break;
            }

            // Pieces this round's peers had in flight but never finished
            // revert to pending here, not when they failed — no piece
            // gets reassigned mid-round.
            session.round_rollover().await;

            debug!(round, "round exhausted, pieces still outstanding, re-announcing");
        }

        shutdown_token.cancel();
        session_join.await.map_err(|err| {
            EngineError::ProtocolViolation(format!("download session task panicked: {err}"))
        })?;

        info!("download complete");
        Ok(())
    }

    async fn announce(&self, http_client: &reqwest::Client, peer_id: &PeerId) -> Result<Vec<SocketAddrV4>> {
        let request = TrackerRequest::new(peer_id.clone(), self.config.port, self.config.numwant, &self.metainfo)
            .map_err(|err| EngineError::TrackerUnreachable(err.to_string()))?;

        let mut peers = HashSet::new();
        for tracker in self.metainfo.trackers() {
            let result = match tracker {
                TrackerUrl::Http(url) => HttpTracker::new(http_client, url).announce(&request).await,
                TrackerUrl::Udp(url) => {
                    UdpTracker::new(url, self.config.tracker_timeout)
                        .announce(&request)
                        .await
                }
            };

            match result {
                Ok(response) => peers.extend(response.peer_addreses),
                Err(err) => warn!(error = %err, "tracker announce failed, trying the next tracker"),
            }
        }

        // Multiple trackers can return overlapping peer lists; de-duplicate
        // before handing them out so a peer isn't handshaked twice a round.
        Ok(peers.into_iter().collect())
    }
}

async fn drain(tasks: &mut JoinSet<()>) {
    while tasks.join_next().await.is_some() {}
}

fn session_is_done(join: &tokio::task::JoinHandle<()>) -> impl std::future::Future<Output = ()> + '_ {
    async move {
        // Polling loop: cheaper than a Notify/watch channel to wire up for
        // a one-shot "did the session finish" check, since this only fires
        // once per round.
        loop {
            if join.is_finished() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        }
    }
}
