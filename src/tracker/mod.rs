pub mod request;
pub mod response;
pub mod udp;

use rand::Rng;
use reqwest::Client as HttpClient;
use tokio::net::UdpSocket;

use crate::error::{EngineError, Result};
use crate::metainfo::tracker_url::{HttpUrl, UdpUrl};
use crate::prelude::*;

use request::TrackerRequest;
use udp::{AnnounceEvent, UDPAnnounceRequest, UDPAnnounceResponse, UDPConnectRequest, UDPConnectResponse};

use self::response::{TrackerResponse, TrackerResponseResult};

pub struct UdpTracker {
    announce_url: UdpUrl,
    timeout: std::time::Duration,
}

pub struct HttpTracker<'a> {
    client: &'a HttpClient,
    announce_url: HttpUrl,
}

impl<'a> HttpTracker<'a> {
    pub fn new(client: &'a HttpClient, announce_url: HttpUrl) -> Self {
        Self {
            client,
            announce_url,
        }
    }
}

impl UdpTracker {
    pub fn new(announce_url: UdpUrl, timeout: std::time::Duration) -> Self {
        Self {
            announce_url,
            timeout,
        }
    }
}

pub trait Announce {
    async fn announce(self, request: &TrackerRequest) -> anyhow::Result<TrackerResponse>;
}

impl<'a> Announce for HttpTracker<'a> {
    #[instrument(level = "info", skip_all, fields(tracker = self.announce_url.as_ref()))]
    async fn announce(self, request: &TrackerRequest) -> anyhow::Result<TrackerResponse> {
        let mut request_url = self.announce_url.into_inner();
        request_url.set_query(Some(&request.to_url_query()));
        info!("announcing to http tracker");
        let response = self.client.get(request_url).send().await?.bytes().await?;
        let response: TrackerResponseResult = serde_bencode::from_bytes(&response)?;
        response.into()
    }
}

impl Announce for UdpTracker {
    #[instrument(level = "info", skip_all, fields(tracker = self.announce_url.as_ref()))]
    async fn announce(self, request: &TrackerRequest) -> anyhow::Result<TrackerResponse> {
        let url = self.announce_url.into_inner();
        let host = url
            .host_str()
            .ok_or_else(|| EngineError::TrackerUnreachable("udp tracker url has no host".into()))?;
        let port = url
            .port()
            .ok_or_else(|| EngineError::TrackerUnreachable("udp tracker url has no port".into()))?;

        let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(EngineError::IoError)?;
        socket
            .connect((host, port))
            .await
            .map_err(EngineError::IoError)?;

        info!("connecting to udp tracker");
        let transaction_id: u32 = rand::thread_rng().gen();
        let connect_req = UDPConnectRequest::new(transaction_id).to_bytes().await?;
        let connect_resp = udp::exchange(&socket, &connect_req, self.timeout).await?;
        let connect_resp = UDPConnectResponse::from_bytes(connect_resp).await?;

        if connect_resp.transaction_id != transaction_id {
            anyhow::bail!("udp tracker connect response transaction id mismatch");
        }

        info!(connection_id = connect_resp.connection_id, "announcing to udp tracker");
        let announce_transaction_id: u32 = rand::thread_rng().gen();
        let announce_req = UDPAnnounceRequest {
            connection_id: connect_resp.connection_id,
            transaction_id: announce_transaction_id,
            info_hash: request.info_hash.clone(),
            peer_id: request.peer_id.clone(),
            downloaded: request.downloaded as u64,
            left: request.left as u64,
            uploaded: request.uploaded as u64,
            event: AnnounceEvent::Started,
            port: request.port,
            num_want: request.numwant as i32,
        }
        .to_bytes()
        .await?;

        let announce_resp = udp::exchange(&socket, &announce_req, self.timeout).await?;
        let announce_resp = UDPAnnounceResponse::from_bytes(announce_resp).await?;

        if announce_resp.transaction_id != announce_transaction_id {
            anyhow::bail!("udp tracker announce response transaction id mismatch");
        }

        Ok(TrackerResponse {
            request_interval_seconds: announce_resp.interval_seconds as u64,
            peer_addreses: announce_resp.peer_addresses,
        })
    }
}
