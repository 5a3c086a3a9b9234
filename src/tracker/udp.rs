//! UDP tracker protocol, BEP-15: connect handshake then announce.
//!
//! The teacher implements only the connect request/response framing and
//! leaves announce as a `todo!()`; this fills in the announce exchange the
//! same way, using the same `Cursor` + `AsyncRead`/`AsyncWriteExt` style.

use std::io::Cursor;
use std::net::SocketAddrV4;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{EngineError, Result};
use crate::torrent::{InfoHash, PeerId};

#[derive(Debug, Clone)]
pub struct UDPConnectRequest {
    pub transaction_id: u32,
}

impl UDPConnectRequest {
    const PROTOCOL_ID: u64 = 0x41727101980;
    const ACTION: u32 = 0;

    pub fn new(transaction_id: u32) -> Self {
        Self { transaction_id }
    }

    pub async fn to_bytes(&self) -> anyhow::Result<[u8; 16]> {
        let mut bytes = [0; 16];
        let mut cursor = Cursor::new(&mut bytes[..]);

        cursor.write_u64(Self::PROTOCOL_ID).await?;
        cursor.write_u32(Self::ACTION).await?;
        cursor.write_u32(self.transaction_id).await?;

        Ok(bytes)
    }
}

#[derive(Debug, Clone)]
pub struct UDPConnectResponse {
    pub action: u32,
    pub transaction_id: u32,
    pub connection_id: u64,
}

impl UDPConnectResponse {
    pub async fn from_bytes(response: Vec<u8>) -> anyhow::Result<Self> {
        let mut cursor = Cursor::new(response);
        let action = cursor.read_u32().await?;
        let transaction_id = cursor.read_u32().await?;
        let connection_id = cursor.read_u64().await?;
        Ok(Self {
            action,
            transaction_id,
            connection_id,
        })
    }
}

/// `event` field of the announce request; we only ever need "started"
/// since this client never seeds or announces a graceful stop.
#[derive(Debug, Clone, Copy)]
#[repr(u32)]
pub enum AnnounceEvent {
    None = 0,
    Started = 1,
}

#[derive(Debug, Clone)]
pub struct UDPAnnounceRequest {
    pub connection_id: u64,
    pub transaction_id: u32,
    pub info_hash: InfoHash,
    pub peer_id: PeerId,
    pub downloaded: u64,
    pub left: u64,
    pub uploaded: u64,
    pub event: AnnounceEvent,
    pub port: u16,
    pub num_want: i32,
}

impl UDPAnnounceRequest {
    const ACTION: u32 = 1;

    pub async fn to_bytes(&self) -> anyhow::Result<[u8; 98]> {
        let mut bytes = [0u8; 98];
        let mut cursor = Cursor::new(&mut bytes[..]);

        cursor.write_u64(self.connection_id).await?;
        cursor.write_u32(Self::ACTION).await?;
        cursor.write_u32(self.transaction_id).await?;
        cursor.write_all(self.info_hash.as_ref()).await?;
        cursor.write_all(self.peer_id.as_ref()).await?;
        cursor.write_u64(self.downloaded).await?;
        cursor.write_u64(self.left).await?;
        cursor.write_u64(self.uploaded).await?;
        cursor.write_u32(self.event as u32).await?;
        cursor.write_u32(0).await?; // IP address: 0 = let tracker use source address
        cursor.write_u32(0).await?; // key: unused, we never reconnect under a stable identity
        cursor.write_i32(self.num_want).await?;
        cursor.write_u16(self.port).await?;

        Ok(bytes)
    }
}

#[derive(Debug, Clone)]
pub struct UDPAnnounceResponse {
    pub transaction_id: u32,
    pub interval_seconds: u32,
    pub peer_addresses: Vec<SocketAddrV4>,
}

impl UDPAnnounceResponse {
    const MIN_SIZE: usize = 20;

    pub async fn from_bytes(response: Vec<u8>) -> anyhow::Result<Self> {
        if response.len() < Self::MIN_SIZE {
            anyhow::bail!("udp announce response shorter than the fixed header");
        }

        let mut cursor = Cursor::new(&response);
        let _action = cursor.read_u32().await?;
        let transaction_id = cursor.read_u32().await?;
        let interval_seconds = cursor.read_u32().await?;
        let _leechers = cursor.read_u32().await?;
        let _seeders = cursor.read_u32().await?;

        let peer_bytes = &response[Self::MIN_SIZE..];
        let chunks = peer_bytes.chunks_exact(6);
        if !chunks.remainder().is_empty() {
            anyhow::bail!("udp announce peer list length is not a multiple of 6");
        }

        let peer_addresses = chunks
            .map(|chunk| {
                let [a, b, c, d, p @ ..]: [u8; 6] =
                    chunk.try_into().expect("chunks_exact yields 6 bytes");
                SocketAddrV4::new(std::net::Ipv4Addr::new(a, b, c, d), u16::from_be_bytes(p))
            })
            .collect();

        Ok(Self {
            transaction_id,
            interval_seconds,
            peer_addresses,
        })
    }
}

pub async fn exchange(
    socket: &tokio::net::UdpSocket,
    request: &[u8],
    timeout: std::time::Duration,
) -> Result<Vec<u8>> {
    socket.send(request).await.map_err(EngineError::IoError)?;

    let mut buf = vec![0u8; 1024];
    let n = tokio::time::timeout(timeout, socket.recv(&mut buf))
        .await
        .map_err(|_| EngineError::TrackerUnreachable("udp tracker timed out".into()))?
        .map_err(EngineError::IoError)?;
    buf.truncate(n);
    Ok(buf)
}
