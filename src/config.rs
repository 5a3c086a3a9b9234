use std::time::Duration;

/// Tunables pinned by the spec (block size, in-flight cap, timeouts, retry
/// budget). Collected into one struct rather than scattered constants so
/// `main` can derive them from CLI flags without threading individual
/// values through every constructor.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of simultaneously in-flight block requests per peer.
    pub max_in_flight_requests: usize,
    /// Block size requested from peers, except for a final shorter block.
    pub block_len: u32,
    /// Timeout for establishing the TCP connection to a peer.
    pub connect_timeout: Duration,
    /// Timeout for the initial handshake read.
    pub handshake_timeout: Duration,
    /// Timeout for each subsequent read while the peer conversation runs.
    pub read_timeout: Duration,
    /// Timeout applied to each tracker announce (connect and announce
    /// phases get their own timeout each for UDP trackers).
    pub tracker_timeout: Duration,
    /// Number of times a peer task is retried from scratch before it's
    /// abandoned for the round.
    pub max_peer_retries: usize,
    /// `numwant` sent to trackers.
    pub numwant: u32,
    /// Port advertised to trackers and bound for incoming connections.
    pub port: u16,
    /// Output directory under which the torrent's file(s) are written.
    pub output_dir: std::path::PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_in_flight_requests: 2,
            block_len: 16 * 1024,
            connect_timeout: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            tracker_timeout: Duration::from_secs(10),
            max_peer_retries: 5,
            numwant: 80,
            port: 6881,
            output_dir: std::path::PathBuf::from("./downloads"),
        }
    }
}
