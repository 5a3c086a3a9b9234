use rand::Rng;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(transparent)]
#[repr(transparent)]
pub struct PeerId([u8; Self::PEER_ID_SIZE]);

impl AsRef<[u8; Self::PEER_ID_SIZE]> for PeerId {
    fn as_ref(&self) -> &[u8; Self::PEER_ID_SIZE] {
        &self.0
    }
}

impl PeerId {
    pub const PEER_ID_SIZE: usize = 20;
    pub const PEER_ID_PREFIX: &'static [u8; 2] = b"SA";
    pub const SUFFIX_LEN: usize = Self::PEER_ID_SIZE - Self::PEER_ID_PREFIX.len();

    const SUFFIX_ALPHABET: &'static [u8; 36] = b"abcdefghijklmnopqrstuvwxyz0123456789";

    pub fn with_suffix(suffix: &[u8; Self::SUFFIX_LEN]) -> Self {
        let mut peer_id = [0; Self::PEER_ID_SIZE];

        let (prefix_segment, suffix_segment) = peer_id.split_at_mut(Self::PEER_ID_PREFIX.len());
        prefix_segment.copy_from_slice(Self::PEER_ID_PREFIX);

        suffix_segment.copy_from_slice(suffix);

        PeerId(peer_id)
    }

    /// Random per-session peer-id: "SA" followed by 18 lowercase/digit ASCII
    /// characters, matching the wire value the original client advertised.
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        let mut suffix = [0u8; Self::SUFFIX_LEN];
        for byte in suffix.iter_mut() {
            let idx = rng.gen_range(0..Self::SUFFIX_ALPHABET.len());
            *byte = Self::SUFFIX_ALPHABET[idx];
        }
        Self::with_suffix(&suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_peer_id_has_sa_prefix() {
        let id = PeerId::random();
        let bytes = id.as_ref();
        assert_eq!(&bytes[0..2], b"SA");
        assert!(bytes[2..]
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
    }
}
