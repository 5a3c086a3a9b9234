use serde::{Deserialize, Serialize};

pub type PieceHash = [u8; 20];

/// A single file entry inside a multi-file `info` dictionary, as it
/// appears on the wire (BEP-3 `files` list).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawFileEntry {
    pub path: Vec<String>,
    pub length: u64,

    #[serde(default)]
    pub md5sum: Option<String>,
}

/// The bencode-roundtrippable `info` dictionary. Kept separate from the
/// public [`super::Metainfo`] type so that re-serializing it (to compute
/// the info-hash) reproduces the original bytes bit-exactly — any field
/// not present here, or present in a different order, would change the
/// hash.
#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum InfoDict {
    MultiFile {
        #[serde(rename = "name")]
        dirname: String,

        files: Vec<RawFileEntry>,

        #[serde(rename = "piece length")]
        piece_length: u64,

        #[serde(with = "piece_hashes")]
        pieces: Vec<PieceHash>,

        #[serde(default)]
        private: Option<i64>,
    },

    SingleFile {
        #[serde(rename = "name")]
        filename: String,
        length: u64,

        #[serde(default)]
        md5sum: Option<String>,

        #[serde(rename = "piece length")]
        piece_length: u64,

        #[serde(with = "piece_hashes")]
        pieces: Vec<PieceHash>,

        #[serde(default)]
        private: Option<i64>,
    },
}

mod piece_hashes {
    use super::PieceHash;
    use serde::de::{self, Visitor};
    use static_str_ops::static_format;

    const HASH_SIZE: usize = std::mem::size_of::<PieceHash>();

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<PieceHash>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_bytes(PieceHashVisitor)
    }

    pub fn serialize<S>(
        piece_hashes: impl AsRef<[PieceHash]>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serde_bytes::serialize(&piece_hashes.as_ref().concat(), serializer)
    }

    struct PieceHashVisitor;
    impl<'de> Visitor<'de> for PieceHashVisitor {
        type Value = Vec<PieceHash>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str(static_format!(
                "a byte sequence whose length is a multiple of {}",
                HASH_SIZE
            ))
        }

        fn visit_bytes<E>(self, bytes: &[u8]) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if bytes.len() % HASH_SIZE != 0 {
                return Err(E::custom(static_format!(
                    "pieces string length must be a multiple of {}",
                    HASH_SIZE
                )));
            }

            Ok(bytes
                .chunks_exact(HASH_SIZE)
                .map(|chunk| {
                    chunk
                        .try_into()
                        .expect("chunks_exact yields chunks of exactly HASH_SIZE")
                })
                .collect())
        }
    }
}
