mod info_dict;
#[allow(clippy::module_inception)]
mod metainfo;
pub mod tracker_url;

pub use info_dict::PieceHash;
pub use metainfo::{FileEntry, Metainfo, Mode};
pub use tracker_url::TrackerUrl;
