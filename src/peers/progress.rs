use super::{BlockLength, BlockOffset, PieceLength};
use crate::prelude::*;
use std::cmp::min;

#[derive(Debug, Clone)]
pub(super) struct PieceDownloadProgress {
    piece_length: PieceLength,
    request_pending: BlockOffset,
    downloaded: BlockOffset,
    pending_blocks: u32,
    max_pending_blocks: u32,
}

impl PieceDownloadProgress {
    const MAX_BLOCK_SIZE: u32 = 1 << 14;

    pub fn new(piece_length: u32, max_pending_blocks: u32) -> Self {
        Self {
            piece_length,
            request_pending: 0,
            downloaded: 0,
            pending_blocks: 0,
            max_pending_blocks,
        }
    }

    pub fn next_block_info(&mut self) -> Option<(BlockOffset, BlockLength)> {
        if self.request_pending == self.piece_length || self.reached_max_pending() {
            trace!("request blocks pipeline filled");
            return None;
        }

        let nbytes_to_end = self.piece_length - self.request_pending;
        debug_assert!(self.request_pending < self.piece_length);

        let length = min(nbytes_to_end, Self::MAX_BLOCK_SIZE);
        let out = Some((self.request_pending, length));

        trace!("increment pending blocks");
        self.pending_blocks += 1;
        trace!(
            "move forward request pending offset by next_block_len={}",
            length
        );
        self.request_pending += length;
        out
    }

    pub fn update_downloaded(
        &mut self,
        block_begin: BlockOffset,
        length: BlockLength,
    ) -> anyhow::Result<()> {
        if block_begin != self.downloaded {
            warn!(
                last_downloaded_block = self.downloaded,
                incoming_block = block_begin,
                "blocks given out of order by peer"
            );
            anyhow::bail!("blocks downloaded out of order. last downloaded offset: {}, incoming block offset: {}", self.downloaded, block_begin)
        }

        self.downloaded += length;
        self.pending_blocks -= 1;
        trace!(
            downloaded_end_offset = self.downloaded,
            num_pending_blocks = self.pending_blocks,
            "update download progress",
        );
        Ok(())
    }

    pub fn reset_progress(&mut self) {
        debug!(
            "reset download progress to {last_requested_block_end}",
            last_requested_block_end = self.request_pending
        );
        self.request_pending = self.downloaded;
        self.pending_blocks = 0;
    }

    pub fn is_done(&self) -> bool {
        trace!(
            "checking if block done {last_downloaded_block_end} {piece_end}",
            last_downloaded_block_end = self.downloaded,
            piece_end = self.piece_length
        );
        self.downloaded == self.piece_length
    }

    fn reached_max_pending(&self) -> bool {
        trace!(
            "check if reached max pending {num_pending}",
            num_pending = self.pending_blocks
        );
        self.pending_blocks >= self.max_pending_blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipelines_up_to_max_pending_then_stops() {
        let mut progress = PieceDownloadProgress::new(16384 * 3, 2);
        assert_eq!(progress.next_block_info(), Some((0, 16384)));
        assert_eq!(progress.next_block_info(), Some((16384, 16384)));
        assert_eq!(progress.next_block_info(), None);
    }

    #[test]
    fn out_of_order_block_is_rejected() {
        let mut progress = PieceDownloadProgress::new(16384, 2);
        progress.next_block_info();
        assert!(progress.update_downloaded(4096, 16384).is_err());
    }

    #[test]
    fn choke_resets_pending_back_to_downloaded() {
        let mut progress = PieceDownloadProgress::new(16384 * 2, 4);
        progress.next_block_info();
        progress.update_downloaded(0, 16384).unwrap();
        progress.next_block_info();
        progress.reset_progress();
        assert_eq!(progress.next_block_info(), Some((16384, 16384)));
    }

    #[test]
    fn done_once_downloaded_reaches_piece_length() {
        let mut progress = PieceDownloadProgress::new(16384, 1);
        assert!(!progress.is_done());
        progress.next_block_info();
        progress.update_downloaded(0, 16384).unwrap();
        assert!(progress.is_done());
    }
}
