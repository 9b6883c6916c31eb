use serde::{Deserialize, Serialize};

use shell_core::constants::LIQUIDITY_EPOCH_COUNT;
use shell_core::policy::ChainParams;
use shell_core::types::{BlockHeight, Hash256, MinorUnits};

/// One liquidity epoch. The Merkle root and total weight are set at
/// finalization, once the attestor quorum has published the epoch tree.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LiquidityEpoch {
    pub index: u32,
    pub start_block: BlockHeight,
    pub end_block: BlockHeight,
    /// Fixed share of the global reward pool.
    pub reward_pool: MinorUnits,
    pub merkle_root: Option<Hash256>,
    pub total_weight: u64,
}

impl LiquidityEpoch {
    pub fn is_finalized(&self) -> bool {
        self.merkle_root.is_some()
    }
}

/// Build the fixed schedule: epoch i occupies
/// `[start + i·len, start + (i+1)·len − 1]`, each carrying an equal share
/// of the global pool (the flooring remainder stays unallocated).
pub fn build_schedule(params: &ChainParams) -> Vec<LiquidityEpoch> {
    let share = params.liquidity_reward_pool / LIQUIDITY_EPOCH_COUNT as i64;
    (0..LIQUIDITY_EPOCH_COUNT)
        .map(|i| {
            let start = params.liquidity_start_block + i as BlockHeight * params.liquidity_epoch_blocks;
            LiquidityEpoch {
                index: i,
                start_block: start,
                end_block: start + params.liquidity_epoch_blocks - 1,
                reward_pool: share,
                merkle_root: None,
                total_weight: 0,
            }
        })
        .collect()
}

/// Which epoch a block height falls into, if any.
pub fn epoch_index_for_height(params: &ChainParams, height: BlockHeight) -> Option<u32> {
    if height < params.liquidity_start_block {
        return None;
    }
    let offset = (height - params.liquidity_start_block) / params.liquidity_epoch_blocks;
    if offset >= LIQUIDITY_EPOCH_COUNT as BlockHeight {
        return None;
    }
    Some(offset as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ChainParams {
        ChainParams {
            liquidity_start_block: 1_000,
            liquidity_epoch_blocks: 100,
            liquidity_reward_pool: 1_200_000,
            ..ChainParams::default()
        }
    }

    #[test]
    fn schedule_covers_contiguous_ranges() {
        let epochs = build_schedule(&params());
        assert_eq!(epochs.len(), 12);
        assert_eq!(epochs[0].start_block, 1_000);
        assert_eq!(epochs[0].end_block, 1_099);
        assert_eq!(epochs[11].start_block, 2_100);
        assert_eq!(epochs[11].end_block, 2_199);
        for pair in epochs.windows(2) {
            assert_eq!(pair[0].end_block + 1, pair[1].start_block);
        }
    }

    #[test]
    fn pool_split_equally() {
        let epochs = build_schedule(&params());
        assert!(epochs.iter().all(|e| e.reward_pool == 100_000));
    }

    #[test]
    fn height_maps_to_epoch() {
        let p = params();
        assert_eq!(epoch_index_for_height(&p, 999), None);
        assert_eq!(epoch_index_for_height(&p, 1_000), Some(0));
        assert_eq!(epoch_index_for_height(&p, 1_099), Some(0));
        assert_eq!(epoch_index_for_height(&p, 1_100), Some(1));
        assert_eq!(epoch_index_for_height(&p, 2_199), Some(11));
        assert_eq!(epoch_index_for_height(&p, 2_200), None);
    }
}
