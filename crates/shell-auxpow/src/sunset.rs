use serde::{Deserialize, Serialize};
use tracing::info;

use shell_core::types::BlockHeight;

/// Sunset lifecycle: `Active → NoticePosted → Sunset`, terminal within a
/// chain lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SunsetPhase {
    Active,
    NoticePosted { activates_at: BlockHeight },
    Sunset,
}

/// Counts native versus merge-mined blocks and drives the phase machine.
/// The network hashrate estimate is operator-fed; estimating it from
/// difficulty belongs to the consensus layer.
#[derive(Debug)]
pub struct SunsetTracker {
    phase: SunsetPhase,
    hashrate_threshold: u64,
    monitoring_blocks: BlockHeight,
    notice_blocks: BlockHeight,
    native_blocks: u64,
    aux_blocks: u64,
    window_blocks: BlockHeight,
    network_hashrate: u64,
}

impl SunsetTracker {
    pub fn new(
        hashrate_threshold: u64,
        monitoring_blocks: BlockHeight,
        notice_blocks: BlockHeight,
    ) -> Self {
        Self {
            phase: SunsetPhase::Active,
            hashrate_threshold,
            monitoring_blocks,
            notice_blocks,
            native_blocks: 0,
            aux_blocks: 0,
            window_blocks: 0,
            network_hashrate: 0,
        }
    }

    pub fn phase(&self) -> SunsetPhase {
        self.phase
    }

    pub fn set_network_hashrate(&mut self, hashrate: u64) {
        self.network_hashrate = hashrate;
    }

    /// Record one connected block and advance the machine.
    pub fn on_block(&mut self, height: BlockHeight, is_aux_block: bool) {
        if let SunsetPhase::NoticePosted { activates_at } = self.phase {
            if height >= activates_at {
                self.phase = SunsetPhase::Sunset;
                info!(height, "auxiliary proof-of-work sunset activated");
                return;
            }
        }
        if self.phase == SunsetPhase::Sunset {
            return;
        }

        if is_aux_block {
            self.aux_blocks += 1;
        } else {
            self.native_blocks += 1;
        }
        self.window_blocks += 1;

        if self.window_blocks >= self.monitoring_blocks {
            self.evaluate_window(height);
            self.native_blocks = 0;
            self.aux_blocks = 0;
            self.window_blocks = 0;
        }
    }

    /// Recompute the native ratio for the finished window; post the notice
    /// once the estimated native hashrate holds the threshold.
    fn evaluate_window(&mut self, height: BlockHeight) {
        let total = self.native_blocks + self.aux_blocks;
        if total == 0 || self.phase != SunsetPhase::Active {
            return;
        }
        let estimated_native = self.native_blocks * self.network_hashrate / total;
        if estimated_native >= self.hashrate_threshold {
            let activates_at = height + self.notice_blocks;
            self.phase = SunsetPhase::NoticePosted { activates_at };
            info!(
                height,
                activates_at, estimated_native, "posted auxiliary proof-of-work sunset notice"
            );
        }
    }
}
