//! Per-channel transfer counters
//!
//! Counting is off unless [`DmacConfig::metrics`](crate::DmacConfig) is set. A transfer is one
//! data movement made during a grant (an interleave block, or the units a NORMAL or CHAIN
//! grant moved), so a single CHCR start usually shows up as several transfers.

use crate::channel::ChannelId;
use crate::registers::TransferMode;
use crate::tag::TagId;
use bincode::{Decode, Encode};
use std::array;

#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct ChannelMetrics {
    /// Quadwords moved, indexed by transfer mode
    pub qwc: [u64; TransferMode::COUNT],
    /// Data movements that moved at least one quadword, indexed by transfer mode
    pub transfers: [u32; TransferMode::COUNT],
    /// CHCR writes that set STR, indexed by transfer mode
    pub starts: [u32; TransferMode::COUNT],
    pub skipped_arbitrations: u32,
    /// Chain descriptors loaded, indexed by tag ID
    pub chain_packets: [u32; 8],
    pub current_chain: u32,
    pub longest_chain: u32,
}

impl ChannelMetrics {
    pub fn total_qwc(&self) -> u64 {
        self.qwc.iter().sum()
    }

    pub fn transfer_count(&self) -> u32 {
        self.transfers.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct DmacMetrics {
    channels: [ChannelMetrics; ChannelId::COUNT],
    events: u64,
    arbitration_checks: u64,
    enabled: bool,
}

impl DmacMetrics {
    pub fn new(enabled: bool) -> Self {
        Self {
            channels: array::from_fn(|_| ChannelMetrics::default()),
            events: 0,
            arbitration_checks: 0,
            enabled,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn channel(&self, id: ChannelId) -> &ChannelMetrics {
        &self.channels[id.index()]
    }

    pub fn events(&self) -> u64 {
        self.events
    }

    pub fn arbitration_checks(&self) -> u64 {
        self.arbitration_checks
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.enabled);
    }

    fn channel_mut(&mut self, id: ChannelId) -> Option<&mut ChannelMetrics> {
        if !self.enabled {
            return None;
        }
        Some(&mut self.channels[id.index()])
    }

    pub(crate) fn record_start(&mut self, id: ChannelId, mode: TransferMode) {
        if let Some(channel) = self.channel_mut(id) {
            channel.starts[mode as usize] += 1;
        }
    }

    pub(crate) fn record_transfer(&mut self, id: ChannelId, mode: TransferMode, units: u32) {
        if units == 0 {
            return;
        }

        if let Some(channel) = self.channel_mut(id) {
            channel.qwc[mode as usize] += u64::from(units);
            channel.transfers[mode as usize] += 1;
        }
    }

    pub(crate) fn record_chain_packet(&mut self, id: ChannelId, tag_id: TagId) {
        if let Some(channel) = self.channel_mut(id) {
            channel.chain_packets[tag_id.index()] += 1;
            channel.current_chain += 1;
            channel.longest_chain = channel.longest_chain.max(channel.current_chain);
        }
    }

    pub(crate) fn record_chain_end(&mut self, id: ChannelId) {
        if let Some(channel) = self.channel_mut(id) {
            channel.current_chain = 0;
        }
    }

    pub(crate) fn record_skip(&mut self, id: ChannelId) {
        if let Some(channel) = self.channel_mut(id) {
            channel.skipped_arbitrations += 1;
        }
    }

    pub(crate) fn record_event(&mut self) {
        if self.enabled {
            self.events += 1;
        }
    }

    pub(crate) fn record_arbitration_check(&mut self) {
        if self.enabled {
            self.arbitration_checks += 1;
        }
    }
}

impl Default for DmacMetrics {
    fn default() -> Self {
        Self::new(false)
    }
}
