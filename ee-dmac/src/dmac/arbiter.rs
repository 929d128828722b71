//! Bus arbitration
//!
//! VIF0 and SIF2 are checked first in fixed priority order. The remaining channels are granted
//! in round-robin order, starting just past the most recent round-robin grant.

use crate::api::DmacConfig;
use crate::channel::ChannelId;
use crate::dmac::metrics::DmacMetrics;
use crate::dmac::stall;
use crate::registers::RegisterFile;
use bincode::{Decode, Encode};

const FIXED_PRIORITY: [ChannelId; 2] = [ChannelId::Vif0, ChannelId::Sif2];

const ROUND_ROBIN: [ChannelId; 8] = [
    ChannelId::Vif1,
    ChannelId::Gif,
    ChannelId::FromIpu,
    ChannelId::ToIpu,
    ChannelId::Sif0,
    ChannelId::Sif1,
    ChannelId::FromSpr,
    ChannelId::ToSpr,
];

pub(super) struct Admission<'a> {
    pub registers: &'a RegisterFile,
    pub requests: &'a mut [bool; ChannelId::COUNT],
    pub config: &'a DmacConfig,
    pub metrics: &'a mut DmacMetrics,
}

impl Admission<'_> {
    pub fn admit(&mut self, id: ChannelId) -> bool {
        if !self.registers.channel(id).chcr.start() {
            return false;
        }

        self.metrics.record_arbitration_check();

        if !self.passes_checks(id) {
            self.metrics.record_skip(id);
            return false;
        }

        self.requests[id.index()] = false;
        true
    }

    fn passes_checks(&self, id: ChannelId) -> bool {
        let channel = self.registers.channel(id);
        let controller = &self.registers.controller;

        if self.config.strict_timing && !self.requests[id.index()] {
            return false;
        }

        if !controller.priority_allows(id) {
            return false;
        }

        if stall::drain_stall_active(id, channel, controller)
            && channel.qwc != 0
            && stall::drain_stall_limit(channel.madr, 1, controller.stadr) == 0
        {
            log::trace!(
                "{id} stalled: MADR={:08X} STADR={:08X}",
                channel.madr.addr(),
                controller.stadr
            );
            return false;
        }

        // With the MFIFO shortcut, the drain channel consumes fromSPR's data straight out of the
        // scratchpad
        if id == ChannelId::FromSpr
            && self.config.mfifo_shortcut
            && controller.mfifo_drain_channel().is_some()
        {
            return false;
        }

        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct Arbiter {
    // Index into ROUND_ROBIN of the last round-robin grant
    cursor: u8,
}

impl Arbiter {
    pub fn new() -> Self {
        Self { cursor: (ROUND_ROBIN.len() - 1) as u8 }
    }

    pub(super) fn select(&mut self, admission: &mut Admission<'_>) -> Option<ChannelId> {
        for id in FIXED_PRIORITY {
            if !admission.registers.channel(id).chcr.start() {
                continue;
            }

            admission.metrics.record_arbitration_check();
            if admission.registers.controller.priority_allows(id) {
                admission.requests[id.index()] = false;
                return Some(id);
            }
            admission.metrics.record_skip(id);
        }

        for step in 1..=ROUND_ROBIN.len() {
            let index = (self.cursor as usize + step) % ROUND_ROBIN.len();
            let id = ROUND_ROBIN[index];
            if admission.admit(id) {
                self.cursor = index as u8;
                return Some(id);
            }
        }

        None
    }
}

impl Default for Arbiter {
    fn default() -> Self {
        Self::new()
    }
}
