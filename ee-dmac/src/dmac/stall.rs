//! Stall control
//!
//! A source-stall channel publishes its MADR through D_STADR as it writes memory, and the
//! drain-stall channel selected by D_CTRL.STD may not read past that address. This lets e.g. SIF0
//! stream data into RAM while GIF consumes it.

use crate::channel::{ChannelId, Direction, StallMode};
use crate::memory;
use crate::registers::{ChannelRegisters, ControllerRegisters, DmacAddr, TransferMode};
use crate::tag::TagId;
use std::cmp::Ordering;

/// Returns how many of `wanted` quadwords starting at `madr` may be read without passing
/// `stadr`.
pub fn drain_stall_limit(madr: DmacAddr, wanted: u32, stadr: u32) -> u32 {
    if !madr.spr() {
        let start = u64::from(madr.addr());
        let end = start + 16 * u64::from(wanted);
        if end <= u64::from(stadr) {
            return wanted;
        }

        return stadr.saturating_sub(madr.addr()) >> 4;
    }

    if stadr as usize >= memory::SCRATCHPAD_LEN {
        return wanted;
    }

    let start = madr.addr() & memory::SCRATCHPAD_ADDR_MASK;
    let room = match start.cmp(&stadr) {
        Ordering::Less => stadr - start,
        Ordering::Greater => memory::SCRATCHPAD_LEN as u32 - start + stadr,
        Ordering::Equal => 0,
    };
    wanted.min(room >> 4)
}

pub fn drain_stall_active(
    id: ChannelId,
    channel: &ChannelRegisters,
    controller: &ControllerRegisters,
) -> bool {
    if id.info().stall != StallMode::Drain
        || controller.stall_drain_channel() != Some(id)
        || channel.direction(id) != Direction::Drain
    {
        return false;
    }

    match channel.mode() {
        TransferMode::Normal => true,
        TransferMode::Chain => channel.tag_id() == TagId::Refs,
        TransferMode::Interleave => false,
    }
}

pub fn source_stall_active(
    id: ChannelId,
    channel: &ChannelRegisters,
    controller: &ControllerRegisters,
) -> bool {
    if id.info().stall != StallMode::Source || controller.stall_source_channel() != Some(id) {
        return false;
    }

    match channel.mode() {
        TransferMode::Normal | TransferMode::Interleave => true,
        // CNTS
        TransferMode::Chain => channel.tag_id() == TagId::Refe,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::{Chcr, Ctrl};

    #[test]
    fn limit_in_main_ram() {
        let madr = DmacAddr::new(0x2000, false);

        assert_eq!(drain_stall_limit(madr, 16, 0x2100), 16);
        assert_eq!(drain_stall_limit(madr, 16, 0x2040), 4);
        assert_eq!(drain_stall_limit(madr, 16, 0x2000), 0);
    }

    #[test]
    fn limit_never_underflows() {
        for _ in 0..10000 {
            let madr = DmacAddr::new(rand::random::<u32>() & 0x01FF_FFF0, false);
            let stadr = rand::random::<u32>() & 0x01FF_FFF0;
            let wanted = rand::random::<u32>() & 0xFFFF;

            let limit = drain_stall_limit(madr, wanted, stadr);
            assert!(limit <= wanted);

            let end = u64::from(madr.addr()) + 16 * u64::from(limit);
            assert!(end <= u64::from(stadr.max(madr.addr())));
        }
    }

    #[test]
    fn limit_in_scratchpad_wraps() {
        // Behind the stall address
        assert_eq!(drain_stall_limit(DmacAddr::new(0x1000, true), 0x100, 0x1100), 0x10);
        // Ahead of it: room wraps around the end of the scratchpad
        assert_eq!(drain_stall_limit(DmacAddr::new(0x3F00, true), 0x100, 0x0040), 0x14);
        assert_eq!(drain_stall_limit(DmacAddr::new(0x0040, true), 0x100, 0x0040), 0);
        // Stall address outside the scratchpad does not apply
        assert_eq!(drain_stall_limit(DmacAddr::new(0x0040, true), 0x100, 0x1_0000), 0x100);
    }

    #[test]
    fn drain_stall_selection() {
        let mut controller = ControllerRegisters::new();
        controller.ctrl = Ctrl(0).with_enabled(true).with_stall_drain(2);

        let mut channel = ChannelRegisters::default();
        channel.chcr = Chcr(0).with_start(true).with_dir(true);
        assert!(drain_stall_active(ChannelId::Gif, &channel, &controller));
        assert!(!drain_stall_active(ChannelId::Vif1, &channel, &controller));

        // CHAIN mode only stalls on REFS
        channel.chcr.set_mode(1);
        channel.chcr.set_tag(0x3000);
        assert!(!drain_stall_active(ChannelId::Gif, &channel, &controller));
        channel.chcr.set_tag(0x4000);
        assert!(drain_stall_active(ChannelId::Gif, &channel, &controller));
    }

    #[test]
    fn source_stall_selection() {
        let mut controller = ControllerRegisters::new();
        controller.ctrl = Ctrl(0).with_stall_source(1);

        let mut channel = ChannelRegisters::default();
        assert!(source_stall_active(ChannelId::Sif0, &channel, &controller));
        assert!(!source_stall_active(ChannelId::FromSpr, &channel, &controller));

        channel.chcr.set_mode(1);
        channel.chcr.set_tag(0x1000);
        assert!(!source_stall_active(ChannelId::Sif0, &channel, &controller));
        channel.chcr.set_tag(0x0000);
        assert!(source_stall_active(ChannelId::Sif0, &channel, &controller));
    }
}
