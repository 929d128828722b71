//! DMAC channel and controller register files
//!
//! Each channel occupies a block of 32-bit registers spaced 0x10 apart, starting at the channel's
//! base address. The controller block lives at $1000E000, with the enable registers further up
//! at $1000F520 (read) and $1000F590 (write).

#[cfg(test)]
mod tests;

use crate::channel::{ChannelId, Direction};
use crate::memory;
use crate::num::{U16Ext, U32Ext};
use crate::tag::TagId;
use bincode::{Decode, Encode};
use proc_bitfield::bitfield;

pub const CHCR_OFFSET: u32 = 0x00;
pub const MADR_OFFSET: u32 = 0x10;
pub const QWC_OFFSET: u32 = 0x20;
pub const TADR_OFFSET: u32 = 0x30;
pub const ASR0_OFFSET: u32 = 0x40;
pub const ASR1_OFFSET: u32 = 0x50;
pub const SADR_OFFSET: u32 = 0x80;

pub const D_CTRL: u32 = 0x1000_E000;
pub const D_STAT: u32 = 0x1000_E010;
pub const D_PCR: u32 = 0x1000_E020;
pub const D_SQWC: u32 = 0x1000_E030;
pub const D_RBSR: u32 = 0x1000_E040;
pub const D_RBOR: u32 = 0x1000_E050;
pub const D_STADR: u32 = 0x1000_E060;
pub const D_ENABLER: u32 = 0x1000_F520;
pub const D_ENABLEW: u32 = 0x1000_F590;

// DIR, MOD, ASP, TTE, TIE, STR, TAG
const CHCR_WRITE_MASK: u32 = 0xFFFF_01FD;
const ADDRESS_WRITE_MASK: u32 = 0xFFFF_FFF0;
const QWC_WRITE_MASK: u32 = 0xFFFF;
const SADR_WRITE_MASK: u32 = memory::SCRATCHPAD_ADDR_MASK;
const PHYSICAL_ADDRESS_MASK: u32 = 0x7FFF_FFF0;

const CTRL_WRITE_MASK: u32 = 0x7FF;
const PCR_WRITE_MASK: u32 = 0x83FF_03FF;
const SQWC_WRITE_MASK: u32 = 0x00FF_00FF;

// CIS, SIS, MEIS, BEIS are acknowledged by writing 1
const STAT_CLEAR_MASK: u32 = 0x0000_E3FF;
// CIM, SIM, MEIM are toggled by writing 1
const STAT_TOGGLE_MASK: u32 = 0x63FF_0000;

// BIOS code expects the low bits of D_ENABLER to read back as $1201
const ENABLER_DEFAULT: u32 = 0x0000_1201;
const ENABLER_SUSPEND_BIT: u8 = 16;

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
    pub struct Chcr(pub u32): Debug, FromStorage, IntoStorage {
        pub dir: bool @ 0,
        pub mode: u8 @ 2..=3,
        pub asp: u8 @ 4..=5,
        pub tte: bool @ 6,
        pub tie: bool @ 7,
        pub start: bool @ 8,
        pub tag: u16 @ 16..=31,
    }
}

impl Chcr {
    /// ID field of the most recently loaded chain tag
    pub fn tag_id(self) -> u8 {
        ((self.tag() >> 12) & 7) as u8
    }

    /// IRQ flag of the most recently loaded chain tag
    pub fn tag_irq(self) -> bool {
        self.tag().bit(15)
    }
}

bitfield! {
    /// Memory / tag / address-stack register value. The SPR bit selects the scratchpad.
    #[derive(Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
    pub struct DmacAddr(pub u32): Debug, FromStorage, IntoStorage {
        pub addr: u32 @ 0..=30,
        pub spr: bool @ 31,
    }
}

impl DmacAddr {
    pub fn new(addr: u32, spr: bool) -> Self {
        Self(0).with_addr(addr.qword_aligned() & 0x7FFF_FFFF).with_spr(spr)
    }

    /// Advances the address by `units` quadwords. Scratchpad addresses wrap at the end of the
    /// scratchpad.
    #[must_use]
    pub fn offset(self, units: u32) -> Self {
        let addr = self.addr().wrapping_add(units.wrapping_mul(16));
        if self.spr() {
            self.with_addr(addr & memory::SCRATCHPAD_ADDR_MASK)
        } else {
            self.with_addr(addr & 0x7FFF_FFFF)
        }
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
    pub struct Ctrl(pub u32): Debug, FromStorage, IntoStorage {
        pub enabled: bool @ 0,
        pub cycle_steal: bool @ 1,
        pub mfifo_drain: u8 @ 2..=3,
        pub stall_source: u8 @ 4..=5,
        pub stall_drain: u8 @ 6..=7,
        pub release_cycle: u8 @ 8..=10,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
    pub struct Stat(pub u32): Debug, FromStorage, IntoStorage {
        pub cis: u16 @ 0..=9,
        pub sis: bool @ 13,
        pub meis: bool @ 14,
        pub beis: bool @ 15,
        pub cim: u16 @ 16..=25,
        pub sim: bool @ 29,
        pub meim: bool @ 30,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
    pub struct Pcr(pub u32): Debug, FromStorage, IntoStorage {
        pub cpc: u16 @ 0..=9,
        pub cde: u16 @ 16..=25,
        pub pce: bool @ 31,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
    pub struct Sqwc(pub u32): Debug, FromStorage, IntoStorage {
        pub sqwc: u8 @ 0..=7,
        pub tqwc: u8 @ 16..=23,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum TransferMode {
    #[default]
    Normal = 0,
    Chain = 1,
    Interleave = 2,
}

impl TransferMode {
    pub const COUNT: usize = 3;

    pub fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => Self::Normal,
            1 => Self::Chain,
            2 => Self::Interleave,
            3 => {
                log::error!("Unexpected DMAC transfer mode of 3");
                Self::Normal
            }
            _ => unreachable!("value & 3 is always <= 3"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub struct ChannelRegisters {
    pub chcr: Chcr,
    pub madr: DmacAddr,
    pub qwc: u32,
    pub tadr: DmacAddr,
    pub asr0: DmacAddr,
    pub asr1: DmacAddr,
    pub sadr: u32,
}

impl ChannelRegisters {
    pub fn mode(&self) -> TransferMode {
        TransferMode::from_bits(self.chcr.mode())
    }

    pub fn tag_id(&self) -> TagId {
        TagId::from_bits(self.chcr.tag_id())
    }

    pub fn direction(&self, id: ChannelId) -> Direction {
        id.info().direction.resolve(self.chcr.dir())
    }

    pub fn read(&self, offset: u32) -> Option<u32> {
        let value = match offset {
            CHCR_OFFSET => self.chcr.0,
            MADR_OFFSET => self.madr.0,
            QWC_OFFSET => self.qwc,
            TADR_OFFSET => self.tadr.0,
            ASR0_OFFSET => self.asr0.0,
            ASR1_OFFSET => self.asr1.0,
            SADR_OFFSET => self.sadr,
            _ => return None,
        };
        Some(value)
    }

    /// Writes a non-CHCR register. Returns false if the offset is not a channel register.
    pub fn write_data_register(&mut self, offset: u32, value: u32) -> bool {
        match offset {
            MADR_OFFSET => self.madr = DmacAddr(value & ADDRESS_WRITE_MASK),
            QWC_OFFSET => self.qwc = value & QWC_WRITE_MASK,
            TADR_OFFSET => self.tadr = DmacAddr(value & ADDRESS_WRITE_MASK),
            ASR0_OFFSET => self.asr0 = DmacAddr(value & ADDRESS_WRITE_MASK),
            ASR1_OFFSET => self.asr1 = DmacAddr(value & ADDRESS_WRITE_MASK),
            SADR_OFFSET => self.sadr = value & SADR_WRITE_MASK,
            _ => return false,
        }
        true
    }

    pub fn masked_chcr(value: u32) -> Chcr {
        Chcr(value & CHCR_WRITE_MASK)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct ControllerRegisters {
    pub ctrl: Ctrl,
    pub stat: Stat,
    pub pcr: Pcr,
    pub sqwc: Sqwc,
    pub rbsr: u32,
    pub rbor: u32,
    pub stadr: u32,
    pub enabler: u32,
}

impl ControllerRegisters {
    pub fn new() -> Self {
        Self {
            ctrl: Ctrl::default(),
            stat: Stat::default(),
            pcr: Pcr::default(),
            sqwc: Sqwc::default(),
            rbsr: 0,
            rbor: 0,
            stadr: 0,
            enabler: ENABLER_DEFAULT,
        }
    }

    /// Returns whether the DMAC is suspended, either through D_ENABLEW or by clearing DMAE
    pub fn suspended(&self) -> bool {
        self.enabler.bit(ENABLER_SUSPEND_BIT) || !self.ctrl.enabled()
    }

    /// Priority control: with PCE set, only channels whose CDE bit is set may be granted the bus
    pub fn priority_allows(&self, id: ChannelId) -> bool {
        !self.pcr.pce() || self.pcr.cde().bit(id.bit())
    }

    pub fn flag_channel_complete(&mut self, id: ChannelId) {
        self.stat.set_cis(self.stat.cis() | (1 << id.bit()));
    }

    pub fn channel_complete(&self, id: ChannelId) -> bool {
        self.stat.cis().bit(id.bit())
    }

    /// Channel draining the memory FIFO ring buffer, if MFIFO is enabled
    pub fn mfifo_drain_channel(&self) -> Option<ChannelId> {
        match self.ctrl.mfifo_drain() {
            2 => Some(ChannelId::Vif1),
            3 => Some(ChannelId::Gif),
            // 0 is off, 1 is reserved
            _ => None,
        }
    }

    /// Channel whose MADR is written to STADR
    pub fn stall_source_channel(&self) -> Option<ChannelId> {
        match self.ctrl.stall_source() {
            1 => Some(ChannelId::Sif0),
            2 => Some(ChannelId::FromSpr),
            3 => Some(ChannelId::FromIpu),
            _ => None,
        }
    }

    /// Channel that may not advance MADR past STADR
    pub fn stall_drain_channel(&self) -> Option<ChannelId> {
        match self.ctrl.stall_drain() {
            1 => Some(ChannelId::Vif1),
            2 => Some(ChannelId::Gif),
            3 => Some(ChannelId::Sif1),
            _ => None,
        }
    }

    /// Confines an address to the MFIFO ring buffer
    pub fn ring_address(&self, addr: DmacAddr) -> DmacAddr {
        DmacAddr::new(self.rbor | (addr.addr() & self.rbsr), false)
    }

    /// Number of quadwords between `tail` and `head` going forwards around the ring
    pub fn ring_distance(&self, head: DmacAddr, tail: DmacAddr) -> u32 {
        (head.addr().wrapping_sub(tail.addr()) & self.rbsr) >> 4
    }

    pub fn write_ctrl(&mut self, value: u32) {
        self.ctrl = Ctrl(value & CTRL_WRITE_MASK);
    }

    pub fn write_stat(&mut self, value: u32) {
        let cleared = self.stat.0 & !(value & STAT_CLEAR_MASK);
        self.stat = Stat(cleared ^ (value & STAT_TOGGLE_MASK));
    }

    pub fn write_pcr(&mut self, value: u32) {
        self.pcr = Pcr(value & PCR_WRITE_MASK);
    }

    pub fn write_sqwc(&mut self, value: u32) {
        self.sqwc = Sqwc(value & SQWC_WRITE_MASK);
    }

    pub fn write_rbsr(&mut self, value: u32) {
        self.rbsr = value & PHYSICAL_ADDRESS_MASK;
    }

    pub fn write_rbor(&mut self, value: u32) {
        self.rbor = value & PHYSICAL_ADDRESS_MASK;
    }

    pub fn write_stadr(&mut self, value: u32) {
        self.stadr = value & PHYSICAL_ADDRESS_MASK;
    }

    /// Returns whether the DMAC interrupt line to the CPU is asserted
    pub fn interrupt_pending(&self) -> bool {
        let stat = self.stat;
        (stat.cis() & stat.cim() != 0)
            || (stat.sis() && stat.sim())
            || (stat.meis() && stat.meim())
            || stat.beis()
    }
}

impl Default for ControllerRegisters {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub struct RegisterFile {
    pub channels: [ChannelRegisters; ChannelId::COUNT],
    pub controller: ControllerRegisters,
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel(&self, id: ChannelId) -> &ChannelRegisters {
        &self.channels[id.index()]
    }

    pub fn channel_mut(&mut self, id: ChannelId) -> &mut ChannelRegisters {
        &mut self.channels[id.index()]
    }
}
