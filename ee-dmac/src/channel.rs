//! DMAC channel catalog
//!
//! DMA channels:
//! - 0 VIF0: memory to VU0 interface (chained, with address stack)
//! - 1 VIF1: memory to/from VU1 interface (chained, with address stack)
//! - 2 GIF: memory to graphics interface (chained, with address stack)
//! - 3 fromIPU: image processor output to memory
//! - 4 toIPU: memory to image processor input (chained)
//! - 5 SIF0: IOP sideband to memory (destination chain)
//! - 6 SIF1: memory to IOP sideband (chained)
//! - 7 SIF2: IOP sideband in either direction, used for debugging
//! - 8 fromSPR: scratchpad to memory (destination chain)
//! - 9 toSPR: memory to scratchpad (chained)
//!
//! VIF0 and SIF2 always have top priority; every other channel takes part in cyclic arbitration.

use bincode::{Decode, Encode};
use std::fmt::{Display, Formatter};

/// Direction of a resolved transfer, from the DMAC's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum Direction {
    /// Peripheral to memory
    Source,
    /// Memory to peripheral
    Drain,
}

/// Which directions a channel is wired for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelDirection {
    Source,
    Drain,
    // Selected by the CHCR DIR bit (1 = from memory)
    Both,
}

impl ChannelDirection {
    pub fn resolve(self, dir_bit: bool) -> Direction {
        match self {
            Self::Source => Direction::Source,
            Self::Drain => Direction::Drain,
            Self::Both => {
                if dir_bit {
                    Direction::Drain
                } else {
                    Direction::Source
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallMode {
    // STADR is neither read nor written
    None,
    // STADR is written with MADR after data is transferred
    Source,
    // MADR is not allowed to advance past STADR
    Drain,
}

/// Peripheral FIFO a channel is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    Vif0,
    Vif1,
    Gif,
    IpuOut,
    IpuIn,
    Sif0,
    Sif1,
    Sif2,
    // Handled inside the DMAC; never forwarded to a peripheral bus
    Scratchpad,
}

impl Port {
    pub const COUNT: usize = 9;

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode)]
pub enum ChannelId {
    Vif0 = 0,
    Vif1 = 1,
    Gif = 2,
    FromIpu = 3,
    ToIpu = 4,
    Sif0 = 5,
    Sif1 = 6,
    Sif2 = 7,
    FromSpr = 8,
    ToSpr = 9,
}

impl ChannelId {
    pub const COUNT: usize = 10;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Vif0,
        Self::Vif1,
        Self::Gif,
        Self::FromIpu,
        Self::ToIpu,
        Self::Sif0,
        Self::Sif1,
        Self::Sif2,
        Self::FromSpr,
        Self::ToSpr,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Bit number in the CIS/CIM/CDE/CPC fields
    pub fn bit(self) -> u8 {
        self as u8
    }

    pub fn info(self) -> &'static ChannelInfo {
        &CATALOG[self.index()]
    }

    /// Sliced channels give up the bus every 8 QWC in NORMAL mode; the SPR channels are burst
    /// channels that always move their whole count.
    pub fn is_sliced(self) -> bool {
        self < Self::FromSpr
    }

    /// Finds the channel whose register block contains the given physical address.
    pub fn from_register_address(address: u32) -> Option<Self> {
        let base = address & !0x3FF;
        Self::ALL.into_iter().find(|id| id.info().base == base)
    }
}

impl Display for ChannelId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.info().name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelInfo {
    pub name: &'static str,
    pub base: u32,
    pub direction: ChannelDirection,
    pub stall: StallMode,
    pub source_chain: bool,
    pub dest_chain: bool,
    pub address_stack: bool,
    pub scratch: bool,
    pub port: Port,
}

impl ChannelInfo {
    const fn new(
        name: &'static str,
        base: u32,
        direction: ChannelDirection,
        stall: StallMode,
        port: Port,
    ) -> Self {
        Self {
            name,
            base,
            direction,
            stall,
            source_chain: false,
            dest_chain: false,
            address_stack: false,
            scratch: false,
            port,
        }
    }

    const fn source_chain(self) -> Self {
        Self { source_chain: true, ..self }
    }

    const fn dest_chain(self) -> Self {
        Self { dest_chain: true, ..self }
    }

    const fn address_stack(self) -> Self {
        Self { address_stack: true, ..self }
    }

    const fn scratch(self) -> Self {
        Self { scratch: true, ..self }
    }

    /// Whether CHAIN mode is supported in the given direction
    pub fn supports_chain(&self, direction: Direction) -> bool {
        match direction {
            Direction::Drain => self.source_chain,
            Direction::Source => self.dest_chain,
        }
    }
}

use ChannelDirection as Dir;

pub static CATALOG: [ChannelInfo; ChannelId::COUNT] = [
    ChannelInfo::new("VIF0", 0x1000_8000, Dir::Drain, StallMode::None, Port::Vif0)
        .source_chain()
        .address_stack(),
    ChannelInfo::new("VIF1", 0x1000_9000, Dir::Both, StallMode::Drain, Port::Vif1)
        .source_chain()
        .address_stack(),
    ChannelInfo::new("GIF", 0x1000_A000, Dir::Drain, StallMode::Drain, Port::Gif)
        .source_chain()
        .address_stack(),
    ChannelInfo::new("fromIPU", 0x1000_B000, Dir::Source, StallMode::Source, Port::IpuOut),
    ChannelInfo::new("toIPU", 0x1000_B400, Dir::Drain, StallMode::None, Port::IpuIn)
        .source_chain(),
    ChannelInfo::new("SIF0", 0x1000_C000, Dir::Source, StallMode::Source, Port::Sif0).dest_chain(),
    ChannelInfo::new("SIF1", 0x1000_C400, Dir::Drain, StallMode::Drain, Port::Sif1)
        .source_chain(),
    ChannelInfo::new("SIF2", 0x1000_C800, Dir::Both, StallMode::None, Port::Sif2),
    ChannelInfo::new("fromSPR", 0x1000_D000, Dir::Source, StallMode::Source, Port::Scratchpad)
        .dest_chain()
        .scratch(),
    ChannelInfo::new("toSPR", 0x1000_D400, Dir::Drain, StallMode::None, Port::Scratchpad)
        .source_chain()
        .scratch(),
];
