//! DMA chain descriptors (DMAtags)

use crate::channel::Direction;
use crate::registers::DmacAddr;
use bincode::{Decode, Encode};
use proc_bitfield::bitfield;
use std::fmt::{Display, Formatter};

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
    pub struct DmaTag(pub u64): Debug, FromStorage, IntoStorage {
        pub qwc: u16 @ 0..=15,
        pub pce: u8 @ 26..=27,
        pub id: u8 @ 28..=30,
        pub irq: bool @ 31,
        pub addr: u32 @ 32..=62,
        pub spr: bool @ 63,
    }
}

impl DmaTag {
    pub fn new(id: TagId, qwc: u16, addr: u32) -> Self {
        Self(0).with_id(id as u8).with_qwc(qwc).with_addr(addr & 0x7FFF_FFFF)
    }

    pub fn tag_id(self) -> TagId {
        TagId::from_bits(self.id())
    }

    /// Bits 16-31, which are copied verbatim into CHCR.TAG
    pub fn upper_half(self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub fn address(self) -> DmacAddr {
        DmacAddr::new(self.addr(), self.spr())
    }

    pub fn from_qword(qword: u128) -> Self {
        Self(qword as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum TagId {
    // Destination chain: CNTS
    Refe = 0,
    Cnt = 1,
    Next = 2,
    Ref = 3,
    Refs = 4,
    Call = 5,
    Ret = 6,
    End = 7,
}

impl TagId {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 7 {
            0 => Self::Refe,
            1 => Self::Cnt,
            2 => Self::Next,
            3 => Self::Ref,
            4 => Self::Refs,
            5 => Self::Call,
            6 => Self::Ret,
            7 => Self::End,
            _ => unreachable!("value & 7 is always <= 7"),
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Mnemonic for this ID in a chain of the given direction
    pub fn label(self, direction: Direction) -> &'static str {
        match (self, direction) {
            (Self::Refe, Direction::Source) => "CNTS",
            (Self::Refe, Direction::Drain) => "REFE",
            (Self::Cnt, _) => "CNT",
            (Self::Next, _) => "NEXT",
            (Self::Ref, _) => "REF",
            (Self::Refs, _) => "REFS",
            (Self::Call, _) => "CALL",
            (Self::Ret, _) => "RET",
            (Self::End, _) => "END",
        }
    }
}

impl Display for TagId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label(Direction::Drain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_fields() {
        let tag = DmaTag(0x8000_1050_E000_0004);

        assert_eq!(tag.qwc(), 4);
        assert_eq!(tag.tag_id(), TagId::Ret);
        assert!(tag.irq());
        assert_eq!(tag.upper_half(), 0xE000);
        assert_eq!(tag.address(), DmacAddr::new(0x1050, true));
    }

    #[test]
    fn builder_matches_layout() {
        let tag = DmaTag::new(TagId::End, 2, 0x2000).with_irq(true);
        assert_eq!(tag.0, 0x0000_2000_F000_0002);
    }

    #[test]
    fn destination_labels() {
        assert_eq!(TagId::Refe.label(Direction::Source), "CNTS");
        assert_eq!(TagId::Refe.label(Direction::Drain), "REFE");
    }
}
