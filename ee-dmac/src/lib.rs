//! Emotion Engine DMA controller (DMAC) emulation core

pub mod api;
pub mod channel;
pub mod dmac;
pub mod memory;
mod num;
pub mod peripheral;
pub mod registers;
pub mod tag;

pub use api::{DmacConfig, DmacError, DmacResult};
pub use channel::{ChannelId, Direction, Port};
pub use dmac::{Dmac, DmacContext, TransferOutcome};
pub use memory::{BusError, Memory};
pub use peripheral::{FifoBus, FifoPeripheral, NullBus, Peripheral, PeripheralBus};
