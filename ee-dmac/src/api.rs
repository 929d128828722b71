//! Public configuration and error types

use bincode::error::{DecodeError, EncodeError};
use bincode::{Decode, Encode};
use thiserror::Error;

/// DMAC emulation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DmacConfig {
    /// Only grant channels whose peripheral has raised a DMA request
    pub strict_timing: bool,
    /// Keep transferring within one update until no channel can make progress
    pub burst: bool,
    /// Feed MFIFO drain channels straight from the scratchpad instead of the ring buffer
    pub mfifo_shortcut: bool,
    /// Collect per-channel transfer statistics
    pub metrics: bool,
}

#[derive(Debug, Error)]
pub enum DmacError {
    #[error("No DMAC register mapped at address ${address:08X}")]
    UnmappedRegister { address: u32 },
    #[error("Error encoding DMAC save state: {0}")]
    SaveState(#[from] EncodeError),
    #[error("Error decoding DMAC save state: {0}")]
    LoadState(#[from] DecodeError),
}

pub type DmacResult<T> = Result<T, DmacError>;
