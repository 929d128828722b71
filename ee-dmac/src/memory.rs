//! EE memory as seen by the DMAC (main RAM / scratchpad)
//!
//! Both regions are stored as quadwords since the DMAC never moves anything smaller.

#[cfg(test)]
mod tests;

use crate::registers::DmacAddr;
use thiserror::Error;

pub const MAIN_RAM_LEN: usize = 32 * 1024 * 1024;
pub const SCRATCHPAD_LEN: usize = 16 * 1024;

pub const MAIN_RAM_QWC: usize = MAIN_RAM_LEN / 16;
pub const SCRATCHPAD_QWC: usize = SCRATCHPAD_LEN / 16;

pub const SCRATCHPAD_ADDR_MASK: u32 = (SCRATCHPAD_LEN - 1) as u32 & !0xF;

// Scratchpad is also visible at this physical address without the SPR bit
pub const SCRATCHPAD_DIRECT_BASE: u32 = 0x7000_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("DMAC bus error: {units} quadwords at ${address:08X} are not mapped")]
pub struct BusError {
    pub address: u32,
    pub units: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    MainRam,
    Scratchpad,
}

/// A run of quadwords inside one region. Indices wrap modulo the capacity, which models both the
/// scratchpad wraparound and the MFIFO ring buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub region: Region,
    base: usize,
    capacity: usize,
    start: usize,
    pub len: usize,
}

impl Window {
    fn index(&self, i: usize) -> usize {
        self.base + (self.start + i) % self.capacity
    }

    /// Index of the first quadword within the slice returned by [`Memory::slice`]
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[derive(Clone)]
pub struct Memory {
    main_ram: Box<[u128]>,
    scratchpad: Box<[u128]>,
}

impl Memory {
    pub fn new() -> Self {
        Self {
            main_ram: vec![0; MAIN_RAM_QWC].into_boxed_slice(),
            scratchpad: vec![0; SCRATCHPAD_QWC].into_boxed_slice(),
        }
    }

    /// Resolves `units` quadwords starting at `addr`.
    ///
    /// With the SPR bit set the address selects the scratchpad and the window wraps at 16KB.
    /// Otherwise the whole run must lie within main RAM or the directly-mapped scratchpad.
    pub fn resolve(&self, addr: DmacAddr, units: u32) -> Result<Window, BusError> {
        if addr.spr() {
            return Ok(scratchpad_window(addr.addr(), units));
        }

        let address = addr.addr() & !0xF;
        let start = u64::from(address);
        let end = start + 16 * u64::from(units);
        let error = BusError { address, units };

        if end <= MAIN_RAM_LEN as u64 && start < MAIN_RAM_LEN as u64 {
            let base = (address >> 4) as usize;
            return Ok(Window {
                region: Region::MainRam,
                base,
                capacity: MAIN_RAM_QWC - base,
                start: 0,
                len: units as usize,
            });
        }

        let direct_base = u64::from(SCRATCHPAD_DIRECT_BASE);
        let direct_end = direct_base + SCRATCHPAD_LEN as u64;
        if start >= direct_base && start < direct_end && end <= direct_end {
            let base = ((start - direct_base) >> 4) as usize;
            return Ok(Window {
                region: Region::Scratchpad,
                base,
                capacity: SCRATCHPAD_QWC - base,
                start: 0,
                len: units as usize,
            });
        }

        Err(error)
    }

    /// Resolves a run inside the MFIFO ring buffer described by D_RBOR and D_RBSR
    pub fn ring(&self, rbor: u32, rbsr: u32, addr: u32, units: u32) -> Result<Window, BusError> {
        let base = (rbor >> 4) as usize;
        let capacity = (rbsr >> 4) as usize + 1;
        if base + capacity > MAIN_RAM_QWC {
            return Err(BusError { address: rbor, units });
        }

        Ok(Window {
            region: Region::MainRam,
            base,
            capacity,
            start: ((addr & rbsr) >> 4) as usize,
            len: units as usize,
        })
    }

    /// Resolves a wrapping scratchpad run at the given SADR
    pub fn scratchpad_window(&self, sadr: u32, units: u32) -> Window {
        scratchpad_window(sadr, units)
    }

    fn region(&self, region: Region) -> &[u128] {
        match region {
            Region::MainRam => &self.main_ram,
            Region::Scratchpad => &self.scratchpad,
        }
    }

    fn region_mut(&mut self, region: Region) -> &mut [u128] {
        match region {
            Region::MainRam => &mut self.main_ram,
            Region::Scratchpad => &mut self.scratchpad,
        }
    }

    /// Backing buffer for a window; peripheral indices wrap modulo its length
    pub fn slice(&self, window: &Window) -> &[u128] {
        &self.region(window.region)[window.base..window.base + window.capacity]
    }

    pub fn slice_mut(&mut self, window: &Window) -> &mut [u128] {
        &mut self.region_mut(window.region)[window.base..window.base + window.capacity]
    }

    /// Copies `src.len` quadwords from one window to another, one quadword at a time so that
    /// overlapping windows behave like the hardware FIFO path.
    pub fn copy(&mut self, src: &Window, dst: &Window) {
        for i in 0..src.len.min(dst.len) {
            let value = self.region(src.region)[src.index(i)];
            let dst_index = dst.index(i);
            self.region_mut(dst.region)[dst_index] = value;
        }
    }

    pub fn read_window(&self, window: &Window) -> Vec<u128> {
        let region = self.region(window.region);
        (0..window.len).map(|i| region[window.index(i)]).collect()
    }

    pub fn read_qword(&self, addr: DmacAddr) -> Result<u128, BusError> {
        let window = self.resolve(addr, 1)?;
        Ok(self.region(window.region)[window.index(0)])
    }

    pub fn write_qword(&mut self, addr: DmacAddr, value: u128) -> Result<(), BusError> {
        let window = self.resolve(addr, 1)?;
        let index = window.index(0);
        self.region_mut(window.region)[index] = value;
        Ok(())
    }

    pub fn main_ram(&self) -> &[u128] {
        &self.main_ram
    }

    pub fn main_ram_mut(&mut self) -> &mut [u128] {
        &mut self.main_ram
    }

    pub fn scratchpad(&self) -> &[u128] {
        &self.scratchpad
    }

    pub fn scratchpad_mut(&mut self) -> &mut [u128] {
        &mut self.scratchpad
    }

    pub fn main_ram_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.main_ram)
    }

    /// Copies raw bytes into main RAM, e.g. to side-load a display list
    pub fn copy_to_main_ram(&mut self, bytes: &[u8], address: u32) -> Result<(), BusError> {
        let start = address as usize;
        let end = start + bytes.len();
        if end > MAIN_RAM_LEN {
            return Err(BusError { address, units: bytes.len().div_ceil(16) as u32 });
        }

        let ram: &mut [u8] = bytemuck::cast_slice_mut(&mut self.main_ram);
        ram[start..end].copy_from_slice(bytes);
        Ok(())
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

fn scratchpad_window(sadr: u32, units: u32) -> Window {
    Window {
        region: Region::Scratchpad,
        base: 0,
        capacity: SCRATCHPAD_QWC,
        start: ((sadr & SCRATCHPAD_ADDR_MASK) >> 4) as usize,
        len: units as usize,
    }
}
