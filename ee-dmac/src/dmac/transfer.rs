//! Per-channel transfer state machine (NORMAL / CHAIN / INTERLEAVE)

use crate::api::DmacConfig;
use crate::channel::{ChannelId, ChannelInfo, Direction, Port};
use crate::dmac::metrics::DmacMetrics;
use crate::dmac::stall;
use crate::dmac::DmacContext;
use crate::memory::{self, BusError, Window};
use crate::registers::{
    ChannelRegisters, ControllerRegisters, DmacAddr, RegisterFile, TransferMode,
};
use crate::tag::TagId;

// Sliced channels release the bus after this many quadwords in NORMAL mode
const SLICE_QWC: u32 = 8;

// Upper bound on descriptors walked in a single burst-mode grant, in case of a chain that loops
// forever without moving data
const MAX_BURST_PACKETS: u32 = 0x10000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Ok,
    BusError,
    FifoStall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Abort {
    Bus(BusError),
    FifoStall,
}

impl From<BusError> for Abort {
    fn from(value: BusError) -> Self {
        Self::Bus(value)
    }
}

pub(super) struct ChannelStep<'a, 'ctx> {
    pub id: ChannelId,
    pub info: &'static ChannelInfo,
    pub registers: &'a mut RegisterFile,
    pub chain_pending: &'a mut bool,
    pub config: &'a DmacConfig,
    pub metrics: &'a mut DmacMetrics,
    pub ctx: &'a mut DmacContext<'ctx>,
}

impl ChannelStep<'_, '_> {
    pub fn run(&mut self) -> TransferOutcome {
        if !self.channel().chcr.start() {
            return TransferOutcome::Ok;
        }

        let result = match self.effective_mode() {
            TransferMode::Interleave => self.interleave(),
            mode => self.normal_or_chain(mode),
        };

        match result {
            Ok(()) => TransferOutcome::Ok,
            Err(abort) => self.raise_irq(abort),
        }
    }

    pub(super) fn channel(&self) -> &ChannelRegisters {
        self.registers.channel(self.id)
    }

    pub(super) fn channel_mut(&mut self) -> &mut ChannelRegisters {
        self.registers.channel_mut(self.id)
    }

    pub(super) fn controller(&self) -> &ControllerRegisters {
        &self.registers.controller
    }

    pub(super) fn direction(&self) -> Direction {
        self.channel().direction(self.id)
    }

    fn effective_mode(&self) -> TransferMode {
        let mode = self.channel().mode();
        match mode {
            TransferMode::Interleave if !self.info.scratch => {
                log::error!("{}: INTERLEAVE mode is only valid on SPR channels", self.id);
                TransferMode::Normal
            }
            TransferMode::Chain if !self.info.supports_chain(self.direction()) => {
                log::error!(
                    "{}: CHAIN mode is not supported in direction {:?}",
                    self.id,
                    self.direction()
                );
                TransferMode::Normal
            }
            _ => mode,
        }
    }

    pub(super) fn complete(&mut self) {
        let id = self.id;
        self.channel_mut().chcr.set_start(false);
        self.registers.controller.flag_channel_complete(id);

        log::debug!("{id}: transfer complete");
    }

    fn interleave(&mut self) -> Result<(), Abort> {
        let sqwc = self.controller().sqwc;
        let tqwc = u32::from(sqwc.tqwc());
        let skip = if tqwc == 0 { 0 } else { u32::from(sqwc.sqwc()) };

        loop {
            let channel = *self.channel();
            if channel.qwc == 0 {
                self.complete();
                return Ok(());
            }

            let block = if tqwc == 0 { channel.qwc } else { tqwc.min(channel.qwc) };

            let memory_addr = channel.madr.with_spr(false);
            let memory_window = self.ctx.memory.resolve(memory_addr, block)?;
            let scratch_window = self.ctx.memory.scratchpad_window(channel.sadr, block);
            match self.direction() {
                Direction::Drain => self.ctx.memory.copy(&memory_window, &scratch_window),
                Direction::Source => self.ctx.memory.copy(&scratch_window, &memory_window),
            }

            self.metrics.record_transfer(self.id, TransferMode::Interleave, block);

            let remaining = channel.qwc - block;
            let advance = if remaining == 0 { block } else { block + skip };

            let registers = self.channel_mut();
            registers.qwc = remaining;
            registers.madr = channel.madr.with_addr(memory_addr.offset(advance).addr());
            registers.sadr = channel.sadr.wrapping_add(block << 4) & memory::SCRATCHPAD_ADDR_MASK;

            self.update_stall_address();

            if remaining == 0 {
                self.complete();
                return Ok(());
            }

            if !self.config.burst {
                return Ok(());
            }
        }
    }

    fn normal_or_chain(&mut self, mode: TransferMode) -> Result<(), Abort> {
        if mode == TransferMode::Chain && *self.chain_pending && !self.load_tag()? {
            return Ok(());
        }

        let mut packets = 0;
        loop {
            let qwc = self.channel().qwc;
            if qwc != 0 {
                let requested = self.transfer_length(mode, qwc)?;
                if requested == 0 {
                    return Ok(());
                }

                let moved = self.move_data(requested)?;
                self.advance_registers(mode, moved);

                if moved < requested {
                    log::trace!("{}: peripheral accepted {moved} of {requested} QWC", self.id);
                    return Ok(());
                }

                if self.channel().qwc != 0 {
                    if self.config.burst {
                        continue;
                    }
                    return Ok(());
                }
            }

            if mode != TransferMode::Chain {
                self.complete();
                return Ok(());
            }

            if !self.advance()? {
                return Ok(());
            }

            packets += 1;
            if !self.config.burst || packets >= MAX_BURST_PACKETS {
                return Ok(());
            }
        }
    }

    fn transfer_length(&self, mode: TransferMode, qwc: u32) -> Result<u32, Abort> {
        let mut length = match mode {
            TransferMode::Normal if self.id.is_sliced() && !self.config.burst => {
                qwc.min(SLICE_QWC)
            }
            _ => qwc,
        };

        if self.data_in_mfifo() {
            length = length.min(self.mfifo_available()?);
        }

        let channel = self.channel();
        let controller = self.controller();
        if stall::drain_stall_active(self.id, channel, controller) {
            length = stall::drain_stall_limit(channel.madr, length, controller.stadr);
        }

        Ok(length)
    }

    /// Whether this channel is the MFIFO drain channel set by D_CTRL.MFD
    pub(super) fn mfifo_drain_active(&self) -> bool {
        self.controller().mfifo_drain_channel() == Some(self.id)
            && self.direction() == Direction::Drain
    }

    /// CNT and END data on the MFIFO drain channel is read from the ring buffer (or from the
    /// scratchpad with the shortcut enabled)
    fn data_in_mfifo(&self) -> bool {
        self.mfifo_drain_active()
            && self.channel().mode() == TransferMode::Chain
            && matches!(self.channel().tag_id(), TagId::Cnt | TagId::End)
    }

    fn madr_in_ring(&self) -> bool {
        self.data_in_mfifo() && !self.config.mfifo_shortcut
    }

    fn uses_mfifo_shortcut(&self) -> bool {
        self.data_in_mfifo() && self.config.mfifo_shortcut
    }

    /// Whether fromSPR is filling the MFIFO ring buffer
    fn writes_mfifo(&self) -> bool {
        self.id == ChannelId::FromSpr
            && self.controller().mfifo_drain_channel().is_some()
            && !self.config.mfifo_shortcut
    }

    fn mfifo_available(&self) -> Result<u32, Abort> {
        let spr = self.registers.channel(ChannelId::FromSpr);

        if self.config.mfifo_shortcut {
            if !spr.chcr.start() || spr.qwc == 0 {
                return Err(Abort::FifoStall);
            }
            return Ok(spr.qwc);
        }

        let available = self.ring_available(self.channel().madr);
        if available == 0 && !spr.chcr.start() {
            return Err(Abort::FifoStall);
        }
        Ok(available)
    }

    /// Quadwords fromSPR has written into the ring ahead of `tail`
    pub(super) fn ring_available(&self, tail: DmacAddr) -> u32 {
        let controller = self.controller();
        let head = self.registers.channel(ChannelId::FromSpr).madr;
        controller.ring_distance(head, controller.ring_address(tail))
    }

    fn memory_window(&self, length: u32) -> Result<Window, BusError> {
        let channel = self.channel();
        let controller = self.controller();
        if self.madr_in_ring() || self.writes_mfifo() {
            self.ctx.memory.ring(controller.rbor, controller.rbsr, channel.madr.addr(), length)
        } else {
            self.ctx.memory.resolve(channel.madr, length)
        }
    }

    fn move_data(&mut self, length: u32) -> Result<u32, Abort> {
        let channel = *self.channel();
        let direction = self.direction();

        let moved = if self.info.port == Port::Scratchpad {
            let memory_window = self.memory_window(length)?;
            let scratch_window = self.ctx.memory.scratchpad_window(channel.sadr, length);
            match direction {
                Direction::Drain => self.ctx.memory.copy(&memory_window, &scratch_window),
                Direction::Source => self.ctx.memory.copy(&scratch_window, &memory_window),
            }
            length as usize
        } else {
            let window = if self.uses_mfifo_shortcut() {
                let sadr = self.registers.channel(ChannelId::FromSpr).sadr;
                self.ctx.memory.scratchpad_window(sadr, length)
            } else {
                self.memory_window(length)?
            };

            let memory = &mut *self.ctx.memory;
            let peripheral = self.ctx.peripherals.peripheral(self.info.port);
            match direction {
                Direction::Drain => {
                    peripheral.drain(memory.slice(&window), window.start(), window.len)
                }
                Direction::Source => {
                    peripheral.source(memory.slice_mut(&window), window.start(), window.len)
                }
            }
        };

        if moved > length as usize {
            log::error!(
                "{}: peripheral reported {moved} QWC for a request of {length}; clamping",
                self.id
            );
            return Ok(length);
        }

        Ok(moved as u32)
    }

    fn advance_registers(&mut self, mode: TransferMode, moved: u32) {
        let in_ring = self.madr_in_ring() || self.writes_mfifo();
        let shortcut = self.uses_mfifo_shortcut();
        let scratch = self.info.port == Port::Scratchpad;
        let controller = self.registers.controller;

        let channel = self.channel_mut();
        channel.qwc -= moved;
        channel.madr = channel.madr.offset(moved);
        if in_ring {
            channel.madr = controller.ring_address(channel.madr);
        }
        if scratch {
            channel.sadr = channel.sadr.wrapping_add(moved << 4) & memory::SCRATCHPAD_ADDR_MASK;
        }

        if shortcut {
            self.consume_spr_stream(moved);
        }

        self.metrics.record_transfer(self.id, mode, moved);
        self.update_stall_address();
    }

    /// Removes data the MFIFO drain channel read directly out of the scratchpad from fromSPR's
    /// pending count
    pub(super) fn consume_spr_stream(&mut self, units: u32) {
        let spr = self.registers.channel_mut(ChannelId::FromSpr);
        spr.qwc = spr.qwc.saturating_sub(units);
        spr.sadr = spr.sadr.wrapping_add(units << 4) & memory::SCRATCHPAD_ADDR_MASK;

        if spr.qwc == 0 && spr.chcr.start() {
            spr.chcr.set_start(false);
            self.registers.controller.flag_channel_complete(ChannelId::FromSpr);
            log::debug!("{}: drained by {}", ChannelId::FromSpr, self.id);
        }
    }

    pub(super) fn update_stall_address(&mut self) {
        if stall::source_stall_active(self.id, self.channel(), self.controller()) {
            let madr = self.channel().madr.addr();
            self.registers.controller.stadr = madr;
        }
    }

    fn raise_irq(&mut self, abort: Abort) -> TransferOutcome {
        let id = self.id;
        match abort {
            Abort::Bus(error) => {
                log::warn!("{id}: {error}");

                self.channel_mut().chcr.set_start(false);
                let controller = &mut self.registers.controller;
                controller.flag_channel_complete(id);
                controller.stat.set_beis(true);

                TransferOutcome::BusError
            }
            Abort::FifoStall => {
                log::debug!("{id}: MFIFO empty");

                self.registers.controller.stat.set_meis(true);

                TransferOutcome::FifoStall
            }
        }
    }
}
