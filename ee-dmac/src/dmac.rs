//! EE DMAC event dispatch and register interface

mod arbiter;
mod chain;
pub mod metrics;
pub mod stall;
mod transfer;


use crate::api::{DmacConfig, DmacError, DmacResult};
use crate::channel::ChannelId;
use crate::memory::Memory;
use crate::peripheral::PeripheralBus;
use crate::registers::{
    ChannelRegisters, ControllerRegisters, RegisterFile, TransferMode, CHCR_OFFSET, D_CTRL,
    D_ENABLER, D_ENABLEW, D_PCR, D_RBOR, D_RBSR, D_SQWC, D_STADR, D_STAT,
};
use arbiter::{Admission, Arbiter};
use bincode::{Decode, Encode};
use metrics::DmacMetrics;
use transfer::ChannelStep;

pub use transfer::TransferOutcome;

// Cap on grants in one burst-mode update
const MAX_BURST_GRANTS: u32 = 0x10000;

macro_rules! bincode_config {
    () => {
        bincode::config::standard()
            .with_little_endian()
            .with_fixed_int_encoding()
            .with_limit::<1_000_000>()
    };
}

pub struct DmacContext<'a> {
    pub memory: &'a mut Memory,
    pub peripherals: &'a mut dyn PeripheralBus,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Dmac {
    registers: RegisterFile,
    arbiter: Arbiter,
    requests: [bool; ChannelId::COUNT],
    // Set when a CHAIN-mode channel needs to read a tag before it can move data
    chain_pending: [bool; ChannelId::COUNT],
    config: DmacConfig,
    metrics: DmacMetrics,
}

impl Dmac {
    pub fn new(config: DmacConfig) -> Self {
        Self {
            registers: RegisterFile::new(),
            arbiter: Arbiter::new(),
            requests: [false; ChannelId::COUNT],
            chain_pending: [false; ChannelId::COUNT],
            config,
            metrics: DmacMetrics::new(config.metrics),
        }
    }

    pub fn config(&self) -> DmacConfig {
        self.config
    }

    pub fn update_config(&mut self, config: DmacConfig) {
        self.config = config;
        self.metrics.set_enabled(config.metrics);
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn channel(&self, id: ChannelId) -> &ChannelRegisters {
        self.registers.channel(id)
    }

    pub fn controller(&self) -> &ControllerRegisters {
        &self.registers.controller
    }

    pub fn metrics(&self) -> &DmacMetrics {
        &self.metrics
    }

    pub fn reset_metrics(&mut self) {
        self.metrics.reset();
    }

    /// Signals that a peripheral is ready for the given channel. Only affects arbitration with
    /// strict timing enabled.
    pub fn raise_request(&mut self, id: ChannelId) {
        self.requests[id.index()] = true;
    }

    pub fn request_pending(&self, id: ChannelId) -> bool {
        self.requests[id.index()]
    }

    /// Whether the DMAC is asserting its interrupt line (INT1 on the EE)
    pub fn interrupt_pending(&self) -> bool {
        self.registers.controller.interrupt_pending()
    }

    /// Picks the next channel to receive the bus, if any channel is ready
    pub fn select_channel(&mut self) -> Option<ChannelId> {
        let mut admission = Admission {
            registers: &self.registers,
            requests: &mut self.requests,
            config: &self.config,
            metrics: &mut self.metrics,
        };
        self.arbiter.select(&mut admission)
    }

    /// Runs the admission test for a single round-robin channel, consuming its request on success
    pub fn admit(&mut self, id: ChannelId) -> bool {
        Admission {
            registers: &self.registers,
            requests: &mut self.requests,
            config: &self.config,
            metrics: &mut self.metrics,
        }
        .admit(id)
    }

    /// Gives the bus to a channel for one transfer step
    pub fn transfer(&mut self, id: ChannelId, ctx: &mut DmacContext<'_>) -> TransferOutcome {
        ChannelStep {
            id,
            info: id.info(),
            registers: &mut self.registers,
            chain_pending: &mut self.chain_pending[id.index()],
            config: &self.config,
            metrics: &mut self.metrics,
            ctx,
        }
        .run()
    }

    /// Arbitrates and runs transfers. Returns how many grants were made.
    pub fn update(&mut self, ctx: &mut DmacContext<'_>) -> u32 {
        self.metrics.record_event();

        if self.registers.controller.suspended() {
            log::trace!(
                "DMAC suspended (D_ENABLER={:08X}, DMAE={})",
                self.registers.controller.enabler,
                self.registers.controller.ctrl.enabled()
            );
            return 0;
        }

        let mut grants = 0;
        let mut idle_grants = 0;
        while let Some(id) = self.select_channel() {
            let before = self.registers;
            let outcome = self.transfer(id, ctx);
            grants += 1;

            log::trace!("{id} granted the bus: {outcome:?}");

            if !self.config.burst || grants >= MAX_BURST_GRANTS {
                break;
            }

            // Stop once every ready channel has been given a turn without anything changing
            if self.registers == before {
                idle_grants += 1;
                if idle_grants >= ChannelId::COUNT {
                    break;
                }
            } else {
                idle_grants = 0;
            }
        }

        self.log_controller_state();

        grants
    }

    fn log_controller_state(&self) {
        let controller = &self.registers.controller;
        let ctrl = controller.ctrl;

        if ctrl.cycle_steal() {
            log::trace!(
                "Cycle stealing enabled, bus released every {} cycles",
                8 << ctrl.release_cycle()
            );
        }

        log::trace!(
            "MFIFO drain: {:?}, stall source: {:?}, stall drain: {:?} (STADR={:08X})",
            controller.mfifo_drain_channel(),
            controller.stall_source_channel(),
            controller.stall_drain_channel(),
            controller.stadr
        );
    }

    pub fn read_register(&self, address: u32) -> DmacResult<u32> {
        let controller = &self.registers.controller;
        let value = match address {
            // $1000E000: D_CTRL (DMAC control)
            D_CTRL => controller.ctrl.0,
            // $1000E010: D_STAT (interrupt status / mask)
            D_STAT => controller.stat.0,
            // $1000E020: D_PCR (priority control)
            D_PCR => controller.pcr.0,
            // $1000E030: D_SQWC (interleave skip / transfer size)
            D_SQWC => controller.sqwc.0,
            D_RBSR => controller.rbsr,
            D_RBOR => controller.rbor,
            D_STADR => controller.stadr,
            // $1000F520: D_ENABLER
            D_ENABLER => controller.enabler,
            _ => {
                return ChannelId::from_register_address(address)
                    .and_then(|id| self.registers.channel(id).read(address & 0x3FF))
                    .ok_or(DmacError::UnmappedRegister { address });
            }
        };

        Ok(value)
    }

    pub fn write_register(&mut self, address: u32, value: u32) -> DmacResult<()> {
        let controller = &mut self.registers.controller;
        match address {
            D_CTRL => {
                controller.write_ctrl(value);
                log::debug!("D_CTRL write: {:?}", controller.ctrl);
            }
            D_STAT => controller.write_stat(value),
            D_PCR => controller.write_pcr(value),
            D_SQWC => controller.write_sqwc(value),
            D_RBSR => controller.write_rbsr(value),
            D_RBOR => controller.write_rbor(value),
            D_STADR => controller.write_stadr(value),
            D_ENABLER => log::warn!("Ignoring write to read-only D_ENABLER: {value:08X}"),
            // $1000F590: D_ENABLEW
            D_ENABLEW => {
                controller.enabler = value;
                log::debug!("D_ENABLEW write: {value:08X}");
            }
            _ => {
                let id = ChannelId::from_register_address(address)
                    .ok_or(DmacError::UnmappedRegister { address })?;
                self.write_channel_register(id, address & 0x3FF, value)
                    .ok_or(DmacError::UnmappedRegister { address })?;
            }
        }

        Ok(())
    }

    fn write_channel_register(&mut self, id: ChannelId, offset: u32, value: u32) -> Option<()> {
        if offset == CHCR_OFFSET {
            self.write_chcr(id, value);
            return Some(());
        }

        let channel = self.registers.channel_mut(id);
        channel.read(offset)?;

        if channel.chcr.start() {
            log::warn!("{id}: ignoring write of {value:08X} to +{offset:02X} while transfer is active");
            return Some(());
        }

        channel.write_data_register(offset, value).then_some(())
    }

    fn write_chcr(&mut self, id: ChannelId, value: u32) {
        let channel = self.registers.channel_mut(id);
        let chcr = ChannelRegisters::masked_chcr(value);

        if channel.chcr.start() {
            // Only STR can change while a transfer is in progress
            channel.chcr.set_start(chcr.start());
            if !chcr.start() {
                log::debug!("{id}: transfer stopped by software");
            }
            return;
        }

        channel.chcr = chcr;
        if !chcr.start() {
            return;
        }

        let mode = channel.mode();
        self.chain_pending[id.index()] = mode == TransferMode::Chain && channel.qwc == 0;
        self.requests[id.index()] = true;

        log::debug!(
            "{id}: started in {mode:?} mode, DIR={} MADR={:08X} QWC={} TADR={:08X} ASP={}",
            u8::from(chcr.dir()),
            channel.madr.0,
            channel.qwc,
            channel.tadr.0,
            chcr.asp()
        );

        self.metrics.record_start(id, mode);
    }

    pub fn save_state(&self) -> DmacResult<Vec<u8>> {
        Ok(bincode::encode_to_vec(self, bincode_config!())?)
    }

    /// Restores a save state. The current configuration is kept.
    pub fn load_state(&mut self, state: &[u8]) -> DmacResult<()> {
        let (mut loaded, _): (Self, usize) = bincode::decode_from_slice(state, bincode_config!())?;
        loaded.update_config(self.config);
        *self = loaded;

        Ok(())
    }
}

impl Default for Dmac {
    fn default() -> Self {
        Self::new(DmacConfig::default())
    }
}
