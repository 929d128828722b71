//! Chain descriptor walking
//!
//! Source chains (memory to peripheral) follow the PS2 DMAtag IDs, including the two-level
//! CALL/RET address stack on the VIF and GIF channels. Destination chains (SIF0, fromSPR) only
//! use CNTS, CNT and END.
//!
//! On the MFIFO drain channel, tags and CNT/END data live in the ring buffer that fromSPR fills
//! (or, with the shortcut enabled, are taken directly from the scratchpad at fromSPR's SADR).

use crate::channel::{ChannelId, Direction};
use crate::dmac::transfer::{Abort, ChannelStep};
use crate::registers::DmacAddr;
use crate::tag::{DmaTag, TagId};

impl ChannelStep<'_, '_> {
    /// Finishes the current descriptor and loads the next one. Returns whether the chain is
    /// still running with a freshly loaded descriptor.
    pub(super) fn advance(&mut self) -> Result<bool, Abort> {
        let channel = *self.channel();
        let tag_id = channel.tag_id();

        let terminal = match self.direction() {
            Direction::Drain => match tag_id {
                TagId::Refe | TagId::End => true,
                TagId::Cnt => {
                    self.channel_mut().tadr = channel.madr;
                    false
                }
                TagId::Next | TagId::Call => false,
                TagId::Ref | TagId::Refs => {
                    let tadr = self.next_qword(channel.tadr);
                    self.channel_mut().tadr = tadr;
                    false
                }
                TagId::Ret => match channel.chcr.asp() {
                    0 => true,
                    1 => {
                        let registers = self.channel_mut();
                        registers.tadr = registers.asr0;
                        registers.chcr.set_asp(0);
                        false
                    }
                    2 => {
                        let registers = self.channel_mut();
                        registers.tadr = registers.asr1;
                        registers.chcr.set_asp(1);
                        false
                    }
                    asp => return Ok(self.anomaly(&format!("RET with ASP={asp}"))),
                },
            },
            Direction::Source => match tag_id {
                TagId::End => true,
                // CNTS / CNT
                TagId::Refe | TagId::Cnt => {
                    self.channel_mut().tadr = channel.tadr.offset(1);
                    false
                }
                _ => return Ok(self.anomaly(&format!("destination chain tag ID {tag_id}"))),
            },
        };

        if terminal || (channel.chcr.tie() && channel.chcr.tag_irq()) {
            self.end_chain();
            return Ok(false);
        }

        self.load_tag()
    }

    /// Reads the descriptor at TADR and applies it. Returns false if the chain cannot continue
    /// right now, either because it ended or because the MFIFO has not caught up yet.
    pub(super) fn load_tag(&mut self) -> Result<bool, Abort> {
        *self.chain_pending = true;

        let Some(tag) = self.fetch_tag()? else {
            log::trace!("{}: waiting for fromSPR to fill the MFIFO", self.id);
            return Ok(false);
        };

        *self.chain_pending = false;

        let id = self.id;
        let direction = self.direction();
        let registers = self.channel_mut();
        registers.chcr.set_tag(tag.upper_half());
        registers.qwc = tag.qwc().into();
        let tadr = registers.tadr;

        self.metrics.record_chain_packet(id, tag.tag_id());

        log::trace!(
            "{id}: {} tag at {:08X}, QWC={} ADDR={:08X} SPR={} IRQ={}",
            tag.tag_id().label(direction),
            tadr.0,
            tag.qwc(),
            tag.addr(),
            tag.spr(),
            tag.irq()
        );

        Ok(match direction {
            Direction::Drain => self.apply_source_tag(tag),
            Direction::Source => self.apply_dest_tag(tag),
        })
    }

    fn fetch_tag(&mut self) -> Result<Option<DmaTag>, Abort> {
        let tadr = self.channel().tadr;

        if !self.mfifo_drain_active() {
            let qword = self.ctx.memory.read_qword(tadr)?;
            return Ok(Some(DmaTag::from_qword(qword)));
        }

        if self.config.mfifo_shortcut {
            let spr = *self.registers.channel(ChannelId::FromSpr);
            if !spr.chcr.start() || spr.qwc == 0 {
                return Err(Abort::FifoStall);
            }

            let window = self.ctx.memory.scratchpad_window(spr.sadr, 1);
            let qword = self.ctx.memory.slice(&window)[window.start()];
            self.consume_spr_stream(1);
            return Ok(Some(DmaTag::from_qword(qword)));
        }

        if self.ring_available(tadr) == 0 {
            if self.registers.channel(ChannelId::FromSpr).chcr.start() {
                return Ok(None);
            }
            return Err(Abort::FifoStall);
        }

        let ring_tadr = self.controller().ring_address(tadr);
        let qword = self.ctx.memory.read_qword(ring_tadr)?;
        Ok(Some(DmaTag::from_qword(qword)))
    }

    fn apply_source_tag(&mut self, tag: DmaTag) -> bool {
        let channel = *self.channel();
        let mfifo = self.mfifo_drain_active();
        let next = self.next_qword(channel.tadr);

        match tag.tag_id() {
            TagId::Refe | TagId::Ref | TagId::Refs => {
                self.channel_mut().madr = tag.address();
            }
            TagId::Cnt | TagId::End => {
                self.channel_mut().madr = next;
            }
            TagId::Next => {
                let tag_addr =
                    if mfifo { self.controller().ring_address(tag.address()) } else { tag.address() };
                let registers = self.channel_mut();
                registers.madr = next;
                registers.tadr = tag_addr;
            }
            TagId::Call => {
                if mfifo || !self.info.address_stack {
                    return self.anomaly("CALL without an address stack");
                }

                let asp = channel.chcr.asp();
                if asp >= 2 {
                    return self.anomaly("CALL with a full address stack");
                }

                let ret_addr = next.offset(tag.qwc().into());
                let registers = self.channel_mut();
                if asp == 0 {
                    registers.asr0 = ret_addr;
                } else {
                    registers.asr1 = ret_addr;
                }
                registers.chcr.set_asp(asp + 1);
                registers.madr = next;
                registers.tadr = tag.address();
            }
            TagId::Ret => {
                if mfifo || !self.info.address_stack {
                    return self.anomaly("RET without an address stack");
                }

                self.channel_mut().madr = next;
            }
        }

        true
    }

    fn apply_dest_tag(&mut self, tag: DmaTag) -> bool {
        match tag.tag_id() {
            // CNTS / CNT / END
            TagId::Refe | TagId::Cnt | TagId::End => {
                self.channel_mut().madr = tag.address();
                true
            }
            tag_id => self.anomaly(&format!("destination chain tag ID {tag_id}")),
        }
    }

    fn next_qword(&self, addr: DmacAddr) -> DmacAddr {
        let next = addr.offset(1);
        if self.mfifo_drain_active() && !self.config.mfifo_shortcut {
            self.controller().ring_address(next)
        } else {
            next
        }
    }

    fn end_chain(&mut self) {
        self.complete();
        self.metrics.record_chain_end(self.id);
    }

    fn anomaly(&mut self, what: &str) -> bool {
        let tadr = self.channel().tadr.0;
        log::warn!("{}: malformed chain ({what}) at TADR={tadr:08X}; ending transfer", self.id);
        self.end_chain();
        false
    }
}
