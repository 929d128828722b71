use super::*;

#[test]
fn chcr_fields() {
    let chcr = Chcr(0x7000_0185);

    assert!(chcr.dir());
    assert_eq!(chcr.mode(), 1);
    assert!(chcr.tie());
    assert!(chcr.start());
    assert_eq!(chcr.tag_id(), 7);
    assert!(!chcr.tag_irq());

    assert!(Chcr(0x8000_0000).tag_irq());
}

#[test]
fn chcr_write_mask_drops_reserved_bits() {
    assert_eq!(ChannelRegisters::masked_chcr(0xFFFF_FFFF).0, 0xFFFF_01FD);
}

#[test]
fn address_offset_wraps_in_scratchpad() {
    let addr = DmacAddr::new(0x3FF0, true);
    assert_eq!(addr.offset(2), DmacAddr::new(0x0010, true));

    let addr = DmacAddr::new(0x0010_0000, false);
    assert_eq!(addr.offset(0x10).addr(), 0x0010_0100);
}

#[test]
fn data_register_writes_are_masked() {
    let mut channel = ChannelRegisters::default();

    assert!(channel.write_data_register(MADR_OFFSET, 0x8000_123F));
    assert!(channel.write_data_register(QWC_OFFSET, 0x1234_5678));
    assert!(channel.write_data_register(SADR_OFFSET, 0xFFFF_FFFF));
    assert!(!channel.write_data_register(0x60, 0));

    assert_eq!(channel.madr, DmacAddr::new(0x1230, true));
    assert_eq!(channel.qwc, 0x5678);
    assert_eq!(channel.sadr, 0x3FF0);
    assert_eq!(channel.read(0x60), None);
}

#[test]
fn stat_write_acknowledges_and_toggles() {
    let mut controller = ControllerRegisters::new();
    controller.stat = Stat(0x0000_C005);

    // Ack CIS bit 0 and BEIS, toggle CIM bit 2
    controller.write_stat(0x0004_8001);
    assert_eq!(controller.stat.0, 0x0004_4004);

    // Toggle CIM bit 2 back off
    controller.write_stat(0x0004_0000);
    assert_eq!(controller.stat.0, 0x0000_4004);
}

#[test]
fn interrupt_pending_requires_mask() {
    let mut controller = ControllerRegisters::new();
    controller.stat = Stat(0).with_cis(1 << 2);
    assert!(!controller.interrupt_pending());

    controller.stat.set_cim(1 << 2);
    assert!(controller.interrupt_pending());

    controller.stat = Stat(0).with_meis(true);
    assert!(!controller.interrupt_pending());
    controller.stat.set_meim(true);
    assert!(controller.interrupt_pending());

    controller.stat = Stat(0).with_beis(true);
    assert!(controller.interrupt_pending());
}

#[test]
fn priority_control_uses_channel_bit() {
    let mut controller = ControllerRegisters::new();
    assert!(controller.priority_allows(ChannelId::Gif));

    controller.write_pcr(0x8000_0000 | (1 << (16 + ChannelId::Vif1.bit())));
    assert!(controller.priority_allows(ChannelId::Vif1));
    assert!(!controller.priority_allows(ChannelId::Gif));
}

#[test]
fn ctrl_channel_selects() {
    let mut controller = ControllerRegisters::new();
    controller.write_ctrl(0x0000_00D9);

    assert!(controller.ctrl.enabled());
    assert_eq!(controller.mfifo_drain_channel(), Some(ChannelId::Vif1));
    assert_eq!(controller.stall_source_channel(), Some(ChannelId::Sif0));
    assert_eq!(controller.stall_drain_channel(), Some(ChannelId::Sif1));
}

#[test]
fn reset_state() {
    let controller = ControllerRegisters::new();
    assert_eq!(controller.enabler, 0x1201);
    assert!(controller.suspended());
}
