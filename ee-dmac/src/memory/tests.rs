use super::*;

#[test]
fn main_ram_window() {
    let memory = Memory::new();

    let window = memory.resolve(DmacAddr::new(0x1000, false), 4).unwrap();
    assert_eq!(window.region, Region::MainRam);
    assert_eq!(window.start(), 0);
    assert_eq!(window.len, 4);

    // Last quadword of RAM is fine, one past it is not
    assert!(memory.resolve(DmacAddr::new(0x01FF_FFF0, false), 1).is_ok());
    assert_eq!(
        memory.resolve(DmacAddr::new(0x01FF_FFF0, false), 2),
        Err(BusError { address: 0x01FF_FFF0, units: 2 })
    );
    assert!(memory.resolve(DmacAddr::new(0x0200_0000, false), 1).is_err());
}

#[test]
fn scratchpad_windows() {
    let mut memory = Memory::new();
    for (i, qword) in memory.scratchpad_mut().iter_mut().enumerate() {
        *qword = i as u128;
    }

    // SPR bit wraps
    let window = memory.resolve(DmacAddr::new(0x3FE0, true), 4).unwrap();
    assert_eq!(memory.read_window(&window), vec![0x3FE, 0x3FF, 0, 1]);

    // Direct mapping does not
    let window = memory.resolve(DmacAddr::new(0x7000_3FE0, false), 2).unwrap();
    assert_eq!(memory.read_window(&window), vec![0x3FE, 0x3FF]);
    assert!(memory.resolve(DmacAddr::new(0x7000_3FE0, false), 3).is_err());
}

#[test]
fn ring_window_wraps() {
    let mut memory = Memory::new();
    for i in 0..0x100 {
        memory.main_ram_mut()[0x1000 + i] = i as u128;
    }

    let window = memory.ring(0x10000, 0xFF0, 0x10FE0, 4).unwrap();
    assert_eq!(window.capacity(), 0x100);
    assert_eq!(memory.read_window(&window), vec![0xFE, 0xFF, 0x00, 0x01]);
}

#[test]
fn copy_between_regions() {
    let mut memory = Memory::new();
    memory.main_ram_mut()[0x100..0x104].copy_from_slice(&[1, 2, 3, 4]);

    let src = memory.resolve(DmacAddr::new(0x1000, false), 4).unwrap();
    let dst = memory.scratchpad_window(0x3FE0, 4);
    memory.copy(&src, &dst);

    assert_eq!(memory.scratchpad()[0x3FE], 1);
    assert_eq!(memory.scratchpad()[0x3FF], 2);
    assert_eq!(memory.scratchpad()[0], 3);
    assert_eq!(memory.scratchpad()[1], 4);
}

#[test]
fn byte_view_is_little_endian() {
    let mut memory = Memory::new();
    memory.copy_to_main_ram(&[0x78, 0x56, 0x34, 0x12], 0x20).unwrap();

    assert_eq!(memory.read_qword(DmacAddr::new(0x20, false)).unwrap(), 0x1234_5678);
    assert_eq!(&memory.main_ram_bytes()[0x20..0x24], &[0x78, 0x56, 0x34, 0x12]);
    assert!(memory.copy_to_main_ram(&[0; 32], (MAIN_RAM_LEN - 16) as u32).is_err());
}
