//! Bus topology suite: forwarding windows, shared storage across spaces,
//! and graph validation through the machine builder.

#![allow(clippy::pedantic, clippy::nursery)]

use bus_core::{
    AccessWidth, AddressSpaceBuilder, ConfigError, Direction, Endianness, MachineBuilder,
    SharedSegment, SpaceConfig, TargetKind,
};
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

fn space(device: &str, name: &str, native_width: AccessWidth) -> AddressSpaceBuilder {
    AddressSpaceBuilder::new(SpaceConfig {
        device: device.to_owned(),
        name: name.to_owned(),
        native_width,
        endianness: Endianness::Little,
        ..SpaceConfig::default()
    })
}

#[test]
fn forwarding_translates_addresses_into_the_target_space() {
    let mut sub = space("audiocpu", "program", AccessWidth::Byte);
    sub.install_ram(0x0000, 0x1FFF, 0).unwrap();

    let main = space("maincpu", "program", AccessWidth::Byte).build();

    let mut machine = MachineBuilder::new();
    let main = machine.add_space(main);
    let sub_handle = machine.add_space(sub.build());
    // Window at 0xC000 in the main map lands at 0x1000 in the sub map.
    machine.forward(&main, 0xC000, 0xC0FF, 0, &sub_handle, 0x1000);
    let machine = machine.freeze().unwrap();

    let main = machine.space("maincpu", "program").unwrap();
    let sub = machine.space("audiocpu", "program").unwrap();

    main.write(0xC042, AccessWidth::Byte, 0x77).unwrap();
    assert_eq!(sub.read(0x1042, AccessWidth::Byte).unwrap(), 0x77);

    sub.write(0x1000, AccessWidth::Byte, 0x11).unwrap();
    assert_eq!(main.read(0xC000, AccessWidth::Byte).unwrap(), 0x11);
}

#[test]
fn forwarding_chains_across_three_spaces() {
    let mut leaf = space("dsp", "data", AccessWidth::Byte);
    leaf.install_ram(0x0000, 0x00FF, 0).unwrap();

    let mut machine = MachineBuilder::new();
    let top = machine.add_space(space("maincpu", "program", AccessWidth::Byte).build());
    let mid = machine.add_space(space("subcpu", "program", AccessWidth::Byte).build());
    let leaf = machine.add_space(leaf.build());
    machine.forward(&top, 0x8000, 0x80FF, 0, &mid, 0x4000);
    machine.forward(&mid, 0x4000, 0x40FF, 0, &leaf, 0x0000);
    let machine = machine.freeze().unwrap();

    let top = machine.space("maincpu", "program").unwrap();
    top.write(0x8010, AccessWidth::Byte, 0xBE).unwrap();
    assert_eq!(top.read(0x8010, AccessWidth::Byte).unwrap(), 0xBE);

    let leaf = machine.space("dsp", "data").unwrap();
    assert_eq!(leaf.read(0x0010, AccessWidth::Byte).unwrap(), 0xBE);
}

#[test]
fn wide_accesses_split_down_to_the_target_native_width() {
    let mut sub = space("ctc", "regs", AccessWidth::Byte);
    sub.install_ram(0x0000, 0x00FF, 0).unwrap();

    let mut machine = MachineBuilder::new();
    let main = machine.add_space(space("maincpu", "program", AccessWidth::Word).build());
    let sub_handle = machine.add_space(sub.build());
    machine.forward(&main, 0x0000, 0x00FF, 0, &sub_handle, 0x0000);
    let machine = machine.freeze().unwrap();

    let main = machine.space("maincpu", "program").unwrap();
    main.write(0x0000, AccessWidth::Word, 0x1234).unwrap();

    let sub = machine.space("ctc", "regs").unwrap();
    assert_eq!(sub.read(0x0000, AccessWidth::Byte).unwrap(), 0x34);
    assert_eq!(sub.read(0x0001, AccessWidth::Byte).unwrap(), 0x12);
    assert_eq!(main.read(0x0000, AccessWidth::Word).unwrap(), 0x1234);
}

#[test]
fn one_segment_serves_two_spaces_as_shared_ram() {
    let shared = SharedSegment::zeroed(0x100);

    let mut cpu_a = space("maincpu", "program", AccessWidth::Byte);
    cpu_a.install_shared(0x6000, 0x60FF, 0, &shared).unwrap();
    let mut cpu_b = space("subcpu", "program", AccessWidth::Byte);
    cpu_b.install_shared(0x2000, 0x20FF, 0, &shared).unwrap();

    let mut machine = MachineBuilder::new();
    let a = machine.add_space(cpu_a.build());
    let b = machine.add_space(cpu_b.build());
    let _machine = machine.freeze().unwrap();

    a.write(0x6010, AccessWidth::Byte, 0x42).unwrap();
    assert_eq!(b.read(0x2010, AccessWidth::Byte).unwrap(), 0x42);

    b.write(0x20FF, AccessWidth::Byte, 0x24).unwrap();
    assert_eq!(a.read(0x60FF, AccessWidth::Byte).unwrap(), 0x24);
    assert_eq!(shared.peek(0xFF), 0x24);
}

#[test]
fn mirrored_forward_windows_alias_the_target() {
    let mut io = space("ppu", "regs", AccessWidth::Byte);
    io.install_ram(0x0000, 0x0007, 0).unwrap();

    let mut machine = MachineBuilder::new();
    let main = machine.add_space(space("maincpu", "program", AccessWidth::Byte).build());
    let io = machine.add_space(io.build());
    // Eight registers aliased through 0x2000-0x3FFF.
    machine.forward(&main, 0x2000, 0x2007, 0x1FF8, &io, 0x0000);
    let machine = machine.freeze().unwrap();

    let main = machine.space("maincpu", "program").unwrap();
    main.write(0x3FFA, AccessWidth::Byte, 0x90).unwrap();
    assert_eq!(main.read(0x2002, AccessWidth::Byte).unwrap(), 0x90);
}

#[test]
fn cycles_are_rejected_before_any_dispatch() {
    let mut machine = MachineBuilder::new();
    let a = machine.add_space(space("maincpu", "program", AccessWidth::Byte).build());
    let b = machine.add_space(space("subcpu", "program", AccessWidth::Byte).build());
    machine.forward(&a, 0x0000, 0x0FFF, 0, &b, 0x0000);
    machine.forward(&b, 0x1000, 0x1FFF, 0, &a, 0x0000);

    match machine.freeze() {
        Err(ConfigError::ForwardingCycle { path }) => {
            assert!(path.contains("maincpu:program"));
            assert!(path.contains("subcpu:program"));
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("cyclic graph must not freeze"),
    }
}

#[test]
fn diamond_topologies_are_legal() {
    // Two CPUs forwarding into one shared register file is a DAG, not a
    // cycle.
    let mut regs = space("sound", "regs", AccessWidth::Byte);
    regs.install_ram(0x0000, 0x00FF, 0).unwrap();

    let mut machine = MachineBuilder::new();
    let a = machine.add_space(space("maincpu", "program", AccessWidth::Byte).build());
    let b = machine.add_space(space("subcpu", "program", AccessWidth::Byte).build());
    let regs = machine.add_space(regs.build());
    machine.forward(&a, 0xE000, 0xE0FF, 0, &regs, 0x0000);
    machine.forward(&b, 0xA000, 0xA0FF, 0, &regs, 0x0000);
    let machine = machine.freeze().unwrap();

    let a = machine.space("maincpu", "program").unwrap();
    let b = machine.space("subcpu", "program").unwrap();
    a.write(0xE005, AccessWidth::Byte, 0x0F).unwrap();
    assert_eq!(b.read(0xA005, AccessWidth::Byte).unwrap(), 0x0F);
}

#[test]
fn map_reports_list_entries_in_priority_order() {
    let mut builder = space("maincpu", "program", AccessWidth::Byte);
    builder.install_rom(0x0000, 0x3FFF, 0, &[]).unwrap();
    builder.install_ram(0x4000, 0x7FFF, 0).unwrap();
    builder.install_hole(0x4000, 0x40FF, 0).unwrap();

    let mut machine = MachineBuilder::new();
    let handle = machine.add_space(builder.build());
    let _machine = machine.freeze().unwrap();

    let report = handle.map_report(Direction::Read);
    let kinds: Vec<TargetKind> = report.iter().map(|entry| entry.kind).collect();
    assert_eq!(
        kinds,
        vec![TargetKind::Rom, TargetKind::Ram, TargetKind::Hole]
    );
    assert_eq!(report[1].start, 0x4000);
    assert_eq!(report[1].end, 0x7FFF);
    assert_eq!(report[2].mirror, 0);
}
