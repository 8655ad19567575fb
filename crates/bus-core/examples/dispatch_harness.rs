//! Performance harness for address space dispatch.
//!
//! Measures read/write throughput over a machine-realistic map: ROM, mirrored
//! work RAM, a banked window, and a word-granular device block.
//!
//! ## Usage
//!
//! ```sh
//! cargo run -p bus-core --release --example dispatch_harness
//! ```
//!
//! ## Metrics
//!
//! - Accesses per second for cache-hit reads, mirrored reads, device
//!   read-modify-write, and bank-switched reads
//! - Emulated-CPU-equivalents at 1 MHz (one access per cycle)

#![allow(clippy::pedantic)]

use bus_core::{
    shared_handler, AccessWidth, AddressSpace, AddressSpaceBuilder, BankPolicy, BusHandler,
    Endianness, SharedSegment, SpaceConfig,
};
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

use std::time::Instant;

const ITERATIONS: u64 = 2_000_000;
const REFERENCE_CLOCK_HZ: f64 = 1_000_000.0;

struct ScratchPort {
    cells: [u64; 128],
}

impl BusHandler for ScratchPort {
    fn granularity(&self) -> AccessWidth {
        AccessWidth::Word
    }

    fn read(&mut self, offset: u64, _width: AccessWidth) -> u64 {
        self.cells[(offset / 2) as usize % 128]
    }

    fn write(&mut self, offset: u64, _width: AccessWidth, value: u64) {
        self.cells[(offset / 2) as usize % 128] = value;
    }
}

fn build_space() -> AddressSpace {
    let mut builder = AddressSpaceBuilder::new(SpaceConfig {
        device: "maincpu".to_owned(),
        name: "program".to_owned(),
        native_width: AccessWidth::Word,
        endianness: Endianness::Little,
        addr_mask: 0xFFFF,
        open_bus: u64::MAX,
    });

    let rom: Vec<u8> = (0..0x4000_u32).map(|byte| byte as u8).collect();
    builder.install_rom(0x0000, 0x3FFF, 0, &rom).expect("rom");
    builder.install_ram(0x4000, 0x47FF, 0x1800).expect("work ram");

    let pages: Vec<SharedSegment> = (0..8).map(|_| SharedSegment::zeroed(0x1000)).collect();
    let bank = builder
        .install_bank(0x8000, 0x8FFF, 0, &pages, BankPolicy::Wrap)
        .expect("bank window");
    bank.select(3).expect("in-range page");

    let port = shared_handler(ScratchPort { cells: [0; 128] });
    builder
        .install_device(0xE000, 0xE0FF, 0, AccessWidth::Word, &port)
        .expect("device block");

    builder.build()
}

fn bench(name: &str, mut access: impl FnMut(u64)) {
    let start = Instant::now();
    for index in 0..ITERATIONS {
        access(index);
    }
    let elapsed = start.elapsed();
    let per_second = ITERATIONS as f64 / elapsed.as_secs_f64();
    let cpu_equivalents = per_second / REFERENCE_CLOCK_HZ;
    println!("{name:<28} {per_second:>14.0} accesses/s  {cpu_equivalents:>8.1} cpu-equivalents @1MHz");
}

fn main() {
    let mut space = build_space();

    bench("rom reads (cache hit)", |index| {
        let addr = (index * 2) & 0x3FFE;
        let _ = space.read(addr, AccessWidth::Word).expect("native width");
    });

    let mut space = build_space();
    bench("mirrored ram writes", |index| {
        let addr = 0x4000 | (index & 0x1FFF);
        let _ = space
            .write(addr, AccessWidth::Byte, index & 0xFF)
            .expect("native width");
    });

    let mut space = build_space();
    bench("device byte rmw", |index| {
        let addr = 0xE000 | (index & 0xFF);
        let _ = space
            .write(addr, AccessWidth::Byte, index & 0xFF)
            .expect("native width");
    });

    let mut space = build_space();
    bench("banked window reads", |index| {
        let addr = 0x8000 | (index & 0xFFF);
        let _ = space.read(addr, AccessWidth::Word).expect("native width");
    });
}
