#![no_main]

use bus_core::{
    shared_handler, AccessWidth, AddressSpaceBuilder, BankPolicy, BusHandler, Endianness,
    SharedSegment, SpaceConfig,
};
use libfuzzer_sys::fuzz_target;

struct EchoPort;

impl BusHandler for EchoPort {
    fn granularity(&self) -> AccessWidth {
        AccessWidth::Word
    }

    fn read(&mut self, offset: u64, _width: AccessWidth) -> u64 {
        offset
    }

    fn write(&mut self, _offset: u64, _width: AccessWidth, _value: u64) {}
}

fn width_from(byte: u8) -> AccessWidth {
    match byte & 0x3 {
        0 => AccessWidth::Byte,
        1 => AccessWidth::Word,
        2 => AccessWidth::Dword,
        _ => AccessWidth::Qword,
    }
}

// Random install sequences followed by random accesses: nothing here may
// panic, and accepted installs must leave the space dispatchable.
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let endianness = if data[0] & 1 == 0 {
        Endianness::Little
    } else {
        Endianness::Big
    };
    let mut builder = AddressSpaceBuilder::new(SpaceConfig {
        native_width: width_from(data[0] >> 1),
        endianness,
        open_bus: u64::from(data[1]).wrapping_mul(0x0101_0101_0101_0101),
        ..SpaceConfig::default()
    });

    let mut chunks = data[2..].chunks_exact(6);
    let mut selectors = Vec::new();
    for chunk in chunks.by_ref().take(12) {
        let start = u64::from(u16::from_le_bytes([chunk[0], chunk[1]]));
        let end = u64::from(u16::from_le_bytes([chunk[2], chunk[3]]));
        let mirror = u64::from(chunk[4]) << 8;
        match chunk[5] % 5 {
            0 => {
                let _ = builder.install_ram(start, end, mirror);
            }
            1 => {
                let _ = builder.install_rom(start, end, mirror, chunk);
            }
            2 => {
                let _ = builder.install_hole(start, end, mirror);
            }
            3 => {
                let port = shared_handler(EchoPort);
                let _ = builder.install_device(start, end, mirror, AccessWidth::Word, &port);
            }
            _ => {
                if start <= end {
                    let span = end - start + 1;
                    let pages = [SharedSegment::zeroed(span), SharedSegment::zeroed(span)];
                    if let Ok(bank) =
                        builder.install_bank(start, end, mirror, &pages, BankPolicy::Wrap)
                    {
                        selectors.push(bank);
                    }
                }
            }
        }
    }

    let mut space = builder.build();
    for chunk in chunks.take(32) {
        let addr = u64::from(u16::from_le_bytes([chunk[0], chunk[1]]));
        let value = u64::from(u16::from_le_bytes([chunk[2], chunk[3]]));
        let width = width_from(chunk[4]);
        let _ = space.read(addr, width);
        let _ = space.write(addr, width, value);
        if let Some(bank) = selectors.first() {
            let _ = bank.select(usize::from(chunk[5]));
        }
    }
});
