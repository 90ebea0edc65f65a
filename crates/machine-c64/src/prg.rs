//! PRG loader.
//!
//! A PRG file is a 2-byte little-endian load address followed by the
//! data bytes, which go into RAM from that address.

use thiserror::Error;

use crate::memory::C64Memory;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("PRG image is {len} bytes; it needs a load address and at least one data byte")]
    TooShort { len: usize },
    #[error("PRG image of {len} bytes at ${address:04X} runs past $FFFF")]
    Overflow { address: u16, len: usize },
}

/// Copy a PRG image into RAM underneath any ROMs. Returns the load address.
pub fn load_prg(memory: &mut C64Memory, data: &[u8]) -> Result<u16, LoadError> {
    let [lo, hi, body @ ..] = data else {
        return Err(LoadError::TooShort { len: data.len() });
    };
    if body.is_empty() {
        return Err(LoadError::TooShort { len: data.len() });
    }
    let address = u16::from_le_bytes([*lo, *hi]);
    if usize::from(address) + body.len() > 0x1_0000 {
        return Err(LoadError::Overflow {
            address,
            len: body.len(),
        });
    }

    for (i, &byte) in body.iter().enumerate() {
        memory.ram_write(address.wrapping_add(i as u16), byte);
    }
    log::debug!(
        "PRG: {} bytes at ${address:04X}-${:04X}",
        body.len(),
        usize::from(address) + body.len() - 1
    );
    Ok(address)
}
