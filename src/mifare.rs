// src/mifare.rs
use std::ffi::CStr;

use log::warn;
use pcsc::{Card, Context, Disposition, Protocols, ShareMode};
use thiserror::Error;

use crate::apdu;
use crate::decode;

pub const BYTES_PER_PAGE: usize = 4;
pub const PAGES_PER_READ: usize = 4;
pub const BYTES_PER_READ: usize = BYTES_PER_PAGE * PAGES_PER_READ;
// Fixed scan depth: 42 pages covers the Ultralight C / NTAG215 user space.
pub const PAGE_COUNT: usize = 42;
// Pages 0-3 hold the serial number, lock bytes and capability container.
pub const USER_MEMORY_OFFSET: usize = 4 * BYTES_PER_PAGE;

const DUMP_SIZE: usize = PAGE_COUNT.div_ceil(PAGES_PER_READ) * BYTES_PER_READ;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DumpError {
    #[error("failed to connect to tag: {0}")]
    Connect(String),
    #[error("read failed at page {page}: {message}")]
    Read { page: usize, message: String },
}

// Everything the dump loop needs from a tag session. The PC/SC card below
// is the real implementation; tests script their own.
pub trait UltralightTag {
    fn connect(&mut self) -> Result<(), String>;
    fn read_pages(&mut self, page: usize) -> Result<[u8; BYTES_PER_READ], String>;
    fn close(&mut self);
}

// Reads the whole tag in 16-byte chunks at pages 0, 4, 8, ... A dump is
// all-or-nothing: the first failed read aborts and no partial buffer
// escapes. The session closes on every exit path once connect succeeded.
pub fn read_dump<T: UltralightTag>(tag: &mut T) -> Result<MemoryDump, DumpError> {
    tag.connect().map_err(DumpError::Connect)?;

    let mut bytes = Vec::with_capacity(DUMP_SIZE);
    let mut failure = None;

    for page in (0..PAGE_COUNT).step_by(PAGES_PER_READ) {
        match tag.read_pages(page) {
            Ok(chunk) => bytes.extend_from_slice(&chunk),
            Err(message) => {
                failure = Some(DumpError::Read { page, message });
                break;
            }
        }
    }

    tag.close();

    match failure {
        Some(err) => Err(err),
        None => Ok(MemoryDump { bytes }),
    }
}

// A complete tag image. Only read_dump builds one, so the byte count is
// always a whole number of read chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryDump {
    bytes: Vec<u8>,
}

impl MemoryDump {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    // Everything past the header pages; NDEF TLV blocks live here.
    pub fn user_memory(&self) -> &[u8] {
        &self.bytes[USER_MEMORY_OFFSET..]
    }

    pub fn decode(&self) -> DecodedDump {
        DecodedDump {
            text: decode::single_byte_text(&self.bytes),
            hex: decode::hex_text(&self.bytes),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedDump {
    pub text: String,
    pub hex: String,
}

// Production tag session over PC/SC. One card connection per dump.
pub struct PcscUltralight<'a> {
    ctx: &'a Context,
    reader: &'a CStr,
    card: Option<Card>,
}

impl<'a> PcscUltralight<'a> {
    pub fn new(ctx: &'a Context, reader: &'a CStr) -> Self {
        PcscUltralight {
            ctx,
            reader,
            card: None,
        }
    }
}

impl UltralightTag for PcscUltralight<'_> {
    fn connect(&mut self) -> Result<(), String> {
        match self.ctx.connect(self.reader, ShareMode::Shared, Protocols::ANY) {
            Ok(card) => {
                self.card = Some(card);
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    fn read_pages(&mut self, page: usize) -> Result<[u8; BYTES_PER_READ], String> {
        let card = self.card.as_ref().ok_or("no open card session")?;
        let data = apdu::read_binary(card, page as u8, BYTES_PER_READ as u8)?;
        data.try_into().map_err(|data: Vec<u8>| {
            format!("expected {} bytes, card sent {}", BYTES_PER_READ, data.len())
        })
    }

    fn close(&mut self) {
        if let Some(card) = self.card.take() {
            if let Err((_, err)) = card.disconnect(Disposition::LeaveCard) {
                warn!("failed to disconnect card: {}", err);
            }
        }
    }
}
