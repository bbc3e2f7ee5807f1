// src/types.rs
use serde::{Deserialize, Serialize};

// Messages sent TO the WebSocket client (Frontend)
#[allow(non_camel_case_types)]
#[derive(Serialize, Clone, Debug)]
#[serde(tag = "type")]
pub enum OutgoingMessage {
    READER_STATUS {
        success: bool,
    },
    CARD_STATUS {
        success: bool,
        message: String,
    },
    TAG_INFO {
        id: String,
        technologies: String,
    },
    MESSAGE_INFO {
        tnf: String,
        id: String,
        record_type: String,
        payload: DecodedPayload,
    },
    DUMP_READ_SUCCESS {
        text: String,
        hex: String,
    },
    DUMP_READ_ERROR {
        error: String,
    },
    READER_ERROR {
        error: String,
    },
}

// Messages received FROM the WebSocket client
#[allow(non_camel_case_types)]
#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
pub enum IncomingMessage {
    GET_READER_STATUS,
}

// Internal commands sent from WS Server -> NFC Thread
#[derive(Debug)]
pub enum NfcCommand {
    CheckReaderStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefRecord {
    pub tnf: u8, // Type Name Format (How to interpret the type)
    pub record_type: Vec<u8>,
    pub payload: Vec<u8>,
    pub id: Option<Vec<u8>>,
}

// One NDEF message, i.e. the contents of a single NDEF TLV block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefMessage {
    pub records: Vec<NdefRecord>,
}

// Snapshot of a freshly inserted tag.
#[derive(Debug, Clone)]
pub struct ScannedTag {
    pub uid: Vec<u8>,
    pub technologies: Vec<String>,
}

// The four parallel renderings of a payload, sent to the client as-is.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodedPayload {
    pub single_byte: String,
    pub double_byte: String,
    pub hex: String,
    pub decimal: String,
}

pub const CARD_TYPE_MIFARE_1K: &str = "6a"; // MIFARE Classic 1K
pub const CARD_TYPE_ULTRALIGHT: &str = "68"; // NTAG215/Ultralight
