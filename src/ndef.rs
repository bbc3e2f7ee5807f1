// src/ndef.rs
use log::warn;

use crate::types::{NdefMessage, NdefRecord};

// TLV tags found in Type 2 tag memory.
const TLV_NULL: u8 = 0x00;
const TLV_NDEF_MESSAGE: u8 = 0x03;
const TLV_TERMINATOR: u8 = 0xFE;

// Scans raw tag memory for NDEF TLV blocks, one NdefMessage per block.
// NULL bytes are padding, the terminator ends the scan, and any other tag
// stops it early. Memory with no NDEF block at all is an empty Vec.
pub fn parse_messages(data: &[u8]) -> Result<Vec<NdefMessage>, String> {
    let mut messages = Vec::new();
    let mut cursor = 0;

    while cursor < data.len() {
        match data[cursor] {
            TLV_NULL => cursor += 1,
            TLV_TERMINATOR => break,
            TLV_NDEF_MESSAGE => {
                let length =
                    *data.get(cursor + 1).ok_or("NDEF TLV is missing its length byte")? as usize;
                if length == 0xFF {
                    return Err("three-byte TLV lengths are not supported".to_string());
                }

                let start = cursor + 2;
                let end = start + length;
                if end > data.len() {
                    return Err(format!(
                        "NDEF TLV claims {} bytes but only {} remain",
                        length,
                        data.len() - start
                    ));
                }

                let records = parse_ndef_records(&data[start..end])?;
                messages.push(NdefMessage { records });
                cursor = end;
            }
            other => {
                warn!("stopping TLV scan at unknown tag {:#04x}", other);
                break;
            }
        }
    }

    Ok(messages)
}

// Record layout: header byte, type length, payload length (1 byte for a
// short record, 4 bytes otherwise), optional id length, then the type, id
// and payload bytes.
pub fn parse_ndef_records(data: &[u8]) -> Result<Vec<NdefRecord>, String> {
    let mut records = Vec::new();
    let mut cursor = 0;

    while cursor < data.len() {
        let header = data[cursor];
        let tnf = header & 0x07; // Last 3 bits
        let is_short_record = (header & 0x10) != 0; // SR flag
        let has_id = (header & 0x08) != 0; // IL flag
        let is_me = (header & 0x40) != 0; // Message End flag
        cursor += 1;

        let type_len = *data.get(cursor).ok_or("record is missing its type length")? as usize;
        cursor += 1;

        let payload_len = if is_short_record {
            let len =
                *data.get(cursor).ok_or("record is missing its payload length")? as usize;
            cursor += 1;
            len
        } else {
            let raw = data
                .get(cursor..cursor + 4)
                .ok_or("record is missing its payload length")?;
            cursor += 4;
            ((raw[0] as usize) << 24)
                | ((raw[1] as usize) << 16)
                | ((raw[2] as usize) << 8)
                | (raw[3] as usize)
        };

        let id_len = if has_id {
            let len = *data.get(cursor).ok_or("record is missing its id length")? as usize;
            cursor += 1;
            len
        } else {
            0
        };

        let record_type = data
            .get(cursor..cursor + type_len)
            .ok_or("record type runs past the end of the message")?
            .to_vec();
        cursor += type_len;

        let id = if has_id {
            let val = data
                .get(cursor..cursor + id_len)
                .ok_or("record id runs past the end of the message")?
                .to_vec();
            cursor += id_len;
            Some(val)
        } else {
            None
        };

        let payload = data
            .get(cursor..cursor + payload_len)
            .ok_or("record payload runs past the end of the message")?
            .to_vec();
        cursor += payload_len;

        records.push(NdefRecord {
            tnf,
            record_type,
            payload,
            id,
        });

        if is_me {
            break;
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use lazy_static::lazy_static;

    use super::*;

    lazy_static! {
        // 03 09 | D1 01 05 54 "Hello" | FE
        static ref HELLO_TLV: Vec<u8> = vec![
            0x03, 0x09, 0xD1, 0x01, 0x05, 0x54, b'H', b'e', b'l', b'l', b'o', 0xFE,
        ];
    }

    #[test]
    fn parses_a_single_text_record() {
        let messages = parse_messages(&HELLO_TLV).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].records.len(), 1);

        let record = &messages[0].records[0];
        assert_eq!(record.tnf, 0x01);
        assert_eq!(record.record_type, b"T");
        assert_eq!(record.payload, b"Hello");
        assert_eq!(record.id, None);
    }

    #[test]
    fn parses_a_record_with_an_id() {
        // Header 0xD9 sets MB, ME, SR and IL.
        let data = [
            0x03, 0x0A, 0xD9, 0x01, 0x03, 0x02, 0x55, 0xAB, 0xCD, 0x01, 0x02, 0x03, 0xFE,
        ];
        let messages = parse_messages(&data).unwrap();

        let record = &messages[0].records[0];
        assert_eq!(record.record_type, b"U");
        assert_eq!(record.id, Some(vec![0xAB, 0xCD]));
        assert_eq!(record.payload, vec![0x01, 0x02, 0x03]);
    }

    #[test]
    fn parses_a_multi_record_message() {
        // 0x91 starts the message, 0x51 ends it.
        let data = [
            0x03, 0x0A, 0x91, 0x01, 0x01, 0x54, 0x41, 0x51, 0x01, 0x01, 0x54, 0x42, 0xFE,
        ];
        let messages = parse_messages(&data).unwrap();

        assert_eq!(messages.len(), 1);
        let records = &messages[0].records;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].payload, b"A");
        assert_eq!(records[1].payload, b"B");
    }

    #[test]
    fn parses_every_tlv_block_on_the_tag() {
        let mut data = vec![TLV_NULL, TLV_NULL];
        data.extend_from_slice(&[0x03, 0x05, 0xD1, 0x01, 0x01, 0x54, 0x41]);
        data.push(TLV_NULL);
        data.extend_from_slice(&[0x03, 0x05, 0xD1, 0x01, 0x01, 0x54, 0x42]);
        data.push(TLV_TERMINATOR);

        let messages = parse_messages(&data).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].records[0].payload, b"A");
        assert_eq!(messages[1].records[0].payload, b"B");
    }

    #[test]
    fn memory_without_an_ndef_block_has_no_messages() {
        assert_eq!(parse_messages(&[]).unwrap().len(), 0);
        assert_eq!(parse_messages(&[0u8; 64]).unwrap().len(), 0);
        // Bytes after the terminator are never scanned.
        assert_eq!(parse_messages(&[0x00, 0xFE, 0x03]).unwrap().len(), 0);
    }

    #[test]
    fn an_unknown_tlv_tag_stops_the_scan() {
        let mut data = vec![0x03, 0x05, 0xD1, 0x01, 0x01, 0x54, 0x41];
        data.extend_from_slice(&[0xA5, 0x03, 0x05, 0xD1, 0x01, 0x01, 0x54, 0x42]);

        let messages = parse_messages(&data).unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn truncated_tlv_blocks_are_an_error() {
        // Length byte missing entirely.
        assert!(parse_messages(&[0x03]).is_err());
        // Claims 9 bytes, provides 3.
        assert!(parse_messages(&[0x03, 0x09, 0xD1, 0x01, 0x05]).is_err());
    }

    #[test]
    fn the_long_tlv_length_form_is_rejected() {
        assert!(parse_messages(&[0x03, 0xFF]).is_err());
    }

    #[test]
    fn a_record_overrunning_its_block_is_an_error() {
        // Payload length says 5 but only 2 bytes follow the type.
        let data = [0x03, 0x06, 0xD1, 0x01, 0x05, 0x54, 0x48, 0x65];
        assert!(parse_messages(&data).is_err());
    }

    #[test]
    fn a_non_short_record_uses_a_four_byte_payload_length() {
        // Header 0xC1: MB and ME set, SR clear.
        let mut message = vec![0xC1, 0x01, 0x00, 0x00, 0x00, 0x03, 0x54];
        message.extend_from_slice(&[0x01, 0x02, 0x03]);
        let mut data = vec![0x03, message.len() as u8];
        data.extend_from_slice(&message);

        let messages = parse_messages(&data).unwrap();
        let record = &messages[0].records[0];
        assert_eq!(record.payload, vec![0x01, 0x02, 0x03]);
    }
}
