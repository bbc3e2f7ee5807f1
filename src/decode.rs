// src/decode.rs
use crate::types::{DecodedPayload, NdefRecord};

pub const TNF_WELL_KNOWN: u8 = 0x01;

// Labels for the seven defined Type Name Format codes (header bits 0-2).
const TNF_LABELS: [(u8, &str); 7] = [
    (0x00, "TNF_EMPTY"),
    (0x01, "TNF_WELL_KNOWN"),
    (0x02, "TNF_MIME_MEDIA"),
    (0x03, "TNF_ABSOLUTE_URI"),
    (0x04, "TNF_EXTERNAL_TYPE"),
    (0x05, "TNF_UNKNOWN"),
    (0x06, "TNF_UNCHANGED"),
];

// Record Type Definition names for the well-known type space.
const WELL_KNOWN_TYPES: [(&[u8], &str); 7] = [
    (b"ac", "RTD_ALTERNATIVE_CARRIER"),
    (b"Hc", "RTD_HANDOVER_CARRIER"),
    (b"Hr", "RTD_HANDOVER_REQUEST"),
    (b"Hs", "RTD_HANDOVER_SELECT"),
    (b"Sp", "RTD_SMART_POSTER"),
    (b"T", "RTD_TEXT"),
    (b"U", "RTD_URI"),
];

pub fn list_techs(technologies: &[String], prefix: &str, separator: &str) -> String {
    technologies
        .iter()
        .map(|tech| format!("{}{}", prefix, tech))
        .collect::<Vec<_>>()
        .join(separator)
}

// A missing or empty id renders as the "none" sentinel; otherwise each byte
// renders as its signed decimal value.
pub fn format_id(id: Option<&[u8]>, separator: &str) -> String {
    match id {
        Some(bytes) if !bytes.is_empty() => bytes
            .iter()
            .map(|&b| (b as i8).to_string())
            .collect::<Vec<_>>()
            .join(separator),
        _ => "none".to_string(),
    }
}

pub fn tnf_label(tnf: u8) -> String {
    TNF_LABELS
        .iter()
        .find(|(code, _)| *code == tnf)
        .map(|(_, label)| (*label).to_string())
        .unwrap_or_else(|| format!("Not defined: {}", tnf))
}

pub fn record_type_label(record_type: &[u8], tnf: u8) -> String {
    if tnf == TNF_WELL_KNOWN {
        return WELL_KNOWN_TYPES
            .iter()
            .find(|(bytes, _)| *bytes == record_type)
            .map(|(_, label)| (*label).to_string())
            .unwrap_or_else(|| "Not so well known".to_string());
    }

    // Types outside the well-known space render each byte as its bare
    // signed decimal, with no separator.
    record_type.iter().map(|&b| (b as i8).to_string()).collect()
}

// One character per byte, codes 0-255.
pub fn single_byte_text(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

// One character per big-endian byte pair; an odd trailing byte takes the
// high half of the final code. Codes in the surrogate range have no char
// form and render as U+FFFD.
pub fn double_byte_text(bytes: &[u8]) -> String {
    let chunks = bytes.chunks_exact(2);
    let trailing = chunks.remainder();

    let mut text = String::with_capacity(bytes.len());
    for pair in chunks {
        text.push(char_from_code(u16::from_be_bytes([pair[0], pair[1]])));
    }
    if let [last] = trailing {
        text.push(char_from_code(u16::from_be_bytes([*last, 0])));
    }
    text
}

fn char_from_code(code: u16) -> char {
    char::from_u32(code as u32).unwrap_or(char::REPLACEMENT_CHARACTER)
}

// Each byte widens through i8 to i32, so bytes >= 0x80 render as full
// 32-bit two's-complement patterns (0xFF -> "ffffffff"). One trailing
// space per token.
pub fn hex_text(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len() * 3);
    for &b in bytes {
        text.push_str(&format!("{:x} ", b as i8 as i32));
    }
    text
}

// Each byte as its signed decimal value, one trailing space per token.
pub fn decimal_text(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len() * 4);
    for &b in bytes {
        text.push_str(&format!("{} ", b as i8));
    }
    text
}

// All four renderings across every record payload, in record order. Byte
// pairing for the double-byte rendering restarts at each record boundary.
pub fn decode_payloads(records: &[NdefRecord]) -> DecodedPayload {
    let mut decoded = DecodedPayload::default();
    for record in records {
        decoded
            .single_byte
            .push_str(&single_byte_text(&record.payload));
        decoded
            .double_byte
            .push_str(&double_byte_text(&record.payload));
        decoded.hex.push_str(&hex_text(&record.payload));
        decoded.decimal.push_str(&decimal_text(&record.payload));
    }
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_payload(payload: Vec<u8>) -> NdefRecord {
        NdefRecord {
            tnf: 1,
            record_type: b"T".to_vec(),
            payload,
            id: None,
        }
    }

    #[test]
    fn tnf_labels_cover_the_defined_codes() {
        assert_eq!(tnf_label(0), "TNF_EMPTY");
        assert_eq!(tnf_label(1), "TNF_WELL_KNOWN");
        assert_eq!(tnf_label(2), "TNF_MIME_MEDIA");
        assert_eq!(tnf_label(3), "TNF_ABSOLUTE_URI");
        assert_eq!(tnf_label(4), "TNF_EXTERNAL_TYPE");
        assert_eq!(tnf_label(5), "TNF_UNKNOWN");
        assert_eq!(tnf_label(6), "TNF_UNCHANGED");
    }

    #[test]
    fn tnf_label_falls_back_to_the_raw_value() {
        assert_eq!(tnf_label(7), "Not defined: 7");
        assert_eq!(tnf_label(255), "Not defined: 255");
    }

    #[test]
    fn well_known_record_types_use_rtd_names() {
        assert_eq!(record_type_label(b"ac", 1), "RTD_ALTERNATIVE_CARRIER");
        assert_eq!(record_type_label(b"Hc", 1), "RTD_HANDOVER_CARRIER");
        assert_eq!(record_type_label(b"Hr", 1), "RTD_HANDOVER_REQUEST");
        assert_eq!(record_type_label(b"Hs", 1), "RTD_HANDOVER_SELECT");
        assert_eq!(record_type_label(b"Sp", 1), "RTD_SMART_POSTER");
        assert_eq!(record_type_label(b"T", 1), "RTD_TEXT");
        assert_eq!(record_type_label(b"U", 1), "RTD_URI");
        assert_eq!(record_type_label(b"X", 1), "Not so well known");
    }

    #[test]
    fn other_record_types_concatenate_signed_decimals() {
        assert_eq!(record_type_label(&[0x54, 0xFF], 2), "84-1");
        assert_eq!(record_type_label(&[], 4), "");
    }

    #[test]
    fn missing_or_empty_id_renders_the_none_sentinel() {
        assert_eq!(format_id(None, "-"), "none");
        assert_eq!(format_id(Some(&[]), "-"), "none");
    }

    #[test]
    fn id_bytes_join_as_signed_decimals() {
        assert_eq!(format_id(Some(&[1, 2, 3]), ","), "1,2,3");
        assert_eq!(format_id(Some(&[0xFF, 0x80, 0x7F]), " "), "-1 -128 127");
    }

    #[test]
    fn tech_list_prefixes_every_entry() {
        assert_eq!(list_techs(&[], "  -", "\n"), "");
        let techs = vec!["NfcA".to_string(), "Ndef".to_string()];
        assert_eq!(list_techs(&techs, "  -", "\n"), "  -NfcA\n  -Ndef");
    }

    #[test]
    fn ascii_payload_renders_in_every_base() {
        let bytes = b"Hello";
        assert_eq!(single_byte_text(bytes), "Hello");
        assert_eq!(decimal_text(bytes), "72 101 108 108 111 ");
        assert_eq!(hex_text(bytes), "48 65 6c 6c 6f ");
    }

    #[test]
    fn hex_rendering_sign_extends_high_bytes() {
        assert_eq!(hex_text(&[0xFF]), "ffffffff ");
        assert_eq!(hex_text(&[0x80]), "ffffff80 ");
        assert_eq!(hex_text(&[0x00]), "0 ");
        assert_eq!(hex_text(&[]), "");
    }

    #[test]
    fn single_byte_text_keeps_high_bytes_as_latin1() {
        assert_eq!(single_byte_text(&[0xC3, 0xA9]), "\u{c3}\u{a9}");
    }

    #[test]
    fn double_byte_text_combines_big_endian_pairs() {
        assert_eq!(double_byte_text(&[0x00, 0x48, 0x00, 0x69]), "Hi");
        assert_eq!(double_byte_text(&[]), "");
    }

    #[test]
    fn double_byte_text_pads_an_odd_trailing_byte() {
        assert_eq!(double_byte_text(&[0x00, 0x48, 0x04]), "H\u{400}");
    }

    #[test]
    fn double_byte_text_replaces_surrogate_codes() {
        assert_eq!(double_byte_text(&[0xD8, 0x00]), "\u{FFFD}");
        assert_eq!(double_byte_text(&[0xDF, 0xFF]), "\u{FFFD}");
    }

    #[test]
    fn payload_decoding_restarts_pairing_per_record() {
        let records = vec![
            record_with_payload(vec![0x41]),
            record_with_payload(vec![0x42]),
        ];
        let decoded = decode_payloads(&records);
        assert_eq!(decoded.single_byte, "AB");
        assert_eq!(decoded.double_byte, "\u{4100}\u{4200}");
        assert_eq!(decoded.hex, "41 42 ");
        assert_eq!(decoded.decimal, "65 66 ");
    }

    #[test]
    fn no_records_decode_to_empty_strings() {
        assert_eq!(decode_payloads(&[]), DecodedPayload::default());
    }
}
