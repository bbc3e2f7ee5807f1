// src/apdu.rs
use log::debug;
use pcsc::Card;

// 0x90 0x00 is the success status word.
fn status_ok(response: &[u8]) -> bool {
    response.len() >= 2
        && response[response.len() - 2] == 0x90
        && response[response.len() - 1] == 0x00
}

// Read: FF B0 00 Page Len
pub fn read_binary(card: &Card, page: u8, length: u8) -> Result<Vec<u8>, String> {
    let apdu = [0xFF, 0xB0, 0x00, page, length];
    let mut recv_buffer = [0u8; 256];

    match card.transmit(&apdu, &mut recv_buffer) {
        Ok(resp) => {
            if status_ok(resp) {
                // Return data without status word
                let data = resp[..resp.len() - 2].to_vec();
                debug!("read page {}: {}", page, hex::encode(&data));
                Ok(data)
            } else {
                Err(format!("Read Failed: {:02X?}", resp))
            }
        }
        Err(e) => Err(e.to_string()),
    }
}

// Get Data: FF CA 00 00 00 returns the card UID
pub fn read_uid(card: &Card) -> Result<Vec<u8>, String> {
    let apdu = [0xFF, 0xCA, 0x00, 0x00, 0x00];
    let mut recv_buffer = [0u8; 256];

    match card.transmit(&apdu, &mut recv_buffer) {
        Ok(resp) => {
            if status_ok(resp) {
                Ok(resp[..resp.len() - 2].to_vec())
            } else {
                Err(format!("UID Fetch Failed: {:02X?}", resp))
            }
        }
        Err(e) => Err(e.to_string()),
    }
}
