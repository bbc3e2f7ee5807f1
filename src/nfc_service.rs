// src/nfc_service.rs
use std::ffi::{CStr, CString};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};
use pcsc::{Context, PNP_NOTIFICATION, Protocols, ReaderState, Scope, ShareMode, State};

use crate::mifare::{self, MemoryDump, PcscUltralight};
use crate::types::{
    CARD_TYPE_MIFARE_1K, CARD_TYPE_ULTRALIGHT, NfcCommand, OutgoingMessage, ScannedTag,
};
use crate::{apdu, decode, ndef};

// Display contract for the TAG_INFO strings.
const TECH_PREFIX: &str = "  -";
const TECH_SEPARATOR: &str = "\n";
const ID_SEPARATOR: &str = " ";

pub fn run(tx: Sender<OutgoingMessage>, rx: Receiver<NfcCommand>) {
    info!("Starting NFC Service (Event Driven)...");

    let ctx = match Context::establish(Scope::User) {
        Ok(ctx) => ctx,
        Err(err) => {
            error!("Failed to establish context: {}", err);
            let _ = tx.send(OutgoingMessage::READER_ERROR {
                error: err.to_string(),
            });
            return;
        }
    };

    let mut readers_buf = [0; 2048];
    let mut reader_names: Vec<CString> = Vec::new();

    // Index 0 tracks hardware plug/unplug, indices 1.. track the readers.
    let mut reader_states = vec![ReaderState::new(PNP_NOTIFICATION(), State::UNAWARE)];

    loop {
        // 1. Wait for State Change
        if let Err(err) = ctx.get_status_change(Duration::from_millis(500), &mut reader_states) {
            if err != pcsc::Error::Timeout {
                error!("PCSC Error: {}", err);
                std::thread::sleep(Duration::from_secs(1));
                continue;
            }
        }

        // 2. CHECK FOR COMMANDS
        while let Ok(cmd) = rx.try_recv() {
            match cmd {
                NfcCommand::CheckReaderStatus => {
                    refresh_readers(
                        &ctx,
                        &mut readers_buf,
                        &mut reader_names,
                        &mut reader_states,
                        &tx,
                    );
                }
            }
        }

        // 3. PROCESS EVENTS
        let mut readers_changed = false;

        // Check PnP (Index 0)
        if reader_states[0].event_state().intersects(State::CHANGED) {
            info!("Hardware change detected");
            readers_changed = true;
            reader_states[0].sync_current_state();
        }

        // Check Readers (Indices 1..)
        for i in 1..reader_states.len() {
            let name = reader_names[i - 1].clone();
            let rs = &reader_states[i];

            if rs.event_state().intersects(State::CHANGED) {
                let current = rs.event_state();

                // Card Inserted
                if current.intersects(State::PRESENT)
                    && !rs.current_state().intersects(State::PRESENT)
                {
                    info!("Card Inserted on {:?}", name);
                    handle_card_insertion(&ctx, &name, &tx);
                }

                // Card Removed
                if current.intersects(State::EMPTY)
                    && rs.current_state().intersects(State::PRESENT)
                {
                    info!("Card Removed from {:?}", name);
                    let _ = tx.send(OutgoingMessage::CARD_STATUS {
                        success: false,
                        message: "Card removed!".into(),
                    });
                }

                reader_states[i].sync_current_state();
            }
        }

        // 4. REFRESH LIST
        if readers_changed {
            refresh_readers(
                &ctx,
                &mut readers_buf,
                &mut reader_names,
                &mut reader_states,
                &tx,
            );
        }
    }
}

// Rebuilds the reader list and its tracked states in lockstep. The PnP
// entry at index 0 survives every refresh.
fn refresh_readers(
    ctx: &Context,
    readers_buf: &mut [u8],
    reader_names: &mut Vec<CString>,
    reader_states: &mut Vec<ReaderState>,
    tx: &Sender<OutgoingMessage>,
) {
    match ctx.list_readers(readers_buf) {
        Ok(iter) => {
            *reader_names = iter.map(CString::from).collect();

            reader_states.truncate(1);
            for name in reader_names.iter() {
                reader_states.push(ReaderState::new(name.clone(), State::UNAWARE));
            }

            let _ = tx.send(OutgoingMessage::READER_STATUS {
                success: !reader_names.is_empty(),
            });
        }
        Err(err) => {
            warn!("Failed to list readers: {}", err);
            reader_names.clear();
            reader_states.truncate(1);
            let _ = tx.send(OutgoingMessage::READER_STATUS { success: false });
        }
    }
}

fn handle_card_insertion(ctx: &Context, reader_name: &CStr, tx: &Sender<OutgoingMessage>) {
    let _ = tx.send(OutgoingMessage::CARD_STATUS {
        success: true,
        message: "Card detected!".into(),
    });

    let (tag, card_type) = match snapshot_tag(ctx, reader_name) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!("Failed to inspect card: {}", e);
            let _ = tx.send(OutgoingMessage::READER_ERROR { error: e });
            return;
        }
    };

    let _ = tx.send(OutgoingMessage::TAG_INFO {
        id: decode::format_id(Some(&tag.uid), ID_SEPARATOR),
        technologies: decode::list_techs(&tag.technologies, TECH_PREFIX, TECH_SEPARATOR),
    });

    if card_type != CARD_TYPE_ULTRALIGHT {
        let _ = tx.send(OutgoingMessage::CARD_STATUS {
            success: true,
            message: format!("No page dump for {} tags", family_name(&card_type)),
        });
        return;
    }

    let mut session = PcscUltralight::new(ctx, reader_name);
    match mifare::read_dump(&mut session) {
        Ok(dump) => {
            for msg in messages_for_dump(&dump) {
                let _ = tx.send(msg);
            }
        }
        Err(e) => {
            let _ = tx.send(OutgoingMessage::DUMP_READ_ERROR {
                error: e.to_string(),
            });
        }
    }
}

// One brief session to pull the ATR family byte and the UID.
fn snapshot_tag(ctx: &Context, reader_name: &CStr) -> Result<(ScannedTag, String), String> {
    let card = ctx
        .connect(reader_name, ShareMode::Shared, Protocols::ANY)
        .map_err(|e| format!("Failed to connect to card: {}", e))?;

    let mut names_buf = [0u8; 128];
    let mut atr_buf = [0u8; 64];
    let card_type = match card.status2(&mut names_buf, &mut atr_buf) {
        Ok(status) => {
            let atr = status.atr();
            if let Some(last) = atr.last() {
                format!("{:x}", last)
            } else {
                "unknown".into()
            }
        }
        Err(_) => "unknown".into(),
    };

    let uid = apdu::read_uid(&card)?;
    debug!("card uid {} (type {})", hex::encode(&uid), card_type);

    let tag = ScannedTag {
        uid,
        technologies: technologies_for(&card_type),
    };
    Ok((tag, card_type))
}

// Technology names announced for each ATR family byte.
fn technologies_for(card_type: &str) -> Vec<String> {
    match card_type {
        CARD_TYPE_ULTRALIGHT => vec![
            "ISO 14443-3 Type A".to_string(),
            "MIFARE Ultralight / NTAG".to_string(),
            "NDEF".to_string(),
        ],
        CARD_TYPE_MIFARE_1K => vec![
            "ISO 14443-3 Type A".to_string(),
            "MIFARE Classic 1K".to_string(),
        ],
        _ => Vec::new(),
    }
}

fn family_name(card_type: &str) -> &'static str {
    match card_type {
        CARD_TYPE_ULTRALIGHT => "MIFARE Ultralight / NTAG",
        CARD_TYPE_MIFARE_1K => "MIFARE Classic 1K",
        _ => "unknown",
    }
}

// Everything the client hears about one successful dump: one MESSAGE_INFO
// per NDEF message, then the raw dump renderings.
fn messages_for_dump(dump: &MemoryDump) -> Vec<OutgoingMessage> {
    let mut out = Vec::new();

    match ndef::parse_messages(dump.user_memory()) {
        Ok(messages) => {
            for message in &messages {
                let Some(first) = message.records.first() else {
                    continue;
                };
                out.push(OutgoingMessage::MESSAGE_INFO {
                    tnf: decode::tnf_label(first.tnf),
                    id: decode::format_id(first.id.as_deref(), ID_SEPARATOR),
                    record_type: decode::record_type_label(&first.record_type, first.tnf),
                    payload: decode::decode_payloads(&message.records),
                });
            }
        }
        Err(e) => warn!("tag memory is not valid NDEF: {}", e),
    }

    let decoded = dump.decode();
    out.push(OutgoingMessage::DUMP_READ_SUCCESS {
        text: decoded.text,
        hex: decoded.hex,
    });

    out
}
