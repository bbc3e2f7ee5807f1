// src/ws.rs
use std::sync::Arc;

use crossbeam_channel::Sender;
use futures::{SinkExt, StreamExt};
use log::warn;
use tokio::sync::broadcast;
use warp::Filter;

use crate::types::{IncomingMessage, NfcCommand, OutgoingMessage};

pub async fn start_server(
    nfc_cmd_tx: Sender<NfcCommand>,
    mut nfc_event_rx: broadcast::Receiver<OutgoingMessage>,
) {
    // Shared Broadcast Channel for WS Clients
    let (ws_tx, _) = broadcast::channel::<OutgoingMessage>(32);
    let ws_tx = Arc::new(ws_tx);

    // 1. Task to forward NFC Events -> All WS Clients
    let ws_tx_clone = ws_tx.clone();
    tokio::spawn(async move {
        while let Ok(msg) = nfc_event_rx.recv().await {
            let _ = ws_tx_clone.send(msg);
        }
    });

    // 2. WS Route on the root path "/"
    let ws_route = warp::path::end()
        .and(warp::ws())
        .map(move |ws: warp::ws::Ws| {
            let nfc_cmd_tx = nfc_cmd_tx.clone();
            let ws_tx = ws_tx.clone();

            ws.on_upgrade(move |socket| handle_connection(socket, nfc_cmd_tx, ws_tx))
        });

    let routes = ws_route.with(warp::cors().allow_any_origin());

    println!("WebSocket server running on ws://127.0.0.1:3500");
    warp::serve(routes).run(([127, 0, 0, 1], 3500)).await;
}

async fn handle_connection(
    ws: warp::ws::WebSocket,
    nfc_cmd_tx: Sender<NfcCommand>,
    ws_tx: Arc<broadcast::Sender<OutgoingMessage>>,
) {
    let (mut client_ws_tx, mut client_ws_rx) = ws.split();
    let mut rx_broadcast = ws_tx.subscribe();

    // Forward broadcasts -> this client until its socket goes away.
    tokio::spawn(async move {
        while let Ok(msg) = rx_broadcast.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    warn!("failed to serialize outgoing message: {}", e);
                    continue;
                }
            };
            if client_ws_tx
                .send(warp::ws::Message::text(json))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    // Handle incoming messages from Client
    while let Some(result) = client_ws_rx.next().await {
        let Ok(msg) = result else {
            continue;
        };
        if !msg.is_text() {
            continue;
        }
        let Ok(text) = msg.to_str() else {
            continue;
        };
        if let Ok(parsed) = serde_json::from_str::<IncomingMessage>(text) {
            match parsed {
                IncomingMessage::GET_READER_STATUS => {
                    let _ = nfc_cmd_tx.send(NfcCommand::CheckReaderStatus);
                }
            }
        }
    }
}
