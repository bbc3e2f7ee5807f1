mod apdu;
mod decode;
mod mifare;
mod ndef;
mod nfc_service;
mod types;
mod ws;

use crossbeam_channel::unbounded;
use tokio::sync::broadcast;

#[tokio::main]
async fn main() {
    env_logger::init();
    println!("Starting NFC Inspector Service...");

    // Channel: WS -> NFC (Commands)
    // We use Crossbeam (Sync) because NFC thread is blocking
    let (cmd_tx, cmd_rx) = unbounded::<types::NfcCommand>();

    // Channel: NFC -> WS (Events)
    // We use Tokio Broadcast for distribution to WS clients
    let (event_tx, event_rx) = broadcast::channel::<types::OutgoingMessage>(100);

    // The NFC service runs on a plain OS thread; its sibling bridges events
    // from the sync channel into the tokio broadcast channel.
    let event_tx_clone = event_tx.clone();
    std::thread::spawn(move || {
        let (bridge_tx, bridge_rx) = unbounded::<types::OutgoingMessage>();

        std::thread::spawn(move || {
            nfc_service::run(bridge_tx, cmd_rx);
        });

        while let Ok(msg) = bridge_rx.recv() {
            let _ = event_tx_clone.send(msg);
        }
    });

    // Start WebSocket Server
    ws::start_server(cmd_tx, event_rx).await;
}
