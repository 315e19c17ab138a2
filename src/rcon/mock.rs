// In-process RCON server for tests

use crate::rcon::packet::{
    Packet, AUTH_FAILED_ID, SERVERDATA_AUTH_RESPONSE, SERVERDATA_RESPONSE_VALUE,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy)]
pub enum MockMode {
    /// Answer `players` with an empty list and echo anything else
    Answer,
    /// Accept auth, never answer commands
    Silent,
}

pub struct MockServer {
    port: u16,
    log: Arc<Mutex<Vec<String>>>,
    closed_rx: mpsc::UnboundedReceiver<()>,
}

impl MockServer {
    pub async fn spawn(password: &'static str, mode: MockMode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let log = Arc::new(Mutex::new(Vec::new()));
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();

        let server_log = log.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(handle_connection(
                    socket,
                    password,
                    mode,
                    server_log.clone(),
                    closed_tx.clone(),
                ));
            }
        });

        Self {
            port,
            log,
            closed_rx,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// "recv <cmd>" / "sent <cmd>" entries in the order they happened
    pub fn received(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub async fn wait_closed(&mut self) {
        self.closed_rx.recv().await;
    }
}

async fn handle_connection(
    mut socket: TcpStream,
    password: &'static str,
    mode: MockMode,
    log: Arc<Mutex<Vec<String>>>,
    closed_tx: mpsc::UnboundedSender<()>,
) {
    let auth = match Packet::read_from(&mut socket).await {
        Ok(packet) => packet,
        Err(_) => return,
    };

    if auth.body != password {
        let _ = Packet::new(AUTH_FAILED_ID, SERVERDATA_AUTH_RESPONSE, "")
            .write_to(&mut socket)
            .await;
        return;
    }

    let _ = Packet::new(auth.id, SERVERDATA_RESPONSE_VALUE, "")
        .write_to(&mut socket)
        .await;
    let _ = Packet::new(auth.id, SERVERDATA_AUTH_RESPONSE, "")
        .write_to(&mut socket)
        .await;

    loop {
        let request = match Packet::read_from(&mut socket).await {
            Ok(packet) => packet,
            Err(_) => {
                let _ = closed_tx.send(());
                return;
            }
        };
        log.lock().unwrap().push(format!("recv {}", request.body));

        if let MockMode::Silent = mode {
            continue;
        }

        tokio::time::sleep(Duration::from_millis(30)).await;
        let reply = match request.body.as_str() {
            "players" => "Players connected (0):\n".to_string(),
            other => format!("{}\n", other),
        };
        log.lock().unwrap().push(format!("sent {}", request.body));
        let _ = Packet::new(request.id, SERVERDATA_RESPONSE_VALUE, reply)
            .write_to(&mut socket)
            .await;
    }
}
