//! Server network layer: TCP framing, connection tasks, and the coordination loop.
//!
//! Every connection gets a reader task and a writer task; both talk to the
//! single coordination loop through channels. The loop owns the room registry
//! outright, so all room mutation is serialized here and the rooms themselves
//! never see a socket or a lock.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared::{ClientPacket, PlayerId, PlayerInfo, ServerPacket, MAX_FRAME_BYTES};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::registry::RoomRegistry;
use crate::room::{Effects, RoomError, TimerEffect};

/// Messages sent from connection and timer tasks to the coordination loop
#[derive(Debug)]
pub enum SessionMessage {
    Connected {
        conn_id: PlayerId,
        sender: mpsc::UnboundedSender<ServerPacket>,
    },
    Intent {
        conn_id: PlayerId,
        packet: ClientPacket,
    },
    Disconnected {
        conn_id: PlayerId,
    },
    WritingDeadline {
        room_code: String,
        round: u32,
    },
}

/// Writes one length-prefixed bincode frame.
pub async fn write_packet<S, T>(stream: &mut S, packet: &T) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serialize(packet).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if body.len() > MAX_FRAME_BYTES {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "frame too large"));
    }
    stream.write_all(&(body.len() as u32).to_le_bytes()).await?;
    stream.write_all(&body).await?;
    stream.flush().await?;
    Ok(())
}

/// Reads one length-prefixed bincode frame; `Ok(None)` on clean end of stream.
pub async fn read_packet<S, T>(stream: &mut S) -> io::Result<Option<T>>
where
    S: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut header = [0u8; 4];
    match stream.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "frame too large"));
    }
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;
    let packet = deserialize(&body).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(Some(packet))
}

/// Milliseconds since the Unix epoch.
pub fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

/// Main server: accepts connections and runs the coordination loop.
pub struct Server {
    listener: Arc<TcpListener>,
    registry: RoomRegistry,
    connections: HashMap<PlayerId, mpsc::UnboundedSender<ServerPacket>>,
    deadline_timers: HashMap<String, JoinHandle<()>>,

    server_tx: mpsc::UnboundedSender<SessionMessage>,
    server_rx: mpsc::UnboundedReceiver<SessionMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        writing_duration: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = Arc::new(TcpListener::bind(addr).await?);
        info!("Server listening on {}", listener.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            registry: RoomRegistry::new(writing_duration),
            connections: HashMap::new(),
            deadline_timers: HashMap::new(),
            server_tx,
            server_rx,
        })
    }

    /// The bound address; useful when the port was picked by the OS.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Spawns the task that accepts connections and hands each one its
    /// reader/writer tasks.
    fn spawn_acceptor(&self) {
        let listener = Arc::clone(&self.listener);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut next_conn_id: PlayerId = 1;

            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let conn_id = next_conn_id;
                        next_conn_id += 1;
                        info!("Connection {} accepted from {}", conn_id, addr);
                        spawn_connection(conn_id, stream, server_tx.clone());
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Main loop: every room mutation in the process happens on this task.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_acceptor();
        info!("Server started successfully");

        while let Some(message) = self.server_rx.recv().await {
            match message {
                SessionMessage::Connected { conn_id, sender } => {
                    self.connections.insert(conn_id, sender);
                    debug!(
                        "Connection {} registered, {} online",
                        conn_id,
                        self.connections.len()
                    );
                }
                SessionMessage::Intent { conn_id, packet } => {
                    self.handle_intent(conn_id, packet);
                }
                SessionMessage::Disconnected { conn_id } => {
                    self.connections.remove(&conn_id);
                    info!(
                        "Connection {} closed, {} online",
                        conn_id,
                        self.connections.len()
                    );
                    let effects = self.registry.remove_connection(conn_id);
                    self.apply_effects(effects);
                }
                SessionMessage::WritingDeadline { room_code, round } => {
                    self.deadline_timers.remove(&room_code);
                    let effects = self.registry.writing_deadline(&room_code, round);
                    self.apply_effects(effects);
                }
            }
        }

        info!("Server shutting down");
        Ok(())
    }

    fn handle_intent(&mut self, conn_id: PlayerId, packet: ClientPacket) {
        match packet {
            ClientPacket::CreateRoom { name, avatar } => {
                let host = PlayerInfo {
                    id: conn_id,
                    name,
                    avatar,
                };
                let (code, effects) = self.registry.create_room(host);
                debug!("Connection {} opened room {}", conn_id, code);
                self.apply_effects(effects);
            }
            ClientPacket::JoinRoom {
                room_code,
                name,
                avatar,
            } => {
                let player = PlayerInfo {
                    id: conn_id,
                    name,
                    avatar,
                };
                let result = self.registry.join_room(&room_code, player);
                self.apply_result(conn_id, result);
            }
            ClientPacket::StartGame { room_code } => {
                let result = self.registry.start_game(&room_code, conn_id, epoch_ms());
                self.apply_result(conn_id, result);
            }
            ClientPacket::SubmitText { room_code, text } => {
                let result = self.registry.submit_story(&room_code, conn_id, text);
                self.apply_result(conn_id, result);
            }
            ClientPacket::SubmitGuess { room_code, guess } => {
                let result = self.registry.submit_guess(&room_code, conn_id, guess);
                self.apply_result(conn_id, result);
            }
            ClientPacket::AdvanceResults { room_code } => {
                let result = self.registry.advance_results(&room_code, conn_id);
                self.apply_result(conn_id, result);
            }
            ClientPacket::RequestLeaderboard { room_code } => {
                let result = self.registry.request_leaderboard(&room_code, conn_id);
                self.apply_result(conn_id, result);
            }
            ClientPacket::NewGame { room_code } => {
                let result = self.registry.new_game(&room_code, conn_id);
                self.apply_result(conn_id, result);
            }
        }
    }

    fn apply_result(&mut self, conn_id: PlayerId, result: Result<Effects, RoomError>) {
        match result {
            Ok(effects) => self.apply_effects(effects),
            // Stale ids are dropped quietly; everything else goes back to the
            // sender as a user-visible room error.
            Err(RoomError::NoSuchParticipant) => {
                debug!("Connection {}: stale intent ignored", conn_id);
            }
            Err(err) => {
                debug!("Connection {}: rejected: {}", conn_id, err);
                self.send_to(
                    conn_id,
                    ServerPacket::RoomError {
                        message: err.to_string(),
                    },
                );
            }
        }
    }

    fn apply_effects(&mut self, effects: Effects) {
        for outbound in effects.outbound {
            self.send_to(outbound.to, outbound.event);
        }
        match effects.timer {
            TimerEffect::Keep => {}
            TimerEffect::Arm {
                room_code,
                round,
                deadline_epoch_ms,
            } => self.arm_deadline(room_code, round, deadline_epoch_ms),
            TimerEffect::Cancel { room_code } => self.cancel_deadline(&room_code),
        }
    }

    fn send_to(&mut self, conn_id: PlayerId, event: ServerPacket) {
        if let Some(sender) = self.connections.get(&conn_id) {
            if sender.send(event).is_err() {
                // Writer task is gone; the reader side will report the
                // disconnect shortly.
                debug!("Connection {}: outbound queue closed", conn_id);
            }
        }
    }

    fn arm_deadline(&mut self, room_code: String, round: u32, deadline_epoch_ms: u64) {
        self.cancel_deadline(&room_code);

        let server_tx = self.server_tx.clone();
        let wait = Duration::from_millis(deadline_epoch_ms.saturating_sub(epoch_ms()));
        debug!(
            "Room {}: deadline timer armed for round {} ({}ms)",
            room_code,
            round,
            wait.as_millis()
        );
        let code = room_code.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            let _ = server_tx.send(SessionMessage::WritingDeadline {
                room_code: code,
                round,
            });
        });
        self.deadline_timers.insert(room_code, handle);
    }

    fn cancel_deadline(&mut self, room_code: &str) {
        if let Some(handle) = self.deadline_timers.remove(room_code) {
            handle.abort();
            debug!("Room {}: deadline timer cancelled", room_code);
        }
    }
}

fn spawn_connection(
    conn_id: PlayerId,
    stream: TcpStream,
    server_tx: mpsc::UnboundedSender<SessionMessage>,
) {
    let (mut reader, mut writer) = stream.into_split();
    let (conn_tx, mut conn_rx) = mpsc::unbounded_channel::<ServerPacket>();

    if server_tx
        .send(SessionMessage::Connected {
            conn_id,
            sender: conn_tx,
        })
        .is_err()
    {
        return;
    }

    // Writer task: drains this connection's outbound queue. Dropping the
    // sender in the coordination loop ends it.
    tokio::spawn(async move {
        while let Some(event) = conn_rx.recv().await {
            if let Err(e) = write_packet(&mut writer, &event).await {
                debug!("Connection {}: write failed: {}", conn_id, e);
                break;
            }
        }
    });

    // Reader task: frames become intents until EOF or error, then the
    // disconnect is reported exactly once.
    tokio::spawn(async move {
        loop {
            match read_packet::<_, ClientPacket>(&mut reader).await {
                Ok(Some(packet)) => {
                    if server_tx
                        .send(SessionMessage::Intent { conn_id, packet })
                        .is_err()
                    {
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Connection {}: read failed: {}", conn_id, e);
                    break;
                }
            }
        }
        let _ = server_tx.send(SessionMessage::Disconnected { conn_id });
    });
}
