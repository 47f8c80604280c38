//! Connection to the server and the event channel feeding the render loop
//!
//! The network side runs on its own thread with its own tokio runtime. The
//! render loop talks to it through two unbounded channels: reveal requests go
//! out as [`ClientMessage`]s, everything the server says comes back as
//! [`GameEvent`]s.

use log::{debug, error, info, warn};
use shared::{ClientMessage, Position, ProtocolError, ServerMessage};
use std::thread;
use thiserror::Error;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines, ReadHalf, WriteHalf,
};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("expected BOARD_DIM, got {0}")]
    Handshake(String),
    #[error("server closed the connection")]
    Closed,
}

/// Something the render loop needs to know about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    Message(ServerMessage),
    /// The connection failed or the server sent a line we could not read
    Failed(String),
    /// The server closed the connection
    Disconnected,
}

/// An open connection past the `BOARD_DIM` handshake
pub struct Connection<S> {
    lines: Lines<BufReader<ReadHalf<S>>>,
    writer: WriteHalf<S>,
}

impl Connection<TcpStream> {
    pub async fn connect(address: &str) -> Result<(Self, usize), ClientError> {
        let stream = TcpStream::connect(address).await?;
        info!("Connected to {}", address);
        Self::handshake(stream).await
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite,
{
    /// Waits for the board size announcement
    pub async fn handshake(stream: S) -> Result<(Self, usize), ClientError> {
        let (reader, writer) = tokio::io::split(stream);
        let mut lines = BufReader::new(reader).lines();

        let line = lines.next_line().await?.ok_or(ClientError::Closed)?;
        match line.parse::<ServerMessage>()? {
            ServerMessage::BoardDim { dimension } => Ok((Self { lines, writer }, dimension)),
            other => Err(ClientError::Handshake(other.to_string())),
        }
    }

    /// Relays commands to the server and server lines to `events`
    ///
    /// Stops after `GAME_OVER`, when the server hangs up, on an I/O error, or
    /// when the render loop drops its end of either channel.
    pub async fn run(
        mut self,
        mut commands: UnboundedReceiver<ClientMessage>,
        events: UnboundedSender<GameEvent>,
    ) {
        loop {
            tokio::select! {
                line = self.lines.next_line() => {
                    let event = match line {
                        Ok(Some(line)) => {
                            debug!("Received: {}", line);
                            match line.parse::<ServerMessage>() {
                                Ok(message) => GameEvent::Message(message),
                                Err(e) => GameEvent::Failed(e.to_string()),
                            }
                        }
                        Ok(None) => GameEvent::Disconnected,
                        Err(e) => GameEvent::Failed(e.to_string()),
                    };

                    let finished = matches!(
                        event,
                        GameEvent::Message(ServerMessage::GameOver)
                            | GameEvent::Failed(_)
                            | GameEvent::Disconnected
                    );
                    if events.send(event).is_err() || finished {
                        break;
                    }
                }
                command = commands.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    debug!("Sending: {}", command);
                    let line = format!("{}\n", command);
                    if let Err(e) = self.writer.write_all(line.as_bytes()).await {
                        error!("Error sending request: {}", e);
                        let _ = events.send(GameEvent::Failed(e.to_string()));
                        break;
                    }
                }
            }
        }

        let _ = self.writer.shutdown().await;
        info!("Connection closed");
    }
}

/// Handle held by the render loop
pub struct Controller {
    commands: UnboundedSender<ClientMessage>,
    events: UnboundedReceiver<GameEvent>,
}

impl Controller {
    /// Starts the network thread
    ///
    /// The first event is the `BOARD_DIM` announcement, or a failure if the
    /// server could not be reached.
    pub fn start(address: String) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    let _ = event_tx.send(GameEvent::Failed(e.to_string()));
                    return;
                }
            };

            runtime.block_on(async move {
                match Connection::connect(&address).await {
                    Ok((connection, dimension)) => {
                        let announcement = ServerMessage::BoardDim { dimension };
                        if event_tx.send(GameEvent::Message(announcement)).is_ok() {
                            connection.run(command_rx, event_tx).await;
                        }
                    }
                    Err(e) => {
                        error!("Cannot connect to {}: {}", address, e);
                        let _ = event_tx.send(GameEvent::Failed(e.to_string()));
                    }
                }
            });
        });

        Self {
            commands: command_tx,
            events: event_rx,
        }
    }

    /// Queues a reveal request; false if the connection is gone
    pub fn request_reveal(&self, position: Position) -> bool {
        let (Ok(row), Ok(col)) = (i32::try_from(position.row), i32::try_from(position.col)) else {
            warn!("Position [{}] does not fit the protocol", position);
            return false;
        };
        self.commands.send(ClientMessage::Reveal { row, col }).is_ok()
    }

    /// Drains every event received since the last call
    pub fn poll_events(&mut self) -> Vec<GameEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_handshake_reads_dimension() {
        let (client, mut server) = duplex(256);
        server.write_all(b"BOARD_DIM 6\n").await.unwrap();

        let (_, dimension) = Connection::handshake(client).await.unwrap();
        assert_eq!(dimension, 6);
    }

    #[tokio::test]
    async fn test_handshake_rejects_other_messages() {
        let (client, mut server) = duplex(256);
        server.write_all(b"GAME_OVER\n").await.unwrap();

        let result = Connection::handshake(client).await;
        assert!(matches!(result, Err(ClientError::Handshake(_))));
    }

    #[tokio::test]
    async fn test_handshake_on_closed_connection() {
        let (client, server) = duplex(256);
        drop(server);

        let result = Connection::handshake(client).await;
        assert!(matches!(result, Err(ClientError::Closed)));
    }

    #[tokio::test]
    async fn test_run_relays_requests_and_events() {
        let (client, server) = duplex(1024);
        let (server_read, mut server_write) = tokio::io::split(server);
        let mut server_lines = BufReader::new(server_read).lines();

        server_write.write_all(b"BOARD_DIM 2\n").await.unwrap();
        let (connection, _) = Connection::handshake(client).await.unwrap();

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(connection.run(command_rx, event_tx));

        command_tx
            .send(ClientMessage::Reveal { row: 0, col: 1 })
            .unwrap();
        let request = server_lines.next_line().await.unwrap().unwrap();
        assert_eq!(request, "REVEAL 0 1");

        server_write.write_all(b"CARD 0 1 B\n").await.unwrap();
        assert_eq!(
            event_rx.recv().await,
            Some(GameEvent::Message(ServerMessage::Card {
                position: Position::new(0, 1),
                letter: 'B'
            }))
        );

        server_write.write_all(b"GAME_OVER\n").await.unwrap();
        assert_eq!(
            event_rx.recv().await,
            Some(GameEvent::Message(ServerMessage::GameOver))
        );

        task.await.unwrap();
        assert_eq!(event_rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_run_reports_disconnect() {
        let (client, mut server) = duplex(256);
        server.write_all(b"BOARD_DIM 2\n").await.unwrap();
        let (connection, _) = Connection::handshake(client).await.unwrap();

        let (_command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        drop(server);

        connection.run(command_rx, event_tx).await;
        assert_eq!(event_rx.recv().await, Some(GameEvent::Disconnected));
    }

    #[tokio::test]
    async fn test_run_reports_unreadable_lines() {
        let (client, mut server) = duplex(256);
        server.write_all(b"BOARD_DIM 2\nWHAT 1\n").await.unwrap();
        let (connection, _) = Connection::handshake(client).await.unwrap();

        let (_command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();

        connection.run(command_rx, event_tx).await;
        assert!(matches!(event_rx.recv().await, Some(GameEvent::Failed(_))));
    }

    #[tokio::test]
    async fn test_run_stops_when_commands_close() {
        let (client, mut server) = duplex(256);
        server.write_all(b"BOARD_DIM 2\n").await.unwrap();
        let (connection, _) = Connection::handshake(client).await.unwrap();

        let (command_tx, command_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let (event_tx, _event_rx) = mpsc::unbounded_channel();
        drop(command_tx);

        connection.run(command_rx, event_tx).await;
    }
}
