//! Per-connection protocol loop driving a single board
//!
//! A session announces the board size, then answers `REVEAL` requests one at
//! a time until the game is won, the client hangs up, or the client sends
//! something that is not a reveal request. Recoverable mistakes (bad
//! coordinates, out-of-bounds cells, cards already face up) are answered with
//! an `ERROR` line and the loop continues.

use crate::board::{Board, BoardError, RevealOutcome};
use log::{debug, info, warn};
use shared::{ClientMessage, ProtocolError, ServerMessage, MAX_LINE_LENGTH};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::sleep;

/// Errors that end a session early
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("board out of sync with session: {0}")]
    Desync(#[from] BoardError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Started,
    AwaitRequest,
    Processing,
    GameOver,
    Closed,
}

/// How a session finished when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Every pair was found and `GAME_OVER` was sent
    Completed,
    /// The client closed the connection
    Disconnected,
}

/// One client connection paired with its own board
pub struct Session<S> {
    id: u32,
    stream: BufReader<S>,
    board: Board,
    /// Reveals applied to the board; odd counts open a turn, even counts close it
    reveals: u64,
    state: SessionState,
    mismatch_delay: Duration,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(id: u32, stream: S, board: Board, mismatch_delay: Duration) -> Self {
        Self {
            id,
            stream: BufReader::new(stream),
            board,
            reveals: 0,
            state: SessionState::Started,
            mismatch_delay,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn reveal_count(&self) -> u64 {
        self.reveals
    }

    /// Runs the session to completion
    ///
    /// The session is `Closed` afterwards whatever the outcome. Errors are
    /// logged here as well as returned, so callers that spawn sessions can
    /// drop the result.
    pub async fn run(&mut self) -> Result<SessionEnd, SessionError> {
        info!("Client #{}: session started", self.id);

        let result = self.serve().await;
        self.state = SessionState::Closed;

        match &result {
            Ok(SessionEnd::Completed) => info!(
                "Client #{}: game completed after {} reveals",
                self.id, self.reveals
            ),
            Ok(SessionEnd::Disconnected) => info!(
                "Client #{}: client disconnected ({} of {} pairs found)",
                self.id,
                self.board.matches(),
                self.board.dimension() * self.board.dimension() / 2
            ),
            Err(e) => warn!("Client #{}: session terminated: {}", self.id, e),
        }

        result
    }

    async fn serve(&mut self) -> Result<SessionEnd, SessionError> {
        let dimension = self.board.dimension();
        self.send(ServerMessage::BoardDim { dimension }).await?;
        self.state = SessionState::AwaitRequest;

        let mut buf = Vec::with_capacity(MAX_LINE_LENGTH);
        loop {
            buf.clear();
            if self.read_request(&mut buf).await? == 0 {
                return Ok(SessionEnd::Disconnected);
            }
            let line = std::str::from_utf8(&buf).map_err(|_| ProtocolError::InvalidEncoding)?;
            debug!("Client #{}: received: {}", self.id, line.trim_end());

            self.state = SessionState::Processing;
            self.handle_request(line).await?;

            if self.board.game_over() {
                self.state = SessionState::GameOver;
                self.send(ServerMessage::GameOver).await?;
                self.stream.shutdown().await?;
                return Ok(SessionEnd::Completed);
            }
            self.state = SessionState::AwaitRequest;
        }
    }

    /// Reads one request line into `buf`, returning the bytes read
    ///
    /// At most `MAX_LINE_LENGTH + 1` bytes are buffered; anything longer
    /// is a protocol violation.
    async fn read_request(&mut self, buf: &mut Vec<u8>) -> Result<usize, SessionError> {
        let limit = MAX_LINE_LENGTH as u64 + 1;
        let read = (&mut self.stream).take(limit).read_until(b'\n', buf).await?;
        if read > MAX_LINE_LENGTH {
            return Err(ProtocolError::LineTooLong(MAX_LINE_LENGTH).into());
        }
        Ok(read)
    }

    /// Answers a single request line
    async fn handle_request(&mut self, line: &str) -> Result<(), SessionError> {
        let (row, col) = match line.parse::<ClientMessage>() {
            Ok(ClientMessage::Reveal { row, col }) => (row, col),
            Err(e) if e.is_recoverable() => {
                return self.send(ServerMessage::invalid_coordinate()).await;
            }
            Err(e) => return Err(e.into()),
        };

        let lookup = self
            .board
            .get_card(row, col)
            .map(|card| (card.position(), card.letter(), card.is_hidden()));

        let (position, letter) = match lookup {
            Ok((position, letter, true)) => (position, letter),
            Ok((_, _, false)) => {
                return self.send(ServerMessage::already_revealed(row, col)).await;
            }
            Err(BoardError::OutOfBounds { .. }) => {
                return self.send(ServerMessage::out_of_bounds(row, col)).await;
            }
            Err(e) => return Err(e.into()),
        };

        let outcome = self.board.reveal(row, col)?;
        self.reveals += 1;
        debug!(
            "Client #{}: reveal #{} ({} of pair)\n{}",
            self.id,
            self.reveals,
            if self.reveals % 2 == 1 { "first" } else { "second" },
            self.board
        );

        self.send(ServerMessage::Card { position, letter }).await?;

        match outcome {
            RevealOutcome::Pending { .. } => {}
            RevealOutcome::Match { first, second } => {
                self.send(ServerMessage::Match { first, second }).await?;
            }
            RevealOutcome::Mismatch { first, second } => {
                if !self.mismatch_delay.is_zero() {
                    sleep(self.mismatch_delay).await;
                }
                self.send(ServerMessage::Mismatch { first, second }).await?;
            }
        }

        Ok(())
    }

    async fn send(&mut self, message: ServerMessage) -> Result<(), SessionError> {
        self.stream.write_all(message.to_line().as_bytes()).await?;
        self.stream.flush().await?;
        debug!("Client #{}: sending: {}", self.id, message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use tokio_test::io::Builder;

    fn scenario_board() -> Board {
        Board::from_letters(2, &['A', 'B', 'B', 'A']).unwrap()
    }

    fn session(stream: tokio_test::io::Mock, board: Board) -> Session<tokio_test::io::Mock> {
        Session::new(1, stream, board, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_session_creation() {
        let mock = Builder::new().build();
        let session = session(mock, scenario_board());

        assert_eq!(session.id(), 1);
        assert_eq!(session.state(), SessionState::Started);
        assert_eq!(session.reveal_count(), 0);
        assert_eq!(session.board().dimension(), 2);
    }

    #[tokio::test]
    async fn test_full_game_transcript() {
        let mock = Builder::new()
            .write(b"BOARD_DIM 2\n")
            .read(b"REVEAL 0 0\n")
            .write(b"CARD 0 0 A\n")
            .read(b"REVEAL 0 1\n")
            .write(b"CARD 0 1 B\n")
            .write(b"MISMATCH 0 0 0 1\n")
            .read(b"REVEAL 0 0\n")
            .write(b"CARD 0 0 A\n")
            .read(b"REVEAL 1 1\n")
            .write(b"CARD 1 1 A\n")
            .write(b"MATCH 0 0 1 1\n")
            .read(b"REVEAL 0 1\n")
            .write(b"CARD 0 1 B\n")
            .read(b"REVEAL 1 0\n")
            .write(b"CARD 1 0 B\n")
            .write(b"MATCH 0 1 1 0\n")
            .write(b"GAME_OVER\n")
            .build();

        let mut session = session(mock, scenario_board());
        let end = session.run().await.unwrap();

        assert_eq!(end, SessionEnd::Completed);
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.reveal_count(), 6);
        assert_eq!(session.board().matches(), 2);
        assert!(session.board().game_over());
    }

    #[tokio::test]
    async fn test_disconnect_mid_turn() {
        let mock = Builder::new()
            .write(b"BOARD_DIM 2\n")
            .read(b"REVEAL 1 0\n")
            .write(b"CARD 1 0 B\n")
            .build();

        let mut session = session(mock, scenario_board());
        let end = session.run().await.unwrap();

        assert_eq!(end, SessionEnd::Disconnected);
        assert_eq!(session.reveal_count(), 1);
        assert!(session.board().pending().is_some());
    }

    #[tokio::test]
    async fn test_recoverable_errors_keep_session_open() {
        let mock = Builder::new()
            .write(b"BOARD_DIM 2\n")
            .read(b"REVEAL x 1\n")
            .write(b"ERROR Invalid coordinate\n")
            .read(b"REVEAL 2 0\n")
            .write(b"ERROR Coordinates out of bounds [2][0]\n")
            .read(b"REVEAL -1 0\n")
            .write(b"ERROR Coordinates out of bounds [-1][0]\n")
            .read(b"REVEAL 0 0\n")
            .write(b"CARD 0 0 A\n")
            .read(b"REVEAL 0 0\n")
            .write(b"ERROR Card already revealed [0][0]\n")
            .read(b"REVEAL 1 1\n")
            .write(b"CARD 1 1 A\n")
            .write(b"MATCH 0 0 1 1\n")
            .build();

        let mut session = session(mock, scenario_board());
        let end = session.run().await.unwrap();

        assert_eq!(end, SessionEnd::Disconnected);
        assert_eq!(session.reveal_count(), 2);
        assert_eq!(session.board().matches(), 1);
    }

    #[tokio::test]
    async fn test_unexpected_line_terminates_without_reply() {
        let mock = Builder::new()
            .write(b"BOARD_DIM 2\n")
            .read(b"REVEAL 0 0\n")
            .write(b"CARD 0 0 A\n")
            .read(b"HELLO there\n")
            .build();

        let mut session = session(mock, scenario_board());
        let result = session.run().await;

        assert!(matches!(
            result,
            Err(SessionError::Protocol(ProtocolError::UnexpectedMessage(_)))
        ));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_wrong_token_count_is_fatal() {
        let mock = Builder::new()
            .write(b"BOARD_DIM 2\n")
            .read(b"REVEAL 0\n")
            .build();

        let mut session = session(mock, scenario_board());
        assert!(matches!(
            session.run().await,
            Err(SessionError::Protocol(_))
        ));
        assert_eq!(session.reveal_count(), 0);
    }

    #[tokio::test]
    async fn test_read_error_terminates_session() {
        let mock = Builder::new()
            .write(b"BOARD_DIM 2\n")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();

        let mut session = session(mock, scenario_board());
        assert!(matches!(session.run().await, Err(SessionError::Io(_))));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_write_error_terminates_session() {
        let mock = Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            .build();

        let mut session = session(mock, scenario_board());
        assert!(matches!(session.run().await, Err(SessionError::Io(_))));
    }

    #[tokio::test]
    async fn test_crlf_requests_are_accepted() {
        let mock = Builder::new()
            .write(b"BOARD_DIM 2\n")
            .read(b"REVEAL 0 1\r\n")
            .write(b"CARD 0 1 B\n")
            .build();

        let mut session = session(mock, scenario_board());
        assert_eq!(session.run().await.unwrap(), SessionEnd::Disconnected);
    }

    #[tokio::test]
    async fn test_longest_allowed_line_is_accepted() {
        let mut request = format!("REVEAL 0 {:>width$}", 1, width = MAX_LINE_LENGTH - 10);
        request.push('\n');
        assert_eq!(request.len(), MAX_LINE_LENGTH);

        let mock = Builder::new()
            .write(b"BOARD_DIM 2\n")
            .read(request.as_bytes())
            .write(b"CARD 0 1 B\n")
            .build();

        let mut session = session(mock, scenario_board());
        assert_eq!(session.run().await.unwrap(), SessionEnd::Disconnected);
    }

    #[tokio::test]
    async fn test_overlong_line_terminates_without_reply() {
        let mock = Builder::new()
            .write(b"BOARD_DIM 2\n")
            .read(&vec![b'x'; MAX_LINE_LENGTH + 1])
            .build();

        let mut session = session(mock, scenario_board());
        assert!(matches!(
            session.run().await,
            Err(SessionError::Protocol(ProtocolError::LineTooLong(MAX_LINE_LENGTH)))
        ));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_endless_line_does_not_grow_buffer() {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (mut client_read, mut client_write) = tokio::io::split(client);

        // Never sends a newline; stops only when the session hangs up
        tokio::spawn(async move {
            let chunk = vec![b'x'; 8 * 1024];
            while client_write.write_all(&chunk).await.is_ok() {}
        });

        let mut session = Session::new(1, server, scenario_board(), Duration::ZERO);
        assert!(matches!(
            session.run().await,
            Err(SessionError::Protocol(ProtocolError::LineTooLong(_)))
        ));
        drop(session);

        let mut received = String::new();
        client_read.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "BOARD_DIM 2\n");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_a_protocol_violation() {
        let mock = Builder::new()
            .write(b"BOARD_DIM 2\n")
            .read(b"REVEAL \xff 0\n")
            .build();

        let mut session = session(mock, scenario_board());
        assert!(matches!(
            session.run().await,
            Err(SessionError::Protocol(ProtocolError::InvalidEncoding))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_mismatch_is_delayed() {
        let delay = Duration::from_secs(1);
        let (client, server) = tokio::io::duplex(1024);
        let handle = tokio::spawn(async move {
            let mut session = Session::new(1, server, scenario_board(), delay);
            session.run().await
        });

        let (client_read, mut client_write) = tokio::io::split(client);
        let mut lines = BufReader::new(client_read).lines();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "BOARD_DIM 2");

        // Mismatch: (0,0) is A, (0,1) is B
        let start = tokio::time::Instant::now();
        client_write.write_all(b"REVEAL 0 0\nREVEAL 0 1\n").await.unwrap();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "CARD 0 0 A");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "CARD 0 1 B");
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "MISMATCH 0 0 0 1");
        assert!(start.elapsed() >= delay);

        // Match: (0,0) and (1,1) are both A
        let start = tokio::time::Instant::now();
        client_write.write_all(b"REVEAL 0 0\nREVEAL 1 1\n").await.unwrap();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "CARD 0 0 A");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "CARD 1 1 A");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "MATCH 0 0 1 1");
        assert_eq!(start.elapsed(), Duration::ZERO);

        drop(client_write);
        drop(lines);
        assert_eq!(handle.await.unwrap().unwrap(), SessionEnd::Disconnected);
    }
}
