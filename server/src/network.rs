//! Server network layer accepting TCP connections and spawning sessions

use crate::board::{Board, BoardError};
use crate::session::Session;
use log::{error, info};
use shared::{is_valid_dimension, DEFAULT_DIMENSION, DEFAULT_PORT, MISMATCH_DELAY_MS};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};

/// Reasons the server could not start
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] BoardError),
    #[error("could not listen on {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
}

/// Settings shared by every session the server starts
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on, e.g. `127.0.0.1:5555`
    pub address: String,
    /// Board dimension for every new session
    pub dimension: usize,
    /// Pause before a mismatch verdict is sent
    pub mismatch_delay: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: format!("127.0.0.1:{}", DEFAULT_PORT),
            dimension: DEFAULT_DIMENSION,
            mismatch_delay: Duration::from_millis(MISMATCH_DELAY_MS),
        }
    }
}

/// Accepts connections and gives each one an independent game
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    next_session_id: AtomicU32,
}

impl Server {
    /// Validates the configuration and binds the listening socket
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        if !is_valid_dimension(config.dimension) {
            return Err(BoardError::InvalidDimension(config.dimension).into());
        }

        let bind_error = |source| ServerError::Bind {
            address: config.address.clone(),
            source,
        };
        let listener = TcpListener::bind(&config.address).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;
        info!(
            "Concentration server listening on {}, DIM={}",
            local_addr, config.dimension
        );

        Ok(Server {
            listener,
            config,
            next_session_id: AtomicU32::new(1),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Number of connections that have been given a session id
    pub fn sessions_started(&self) -> u32 {
        self.next_session_id.load(Ordering::Relaxed) - 1
    }

    /// Accept loop; never returns
    ///
    /// A failed accept only affects the connection being accepted.
    pub async fn run(&self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => self.spawn_session(stream, addr),
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }

    /// Spawns a task owning the connection and a fresh board
    fn spawn_session(&self, stream: TcpStream, addr: SocketAddr) {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        let board = match Board::new(self.config.dimension) {
            Ok(board) => board,
            Err(e) => {
                error!("Client #{}: could not create board: {}", id, e);
                return;
            }
        };

        info!("Client #{}: connected from {}", id, addr);
        let mismatch_delay = self.config.mismatch_delay;

        tokio::spawn(async move {
            let mut session = Session::new(id, stream, board, mismatch_delay);
            let _ = session.run().await;
        });
    }
}
