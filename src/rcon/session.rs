use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

use super::cipher::CipherStream;
use super::{login_command, MAX_KEY_FRAME, MAX_RESPONSE, SUCCESS_MARKER};
use crate::error::{RconError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    /// Key established, login not yet accepted. No commands permitted.
    Authenticating,
    /// Login accepted; commands may be issued, one at a time.
    Ready,
}

/// An authenticated RCON command channel over an obfuscated byte stream.
///
/// The protocol is strictly half-duplex request/response with no length
/// prefixing: one send is paired with exactly one bounded read. There is no
/// partial recovery; any I/O failure poisons the session and the caller
/// must connect again (which also fetches a fresh key; keys are never reused
/// across connections).
#[derive(Debug)]
pub struct RconSession<S> {
    stream: CipherStream<S>,
    timeout: Duration,
    state: SessionState,
}

impl RconSession<TcpStream> {
    /// Open a TCP connection and perform the key handshake. The same bound
    /// covers the connect and every subsequent read on this session.
    pub async fn connect(host: &str, port: u16, io_timeout: Duration) -> Result<Self> {
        let addr = if host.contains(':') {
            // IPv6 literal
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        };

        let stream = timeout(io_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| RconError::Timeout(io_timeout))?
            .map_err(RconError::Connect)?;

        Self::establish(stream, io_timeout).await
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> RconSession<S> {
    /// Perform the key handshake on an already-open transport: read exactly
    /// one inbound frame as the session key. The server sends it unsolicited
    /// and in the clear immediately after accepting the connection.
    pub async fn establish(stream: S, io_timeout: Duration) -> Result<Self> {
        let mut stream = CipherStream::new(stream);

        let key = timeout(io_timeout, stream.recv_raw(MAX_KEY_FRAME))
            .await
            .map_err(|_| RconError::Timeout(io_timeout))??;
        if key.is_empty() {
            return Err(RconError::Protocol("empty key frame".into()));
        }
        trace!(key_len = key.len(), "Session key received");
        stream.set_key(&key)?;

        Ok(Self {
            stream,
            timeout: io_timeout,
            state: SessionState::Authenticating,
        })
    }

    /// Send the login command. Success is recognized by the literal
    /// `SUCCESS` marker in the decoded response; anything else is a
    /// rejection. The session stays in the unauthenticated state on
    /// rejection, but the remote may also close the socket, so callers
    /// should restart the whole handshake rather than retry in place.
    pub async fn authenticate(&mut self, password: &str) -> Result<()> {
        let reply = self.exchange(&login_command(password)).await?;
        if reply.contains(SUCCESS_MARKER) {
            self.state = SessionState::Ready;
            Ok(())
        } else {
            Err(RconError::AuthRejected)
        }
    }

    /// Execute one command and return the decoded response.
    ///
    /// Valid only after a successful `authenticate`; otherwise fails
    /// deterministically without touching the transport. An empty read maps
    /// to an empty string ("no data", not an error). A response larger than
    /// one read arrives truncated, a protocol limitation the caller
    /// tolerates as imperfect-but-valid log content.
    pub async fn execute(&mut self, command: &str) -> Result<String> {
        if self.state != SessionState::Ready {
            return Err(RconError::Protocol(
                "command issued on unauthenticated session".into(),
            ));
        }
        self.exchange(command).await
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Release the transport. Dropping the session has the same effect; the
    /// explicit spelling exists so call sites read as state transitions.
    pub fn close(self) {}

    async fn exchange(&mut self, command: &str) -> Result<String> {
        self.stream.send(command.as_bytes()).await?;
        let raw = timeout(self.timeout, self.stream.recv(MAX_RESPONSE))
            .await
            .map_err(|_| RconError::Timeout(self.timeout))??;
        // Log text may contain arbitrary player input; decode lossily rather
        // than failing the poll on a bad byte.
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}
