//! Command/reply engine over one transport.

use super::{ConnectionState, ServerInfo, SmtpStream, connect, connect_tls};
use crate::auth::{AuthExchange, AuthMethod, AuthStep};
use crate::command::{Command, encode_data};
use crate::config::{ClientConfig, Security};
use crate::error::{Error, Result};
use crate::parser::{LineReader, ReplyAssembler};
use crate::types::{Capabilities, Reply, ReplyCode};
use bytes::BytesMut;
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

const READ_CHUNK: usize = 8 * 1024;

/// A live SMTP/LMTP connection.
#[derive(Debug)]
pub struct Connection {
    stream: Option<SmtpStream>,
    read_buf: BytesMut,
    reader: LineReader,
    assembler: ReplyAssembler,
    lines: VecDeque<String>,
    timeout: Duration,
    state: ConnectionState,
    server_info: ServerInfo,
}

impl Connection {
    /// Opens the transport and waits for a `220` greeting.
    ///
    /// The configured timeout covers the connect and the greeting together.
    ///
    /// # Errors
    ///
    /// Returns `ETIMEDOUT` if no greeting arrives in time, `EPROTOCOL` for a
    /// non-220 greeting, `ECONNECTION` if the transport fails and `ETLS` if
    /// implicit TLS fails.
    pub async fn open(config: &ClientConfig) -> Result<Self> {
        tracing::info!(
            host = %config.host,
            port = config.port,
            security = ?config.security,
            "connecting"
        );

        let timeout = config.timeout;
        with_timeout(timeout, async {
            let stream = match config.security {
                Security::Tls => {
                    connect_tls(&config.host, config.port, config.accept_invalid_certs).await?
                }
                Security::None | Security::StartTls => connect(&config.host, config.port).await?,
            };
            let mut conn = Self::from_stream(stream, timeout);
            conn.read_greeting().await?;
            Ok::<_, Error>(conn)
        })
        .await
    }

    /// Wraps an already-connected stream. No greeting is read.
    #[must_use]
    pub fn from_stream(stream: SmtpStream, timeout: Duration) -> Self {
        Self {
            stream: Some(stream),
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            reader: LineReader::new(),
            assembler: ReplyAssembler::new(),
            lines: VecDeque::new(),
            timeout,
            state: ConnectionState::Connecting,
            server_info: ServerInfo::default(),
        }
    }

    /// Returns the protocol state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Sets the protocol state.
    pub const fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
    }

    /// Returns what the server advertised.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Returns the capabilities from the last EHLO/LHLO.
    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.server_info.capabilities
    }

    /// Returns true if the transport is encrypted.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.stream.as_ref().is_some_and(SmtpStream::is_tls)
    }

    async fn read_greeting(&mut self) -> Result<()> {
        let greeting = self.next_reply().await?;
        if greeting.code != ReplyCode::SERVICE_READY {
            return Err(Error::protocol("Invalid greeting", greeting));
        }

        self.server_info.hostname = greeting
            .lines
            .first()
            .and_then(|line| line.split_whitespace().next())
            .unwrap_or_default()
            .to_string();
        self.state = ConnectionState::Greeted;
        Ok(())
    }

    /// Identifies, upgrades to TLS when possible and authenticates.
    ///
    /// Leaves the connection in [`ConnectionState::Ready`].
    ///
    /// # Errors
    ///
    /// Returns `EPROTOCOL` if identification fails, `ETLS` if a required
    /// upgrade is impossible or fails and `EAUTH` if authentication fails.
    pub async fn handshake(&mut self, config: &ClientConfig) -> Result<()> {
        self.identify(config).await?;

        let wants_tls = config.security == Security::StartTls;
        if !self.is_secure() && (wants_tls || !config.ignore_tls) {
            if self.capabilities().supports_starttls() {
                self.starttls(config, wants_tls).await?;
            } else if wants_tls {
                return Err(Error::StartTlsUnavailable);
            }
        }

        if let Some(credentials) = &config.auth {
            self.state = ConnectionState::Authenticating;
            let method = AuthMethod::select(credentials, self.capabilities());
            tracing::debug!(mechanism = %method.mechanism(), "authenticating");

            let mut exchange = AuthExchange::new(method, credentials);
            let mut command = exchange.start();
            loop {
                let reply = self.send_command(&command).await?;
                match exchange.respond(&reply)? {
                    AuthStep::Send(next) => command = next,
                    AuthStep::Done => break,
                }
            }
            tracing::info!(user = credentials.user().unwrap_or_default(), "authenticated");
        }

        self.state = ConnectionState::Ready;
        Ok(())
    }

    async fn identify(&mut self, config: &ClientConfig) -> Result<()> {
        let hostname = config.hostname.clone();
        let (command, verb) = if config.lmtp {
            (Command::Lhlo { hostname: hostname.clone() }, "LHLO")
        } else {
            (Command::Ehlo { hostname: hostname.clone() }, "EHLO")
        };

        let reply = self.send_command(&command).await?;
        if reply.is_success() {
            self.server_info.capabilities = Capabilities::from_ehlo(&reply);
            self.server_info.legacy_helo = false;
            return Ok(());
        }

        let unrecognized = matches!(reply.code, ReplyCode::SYNTAX_ERROR | ReplyCode::NOT_IMPLEMENTED);
        if config.lmtp || !unrecognized {
            return Err(Error::protocol(format!("Failed to identify with {verb}"), reply));
        }

        tracing::debug!("EHLO not supported, falling back to HELO");
        let reply = self.send_command(&Command::Helo { hostname }).await?;
        if !reply.is_success() {
            return Err(Error::protocol("Failed to identify with HELO", reply));
        }
        self.server_info.capabilities = Capabilities::default();
        self.server_info.legacy_helo = true;
        Ok(())
    }

    async fn starttls(&mut self, config: &ClientConfig, required: bool) -> Result<()> {
        let reply = self.send_command(&Command::StartTls).await?;
        if !reply.is_success() {
            if required {
                return Err(Error::starttls_rejected(reply));
            }
            tracing::warn!(%reply, "STARTTLS rejected, continuing without TLS");
            return Ok(());
        }

        let stream = self.stream.take().ok_or(Error::ConnectionClosed)?;
        // Anything buffered before the handshake must not be trusted
        self.reader.clear();
        self.lines.clear();
        let timeout = self.timeout;
        let stream = with_timeout(
            timeout,
            stream.upgrade_to_tls(&config.host, config.accept_invalid_certs),
        )
        .await?;
        self.stream = Some(stream);
        tracing::info!(host = %config.host, "connection upgraded with STARTTLS");

        self.identify(config).await
    }

    /// Sends a command and waits for its reply.
    ///
    /// # Errors
    ///
    /// Returns `ETIMEDOUT`, `ECONNECTION` or `EPROTOCOL` for a malformed
    /// reply. Failure replies are returned as `Ok`.
    pub async fn send_command(&mut self, command: &Command) -> Result<Reply> {
        tracing::debug!("C: {}", command.redacted());
        self.write(&command.serialize()).await?;
        self.read_reply().await
    }

    /// Sends the message body, dot-stuffed and terminated.
    ///
    /// # Errors
    ///
    /// Returns `ETIMEDOUT` or `ECONNECTION`.
    pub async fn send_data(&mut self, message: &[u8]) -> Result<()> {
        tracing::debug!("C: <{} bytes of message data>", message.len());
        self.write(&encode_data(message)).await
    }

    /// Waits for the next reply.
    ///
    /// # Errors
    ///
    /// Returns `ETIMEDOUT` when nothing arrives within the timeout,
    /// `ECONNECTION` when the server hangs up and `EPROTOCOL` for a
    /// malformed reply.
    pub async fn read_reply(&mut self) -> Result<Reply> {
        let timeout = self.timeout;
        with_timeout(timeout, self.next_reply()).await
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let timeout = self.timeout;
        let stream = self.stream.as_mut().ok_or(Error::ConnectionClosed)?;
        with_timeout(timeout, stream.write_all(bytes)).await
    }

    async fn next_reply(&mut self) -> Result<Reply> {
        loop {
            while let Some(line) = self.lines.pop_front() {
                if line.is_empty() && !self.assembler.in_progress() {
                    continue;
                }
                tracing::debug!("S: {line}");
                if let Some(reply) = self.assembler.push_line(&line)? {
                    return Ok(reply);
                }
            }

            let stream = self.stream.as_mut().ok_or(Error::ConnectionClosed)?;
            self.read_buf.clear();
            self.read_buf.reserve(READ_CHUNK);
            if stream.read_buf(&mut self.read_buf).await? == 0 {
                return Err(Error::ConnectionClosed);
            }
            self.lines.extend(self.reader.push(&self.read_buf)?);
        }
    }

    /// Resets the current transaction with `RSET`.
    ///
    /// # Errors
    ///
    /// Returns `EPROTOCOL` if the server refuses.
    pub async fn reset(&mut self) -> Result<()> {
        let reply = self.send_command(&Command::Rset).await?;
        if !reply.is_success() {
            return Err(Error::protocol("RSET failed", reply));
        }
        self.state = ConnectionState::Ready;
        Ok(())
    }

    /// Sends `NOOP`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is no longer usable.
    pub async fn noop(&mut self) -> Result<()> {
        let reply = self.send_command(&Command::Noop).await?;
        if !reply.is_success() {
            return Err(Error::protocol("NOOP failed", reply));
        }
        Ok(())
    }

    /// Sends `QUIT` and closes the transport.
    ///
    /// Never fails; problems are logged.
    pub async fn quit(&mut self) {
        if self.stream.is_some() && self.state.is_open() {
            match self.send_command(&Command::Quit).await {
                Ok(reply) if reply.is_success() => {}
                Ok(reply) => tracing::warn!(%reply, "unexpected QUIT reply"),
                Err(error) => tracing::warn!(%error, "QUIT failed"),
            }
        }
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await;
        }
        self.state = ConnectionState::Closed;
    }

    /// Drops the transport without saying goodbye.
    pub fn abort(&mut self) {
        self.stream = None;
        self.read_buf.clear();
        self.reader.clear();
        self.lines.clear();
        self.assembler = ReplyAssembler::new();
        self.state = ConnectionState::Closed;
    }
}

async fn with_timeout<T>(timeout: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| Error::Timeout(timeout))?
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn pair() -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        let conn = Connection::from_stream(SmtpStream::Tcp(client), Duration::from_secs(5));
        (conn, server)
    }

    #[tokio::test]
    async fn reply_split_across_segments() {
        let (mut conn, mut server) = pair().await;
        tokio::spawn(async move {
            for piece in ["25", "0-mx.test\r", "\n250-SIZE 10", "00\r\n250 AUTH PLAIN\r\n"] {
                server.write_all(piece.as_bytes()).await.unwrap();
                server.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            let mut buf = [0u8; 1];
            let _ = server.read(&mut buf).await;
        });

        let reply = conn.read_reply().await.unwrap();
        assert_eq!(reply.code, ReplyCode::OK);
        assert_eq!(reply.lines, vec!["mx.test", "SIZE 1000", "AUTH PLAIN"]);
    }

    #[tokio::test]
    async fn several_replies_in_one_segment() {
        let (mut conn, mut server) = pair().await;
        server.write_all(b"250 2.1.5 a\r\n550 5.1.1 b\r\n").await.unwrap();

        assert_eq!(conn.read_reply().await.unwrap().code.as_u16(), 250);
        assert_eq!(conn.read_reply().await.unwrap().code.as_u16(), 550);
    }

    #[tokio::test]
    async fn reply_larger_than_read_buffer() {
        let (mut conn, mut server) = pair().await;
        let mut text = String::new();
        for i in 0..299 {
            text.push_str(&format!("250-X-EXTENSION-{i:04} {}\r\n", "v".repeat(40)));
        }
        text.push_str("250 DONE\r\n354 go ahead\r\n");
        assert!(text.len() > READ_CHUNK);
        server.write_all(text.as_bytes()).await.unwrap();

        let reply = conn.read_reply().await.unwrap();
        assert_eq!(reply.lines.len(), 300);
        assert_eq!(reply.lines[299], "DONE");
        assert_eq!(conn.read_reply().await.unwrap().code, ReplyCode::START_DATA);
    }

    #[tokio::test]
    async fn hangup_is_connection_error() {
        let (mut conn, server) = pair().await;
        drop(server);
        let err = conn.read_reply().await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Connection);
    }

    #[tokio::test]
    async fn silence_times_out() {
        let (conn, _server) = pair().await;
        let mut conn = Connection {
            timeout: Duration::from_millis(100),
            ..conn
        };
        let err = conn.read_reply().await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Timeout);
    }

    #[tokio::test]
    async fn abort_closes() {
        let (mut conn, _server) = pair().await;
        conn.abort();
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(!conn.is_secure());
        assert_eq!(conn.noop().await.unwrap_err().code(), ErrorCode::Connection);
        conn.quit().await;
    }
}
