//! High-level client: connect, handshake and run one mail transaction.

use crate::command::Command;
use crate::config::ClientConfig;
use crate::connection::{Connection, ConnectionState};
use crate::envelope::{Delivery, Envelope};
use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};
use courier_mime::{BuildOptions, Mail, ParsedAddress};

/// What to send.
///
/// The structured [`Mail`] is always used to resolve the envelope. When
/// `raw` is set the message is not composed: those bytes go out as-is.
#[derive(Debug, Clone, Default)]
pub struct SendRequest {
    /// Structured message.
    pub mail: Mail,
    /// Pre-built RFC 5322 message.
    pub raw: Option<Vec<u8>>,
    /// Explicit envelope; fields left empty fall back to the headers.
    pub envelope: Option<Envelope>,
}

impl SendRequest {
    /// Creates a request for a structured message.
    #[must_use]
    pub fn new(mail: Mail) -> Self {
        Self {
            mail,
            raw: None,
            envelope: None,
        }
    }

    /// Sends `raw` instead of composing the message.
    #[must_use]
    pub fn with_raw(mut self, raw: impl Into<Vec<u8>>) -> Self {
        self.raw = Some(raw.into());
        self
    }

    /// Overrides the envelope.
    #[must_use]
    pub fn with_envelope(mut self, envelope: Envelope) -> Self {
        self.envelope = Some(envelope);
        self
    }
}

impl From<Mail> for SendRequest {
    fn from(mail: Mail) -> Self {
        Self::new(mail)
    }
}

/// Outcome of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    /// Recipients the server accepted.
    pub accepted: Vec<String>,
    /// Recipients the server rejected.
    pub rejected: Vec<String>,
    /// Rejecting reply for each entry of `rejected`.
    pub rejected_replies: Vec<(String, Reply)>,
    /// Envelope actually used.
    pub envelope: Envelope,
    /// Final server reply.
    pub response: String,
    /// Message-ID of the composed message; `None` for raw messages.
    pub message_id: Option<String>,
}

/// SMTP/LMTP client.
///
/// Holds at most one connection. A successful `send` leaves it open so the
/// next `send` reuses it after `RSET`; any error tears it down and the next
/// call reconnects.
///
/// # Example
///
/// ```no_run
/// use courier_smtp::{Client, ClientConfig, Credentials};
/// use courier_mime::Mail;
///
/// # async fn example() -> courier_smtp::Result<()> {
/// let config = ClientConfig::builder("smtp.example.com")
///     .auth(Credentials::password("user@example.com", "secret"))
///     .build()?;
/// let mut client = Client::new(config);
///
/// let mail = Mail::new()
///     .from("user@example.com")
///     .to("friend@example.com")
///     .subject("Hello")
///     .text("Hi there");
/// let result = client.send(mail).await?;
/// println!("accepted: {:?}", result.accepted);
///
/// client.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    connection: Option<Connection>,
    idle_state: ConnectionState,
}

impl Client {
    /// Creates a client. Does not connect.
    #[must_use]
    pub const fn new(config: ClientConfig) -> Self {
        Self {
            config,
            connection: None,
            idle_state: ConnectionState::Disconnected,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the protocol state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.connection
            .as_ref()
            .map_or(self.idle_state, Connection::state)
    }

    /// Returns true while a connection is held.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_open()
    }

    /// Returns true if the connection is encrypted.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.connection.as_ref().is_some_and(Connection::is_secure)
    }

    /// Parses an RFC 5322 address list.
    ///
    /// With `flatten`, group members replace their group.
    #[must_use]
    pub fn parse_address(input: &str, flatten: bool) -> Vec<ParsedAddress> {
        courier_mime::parse_address_list(input, flatten)
    }

    /// Connects and completes the handshake without sending anything.
    ///
    /// Returns immediately when a ready connection is already held.
    ///
    /// # Errors
    ///
    /// Returns the connect, greeting, TLS or authentication error.
    pub async fn verify(&mut self) -> Result<bool> {
        self.ready_connection().await?;
        Ok(true)
    }

    /// Sends a message.
    ///
    /// Partial recipient rejection is not an error: see
    /// [`SendResult::rejected`].
    ///
    /// # Errors
    ///
    /// - `EENVELOPE`: no recipients, invalid address, `MAIL FROM` rejected or
    ///   every recipient rejected
    /// - `EMESSAGE`: message cannot be composed, exceeds the server `SIZE`, or
    ///   is rejected after transmission
    /// - `EPROTOCOL`, `EAUTH`, `ETLS`, `ETIMEDOUT`, `ECONNECTION` from the
    ///   connection itself
    pub async fn send(&mut self, request: impl Into<SendRequest>) -> Result<SendResult> {
        let request = request.into();
        let envelope = Envelope::resolve(request.envelope.as_ref(), &request.mail)?;

        let (bytes, message_id) = match request.raw {
            Some(raw) => (raw, None),
            None => {
                let built = request.mail.build(&BuildOptions {
                    hostname: self.config.hostname.clone(),
                    keep_bcc: self.config.keep_bcc,
                    disable_file_access: self.config.disable_file_access,
                    dkim: self.config.dkim.clone(),
                    ..BuildOptions::default()
                })?;
                (built.bytes, Some(built.message_id))
            }
        };

        let reused = self.has_ready_connection();
        let lmtp = self.config.lmtp;
        let conn = self.ready_connection().await?;
        match transact(conn, reused, lmtp, &envelope, &bytes).await {
            Ok((delivery, response)) => {
                let rejected_replies = delivery.rejected();
                tracing::info!(
                    message_id = message_id.as_deref().unwrap_or("<raw>"),
                    accepted = delivery.accepted_count(),
                    rejected = rejected_replies.len(),
                    "message sent"
                );
                Ok(SendResult {
                    accepted: delivery.accepted(),
                    rejected: rejected_replies.iter().map(|(addr, _)| addr.clone()).collect(),
                    rejected_replies,
                    envelope,
                    response: response.to_string(),
                    message_id,
                })
            }
            Err(error) => {
                self.teardown();
                Err(error)
            }
        }
    }

    /// Sends `QUIT` and closes the connection.
    ///
    /// Never fails and may be called any number of times.
    pub async fn close(&mut self) {
        if let Some(mut conn) = self.connection.take() {
            conn.quit().await;
            self.idle_state = ConnectionState::Closed;
            tracing::info!(host = %self.config.host, "connection closed");
        }
    }

    /// Drops the connection without `QUIT`.
    pub fn disconnect(&mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(mut conn) = self.connection.take() {
            conn.abort();
            self.idle_state = ConnectionState::Closed;
        }
    }

    fn has_ready_connection(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|conn| conn.state() == ConnectionState::Ready)
    }

    async fn ready_connection(&mut self) -> Result<&mut Connection> {
        if !self.has_ready_connection() {
            self.teardown();
            self.idle_state = ConnectionState::Connecting;
            let mut conn = match Connection::open(&self.config).await {
                Ok(conn) => conn,
                Err(error) => {
                    self.idle_state = ConnectionState::Closed;
                    return Err(error);
                }
            };
            if let Err(error) = conn.handshake(&self.config).await {
                conn.abort();
                self.idle_state = ConnectionState::Closed;
                return Err(error);
            }
            self.connection = Some(conn);
        }
        self.connection.as_mut().ok_or(Error::ConnectionClosed)
    }
}

async fn transact(
    conn: &mut Connection,
    reused: bool,
    lmtp: bool,
    envelope: &Envelope,
    message: &[u8],
) -> Result<(Delivery, Reply)> {
    if reused {
        conn.reset().await?;
    }

    let advertised_size = conn.capabilities().size.is_some();
    if let Some(limit) = conn.capabilities().max_message_size()
        && message.len() > limit
    {
        return Err(Error::message(
            format!(
                "Message size exceeds server limit ({} > {limit} bytes)",
                message.len()
            ),
            None,
        ));
    }

    conn.set_state(ConnectionState::Transacting);

    let reply = conn
        .send_command(&Command::MailFrom {
            from: envelope.from.clone(),
            size: advertised_size.then_some(message.len()),
        })
        .await?;
    if !reply.is_success() {
        return Err(Error::envelope("MAIL FROM rejected", Some(reply)));
    }

    let mut delivery = Delivery::new(envelope);
    let mut last_rejection = None;
    for (index, to) in envelope.to.iter().enumerate() {
        let reply = conn.send_command(&Command::RcptTo { to: to.clone() }).await?;
        delivery.record(index, &reply);
        if !reply.is_success() {
            last_rejection = Some(reply);
        }
    }
    if delivery.accepted_count() == 0 {
        return Err(Error::envelope(
            "Can't send mail - all recipients were rejected",
            last_rejection,
        ));
    }

    let reply = conn.send_command(&Command::Data).await?;
    if reply.code != ReplyCode::START_DATA {
        return Err(Error::protocol("DATA command rejected", reply));
    }

    conn.send_data(message).await?;

    let response = if lmtp {
        let mut last = None;
        for index in delivery.accepted_indices() {
            let reply = conn.read_reply().await?;
            delivery.record(index, &reply);
            last = Some(reply);
        }
        let last = last.ok_or(Error::ConnectionClosed)?;
        if delivery.accepted_count() == 0 {
            return Err(Error::message("Message rejected", Some(last)));
        }
        last
    } else {
        let reply = conn.read_reply().await?;
        if !reply.is_success() {
            return Err(Error::message("Message rejected", Some(reply)));
        }
        reply
    };

    conn.set_state(ConnectionState::Ready);
    Ok((delivery, response))
}
