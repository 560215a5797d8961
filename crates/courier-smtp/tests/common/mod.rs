//! Scripted in-process SMTP server for integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::net::tcp::OwnedWriteHalf;

pub const CRAM_CHALLENGE: &str = "<1896.697170952@postoffice.reston.mci.net>";

/// Installs a test subscriber honoring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// How the mock server behaves.
#[derive(Debug, Clone)]
pub struct Script {
    /// Greeting line; `None` never greets.
    pub greeting: Option<String>,
    /// EHLO keywords after the first line.
    pub extensions: Vec<String>,
    /// Replaces the whole EHLO/LHLO reply.
    pub ehlo_reply: Option<String>,
    /// Writes the EHLO reply in chunks of this many bytes.
    pub ehlo_chunk: Option<usize>,
    /// Accepted credentials for PLAIN, LOGIN and CRAM-MD5.
    pub credentials: Option<(String, String)>,
    /// Accepted XOAUTH2 bearer token.
    pub oauth_token: Option<String>,
    /// Reply to MAIL FROM.
    pub mail_reply: String,
    /// Recipients answered with 550.
    pub rejected: Vec<String>,
    /// Reply to DATA.
    pub data_reply: String,
    /// Reply after the body.
    pub final_reply: String,
    /// LMTP: recipients rejected after the body.
    pub lmtp_rejected: Vec<String>,
    /// Hang up without replying when a command starts with this.
    pub hangup_on: Option<String>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            greeting: Some("220 mock.test ESMTP ready".into()),
            extensions: vec!["PIPELINING".into(), "8BITMIME".into()],
            ehlo_reply: None,
            ehlo_chunk: None,
            credentials: None,
            oauth_token: None,
            mail_reply: "250 2.1.0 OK".into(),
            rejected: Vec::new(),
            data_reply: "354 End data with <CR><LF>.<CR><LF>".into(),
            final_reply: "250 2.0.0 Queued as 42".into(),
            lmtp_rejected: Vec::new(),
            hangup_on: None,
        }
    }
}

/// What one connection saw.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub commands: Vec<String>,
    pub messages: Vec<Vec<u8>>,
}

impl Session {
    pub fn has_command(&self, prefix: &str) -> bool {
        self.commands.iter().any(|c| c.starts_with(prefix))
    }

    pub fn message_text(&self, index: usize) -> String {
        String::from_utf8_lossy(&self.messages[index]).into_owned()
    }
}

pub struct MockServer {
    pub port: u16,
    sessions: Arc<Mutex<Vec<Session>>>,
}

impl MockServer {
    pub async fn start(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let sessions = Arc::new(Mutex::new(Vec::new()));

        let shared = Arc::clone(&sessions);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let index = {
                    let mut all = shared.lock().unwrap();
                    all.push(Session::default());
                    all.len() - 1
                };
                let script = script.clone();
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    let _ = serve(socket, &script, &shared, index).await;
                });
            }
        });

        Self { port, sessions }
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.sessions.lock().unwrap().clone()
    }

    pub fn session(&self, index: usize) -> Session {
        self.sessions()[index].clone()
    }
}

async fn reply(w: &mut OwnedWriteHalf, line: &str) -> std::io::Result<()> {
    w.write_all(format!("{line}\r\n").as_bytes()).await?;
    w.flush().await
}

async fn serve(
    socket: tokio::net::TcpStream,
    script: &Script,
    sessions: &Arc<Mutex<Vec<Session>>>,
    index: usize,
) -> std::io::Result<()> {
    let (r, mut w) = socket.into_split();
    let mut r = BufReader::new(r);

    let Some(greeting) = &script.greeting else {
        tokio::time::sleep(Duration::from_secs(60)).await;
        return Ok(());
    };
    reply(&mut w, greeting).await?;

    let mut accepted: Vec<String> = Vec::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if r.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buf).trim_end().to_string();
        sessions.lock().unwrap()[index].commands.push(line.clone());
        let upper = line.to_uppercase();

        if script
            .hangup_on
            .as_deref()
            .is_some_and(|prefix| upper.starts_with(prefix))
        {
            return Ok(());
        }

        if upper.starts_with("EHLO") || upper.starts_with("LHLO") {
            let text = match &script.ehlo_reply {
                Some(custom) => format!("{custom}\r\n"),
                None => {
                    let mut lines = vec!["mock.test greets you".to_string()];
                    lines.extend(script.extensions.iter().cloned());
                    let last = lines.len() - 1;
                    lines
                        .iter()
                        .enumerate()
                        .map(|(i, l)| format!("250{}{l}\r\n", if i == last { ' ' } else { '-' }))
                        .collect()
                }
            };
            match script.ehlo_chunk {
                Some(size) => {
                    for piece in text.as_bytes().chunks(size) {
                        w.write_all(piece).await?;
                        w.flush().await?;
                        tokio::time::sleep(Duration::from_millis(2)).await;
                    }
                }
                None => {
                    w.write_all(text.as_bytes()).await?;
                    w.flush().await?;
                }
            }
        } else if upper.starts_with("HELO") {
            reply(&mut w, "250 mock.test").await?;
        } else if upper.starts_with("STARTTLS") {
            reply(&mut w, "454 4.7.0 TLS not available").await?;
        } else if upper.starts_with("AUTH PLAIN") {
            let payload = match line.split_whitespace().nth(2) {
                Some(payload) => payload.to_string(),
                None => {
                    reply(&mut w, "334 ").await?;
                    read_line(&mut r).await?
                }
            };
            let decoded = STANDARD.decode(payload).unwrap_or_default();
            let parts: Vec<String> = decoded
                .split(|&b| b == 0)
                .map(|p| String::from_utf8_lossy(p).into_owned())
                .collect();
            let ok = parts.len() == 3 && check(script, &parts[1], &parts[2]);
            auth_result(&mut w, ok).await?;
        } else if upper.starts_with("AUTH LOGIN") {
            reply(&mut w, "334 VXNlcm5hbWU6").await?;
            let user = decode_line(&read_line(&mut r).await?);
            reply(&mut w, "334 UGFzc3dvcmQ6").await?;
            let pass = decode_line(&read_line(&mut r).await?);
            auth_result(&mut w, check(script, &user, &pass)).await?;
        } else if upper.starts_with("AUTH CRAM-MD5") {
            reply(&mut w, &format!("334 {}", STANDARD.encode(CRAM_CHALLENGE))).await?;
            let answer = decode_line(&read_line(&mut r).await?);
            let ok = answer.split_once(' ').is_some_and(|(user, digest)| {
                script.credentials.as_ref().is_some_and(|(u, p)| {
                    let mut mac = Hmac::<md5::Md5>::new_from_slice(p.as_bytes()).unwrap();
                    mac.update(CRAM_CHALLENGE.as_bytes());
                    user == u && digest == hex::encode(mac.finalize().into_bytes())
                })
            });
            auth_result(&mut w, ok).await?;
        } else if upper.starts_with("AUTH XOAUTH2") {
            let token = decode_line(line.split_whitespace().nth(2).unwrap_or_default());
            let ok = script
                .oauth_token
                .as_ref()
                .is_some_and(|t| token.contains(&format!("auth=Bearer {t}\x01")));
            if ok {
                reply(&mut w, "235 2.7.0 Accepted").await?;
            } else {
                reply(&mut w, "334 eyJzdGF0dXMiOiI0MDEifQ==").await?;
                read_line(&mut r).await?;
                reply(&mut w, "535 5.7.8 Authentication failed").await?;
            }
        } else if upper.starts_with("MAIL FROM") {
            accepted.clear();
            reply(&mut w, &script.mail_reply).await?;
        } else if upper.starts_with("RCPT TO") {
            let addr = line
                .split_once('<')
                .and_then(|(_, rest)| rest.split_once('>'))
                .map(|(addr, _)| addr.to_string())
                .unwrap_or_default();
            if script.rejected.contains(&addr) {
                reply(&mut w, "550 5.1.1 User unknown").await?;
            } else {
                accepted.push(addr);
                reply(&mut w, "250 2.1.5 OK").await?;
            }
        } else if upper == "DATA" {
            reply(&mut w, &script.data_reply).await?;
            if !script.data_reply.starts_with("354") {
                continue;
            }
            let mut message = Vec::new();
            loop {
                buf.clear();
                if r.read_until(b'\n', &mut buf).await? == 0 {
                    return Ok(());
                }
                if buf == b".\r\n" {
                    break;
                }
                message.extend_from_slice(&buf);
            }
            sessions.lock().unwrap()[index].messages.push(message);
            if script.hangup_on.as_deref() == Some("<BODY>") {
                return Ok(());
            }

            if upper_is_lmtp(sessions, index) {
                for rcpt in &accepted {
                    if script.lmtp_rejected.contains(rcpt) {
                        reply(&mut w, &format!("452 4.2.2 <{rcpt}> Mailbox full")).await?;
                    } else {
                        reply(&mut w, &format!("250 2.0.0 <{rcpt}> Delivered")).await?;
                    }
                }
            } else {
                reply(&mut w, &script.final_reply).await?;
            }
        } else if upper.starts_with("RSET") || upper.starts_with("NOOP") {
            accepted.clear();
            reply(&mut w, "250 2.0.0 OK").await?;
        } else if upper.starts_with("QUIT") {
            reply(&mut w, "221 2.0.0 Bye").await?;
            return Ok(());
        } else {
            reply(&mut w, "502 5.5.2 Command not recognized").await?;
        }
    }
}

fn upper_is_lmtp(sessions: &Arc<Mutex<Vec<Session>>>, index: usize) -> bool {
    sessions.lock().unwrap()[index]
        .commands
        .iter()
        .any(|c| c.to_uppercase().starts_with("LHLO"))
}

fn check(script: &Script, user: &str, pass: &str) -> bool {
    script
        .credentials
        .as_ref()
        .is_some_and(|(u, p)| u == user && p == pass)
}

async fn auth_result(w: &mut OwnedWriteHalf, ok: bool) -> std::io::Result<()> {
    if ok {
        reply(w, "235 2.7.0 Authentication successful").await
    } else {
        reply(w, "535 5.7.8 Authentication failed").await
    }
}

async fn read_line<R: tokio::io::AsyncBufRead + Unpin>(r: &mut R) -> std::io::Result<String> {
    let mut line = String::new();
    r.read_line(&mut line).await?;
    Ok(line.trim_end().to_string())
}

fn decode_line(line: &str) -> String {
    String::from_utf8_lossy(&STANDARD.decode(line.trim()).unwrap_or_default()).into_owned()
}
