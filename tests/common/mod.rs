//! Shared fixtures: in-process POP3 and IMAP servers and message builders.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mailpage::domain::{NormalizedMessage, ServerConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};

/// Password the fake servers reject.
pub const WRONG_SECRET: &str = "wrong-password";

/// Builds a well-formed message whose subject and Message-ID carry `n`.
pub fn message(n: u32) -> Vec<u8> {
    format!(
        "From: Sender {n} <sender{n}@example.com>\r\n\
To: Inbox <inbox@example.com>\r\n\
Subject: Message {n}\r\n\
Date: Mon, 0{day} Sep 2025 12:00:00 +0000\r\n\
Message-ID: <msg-{n}@example.com>\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Body of message {n}\r\n\
.a line that starts with a dot\r\n",
        n = n,
        day = (n % 9) + 1,
    )
    .into_bytes()
}

/// Builds a mailbox of `count` well-formed messages (index 1 first).
pub fn mailbox(count: u32) -> Vec<Vec<u8>> {
    (1..=count).map(message).collect()
}

/// Extracts `n` from the `<msg-n@example.com>` Message-ID.
pub fn message_number(message: &NormalizedMessage) -> u32 {
    message
        .message_id
        .as_deref()
        .and_then(|id| id.strip_prefix("msg-"))
        .and_then(|id| id.split('@').next())
        .and_then(|n| n.parse().ok())
        .expect("fixture message id")
}

pub fn numbers(messages: &[NormalizedMessage]) -> Vec<u32> {
    messages.iter().map(message_number).collect()
}

/// Plain-transport credentials for a fake server.
pub fn server_config(port: u16) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port,
        username: "tester".to_string(),
        secret: "correct-horse".to_string(),
        use_tls: false,
    }
}

/// Session counters shared with the test.
#[derive(Debug, Default)]
pub struct SessionStats {
    active: AtomicUsize,
    max_active: AtomicUsize,
    sessions: AtomicUsize,
    closes: AtomicUsize,
}

impl SessionStats {
    fn open(&self) {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
    }

    fn close(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    /// Highest number of sessions open at the same time.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Sessions accepted so far.
    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    /// QUIT / LOGOUT commands received so far.
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Waits briefly for the server to see `expected` closes.
    pub async fn wait_for_closes(&self, expected: usize) -> usize {
        for _ in 0..200 {
            if self.closes() >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.closes()
    }
}

/// Behavior knobs for the fake servers.
#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    /// Pause before answering each message retrieval.
    pub retrieval_delay: Option<Duration>,
    /// IMAP: deliver FETCH responses out of sequence order.
    pub shuffle: bool,
    /// IMAP: sequence numbers answered with a UID but no body.
    pub bodyless: Vec<usize>,
    /// IMAP: flag update for this sequence number, sent before the FETCH data.
    pub unsolicited: Option<usize>,
    /// IMAP: stop after this many bodies and complete the FETCH with `NO`.
    pub fail_fetch_after: Option<usize>,
}

/// A running fake server.
#[derive(Debug, Clone)]
pub struct FakeServer {
    pub port: u16,
    pub stats: Arc<SessionStats>,
}

impl FakeServer {
    pub fn config(&self) -> ServerConfig {
        server_config(self.port)
    }
}

async fn bind() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

// POP3

/// Starts a POP3 server holding `messages` (index 1 first).
pub async fn start_pop3(messages: Vec<Vec<u8>>, options: ServerOptions) -> FakeServer {
    let (listener, port) = bind().await;
    let stats = Arc::new(SessionStats::default());
    let messages = Arc::new(messages);

    let server_stats = stats.clone();
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let stats = server_stats.clone();
            let messages = messages.clone();
            let options = options.clone();
            tokio::spawn(async move { pop3_session(socket, &messages, &options, &stats).await });
        }
    });

    FakeServer { port, stats }
}

async fn pop3_session(
    socket: TcpStream,
    messages: &[Vec<u8>],
    options: &ServerOptions,
    stats: &SessionStats,
) {
    stats.open();
    let mut closed = false;
    let (read, mut write) = socket.into_split();
    let mut lines = BufReader::new(read).lines();

    let _ = write.write_all(b"+OK fake POP3 ready\r\n").await;
    while let Ok(Some(line)) = lines.next_line().await {
        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or_default().to_ascii_uppercase();
        let argument = parts.next().unwrap_or_default().to_string();

        let reply = match command.as_str() {
            "USER" => "+OK\r\n".to_string(),
            "PASS" if argument == WRONG_SECRET => "-ERR [AUTH] invalid credentials\r\n".to_string(),
            "PASS" => "+OK maildrop locked\r\n".to_string(),
            "STAT" => {
                let size: usize = messages.iter().map(Vec::len).sum();
                format!("+OK {} {}\r\n", messages.len(), size)
            }
            "RETR" => {
                if let Some(delay) = options.retrieval_delay {
                    tokio::time::sleep(delay).await;
                }
                match argument
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| messages.get(i))
                {
                    Some(raw) => {
                        let mut reply = format!("+OK {} octets\r\n", raw.len()).into_bytes();
                        reply.extend_from_slice(&dot_stuff(raw));
                        reply.extend_from_slice(b".\r\n");
                        let _ = write.write_all(&reply).await;
                        continue;
                    }
                    None => "-ERR no such message\r\n".to_string(),
                }
            }
            "QUIT" => {
                stats.closes.fetch_add(1, Ordering::SeqCst);
                stats.close();
                closed = true;
                let _ = write.write_all(b"+OK bye\r\n").await;
                break;
            }
            _ => "-ERR unknown command\r\n".to_string(),
        };
        let _ = write.write_all(reply.as_bytes()).await;
    }

    if !closed {
        stats.close();
    }
}

fn dot_stuff(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len() + 8);
    let mut at_line_start = true;
    for &byte in raw {
        if at_line_start && byte == b'.' {
            out.push(b'.');
        }
        out.push(byte);
        at_line_start = byte == b'\n';
    }
    if !out.ends_with(b"\r\n") {
        out.extend_from_slice(b"\r\n");
    }
    out
}

// IMAP

/// Starts an IMAP server whose INBOX holds `messages` (sequence 1 first).
pub async fn start_imap(messages: Vec<Vec<u8>>, options: ServerOptions) -> FakeServer {
    let (listener, port) = bind().await;
    let stats = Arc::new(SessionStats::default());
    let messages = Arc::new(messages);

    let server_stats = stats.clone();
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let stats = server_stats.clone();
            let messages = messages.clone();
            let options = options.clone();
            tokio::spawn(async move { imap_session(socket, &messages, &options, &stats).await });
        }
    });

    FakeServer { port, stats }
}

async fn imap_session(
    socket: TcpStream,
    messages: &[Vec<u8>],
    options: &ServerOptions,
    stats: &SessionStats,
) {
    stats.open();
    let mut closed = false;
    let (read, mut write) = socket.into_split();
    let mut lines = BufReader::new(read).lines();

    let _ = write.write_all(b"* OK [CAPABILITY IMAP4rev1] fake IMAP ready\r\n").await;
    while let Ok(Some(line)) = lines.next_line().await {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let (Some(tag), Some(command)) = (parts.first(), parts.get(1)) else {
            continue;
        };
        let tag = tag.to_string();

        match command.to_ascii_uppercase().as_str() {
            "LOGIN" if line.contains(WRONG_SECRET) => {
                let reply = format!("{} NO [AUTHENTICATIONFAILED] Invalid credentials\r\n", tag);
                let _ = write.write_all(reply.as_bytes()).await;
            }
            "LOGIN" => {
                let reply = format!("{} OK LOGIN completed\r\n", tag);
                let _ = write.write_all(reply.as_bytes()).await;
            }
            "EXAMINE" | "SELECT" => {
                let reply = format!(
                    "* {} EXISTS\r\n* 0 RECENT\r\n* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n\
* OK [UIDVALIDITY 42] UIDs valid\r\n{} OK [READ-ONLY] EXAMINE completed\r\n",
                    messages.len(),
                    tag
                );
                let _ = write.write_all(reply.as_bytes()).await;
            }
            "FETCH" => {
                let range = parts.get(2).copied().unwrap_or_default();
                send_fetch(&mut write, &tag, range, messages, options).await;
            }
            "LOGOUT" => {
                stats.closes.fetch_add(1, Ordering::SeqCst);
                stats.close();
                closed = true;
                let reply = format!("* BYE logging out\r\n{} OK LOGOUT completed\r\n", tag);
                let _ = write.write_all(reply.as_bytes()).await;
                break;
            }
            _ => {
                let reply = format!("{} OK done\r\n", tag);
                let _ = write.write_all(reply.as_bytes()).await;
            }
        }
    }

    if !closed {
        stats.close();
    }
}

async fn send_fetch(
    write: &mut OwnedWriteHalf,
    tag: &str,
    range: &str,
    messages: &[Vec<u8>],
    options: &ServerOptions,
) {
    let bounds: Vec<usize> = range.split(':').filter_map(|n| n.parse().ok()).collect();
    let (start, end) = match bounds.as_slice() {
        [start, end] => (*start, *end),
        [single] => (*single, *single),
        _ => {
            let reply = format!("{} BAD invalid sequence set\r\n", tag);
            let _ = write.write_all(reply.as_bytes()).await;
            return;
        }
    };

    let mut order: Vec<usize> = (start..=end.min(messages.len())).collect();
    if options.shuffle {
        // Odd sequence numbers first, then the even ones in reverse.
        let (odd, even): (Vec<usize>, Vec<usize>) = order.into_iter().partition(|n| n % 2 == 1);
        order = odd.into_iter().chain(even.into_iter().rev()).collect();
    }

    if let Some(seq) = options.unsolicited {
        let reply = format!("* {} FETCH (FLAGS (\\Seen))\r\n", seq);
        let _ = write.write_all(reply.as_bytes()).await;
    }

    for (sent, seq) in order.into_iter().enumerate() {
        if options.fail_fetch_after == Some(sent) {
            let reply = format!("{} NO [UNAVAILABLE] FETCH failed\r\n", tag);
            let _ = write.write_all(reply.as_bytes()).await;
            return;
        }
        if let Some(delay) = options.retrieval_delay {
            tokio::time::sleep(delay).await;
        }
        if options.bodyless.contains(&seq) {
            let reply = format!("* {} FETCH (UID {})\r\n", seq, seq + 1000);
            let _ = write.write_all(reply.as_bytes()).await;
            continue;
        }
        let body = &messages[seq - 1];
        let mut reply = format!("* {} FETCH (UID {} BODY[] {{{}}}\r\n", seq, seq + 1000, body.len())
            .into_bytes();
        reply.extend_from_slice(body);
        reply.extend_from_slice(b")\r\n");
        let _ = write.write_all(&reply).await;
    }

    let reply = format!("{} OK FETCH completed\r\n", tag);
    let _ = write.write_all(reply.as_bytes()).await;
}
