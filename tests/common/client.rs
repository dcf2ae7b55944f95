//! Test chat client.
//!
//! Sends raw lines and asserts on the lines the server sends back.

#![allow(dead_code)]

use chatroomd::replies;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

/// A test chat client.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    /// Connect to a test server.
    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        })
    }

    /// Send one line; the `\n` is appended.
    pub async fn send_line(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Send raw bytes as-is.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Receive a single line.
    pub async fn recv(&mut self) -> anyhow::Result<String> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    /// Receive a line with a timeout. Fails if the server closed the
    /// connection.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<String> {
        let mut line = String::new();
        let n = timeout(dur, self.reader.read_line(&mut line)).await??;
        if n == 0 {
            anyhow::bail!("connection closed by server");
        }
        Ok(line.trim_end_matches('\n').to_string())
    }

    /// Receive a line and check it.
    pub async fn expect(&mut self, expected: &str) -> anyhow::Result<()> {
        let line = self.recv().await?;
        anyhow::ensure!(line == expected, "expected {expected:?}, got {line:?}");
        Ok(())
    }

    /// Assert nothing arrives for `dur`.
    pub async fn expect_silence(&mut self, dur: Duration) -> anyhow::Result<()> {
        let mut line = String::new();
        match timeout(dur, self.reader.read_line(&mut line)).await {
            Err(_) => Ok(()),
            Ok(Ok(0)) => anyhow::bail!("connection closed while expecting silence"),
            Ok(Ok(_)) => anyhow::bail!("unexpected line {line:?}"),
            Ok(Err(e)) => Err(e.into()),
        }
    }

    /// Assert the server closed the connection, with no further lines.
    pub async fn expect_closed(&mut self) -> anyhow::Result<()> {
        let mut line = String::new();
        match timeout(Duration::from_secs(5), self.reader.read_line(&mut line)).await? {
            Ok(0) => Ok(()),
            Ok(_) => anyhow::bail!("expected close, got line {line:?}"),
            // A reset also means the server side is gone.
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Sign up from the credentials prompt through to the room prompt.
    pub async fn register(&mut self, username: &str, password: &str) -> anyhow::Result<()> {
        self.expect(replies::CREDENTIALS_PROMPT).await?;
        self.send_line(&format!("REG {username} {password}")).await?;
        self.expect(replies::REGISTRATION_SUCCESSFUL).await?;
        self.expect(replies::ROOM_PROMPT).await
    }

    /// Sign in from the credentials prompt through to the room prompt.
    pub async fn authenticate(&mut self, username: &str, password: &str) -> anyhow::Result<()> {
        self.expect(replies::CREDENTIALS_PROMPT).await?;
        self.send_line(&format!("AUTH {username} {password}")).await?;
        self.expect(replies::AUTHENTICATION_SUCCESSFUL).await?;
        self.expect(replies::ROOM_PROMPT).await
    }

    /// Answer the room prompt with `0` and return the new room id.
    pub async fn create_room(&mut self) -> anyhow::Result<u32> {
        self.send_line("0").await?;
        let line = self.recv().await?;
        let id = line
            .strip_prefix("New chat session created with ID: ")
            .ok_or_else(|| anyhow::anyhow!("unexpected reply {line:?}"))?;
        Ok(id.parse()?)
    }

    /// Answer the room prompt with an existing id. The server says nothing.
    pub async fn join_room(&mut self, id: u32) -> anyhow::Result<()> {
        self.send_line(&id.to_string()).await
    }
}
