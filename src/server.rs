//! Line-oriented TCP front end.
//!
//! Clients are served one at a time on the current task. Every command is
//! dispatched synchronously into a buffer, which is then written back in
//! one piece; plugin code never sees the socket.

use std::io;
use std::net::SocketAddr;

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::dispatch::respond;
use crate::host::Host;

/// Longest accepted command line in bytes, terminator included.
pub const MAX_LINE_LEN: usize = 1024;

/// Sent when a line exceeds [`MAX_LINE_LEN`]; the line is discarded.
pub const LINE_TOO_LONG: &str = "Line too long.";

/// How a client session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client dispatched `exit`.
    Exit,
    /// The client closed its side of the connection.
    Disconnected,
}

pub struct Server {
    listener: TcpListener,
    prompt: String,
}

impl Server {
    /// Bind the listening socket.
    pub async fn bind(addr: SocketAddr, prompt: impl Into<String>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            prompt: prompt.into(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept clients until one of them dispatches `exit`.
    pub async fn run(self, host: &mut Host) -> io::Result<()> {
        info!("Listening on {}", self.local_addr()?);

        loop {
            let (stream, peer) = self.listener.accept().await?;
            info!("Client {} connected.", peer);

            match serve_client(stream, host, &self.prompt).await {
                Ok(SessionEnd::Exit) => {
                    info!("Client {} disconnected.", peer);
                    return Ok(());
                }
                Ok(SessionEnd::Disconnected) => info!("Client {} disconnected.", peer),
                Err(e) => warn!("Connection to {} failed: {}", peer, e),
            }
        }
    }
}

/// Run one client session over `stream`.
///
/// Sends the prompt, runs the registration broadcast, then reads
/// newline-framed commands until the client sends `exit` or hangs up.
/// Input that is not valid UTF-8 is decoded lossily.
pub async fn serve_client<S>(stream: S, host: &mut Host, prompt: &str) -> io::Result<SessionEnd>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    let mut response = Vec::new();

    writer.write_all(prompt.as_bytes()).await?;
    host.greet(&mut response);
    writer.write_all(&response).await?;

    loop {
        match read_line(&mut reader, &mut line).await? {
            Line::Eof => return Ok(SessionEnd::Disconnected),
            Line::TooLong => {
                debug!("Discarded a line longer than {} bytes", MAX_LINE_LEN);
                response.clear();
                respond(&mut response, LINE_TOO_LONG);
                writer.write_all(&response).await?;
                writer.write_all(prompt.as_bytes()).await?;
                continue;
            }
            Line::Complete => {}
        }

        let text = String::from_utf8_lossy(&line);
        response.clear();
        let code = host.handle_line(&text, &mut response);
        debug!("{:?} -> {}", text.trim_end(), code);
        writer.write_all(&response).await?;

        if host.is_done() {
            writer.flush().await?;
            return Ok(SessionEnd::Exit);
        }
        writer.write_all(prompt.as_bytes()).await?;
    }
}

enum Line {
    Complete,
    TooLong,
    Eof,
}

/// Read one newline-terminated line into `line`, buffering at most
/// [`MAX_LINE_LEN`] bytes. The rest of an overlong line is read and dropped.
async fn read_line<R>(reader: &mut R, line: &mut Vec<u8>) -> io::Result<Line>
where
    R: AsyncBufRead + Unpin,
{
    let limit = MAX_LINE_LEN as u64;

    line.clear();
    let read = (&mut *reader).take(limit).read_until(b'\n', line).await?;
    if read == 0 {
        return Ok(Line::Eof);
    }
    if read < MAX_LINE_LEN || line.ends_with(b"\n") {
        return Ok(Line::Complete);
    }

    loop {
        line.clear();
        let read = (&mut *reader).take(limit).read_until(b'\n', line).await?;
        if read == 0 || line.ends_with(b"\n") {
            break;
        }
    }
    line.clear();
    Ok(Line::TooLong)
}
