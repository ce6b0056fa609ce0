use super::transport_trait::DapTransportTrait;
use super::types::Message;
use crate::{Error, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout};
use tracing::{debug, trace, warn};

/// DAP transport over a child process's stdio, using the protocol's
/// `Content-Length: N\r\n\r\n<N bytes of JSON>` framing. This is distinct
/// from the ambient tool/RPC transport (`crate::mcp::transport`), which is
/// line-delimited — the two must never be confused with one another.
pub struct DapTransport {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl DapTransport {
    pub fn new(stdin: ChildStdin, stdout: ChildStdout) -> Self {
        Self {
            stdin,
            stdout: BufReader::new(stdout),
        }
    }

    pub async fn read_message(&mut self) -> Result<Message> {
        loop {
            let mut headers = String::new();
            loop {
                let mut line = String::new();
                let n = self.stdout.read_line(&mut line).await?;
                if n == 0 {
                    return Err(Error::Dap("debugger closed stdout".to_string()));
                }
                if line == "\r\n" || line == "\n" {
                    break;
                }
                headers.push_str(&line);
            }

            let content_length = headers
                .lines()
                .find(|line| line.to_ascii_lowercase().starts_with("content-length:"))
                .and_then(|line| line.split(':').nth(1))
                .and_then(|s| s.trim().parse::<usize>().ok());

            let content_length = match content_length {
                Some(len) => len,
                None => {
                    warn!("DAP: discarding header block with missing/invalid Content-Length: {:?}", headers);
                    continue;
                }
            };

            trace!("DAP: reading message with Content-Length: {}", content_length);

            let mut buffer = vec![0u8; content_length];
            tokio::io::AsyncReadExt::read_exact(&mut self.stdout, &mut buffer).await?;

            let content = String::from_utf8(buffer)
                .map_err(|e| Error::Dap(format!("invalid UTF-8 in DAP body: {}", e)))?;

            debug!("DAP received: {}", content);

            return serde_json::from_str(&content)
                .map_err(|e| Error::Dap(format!("failed to parse DAP message: {}", e)));
        }
    }

    pub async fn write_message(&mut self, msg: &Message) -> Result<()> {
        let content = serde_json::to_string(msg)
            .map_err(|e| Error::Dap(format!("failed to serialize DAP message: {}", e)))?;

        debug!("DAP sending: {}", content);

        let header = format!("Content-Length: {}\r\n\r\n", content.len());
        self.stdin.write_all(header.as_bytes()).await?;
        self.stdin.write_all(content.as_bytes()).await?;
        self.stdin.flush().await?;

        Ok(())
    }
}

#[async_trait]
impl DapTransportTrait for DapTransport {
    async fn read_message(&mut self) -> Result<Message> {
        self.read_message().await
    }

    async fn write_message(&mut self, msg: &Message) -> Result<()> {
        self.write_message(msg).await
    }
}
