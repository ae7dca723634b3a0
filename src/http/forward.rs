//! Origin forwarding.
//!
//! One outbound connection per request, never reused. The response is
//! buffered until the origin closes or a read goes quiet for the read
//! timeout; there is no Content-Length or chunked framing awareness, so
//! keep-alive origins are only released by that timeout.

use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::TimeoutConfig;
use crate::http::response;

const READ_CHUNK: usize = 4096;

/// Ways forwarding can fail. Each maps to one synthesized response.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("timed out connecting to origin")]
    ConnectTimeout,

    #[error("origin refused the connection")]
    ConnectionRefused,

    #[error("origin closed without sending a response")]
    EmptyResponse,

    #[error("forwarding failed: {0}")]
    Other(#[from] io::Error),
}

impl ForwardError {
    /// Status code of the synthesized response.
    pub fn status(&self) -> u16 {
        match self {
            ForwardError::ConnectTimeout => 504,
            _ => 502,
        }
    }

    /// Message shown in the synthesized page.
    pub fn message(&self) -> &'static str {
        match self {
            ForwardError::ConnectTimeout => "Gateway Timeout",
            ForwardError::ConnectionRefused => "Connection Refused",
            ForwardError::EmptyResponse => "Empty Response from Server",
            ForwardError::Other(_) => "Bad Gateway",
        }
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ForwardError::ConnectTimeout => "connect_timeout",
            ForwardError::ConnectionRefused => "connection_refused",
            ForwardError::EmptyResponse => "empty_response",
            ForwardError::Other(_) => "other",
        }
    }

    /// The full response to send to the client.
    pub fn to_response(&self) -> Vec<u8> {
        let reason = match self.status() {
            504 => "Gateway Timeout",
            _ => "Bad Gateway",
        };
        response::gateway_error(self.status(), reason, self.message())
    }
}

/// Relays a request to its origin and buffers the reply.
#[derive(Debug, Clone, Copy)]
pub struct Forwarder {
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl Forwarder {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            read_timeout,
        }
    }

    pub fn from_config(timeouts: &TimeoutConfig) -> Self {
        Self::new(timeouts.connect(), timeouts.read())
    }

    /// Send `request` verbatim to `host:port` and return the whole response.
    ///
    /// The outbound socket is dropped on every return path.
    pub async fn forward(&self, host: &str, port: u16, request: &[u8]) -> Result<Vec<u8>, ForwardError> {
        let mut stream = match timeout(self.connect_timeout, TcpStream::connect((host, port))).await {
            Err(_) => return Err(ForwardError::ConnectTimeout),
            Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
                return Err(ForwardError::ConnectionRefused)
            }
            Ok(Err(e)) => return Err(ForwardError::Other(e)),
            Ok(Ok(stream)) => stream,
        };
        tracing::debug!(host = %host, port, "Connected to origin");

        // The send shares the connect deadline.
        match timeout(self.connect_timeout, stream.write_all(request)).await {
            Err(_) => return Err(ForwardError::ConnectTimeout),
            Ok(result) => result?,
        }

        let mut response = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match timeout(self.read_timeout, stream.read(&mut chunk)).await {
                // Quiet origin: treat what we have as the full response.
                Err(_) => break,
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => response.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) => return Err(ForwardError::Other(e)),
            }
        }

        if response.is_empty() {
            return Err(ForwardError::EmptyResponse);
        }
        Ok(response)
    }
}
