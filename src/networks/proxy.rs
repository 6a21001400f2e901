//! Transport-level reverse proxy.

use crate::targets::Transport;
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// A reverse proxy bound to one `transport//host:port` backend.
#[derive(Debug)]
pub struct ReverseNetworkProxy {
    transport: Transport,
    addr: String,
    timeout: Duration,
}

impl ReverseNetworkProxy {
    /// Create a proxy dialing `addr` over the given transport with the
    /// given connection timeout.
    #[must_use]
    pub fn new(transport: Transport, addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            transport,
            addr: addr.into(),
            timeout,
        }
    }

    /// The backend address the proxy dials.
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// The transport the proxy dials over.
    #[must_use]
    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Dial the backend. A zero timeout dials without a deadline. The
    /// listener is TCP-only, so UDP transports are declared in the table
    /// but rejected here.
    pub async fn dial(&self) -> io::Result<TcpStream> {
        match self.transport {
            Transport::Tcp => {
                if self.timeout.is_zero() {
                    TcpStream::connect(&self.addr).await
                } else {
                    tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr))
                        .await
                        .map_err(|_| {
                            io::Error::new(io::ErrorKind::TimedOut, "backend dial timed out")
                        })?
                }
            },
            Transport::Udp => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "udp relaying is not implemented",
            )),
        }
    }

    /// Splice the client and backend connections: copy bytes in both
    /// directions and tear both ends down once either direction finishes.
    pub async fn splice(&self, client: TcpStream, remote: TcpStream) {
        let peer = client.peer_addr().ok();
        debug!(peer = ?peer, backend = %self.addr, "connected");

        let (mut client_read, mut client_write) = client.into_split();
        let (mut remote_read, mut remote_write) = remote.into_split();

        let sent;
        let received;
        tokio::select! {
            result = tokio::io::copy(&mut client_read, &mut remote_write) => {
                sent = result.unwrap_or(0);
                received = 0;
            },
            result = tokio::io::copy(&mut remote_read, &mut client_write) => {
                received = result.unwrap_or(0);
                sent = 0;
            },
        }

        debug!(peer = ?peer, backend = %self.addr, sent, received, "closed");
    }
}
