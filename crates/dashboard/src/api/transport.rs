//! Event stream transport
//!
//! A quiet event stream leaves its reader blocked in a socket read. The
//! connector here keeps a clone of every socket it opens in a
//! [`SocketHandle`], so another thread can shut the socket down and unblock
//! that read. TLS is layered on top by the regular rustls connector.

use log::debug;
use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use ureq::unversioned::transport::{
    Buffers, ConnectionDetails, Connector, LazyBuffers, NextTimeout, Transport,
};
use ureq::{Error, Timeout};

/// Shared slot holding the socket of the current stream connection
#[derive(Debug, Clone, Default)]
pub struct SocketHandle {
    socket: Arc<Mutex<Option<TcpStream>>>,
}

impl SocketHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<TcpStream>> {
        self.socket.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, stream: TcpStream) {
        *self.slot() = Some(stream);
    }

    /// Whether a socket is currently held
    pub fn is_connected(&self) -> bool {
        self.slot().is_some()
    }

    /// Shut the socket down in both directions, waking any blocked read.
    /// Later calls do nothing.
    pub fn shutdown(&self) {
        let Some(stream) = self.slot().take() else {
            return;
        };
        match stream.shutdown(Shutdown::Both) {
            Ok(()) => debug!("Shut down event stream socket"),
            // The peer may have closed it already
            Err(e) => debug!("Event stream socket shutdown: {}", e),
        }
    }
}

/// Plain TCP connector that records each socket in a [`SocketHandle`]
#[derive(Debug)]
pub struct StreamConnector {
    handle: SocketHandle,
}

impl StreamConnector {
    pub fn new(handle: SocketHandle) -> Self {
        Self { handle }
    }
}

impl Connector for StreamConnector {
    type Out = SocketTransport;

    fn connect(
        &self,
        details: &ConnectionDetails,
        _chained: Option<()>,
    ) -> Result<Option<Self::Out>, Error> {
        let mut last_error = None;

        for addr in details.addrs.iter() {
            let attempt = match details.timeout.not_zero() {
                Some(timeout) => TcpStream::connect_timeout(addr, *timeout),
                None => TcpStream::connect(addr),
            };

            match attempt {
                Ok(stream) => {
                    if details.config.no_delay() {
                        stream.set_nodelay(true)?;
                    }
                    self.handle.set(stream.try_clone()?);
                    debug!("Connected event stream socket to {}", addr);

                    let buffers = LazyBuffers::new(
                        details.config.input_buffer_size(),
                        details.config.output_buffer_size(),
                    );
                    return Ok(Some(SocketTransport { stream, buffers }));
                }
                Err(e) if is_timeout(&e) => last_error = Some(Error::Timeout(Timeout::Connect)),
                Err(e) => last_error = Some(Error::Io(e)),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "No address to connect to",
            ))
        }))
    }
}

/// Blocking TCP transport for one stream connection
pub struct SocketTransport {
    stream: TcpStream,
    buffers: LazyBuffers,
}

impl Transport for SocketTransport {
    fn buffers(&mut self) -> &mut dyn Buffers {
        &mut self.buffers
    }

    fn transmit_output(&mut self, amount: usize, timeout: NextTimeout) -> Result<(), Error> {
        self.stream.set_write_timeout(timeout.not_zero().map(|t| *t))?;
        let output = &self.buffers.output()[..amount];
        self.stream.write_all(output).map_err(|e| io_error(e, timeout))
    }

    fn await_input(&mut self, timeout: NextTimeout) -> Result<bool, Error> {
        self.stream.set_read_timeout(timeout.not_zero().map(|t| *t))?;
        let input = self.buffers.input_append_buf();
        let amount = self.stream.read(input).map_err(|e| io_error(e, timeout))?;
        self.buffers.input_appended(amount);
        Ok(amount > 0)
    }

    fn is_open(&mut self) -> bool {
        // stream connections are never pooled
        false
    }
}

impl fmt::Debug for SocketTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketTransport")
            .field("addr", &self.stream.peer_addr().ok())
            .finish()
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

fn io_error(e: io::Error, timeout: NextTimeout) -> Error {
    if is_timeout(&e) {
        Error::Timeout(timeout.reason)
    } else {
        Error::Io(e)
    }
}
