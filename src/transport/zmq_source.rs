use std::time::Duration;

use log::debug;

use super::{Part, PartSource, TransportError};

/// A ZeroMQ SUB socket bound locally; publishers connect to it.
pub struct ZmqSource {
    socket: zmq::Socket,
    endpoint: String,
    // kept after the socket so it is dropped last
    _context: zmq::Context,
}

impl ZmqSource {
    pub fn bind(endpoint: &str, topic: &[u8]) -> Result<Self, TransportError> {
        let context = zmq::Context::new();
        let socket = context
            .socket(zmq::SUB)
            .map_err(|source| TransportError::Socket { source })?;
        // don't hold the process open for undelivered messages on close
        socket
            .set_linger(0)
            .map_err(|source| TransportError::Socket { source })?;
        socket
            .bind(endpoint)
            .map_err(|source| TransportError::Bind {
                endpoint: endpoint.to_owned(),
                source,
            })?;
        socket
            .set_subscribe(topic)
            .map_err(|source| TransportError::Subscribe { source })?;

        // resolves wildcard ports such as tcp://127.0.0.1:*
        let endpoint = match socket.get_last_endpoint() {
            Ok(Ok(bound)) => bound,
            _ => endpoint.to_owned(),
        };
        debug!("Subscriber bound to {}", endpoint);

        Ok(Self {
            socket,
            endpoint,
            _context: context,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl PartSource for ZmqSource {
    fn next_part(&mut self, timeout: Duration) -> Result<Option<Part>, TransportError> {
        let timeout_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
        match self.socket.poll(zmq::POLLIN, timeout_ms) {
            Ok(0) | Err(zmq::Error::EINTR) => return Ok(None),
            Ok(_) => {}
            Err(source) => return Err(TransportError::Receive { source }),
        }

        let data = match self.socket.recv_bytes(zmq::DONTWAIT) {
            Ok(data) => data,
            Err(zmq::Error::EAGAIN | zmq::Error::EINTR) => return Ok(None),
            Err(source) => return Err(TransportError::Receive { source }),
        };
        let more = self
            .socket
            .get_rcvmore()
            .map_err(|source| TransportError::Receive { source })?;

        Ok(Some(Part { data, more }))
    }
}
