use std::{
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
    thread,
    time::Duration,
};

use super::{Part, PartSource, TransportError};

/// In-process part source fed through an mpsc channel.
pub struct ChannelSource {
    rx: Receiver<Part>,
}

impl ChannelSource {
    pub fn new() -> (Self, Sender<Part>) {
        let (tx, rx) = mpsc::channel();
        (Self { rx }, tx)
    }
}

impl PartSource for ChannelSource {
    fn next_part(&mut self, timeout: Duration) -> Result<Option<Part>, TransportError> {
        match self.rx.recv_timeout(timeout) {
            Ok(part) => Ok(Some(part)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                // behave like an idle socket
                thread::sleep(timeout);
                Ok(None)
            }
        }
    }
}
