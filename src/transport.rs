mod framer;
mod zmq_source;
#[cfg(test)]
pub mod channel_source;

use std::time::Duration;

use derive_more::{Display, Error};
use log::{debug, warn};

use crate::{
    cancel::CancelToken,
    frame::{Frame, FrameFit},
};
use framer::{Framer, Step};
pub use zmq_source::ZmqSource;

#[derive(Debug, Display, Error)]
pub enum TransportError {
    #[display("could not create subscriber socket: {source}")]
    Socket { source: zmq::Error },
    #[display("could not bind {endpoint}: {source}")]
    Bind { endpoint: String, source: zmq::Error },
    #[display("could not subscribe to topic: {source}")]
    Subscribe { source: zmq::Error },
    #[display("receive failed: {source}")]
    Receive { source: zmq::Error },
}

/// One part of a multi-part message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Part {
    pub data: Vec<u8>,
    /// More parts of the same message follow.
    pub more: bool,
}

/// Where message parts come from. Waits at most `timeout` for the next part.
pub trait PartSource {
    fn next_part(&mut self, timeout: Duration) -> Result<Option<Part>, TransportError>;
}

#[derive(Debug)]
pub enum Received {
    Frame { frame: Frame, fit: FrameFit },
    Stop,
}

/// Turns a stream of message parts into whole frames.
pub struct Receiver<S> {
    source: S,
    framer: Framer,
    poll_interval: Duration,
    rejected: u64,
}

impl<S: PartSource> Receiver<S> {
    pub fn new(source: S, topic: &[u8], poll_interval: Duration) -> Self {
        Self {
            source,
            framer: Framer::new(topic),
            poll_interval,
            rejected: 0,
        }
    }

    /// Blocks until a complete frame arrives, or returns [`Received::Stop`] within
    /// one poll interval of `cancel` being tripped. `idle` runs after every poll
    /// interval that brought nothing.
    pub fn receive_frame(
        &mut self,
        cancel: &CancelToken,
        mut idle: impl FnMut(),
    ) -> Result<Received, TransportError> {
        loop {
            if cancel.is_cancelled() {
                if !self.framer.is_idle() {
                    debug!("Stopping with a partly received message");
                }
                return Ok(Received::Stop);
            }
            let Some(part) = self.source.next_part(self.poll_interval)? else {
                idle();
                continue;
            };

            match self.framer.push(part) {
                Step::Pending => {}
                Step::Rejected(rejection) => {
                    warn!("Dropped message: {}", rejection);
                    self.rejected += 1;
                }
                Step::Payload {
                    payload,
                    extra_parts,
                } => {
                    if extra_parts > 0 {
                        warn!("Ignored {} extra message parts after payload", extra_parts);
                    }
                    let (frame, fit) = Frame::decode(&payload);
                    match fit {
                        FrameFit::Exact => {}
                        FrameFit::Short { received } => warn!(
                            "Short frame: {} of {} bytes, rest left black",
                            received,
                            Frame::BYTES
                        ),
                        FrameFit::Long { received } => warn!(
                            "Long frame: {} bytes, only the first {} used",
                            received,
                            Frame::BYTES
                        ),
                    }
                    return Ok(Received::Frame { frame, fit });
                }
            }
        }
    }

    /// Messages thrown away because they broke the topic-then-payload framing.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

/// Binds a subscriber at `endpoint` that only sees messages starting with `topic`.
pub fn bind(
    endpoint: &str,
    topic: &[u8],
    poll_interval: Duration,
) -> Result<Receiver<ZmqSource>, TransportError> {
    let source = ZmqSource::bind(endpoint, topic)?;
    Ok(Receiver::new(source, topic, poll_interval))
}

#[cfg(test)]
mod test {
    use std::{thread, time::Instant};

    use smart_leds::RGB8;

    use super::channel_source::ChannelSource;
    use super::*;

    fn part(data: &[u8], more: bool) -> Part {
        Part {
            data: data.to_vec(),
            more,
        }
    }

    #[test]
    fn test_two_part_message_yields_frame() {
        let (source, tx) = ChannelSource::new();
        let mut receiver = Receiver::new(source, b"A", Duration::from_millis(10));
        let payload = Frame::filled(RGB8::new(1, 2, 3));
        tx.send(part(b"A", true)).unwrap();
        tx.send(part(payload.as_bytes(), false)).unwrap();

        match receiver.receive_frame(&CancelToken::new(), || {}).unwrap() {
            Received::Frame { frame, fit } => {
                assert_eq!(fit, FrameFit::Exact);
                assert_eq!(frame, payload);
            }
            Received::Stop => panic!("expected a frame"),
        }
    }

    #[test]
    fn test_payload_without_topic_is_rejected() {
        let (source, tx) = ChannelSource::new();
        let mut receiver = Receiver::new(source, b"A", Duration::from_millis(10));
        let payload = Frame::filled(RGB8::new(9, 9, 9));
        tx.send(part(payload.as_bytes(), false)).unwrap();
        tx.send(part(b"A", true)).unwrap();
        tx.send(part(payload.as_bytes(), false)).unwrap();

        match receiver.receive_frame(&CancelToken::new(), || {}).unwrap() {
            Received::Frame { frame, .. } => assert_eq!(frame, payload),
            Received::Stop => panic!("expected a frame"),
        }
        assert_eq!(receiver.rejected(), 1);
    }

    #[test]
    fn test_short_payload_still_yields_frame() {
        let (source, tx) = ChannelSource::new();
        let mut receiver = Receiver::new(source, b"A", Duration::from_millis(10));
        tx.send(part(b"A", true)).unwrap();
        tx.send(part(&[255; Frame::BYTES / 2], false)).unwrap();

        match receiver.receive_frame(&CancelToken::new(), || {}).unwrap() {
            Received::Frame { frame, fit } => {
                assert_eq!(
                    fit,
                    FrameFit::Short {
                        received: Frame::BYTES / 2
                    }
                );
                assert_eq!(frame.pixel(63, 63), RGB8::new(0, 0, 0));
            }
            Received::Stop => panic!("expected a frame"),
        }
    }

    #[test]
    fn test_cancel_stops_blocked_receive() {
        let (source, _tx) = ChannelSource::new();
        let poll = Duration::from_millis(20);
        let mut receiver = Receiver::new(source, b"A", poll);
        let cancel = CancelToken::new();

        let trigger = cancel.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            trigger.cancel();
        });

        let start = Instant::now();
        let mut idle_calls = 0;
        assert!(matches!(
            receiver.receive_frame(&cancel, || idle_calls += 1).unwrap(),
            Received::Stop
        ));
        // 50ms until the cancel, then at most one poll interval plus scheduling slack
        assert!(start.elapsed() < Duration::from_millis(50) + poll * 10);
        // every empty poll interval gave the caller a turn
        assert!(idle_calls >= 2);
        canceller.join().unwrap();
    }

    #[test]
    fn test_already_cancelled_returns_immediately() {
        let (source, tx) = ChannelSource::new();
        let mut receiver = Receiver::new(source, b"A", Duration::from_millis(10));
        tx.send(part(b"A", true)).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();

        assert!(matches!(
            receiver.receive_frame(&cancel, || {}).unwrap(),
            Received::Stop
        ));
    }
}
