use std::{fmt, mem};

// Topic parts are short; anything longer is only shown this far in logs.
const TOPIC_DISPLAY_CAP: usize = 255;

#[derive(Debug, PartialEq, Eq)]
pub enum Rejection {
    /// A single-part message: a payload that was never announced by a topic.
    PayloadWithoutTopic { len: usize },
    /// The topic part did not start with the subscribed prefix.
    ForeignTopic { topic: Vec<u8> },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::PayloadWithoutTopic { len } => {
                write!(f, "payload of {} bytes without a topic part", len)
            }
            Rejection::ForeignTopic { topic } => {
                let shown = &topic[..topic.len().min(TOPIC_DISPLAY_CAP)];
                write!(f, "unexpected topic {:?}", String::from_utf8_lossy(shown))
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    /// Mid-message, keep feeding parts.
    Pending,
    Payload {
        payload: Vec<u8>,
        extra_parts: usize,
    },
    Rejected(Rejection),
}

#[derive(Debug, PartialEq, Eq)]
enum State {
    AwaitingTopic,
    AwaitingPayload { topic_ok: bool, topic: Vec<u8> },
    /// Payload is in hand, swallowing trailing parts until the message ends.
    Draining { payload: Vec<u8>, extra_parts: usize },
}

/// Topic-then-payload framing over a stream of message parts.
///
/// A message is `[topic, payload]`. Every message is consumed to its last part
/// before the framer goes back to waiting for a topic, so one malformed message
/// can never shift the boundaries of the next.
#[derive(Debug)]
pub struct Framer {
    filter: Vec<u8>,
    state: State,
}

impl Framer {
    pub fn new(filter: &[u8]) -> Self {
        Self {
            filter: filter.to_vec(),
            state: State::AwaitingTopic,
        }
    }

    pub fn push(&mut self, part: super::Part) -> Step {
        let state = mem::replace(&mut self.state, State::AwaitingTopic);

        match state {
            State::AwaitingTopic if part.more => {
                self.state = State::AwaitingPayload {
                    topic_ok: part.data.starts_with(&self.filter),
                    topic: part.data,
                };
                Step::Pending
            }
            State::AwaitingTopic => Step::Rejected(Rejection::PayloadWithoutTopic {
                len: part.data.len(),
            }),
            State::AwaitingPayload { topic_ok, topic } => {
                if !topic_ok {
                    if part.more {
                        self.state = State::AwaitingPayload { topic_ok, topic };
                        return Step::Pending;
                    }
                    return Step::Rejected(Rejection::ForeignTopic { topic });
                }
                if part.more {
                    self.state = State::Draining {
                        payload: part.data,
                        extra_parts: 0,
                    };
                    return Step::Pending;
                }
                Step::Payload {
                    payload: part.data,
                    extra_parts: 0,
                }
            }
            State::Draining {
                payload,
                extra_parts,
            } => {
                if part.more {
                    self.state = State::Draining {
                        payload,
                        extra_parts: extra_parts + 1,
                    };
                    return Step::Pending;
                }
                Step::Payload {
                    payload,
                    extra_parts: extra_parts + 1,
                }
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == State::AwaitingTopic
    }
}
