use std::fmt;

use smart_leds::RGB8;

/// How a received payload lined up against the fixed frame size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameFit {
    Exact,
    /// The tail past `received` bytes was left black.
    Short { received: usize },
    /// Everything past `Frame::BYTES` was ignored.
    Long { received: usize },
}

/// One complete 64x64 RGB snapshot as published on the wire.
///
/// Stored flat, in wire order: the byte for channel `c` of cell `(x, y)` lives at
/// `x * HEIGHT * 3 + y * 3 + c`.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
}

impl Frame {
    pub const WIDTH: usize = 64;
    pub const HEIGHT: usize = 64;
    pub const CHANNELS: usize = 3;
    pub const BYTES: usize = Frame::WIDTH * Frame::HEIGHT * Frame::CHANNELS;

    pub fn new() -> Self {
        Frame {
            data: vec![0; Frame::BYTES],
        }
    }

    #[cfg(test)]
    pub fn filled(color: RGB8) -> Self {
        let mut frame = Frame::new();
        for cell in frame.data.chunks_exact_mut(Frame::CHANNELS) {
            cell.copy_from_slice(&[color.r, color.g, color.b]);
        }
        frame
    }

    /// Copies a payload into a frame of exactly `Frame::BYTES` bytes, never
    /// trusting the sender's length.
    pub fn decode(payload: &[u8]) -> (Self, FrameFit) {
        let mut frame = Frame::new();
        let used = payload.len().min(Frame::BYTES);
        frame.data[..used].copy_from_slice(&payload[..used]);

        let fit = match payload.len() {
            len if len == Frame::BYTES => FrameFit::Exact,
            len if len < Frame::BYTES => FrameFit::Short { received: len },
            len => FrameFit::Long { received: len },
        };
        (frame, fit)
    }

    #[cfg(test)]
    const fn index(x: usize, y: usize) -> usize {
        x * Frame::HEIGHT * Frame::CHANNELS + y * Frame::CHANNELS
    }

    #[cfg(test)]
    pub fn pixel(&self, x: usize, y: usize) -> RGB8 {
        let base = Frame::index(x, y);
        RGB8::new(self.data[base], self.data[base + 1], self.data[base + 2])
    }

    #[cfg(test)]
    pub fn set_pixel(&mut self, x: usize, y: usize, color: RGB8) {
        let base = Frame::index(x, y);
        self.data[base] = color.r;
        self.data[base + 1] = color.g;
        self.data[base + 2] = color.b;
    }

    /// Cells in wire order, `x` outermost.
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize, RGB8)> + '_ {
        self.data
            .chunks_exact(Frame::CHANNELS)
            .enumerate()
            .map(|(idx, cell)| {
                (
                    idx / Frame::HEIGHT,
                    idx % Frame::HEIGHT,
                    RGB8::new(cell[0], cell[1], cell[2]),
                )
            })
    }

    #[cfg(test)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl Default for Frame {
    fn default() -> Self {
        Frame::new()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({}x{})", Frame::WIDTH, Frame::HEIGHT)
    }
}
