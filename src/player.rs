use eyre::{Result, WrapErr};

use crate::{
    cancel::CancelToken,
    compositor::Compositor,
    frame::FrameFit,
    panel::PanelDriver,
    transport::{PartSource, Received, Receiver},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames: u64,
    pub short_frames: u64,
    pub long_frames: u64,
    pub rejected_messages: u64,
    pub dropped_pixels: u64,
}

/// Receive, draw, present, until `cancel` trips or the transport fails. The
/// compositor is shut down on the way out either way.
pub fn run<S, D>(
    receiver: &mut Receiver<S>,
    compositor: &mut Compositor<D>,
    cancel: &CancelToken,
) -> Result<LoopStats>
where
    S: PartSource,
    D: PanelDriver,
{
    let outcome = render_loop(receiver, compositor, cancel);
    compositor.shutdown();
    outcome
}

fn render_loop<S, D>(
    receiver: &mut Receiver<S>,
    compositor: &mut Compositor<D>,
    cancel: &CancelToken,
) -> Result<LoopStats>
where
    S: PartSource,
    D: PanelDriver,
{
    let mut stats = LoopStats::default();

    loop {
        let (frame, fit) = match receiver
            .receive_frame(cancel, || compositor.idle())
            .wrap_err("Failed to receive frame")?
        {
            Received::Frame { frame, fit } => (frame, fit),
            Received::Stop => break,
        };

        match fit {
            FrameFit::Exact => {}
            FrameFit::Short { .. } => stats.short_frames += 1,
            FrameFit::Long { .. } => stats.long_frames += 1,
        }

        let drawn = compositor.draw_frame(&frame)?;
        stats.dropped_pixels += drawn.dropped as u64;
        compositor.present()?;
        stats.frames += 1;
    }

    stats.rejected_messages = receiver.rejected();
    Ok(stats)
}
