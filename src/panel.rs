//! The panel hardware capability: whatever sits behind it owns both surfaces
//! and decides when a swap becomes visible.

pub mod memory;
#[cfg(feature = "hardware")]
pub mod matrix;
#[cfg(feature = "simulator")]
pub mod simulator;

use derive_more::{Display, Error};
use smart_leds::RGB8;

use crate::{cancel::CancelToken, config::PanelConfig, geometry::PanelPoint};

#[derive(Debug, Display, Error)]
pub enum HardwareInitError {
    #[display("invalid panel configuration: {reason}")]
    InvalidConfig { reason: String },
    #[cfg(any(feature = "simulator", feature = "hardware"))]
    #[display("panel driver failed to start: {reason}")]
    Driver { reason: String },
}

/// A drawable buffer matching the panel's pixel grid.
pub trait Surface {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    /// Out-of-range points are ignored.
    fn set_pixel(&mut self, point: PanelPoint, color: RGB8);
}

pub trait PanelDriver: Sized {
    type Surface: Surface;

    fn open(config: &PanelConfig, cancel: &CancelToken) -> Result<Self, HardwareInitError>;

    fn offscreen_surface(&mut self) -> Self::Surface;

    /// Shows `surface` at the next vertical sync and hands back the one that was
    /// on screen until now. Blocks until the swap happened.
    fn swap_on_vsync(&mut self, surface: Self::Surface) -> Self::Surface;

    fn mapping_name(&self) -> &str;

    /// Called while no frame is arriving, so drivers with an event queue
    /// keep serving it between swaps.
    fn idle(&mut self) {}
}
