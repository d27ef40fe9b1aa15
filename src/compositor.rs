use derive_more::{Display, Error};
use log::{debug, info};

use crate::{
    cancel::CancelToken,
    config::PanelConfig,
    frame::Frame,
    geometry::Rotate180,
    panel::{HardwareInitError, PanelDriver, Surface},
};

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum DisplayError {
    #[display("display already shut down")]
    Terminated,
}

/// What a single `draw_frame` did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub written: usize,
    /// Source cells that had no place on the panel.
    pub dropped: usize,
}

/// Owns the panel driver and the surface being drawn into.
///
/// Frames are always written to the off-screen surface; [`Compositor::present`]
/// gives it to the driver and takes back the surface that was on screen, so a
/// stale surface handle can never be drawn into.
pub struct Compositor<D: PanelDriver> {
    driver: Option<D>,
    offscreen: Option<D::Surface>,
    transform: Rotate180,
}

impl<D: PanelDriver> Compositor<D> {
    pub fn initialize(
        config: &PanelConfig,
        cancel: &CancelToken,
    ) -> Result<Self, HardwareInitError> {
        Ok(Self::new(D::open(config, cancel)?))
    }

    pub fn new(mut driver: D) -> Self {
        let offscreen = driver.offscreen_surface();
        let transform = Rotate180::new(offscreen.width(), offscreen.height());
        Self {
            driver: Some(driver),
            offscreen: Some(offscreen),
            transform,
        }
    }

    /// `(panel_width, panel_height)`
    pub fn dimensions(&self) -> Result<(usize, usize), DisplayError> {
        let surface = self.offscreen.as_ref().ok_or(DisplayError::Terminated)?;
        Ok((surface.width(), surface.height()))
    }

    pub fn mapping_name(&self) -> Result<&str, DisplayError> {
        let driver = self.driver.as_ref().ok_or(DisplayError::Terminated)?;
        Ok(driver.mapping_name())
    }

    pub fn draw_frame(&mut self, frame: &Frame) -> Result<DrawStats, DisplayError> {
        let surface = self.offscreen.as_mut().ok_or(DisplayError::Terminated)?;
        let mut stats = DrawStats::default();

        for (x, y, color) in frame.pixels() {
            match self.transform.apply(x, y) {
                Some(point) => {
                    surface.set_pixel(point, color);
                    stats.written += 1;
                }
                None => stats.dropped += 1,
            }
        }
        debug!(
            "Drew frame: {} pixels written, {} dropped",
            stats.written, stats.dropped
        );
        Ok(stats)
    }

    /// Swaps at the next vsync and returns the new off-screen surface.
    pub fn present(&mut self) -> Result<&D::Surface, DisplayError> {
        let driver = self.driver.as_mut().ok_or(DisplayError::Terminated)?;
        let drawn = self.offscreen.take().ok_or(DisplayError::Terminated)?;
        let next = self.offscreen.insert(driver.swap_on_vsync(drawn));
        Ok(&*next)
    }

    /// Lets the driver serve its own events while nothing is being drawn.
    pub fn idle(&mut self) {
        if let Some(driver) = self.driver.as_mut() {
            driver.idle();
        }
    }

    /// Releases the driver and both surfaces. Returns `false` if that already happened.
    pub fn shutdown(&mut self) -> bool {
        self.offscreen = None;
        match self.driver.take() {
            Some(driver) => {
                drop(driver);
                info!("Display shut down");
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub fn is_terminated(&self) -> bool {
        self.driver.is_none()
    }

    #[cfg(test)]
    pub fn driver(&self) -> Option<&D> {
        self.driver.as_ref()
    }
}

impl<D: PanelDriver> Drop for Compositor<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod test {
    use rand::Rng;
    use smart_leds::RGB8;

    use super::*;
    use crate::{
        geometry::PanelPoint,
        panel::memory::{MemoryPanel, MemorySurface},
    };

    fn compositor(width: usize, height: usize) -> Compositor<MemoryPanel> {
        Compositor::new(MemoryPanel::new(width, height, None))
    }

    fn displayed(compositor: &Compositor<MemoryPanel>) -> &MemorySurface {
        compositor.driver().unwrap().displayed()
    }

    #[test]
    fn test_initialize_from_config() {
        let compositor =
            Compositor::<MemoryPanel>::initialize(&PanelConfig::default(), &CancelToken::new())
                .unwrap();
        assert_eq!(compositor.dimensions(), Ok((64, 64)));
        assert_eq!(compositor.mapping_name(), Ok("regular"));
    }

    #[test]
    fn test_initialize_rejects_bad_config() {
        let config = PanelConfig {
            chain_length: 0,
            ..PanelConfig::default()
        };
        let result = Compositor::<MemoryPanel>::initialize(&config, &CancelToken::new());
        assert!(matches!(
            result,
            Err(HardwareInitError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_pattern_round_trip() {
        let mut frame = Frame::new();
        for x in 0..Frame::WIDTH {
            for y in 0..Frame::HEIGHT {
                frame.set_pixel(x, y, RGB8::new(x as u8, y as u8, ((x + y) % 256) as u8));
            }
        }

        let mut compositor = compositor(64, 64);
        let stats = compositor.draw_frame(&frame).unwrap();
        assert_eq!(stats, DrawStats { written: 4096, dropped: 0 });
        compositor.present().unwrap();

        let transform = Rotate180::new(64, 64);
        let shown = displayed(&compositor);
        for x in 0..Frame::WIDTH {
            for y in 0..Frame::HEIGHT {
                let point = transform.apply(x, y).unwrap();
                assert_eq!(shown.pixel(point), Some(frame.pixel(x, y)));
            }
        }
    }

    #[test]
    fn test_random_frame_round_trip() {
        let mut rng = rand::thread_rng();
        let mut frame = Frame::new();
        for x in 0..Frame::WIDTH {
            for y in 0..Frame::HEIGHT {
                frame.set_pixel(x, y, RGB8::new(rng.gen(), rng.gen(), rng.gen()));
            }
        }

        let mut compositor = compositor(64, 64);
        compositor.draw_frame(&frame).unwrap();
        compositor.present().unwrap();

        let shown = displayed(&compositor);
        for (x, y, color) in frame.pixels() {
            let point = PanelPoint {
                row: 63 - y,
                col: 63 - x,
            };
            assert_eq!(shown.pixel(point), Some(color));
        }
    }

    #[test]
    fn test_drawing_is_invisible_until_present() {
        let mut compositor = compositor(64, 64);
        let first_offscreen = compositor.offscreen.as_ref().unwrap().id();
        let first_displayed = displayed(&compositor).id();

        compositor
            .draw_frame(&Frame::filled(RGB8::new(255, 0, 0)))
            .unwrap();
        assert!(displayed(&compositor)
            .pixels()
            .iter()
            .all(|pixel| *pixel == RGB8::default()));

        let next_id = compositor.present().unwrap().id();
        assert_eq!(next_id, first_displayed);
        assert_eq!(displayed(&compositor).id(), first_offscreen);

        // drawing into the handed-back surface leaves the shown one alone
        compositor
            .draw_frame(&Frame::filled(RGB8::new(0, 0, 255)))
            .unwrap();
        assert!(displayed(&compositor)
            .pixels()
            .iter()
            .all(|pixel| *pixel == RGB8::new(255, 0, 0)));

        compositor.present().unwrap();
        assert!(displayed(&compositor)
            .pixels()
            .iter()
            .all(|pixel| *pixel == RGB8::new(0, 0, 255)));
    }

    #[test]
    fn test_smaller_panel_drops_pixels() {
        let mut compositor = compositor(32, 32);
        let stats = compositor
            .draw_frame(&Frame::filled(RGB8::new(1, 1, 1)))
            .unwrap();
        assert_eq!(
            stats,
            DrawStats {
                written: 32 * 32,
                dropped: 64 * 64 - 32 * 32
            }
        );
    }

    #[test]
    fn test_shutdown_once() {
        let mut compositor = compositor(8, 8);
        assert!(compositor.shutdown());
        assert!(compositor.is_terminated());
        assert!(!compositor.shutdown());

        assert_eq!(compositor.dimensions(), Err(DisplayError::Terminated));
        assert_eq!(
            compositor.draw_frame(&Frame::new()),
            Err(DisplayError::Terminated)
        );
        assert!(matches!(compositor.present(), Err(DisplayError::Terminated)));
    }
}
