#[cfg(test)]
use std::sync::{Arc, Mutex};
use std::{
    thread,
    time::{Duration, Instant},
};

use log::{debug, trace};
use smart_leds::RGB8;

use super::{HardwareInitError, PanelDriver, Surface};
use crate::{cancel::CancelToken, config::PanelConfig, geometry::PanelPoint};

/// RGB buffer laid out like the canvas, one line after another: `y * width + x`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemorySurface {
    id: usize,
    width: usize,
    height: usize,
    pixels: Vec<RGB8>,
}

impl MemorySurface {
    pub fn new(id: usize, width: usize, height: usize) -> Self {
        Self {
            id,
            width,
            height,
            pixels: vec![RGB8::default(); width * height],
        }
    }

    fn offset(&self, point: PanelPoint) -> Option<usize> {
        let (x, y) = point.canvas_xy();
        (x < self.width && y < self.height).then_some(y * self.width + x)
    }

    /// Identifies the buffer across swaps.
    #[cfg(test)]
    pub const fn id(&self) -> usize {
        self.id
    }

    #[cfg(test)]
    pub fn pixel(&self, point: PanelPoint) -> Option<RGB8> {
        self.offset(point).map(|offset| self.pixels[offset])
    }

    #[cfg(test)]
    pub fn pixels(&self) -> &[RGB8] {
        &self.pixels
    }

    #[cfg(test)]
    pub fn fill(&mut self, color: RGB8) {
        self.pixels.fill(color);
    }

    /// Packed RGB24, the layout SDL textures take.
    #[cfg(any(test, feature = "simulator"))]
    pub fn to_rgb24(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|pixel| [pixel.r, pixel.g, pixel.b])
            .collect()
    }
}

impl Surface for MemorySurface {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn set_pixel(&mut self, point: PanelPoint, color: RGB8) {
        if let Some(offset) = self.offset(point) {
            self.pixels[offset] = color;
        }
    }
}

/// Read-only view of what a [`MemoryPanel`] currently shows. Outlives the panel.
#[cfg(test)]
#[derive(Clone, Debug)]
pub struct PanelMonitor {
    shown: Arc<Mutex<MemorySurface>>,
}

#[cfg(test)]
impl PanelMonitor {
    pub fn snapshot(&self) -> MemorySurface {
        match self.shown.lock() {
            Ok(shown) => shown.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn publish(&self, displayed: &MemorySurface) {
        match self.shown.lock() {
            Ok(mut shown) => shown.clone_from(displayed),
            Err(poisoned) => poisoned.into_inner().clone_from(displayed),
        }
    }
}

/// Headless panel. Keeps the displayed buffer in memory and paces swaps to the
/// configured refresh rate the way a real panel's vsync would.
pub struct MemoryPanel {
    width: usize,
    height: usize,
    mapping: String,
    displayed: MemorySurface,
    next_id: usize,
    frame_interval: Option<Duration>,
    next_vsync: Instant,
    #[cfg(test)]
    monitor: Option<PanelMonitor>,
}

impl MemoryPanel {
    pub fn new(width: usize, height: usize, frame_interval: Option<Duration>) -> Self {
        Self {
            width,
            height,
            mapping: "memory".to_owned(),
            displayed: MemorySurface::new(0, width, height),
            next_id: 1,
            frame_interval,
            next_vsync: Instant::now(),
            #[cfg(test)]
            monitor: None,
        }
    }

    #[cfg(any(test, feature = "simulator"))]
    pub fn displayed(&self) -> &MemorySurface {
        &self.displayed
    }

    #[cfg(test)]
    pub fn monitor(&mut self) -> PanelMonitor {
        self.monitor
            .get_or_insert_with(|| PanelMonitor {
                shown: Arc::new(Mutex::new(self.displayed.clone())),
            })
            .clone()
    }

    fn wait_for_vsync(&mut self) {
        let Some(interval) = self.frame_interval else {
            return;
        };
        let now = Instant::now();
        if now < self.next_vsync {
            thread::sleep(self.next_vsync - now);
            self.next_vsync += interval;
        } else {
            debug!("Swap late by {:?}", now - self.next_vsync);
            self.next_vsync = now + interval;
        }
    }
}

impl PanelDriver for MemoryPanel {
    type Surface = MemorySurface;

    fn open(config: &PanelConfig, _cancel: &CancelToken) -> Result<Self, HardwareInitError> {
        let (width, height) = config.dimensions()?;
        if !config.led_options.is_empty() {
            debug!(
                "Ignoring {} driver option(s) without a matrix attached",
                config.led_options.len()
            );
        }
        let mut panel = Self::new(width, height, config.frame_interval());
        panel.mapping = config.hardware_mapping.clone();
        Ok(panel)
    }

    fn offscreen_surface(&mut self) -> MemorySurface {
        let surface = MemorySurface::new(self.next_id, self.width, self.height);
        self.next_id += 1;
        surface
    }

    fn swap_on_vsync(&mut self, surface: MemorySurface) -> MemorySurface {
        self.wait_for_vsync();
        let previous = std::mem::replace(&mut self.displayed, surface);
        trace!("Surface {} on screen, {} back", self.displayed.id, previous.id);

        #[cfg(test)]
        if let Some(monitor) = &self.monitor {
            monitor.publish(&self.displayed);
        }
        previous
    }

    fn mapping_name(&self) -> &str {
        &self.mapping
    }
}
