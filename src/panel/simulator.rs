use log::{debug, warn};
use sdl2::{
    event::Event,
    keyboard::Keycode,
    pixels::PixelFormatEnum,
    render::{Canvas, TextureCreator},
    video::{Window, WindowContext},
    EventPump,
};

use super::{
    memory::{MemoryPanel, MemorySurface},
    HardwareInitError, PanelDriver, Surface,
};
use crate::{cancel::CancelToken, config::PanelConfig};

const SCALE: u32 = 8;

macro_rules! init_error {
    ($result:expr) => {
        $result.map_err(|err| HardwareInitError::Driver {
            reason: err.to_string(),
        })?
    };
}

/// Shows the panel in an SDL window. The canvas presents on vsync, so a swap
/// blocks until the monitor's next refresh just like the real panel.
pub struct SimulatorPanel {
    buffers: MemoryPanel,
    event_pump: EventPump,
    canvas: Canvas<Window>,
    tex_creator: TextureCreator<WindowContext>,
    cancel: CancelToken,
    mapping: String,
    width: u32,
    height: u32,
}

impl SimulatorPanel {
    fn handle_input(&mut self) {
        for event in self.event_pump.poll_iter() {
            match event {
                Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                }
                | Event::Quit { .. } => self.cancel.cancel(),
                _ => { /* do nothing */ }
            }
        }
    }

    fn render(&mut self) -> Result<(), String> {
        let shown = self.buffers.displayed();
        let pitch = shown.width() * 3;
        let rgb = shown.to_rgb24();
        let mut texture = self
            .tex_creator
            .create_texture_streaming(PixelFormatEnum::RGB24, self.width, self.height)
            .map_err(|err| err.to_string())?;
        texture
            .update(None, &rgb, pitch)
            .map_err(|err| err.to_string())?;
        self.canvas.copy(&texture, None, None)?;
        self.canvas.present();
        Ok(())
    }
}

impl PanelDriver for SimulatorPanel {
    type Surface = MemorySurface;

    fn open(config: &PanelConfig, cancel: &CancelToken) -> Result<Self, HardwareInitError> {
        let (width, height) = config.dimensions()?;
        if !config.led_options.is_empty() {
            debug!(
                "Ignoring {} driver option(s) in the simulator",
                config.led_options.len()
            );
        }
        let too_large = |_| HardwareInitError::InvalidConfig {
            reason: format!("{}x{} is too large to simulate", width, height),
        };
        let texture_width = u32::try_from(width).map_err(too_large)?;
        let texture_height = u32::try_from(height).map_err(too_large)?;
        let sdl = init_error!(sdl2::init());
        let window = init_error!(init_error!(sdl.video())
            .window(
                "ledsub",
                texture_width.saturating_mul(SCALE),
                texture_height.saturating_mul(SCALE),
            )
            .position_centered()
            .build());
        let canvas = init_error!(window.into_canvas().present_vsync().build());
        let tex_creator = canvas.texture_creator();
        let event_pump = init_error!(sdl.event_pump());

        Ok(Self {
            // the canvas already waits for vsync
            buffers: MemoryPanel::new(width, height, None),
            event_pump,
            canvas,
            tex_creator,
            cancel: cancel.clone(),
            mapping: config.hardware_mapping.clone(),
            width: texture_width,
            height: texture_height,
        })
    }

    fn offscreen_surface(&mut self) -> MemorySurface {
        self.buffers.offscreen_surface()
    }

    fn swap_on_vsync(&mut self, surface: MemorySurface) -> MemorySurface {
        let previous = self.buffers.swap_on_vsync(surface);
        if let Err(err) = self.render() {
            warn!("Simulator render failed: {}", err);
        }
        self.handle_input();
        previous
    }

    fn mapping_name(&self) -> &str {
        &self.mapping
    }

    fn idle(&mut self) {
        self.handle_input();
    }
}
