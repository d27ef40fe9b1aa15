use log::debug;
use rpi_led_matrix::{LedCanvas, LedColor, LedMatrix, LedMatrixOptions, LedRuntimeOptions};
use smart_leds::RGB8;

use super::{HardwareInitError, PanelDriver, Surface};
use crate::{
    cancel::CancelToken,
    config::{LedOption, PanelConfig, PixelMapper},
    geometry::PanelPoint,
};

fn led_color(color: RGB8) -> LedColor {
    LedColor {
        red: color.r,
        green: color.g,
        blue: color.b,
    }
}

fn coord(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

impl Surface for LedCanvas {
    fn width(&self) -> usize {
        usize::try_from(self.canvas_size().0).unwrap_or(0)
    }

    fn height(&self) -> usize {
        usize::try_from(self.canvas_size().1).unwrap_or(0)
    }

    fn set_pixel(&mut self, point: PanelPoint, color: RGB8) {
        let (x, y) = point.canvas_xy();
        self.set(coord(x), coord(y), &led_color(color));
    }
}

fn apply_option(
    option: &LedOption,
    matrix: &mut LedMatrixOptions,
    runtime: &mut LedRuntimeOptions,
) {
    match option {
        LedOption::RowAddrType(kind) => matrix.set_row_addr_type(*kind),
        LedOption::Multiplexing(kind) => matrix.set_multiplexing(*kind),
        LedOption::ScanMode(mode) => matrix.set_scan_mode(*mode),
        LedOption::RgbSequence(sequence) => matrix.set_led_rgb_sequence(sequence),
        LedOption::PwmLsbNanoseconds(ns) => matrix.set_pwm_lsb_nanoseconds(*ns),
        LedOption::PwmDitherBits(bits) => matrix.set_pwm_dither_bits(*bits),
        LedOption::NoHardwarePulse => matrix.set_hardware_pulsing(false),
        LedOption::ShowRefresh => matrix.set_refresh_rate(true),
        LedOption::Inverse => matrix.set_inverse_colors(true),
        LedOption::PanelType(kind) => matrix.set_panel_type(kind),
        LedOption::LimitRefresh(hz) => matrix.set_limit_refresh(*hz),
        LedOption::Daemon => runtime.set_daemon(true),
        LedOption::DropPrivileges(drop) => runtime.set_drop_privileges(*drop),
    }
}

/// HUB75 panel chain driven through rpi-rgb-led-matrix. Needs GPIO access,
/// which usually means running as root.
pub struct MatrixPanel {
    matrix: LedMatrix,
    mapping: String,
}

impl PanelDriver for MatrixPanel {
    type Surface = LedCanvas;

    fn open(config: &PanelConfig, _cancel: &CancelToken) -> Result<Self, HardwareInitError> {
        config.validate()?;
        let invalid = |reason: &str| HardwareInitError::InvalidConfig {
            reason: reason.to_owned(),
        };
        let count = |value: usize| {
            u32::try_from(value).map_err(|_| HardwareInitError::InvalidConfig {
                reason: format!("{} is out of range", value),
            })
        };

        let mut options = LedMatrixOptions::new();
        options.set_rows(count(config.rows)?);
        options.set_cols(count(config.cols)?);
        options.set_chain_length(count(config.chain_length)?);
        options.set_parallel(count(config.parallel)?);
        options.set_hardware_mapping(&config.hardware_mapping);
        options.set_pixel_mapper_config(match config.pixel_mapper {
            PixelMapper::UMapper => config.pixel_mapper.name(),
            PixelMapper::None => "",
        });
        options.set_brightness(config.brightness).map_err(invalid)?;
        options.set_pwm_bits(config.pwm_bits).map_err(invalid)?;

        let mut runtime = LedRuntimeOptions::new();
        runtime.set_gpio_slowdown(config.slowdown_gpio);

        for option in &config.led_options {
            debug!("Driver option: {:?}", option);
            apply_option(option, &mut options, &mut runtime);
        }

        let matrix = LedMatrix::new(Some(options), Some(runtime)).map_err(|reason| {
            HardwareInitError::Driver {
                reason: reason.to_owned(),
            }
        })?;

        Ok(Self {
            matrix,
            mapping: config.hardware_mapping.clone(),
        })
    }

    fn offscreen_surface(&mut self) -> LedCanvas {
        self.matrix.offscreen_canvas()
    }

    fn swap_on_vsync(&mut self, surface: LedCanvas) -> LedCanvas {
        self.matrix.swap(surface)
    }

    fn mapping_name(&self) -> &str {
        &self.mapping
    }
}
