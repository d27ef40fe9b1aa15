use std::{str::FromStr, time::Duration};

use derive_more::{Display, Error};

use crate::panel::HardwareInitError;

pub const DEFAULT_ENDPOINT: &str = "tcp://127.0.0.1:5555";
pub const DEFAULT_TOPIC: &str = "A";
const DEFAULT_POLL_MS: u64 = 100;
// largest surface side accepted, far past any real HUB75 chain
const MAX_SURFACE_SIDE: usize = 4096;

pub const USAGE: &str = "\
Usage: ledsub [options] [--led-* panel options]

  --endpoint <addr>     address to bind the subscriber to (default tcp://127.0.0.1:5555)
  --topic <prefix>      subscription topic filter (default A)
  --backend <name>      hardware | simulator | headless
  --poll-ms <n>         how often a blocked receive checks for shutdown (default 100)
  -h, --help            show this text

Panel options:
  --led-rows <n>            rows per module (default 32)
  --led-cols <n>            columns per module (default 64)
  --led-chain <n>           modules daisy-chained (default 2)
  --led-parallel <n>        parallel chains (default 1)
  --led-gpio-mapping <name> hardware pin mapping (default regular)
  --led-pixel-mapper <name> U-mapper | none (default U-mapper)
  --led-brightness <pct>    1-100 (default 100)
  --led-pwm-bits <n>        1-11 (default 11)
  --led-slowdown-gpio <n>   0-4 (default 1)
  --led-refresh-hz <n>      swap rate of the headless and simulator panels, 0 = unpaced (default 60)

The other rpi-rgb-led-matrix flags (--led-row-addr-type, --led-multiplexing,
--led-scan-mode, --led-rgb-sequence, --led-pwm-lsb-nanoseconds,
--led-pwm-dither-bits, --led-panel-type, --led-limit-refresh,
--led-no-hardware-pulse, --led-show-refresh, --led-inverse, --led-daemon,
--led-drop-privileges, --led-no-drop-privs) are handed to the hardware driver.
Any other --led-* flag stops the panel from starting.";

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[display("unknown option {option}")]
    UnknownOption { option: String },
    #[display("option {option} needs a value")]
    MissingValue { option: String },
    #[display("invalid value {value:?} for {option}")]
    InvalidValue { option: String, value: String },
    #[display("backend {backend} is not compiled into this binary")]
    BackendUnavailable { backend: Backend },
}

/// Which panel driver renders the stream.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum Backend {
    #[display("hardware")]
    Hardware,
    #[display("simulator")]
    Simulator,
    #[display("headless")]
    Headless,
}

impl Backend {
    pub const fn compiled_in(self) -> bool {
        match self {
            Backend::Hardware => cfg!(feature = "hardware"),
            Backend::Simulator => cfg!(feature = "simulator"),
            Backend::Headless => true,
        }
    }

    fn preferred() -> Self {
        if cfg!(feature = "hardware") {
            Backend::Hardware
        } else if cfg!(feature = "simulator") {
            Backend::Simulator
        } else {
            Backend::Headless
        }
    }
}

impl FromStr for Backend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hardware" => Ok(Backend::Hardware),
            "simulator" => Ok(Backend::Simulator),
            "headless" => Ok(Backend::Headless),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelMapper {
    /// Folds the chain in half so two wide modules form a square.
    UMapper,
    None,
}

impl PixelMapper {
    pub const fn name(self) -> &'static str {
        match self {
            PixelMapper::UMapper => "U-mapper",
            PixelMapper::None => "none",
        }
    }
}

impl FromStr for PixelMapper {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "U-mapper" => Ok(PixelMapper::UMapper),
            "none" | "" => Ok(PixelMapper::None),
            _ => Err(()),
        }
    }
}

/// The rest of the rpi-rgb-led-matrix flag set, handed to the hardware driver as is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedOption {
    RowAddrType(u32),
    Multiplexing(u32),
    ScanMode(u32),
    RgbSequence(String),
    PwmLsbNanoseconds(u32),
    PwmDitherBits(u32),
    NoHardwarePulse,
    ShowRefresh,
    Inverse,
    PanelType(String),
    LimitRefresh(u32),
    Daemon,
    DropPrivileges(bool),
}

impl LedOption {
    /// `Some(true)` when `flag` is known and takes a value, `None` when unknown.
    pub fn takes_value(flag: &str) -> Option<bool> {
        match flag {
            "--led-row-addr-type"
            | "--led-multiplexing"
            | "--led-scan-mode"
            | "--led-rgb-sequence"
            | "--led-pwm-lsb-nanoseconds"
            | "--led-pwm-dither-bits"
            | "--led-panel-type"
            | "--led-limit-refresh" => Some(true),
            "--led-no-hardware-pulse"
            | "--led-show-refresh"
            | "--led-inverse"
            | "--led-daemon"
            | "--led-drop-privileges"
            | "--led-no-drop-privs" => Some(false),
            _ => None,
        }
    }

    /// Builds the option for `flag`; `None` when the flag is unknown.
    pub fn parse(flag: &str, value: Option<&str>) -> Option<Result<Self, ConfigError>> {
        let bad = || ConfigError::InvalidValue {
            option: flag.to_owned(),
            value: value.unwrap_or_default().to_owned(),
        };
        let ranged = |max: u32| -> Result<u32, ConfigError> {
            match value.map(str::parse::<u32>) {
                Some(Ok(n)) if n <= max => Ok(n),
                _ => Err(bad()),
            }
        };
        let text = || -> Result<String, ConfigError> {
            match value {
                Some(text) if !text.is_empty() => Ok(text.to_owned()),
                _ => Err(bad()),
            }
        };
        let switch = |option: LedOption| match value {
            None => Ok(option),
            Some(_) => Err(bad()),
        };

        Some(match flag {
            "--led-row-addr-type" => ranged(5).map(LedOption::RowAddrType),
            "--led-multiplexing" => ranged(18).map(LedOption::Multiplexing),
            "--led-scan-mode" => ranged(1).map(LedOption::ScanMode),
            "--led-rgb-sequence" => text().and_then(|sequence| {
                let mut letters: Vec<char> = sequence.to_ascii_uppercase().chars().collect();
                letters.sort_unstable();
                if letters == ['B', 'G', 'R'] {
                    Ok(LedOption::RgbSequence(sequence))
                } else {
                    Err(bad())
                }
            }),
            "--led-pwm-lsb-nanoseconds" => ranged(u32::MAX).map(LedOption::PwmLsbNanoseconds),
            "--led-pwm-dither-bits" => ranged(2).map(LedOption::PwmDitherBits),
            "--led-panel-type" => text().map(LedOption::PanelType),
            "--led-limit-refresh" => ranged(u32::MAX).map(LedOption::LimitRefresh),
            "--led-no-hardware-pulse" => switch(LedOption::NoHardwarePulse),
            "--led-show-refresh" => switch(LedOption::ShowRefresh),
            "--led-inverse" => switch(LedOption::Inverse),
            "--led-daemon" => switch(LedOption::Daemon),
            "--led-drop-privileges" => switch(LedOption::DropPrivileges(true)),
            "--led-no-drop-privs" => switch(LedOption::DropPrivileges(false)),
            _ => return None,
        })
    }
}

/// Physical panel options. Opaque to the render loop, consumed by the panel drivers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PanelConfig {
    pub rows: usize,
    pub cols: usize,
    pub chain_length: usize,
    pub parallel: usize,
    pub hardware_mapping: String,
    pub pixel_mapper: PixelMapper,
    pub brightness: u8,
    pub pwm_bits: u8,
    pub slowdown_gpio: u32,
    pub refresh_hz: u32,
    /// Remaining rpi-rgb-led-matrix flags, in the order given.
    pub led_options: Vec<LedOption>,
    /// `--led-*` flags nobody understands. Refused when the panel is opened.
    pub unknown_options: Vec<String>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            rows: 32,
            cols: 64,
            chain_length: 2,
            parallel: 1,
            hardware_mapping: "regular".to_owned(),
            pixel_mapper: PixelMapper::UMapper,
            brightness: 100,
            pwm_bits: 11,
            slowdown_gpio: 1,
            refresh_hz: 60,
            led_options: Vec::new(),
            unknown_options: Vec::new(),
        }
    }
}

impl PanelConfig {
    pub fn validate(&self) -> Result<(), HardwareInitError> {
        let invalid = |reason: String| Err(HardwareInitError::InvalidConfig { reason });

        if self.rows == 0 || self.cols == 0 || self.chain_length == 0 || self.parallel == 0 {
            return invalid(format!(
                "rows, cols, chain and parallel must be non-zero (got {}, {}, {}, {})",
                self.rows, self.cols, self.chain_length, self.parallel
            ));
        }
        if !(1..=3).contains(&self.parallel) {
            return invalid(format!("parallel must be 1-3, got {}", self.parallel));
        }
        if !(1..=100).contains(&self.brightness) {
            return invalid(format!("brightness must be 1-100, got {}", self.brightness));
        }
        if !(1..=11).contains(&self.pwm_bits) {
            return invalid(format!("pwm bits must be 1-11, got {}", self.pwm_bits));
        }
        if self.slowdown_gpio > 4 {
            return invalid(format!("gpio slowdown must be 0-4, got {}", self.slowdown_gpio));
        }
        if self.pixel_mapper == PixelMapper::UMapper && self.chain_length % 2 != 0 {
            return invalid(format!(
                "U-mapper needs an even chain length, got {}",
                self.chain_length
            ));
        }
        if !self.unknown_options.is_empty() {
            return invalid(format!(
                "unsupported panel options: {}",
                self.unknown_options.join(" ")
            ));
        }
        self.surface_size().map(|_| ())
    }

    fn surface_size(&self) -> Result<(usize, usize), HardwareInitError> {
        let (width, height) = match self.pixel_mapper {
            PixelMapper::UMapper => (
                self.cols
                    .checked_mul(self.chain_length)
                    .map(|width| width / 2),
                self.rows
                    .checked_mul(self.parallel)
                    .and_then(|height| height.checked_mul(2)),
            ),
            PixelMapper::None => (
                self.cols.checked_mul(self.chain_length),
                self.rows.checked_mul(self.parallel),
            ),
        };
        match (width, height) {
            (Some(width), Some(height))
                if width <= MAX_SURFACE_SIDE && height <= MAX_SURFACE_SIDE =>
            {
                Ok((width, height))
            }
            _ => Err(HardwareInitError::InvalidConfig {
                reason: format!(
                    "{} rows x {} cols, chain {}, parallel {} is larger than {}x{}",
                    self.rows,
                    self.cols,
                    self.chain_length,
                    self.parallel,
                    MAX_SURFACE_SIDE,
                    MAX_SURFACE_SIDE
                ),
            }),
        }
    }

    /// `(width, height)` of the drawable surface once the chain is laid out.
    pub fn dimensions(&self) -> Result<(usize, usize), HardwareInitError> {
        self.validate()?;
        self.surface_size()
    }

    /// Time between vsync boundaries on panels that emulate one.
    pub fn frame_interval(&self) -> Option<Duration> {
        match self.refresh_hz {
            0 => None,
            hz => Some(Duration::from_secs(1) / hz),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub endpoint: String,
    pub topic: Vec<u8>,
    pub backend: Backend,
    pub poll_interval: Duration,
    pub panel: PanelConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            topic: DEFAULT_TOPIC.as_bytes().to_vec(),
            backend: Backend::preferred(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_MS),
            panel: PanelConfig::default(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Run(Config),
    Help,
}

impl Config {
    /// Parses everything after the program name.
    pub fn from_args<I>(args: I) -> Result<Command, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Config::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            let (option, inline) = match arg.split_once('=') {
                Some((option, value)) if option.starts_with("--") => {
                    (option.to_owned(), Some(value.to_owned()))
                }
                _ => (arg.clone(), None),
            };
            let mut value = || -> Result<String, ConfigError> {
                match &inline {
                    Some(value) => Ok(value.clone()),
                    None => args.next().ok_or_else(|| ConfigError::MissingValue {
                        option: option.clone(),
                    }),
                }
            };

            match option.as_str() {
                "-h" | "--help" => return Ok(Command::Help),
                "--endpoint" => config.endpoint = value()?,
                "--topic" => config.topic = value()?.into_bytes(),
                "--backend" => {
                    let name = value()?;
                    let backend = parse(&option, &name)?;
                    config.backend = backend;
                }
                "--poll-ms" => {
                    let ms: u64 = parse(&option, &value()?)?;
                    config.poll_interval = Duration::from_millis(ms.max(1));
                }
                "--led-rows" => config.panel.rows = parse(&option, &value()?)?,
                "--led-cols" => config.panel.cols = parse(&option, &value()?)?,
                "--led-chain" => config.panel.chain_length = parse(&option, &value()?)?,
                "--led-parallel" => config.panel.parallel = parse(&option, &value()?)?,
                "--led-gpio-mapping" => config.panel.hardware_mapping = value()?,
                "--led-pixel-mapper" => config.panel.pixel_mapper = parse(&option, &value()?)?,
                "--led-brightness" => config.panel.brightness = parse(&option, &value()?)?,
                "--led-pwm-bits" => config.panel.pwm_bits = parse(&option, &value()?)?,
                "--led-slowdown-gpio" => config.panel.slowdown_gpio = parse(&option, &value()?)?,
                "--led-refresh-hz" => config.panel.refresh_hz = parse(&option, &value()?)?,
                flag if flag.starts_with("--led-") => match LedOption::takes_value(flag) {
                    Some(takes_value) => {
                        let given = if takes_value {
                            Some(value()?)
                        } else {
                            inline.clone()
                        };
                        if let Some(parsed) = LedOption::parse(flag, given.as_deref()) {
                            config.panel.led_options.push(parsed?);
                        }
                    }
                    None => config.panel.unknown_options.push(arg),
                },
                _ => return Err(ConfigError::UnknownOption { option: arg }),
            }
        }

        if !config.backend.compiled_in() {
            return Err(ConfigError::BackendUnavailable {
                backend: config.backend,
            });
        }
        Ok(Command::Run(config))
    }
}

fn parse<T: FromStr>(option: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        option: option.to_owned(),
        value: value.to_owned(),
    })
}
