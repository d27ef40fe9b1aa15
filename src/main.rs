#![warn(trivial_numeric_casts)]

mod cancel;
mod compositor;
mod config;
mod frame;
mod geometry;
mod panel;
mod player;
mod transport;

use std::{env, process::ExitCode};

use cancel::CancelToken;
use compositor::Compositor;
use config::{Backend, Command, Config, USAGE};
use log::{error, info, warn};
use panel::{memory::MemoryPanel, PanelDriver};

fn start<D: PanelDriver>(config: &Config, cancel: &CancelToken) -> ExitCode {
    // The panel comes up before any transport is opened; without it there is
    // nothing to render to.
    let mut compositor = match Compositor::<D>::initialize(&config.panel, cancel) {
        Ok(compositor) => compositor,
        Err(err) => {
            error!("{}", err);
            return ExitCode::from(1);
        }
    };

    if let (Ok((width, height)), Ok(mapping)) =
        (compositor.dimensions(), compositor.mapping_name())
    {
        info!(
            "Size: {}x{}. Hardware gpio mapping: {}",
            width, height, mapping
        );
    }
    info!("Pixel mapper: {}", config.panel.pixel_mapper.name());
    if !config.panel.led_options.is_empty() {
        info!("Driver options: {:?}", config.panel.led_options);
    }

    let mut receiver = match transport::bind(&config.endpoint, &config.topic, config.poll_interval)
    {
        Ok(receiver) => receiver,
        Err(err) => {
            error!("{}", err);
            compositor.shutdown();
            return ExitCode::from(1);
        }
    };
    info!(
        "Listening on {} for topic {:?}",
        receiver.source().endpoint(),
        String::from_utf8_lossy(&config.topic)
    );

    match player::run(&mut receiver, &mut compositor, cancel) {
        Ok(stats) => {
            info!(
                "Stopped after {} frames ({} short, {} long, {} messages rejected)",
                stats.frames, stats.short_frames, stats.long_frames, stats.rejected_messages
            );
            if stats.dropped_pixels > 0 {
                warn!(
                    "{} pixels fell outside the panel and were not drawn",
                    stats.dropped_pixels
                );
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{:?}", err);
            ExitCode::from(1)
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_args(env::args().skip(1)) {
        Ok(Command::Run(config)) => config,
        Ok(Command::Help) => {
            println!("{}", USAGE);
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("{}\n\n{}", err, USAGE);
            return ExitCode::from(2);
        }
    };

    let cancel = CancelToken::new();
    if let Err(err) = cancel.cancel_on_interrupt() {
        error!("Could not install interrupt handler: {}", err);
        return ExitCode::from(1);
    }

    match config.backend {
        Backend::Headless => start::<MemoryPanel>(&config, &cancel),
        #[cfg(feature = "simulator")]
        Backend::Simulator => start::<panel::simulator::SimulatorPanel>(&config, &cancel),
        #[cfg(feature = "hardware")]
        Backend::Hardware => start::<panel::matrix::MatrixPanel>(&config, &cancel),
        #[allow(unreachable_patterns)]
        other => {
            // from_args refuses backends that were not compiled in
            error!("Backend {} is not available", other);
            ExitCode::from(2)
        }
    }
}
