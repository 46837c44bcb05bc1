use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;
use simplelog::{ColorChoice, TermLogger, TerminalMode};

use mmio_bus::config::Scenario;
use mmio_bus::display::{ConsoleSink, Screen, StdoutSink};
use mmio_bus::framebuffer::{DisplaySink, Frame};
use mmio_bus::memory::Address;
use mmio_bus::simulation::{Outcome, Simulation};

#[derive(Parser)]
#[command(about = "Runs a client program against the memory-mapped console and framebuffer")]
struct Cli {
    /// Scenario file describing the address map, scheduling and program.
    scenario: PathBuf,
    /// Overrides the scenario's step limit.
    #[arg(long)]
    max_steps: Option<u64>,
    /// Raw image to load onto the bus before starting.
    #[arg(long)]
    image: Option<PathBuf>,
    /// Address the image is loaded at (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = parse_address, default_value = "0")]
    image_base: Address,
    /// Render console output on an 80x25 text screen instead of streaming it.
    #[arg(long)]
    screen: bool,
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_address(string: &str) -> Result<Address, std::num::ParseIntError> {
    if string.starts_with("0x") {
        Address::from_str_radix(string.trim_start_matches("0x"), 16)
    } else {
        Address::from_str_radix(string, 10)
    }
}

struct FrameLogger;

impl DisplaySink for FrameLogger {
    fn present(&mut self, frame: &Frame) {
        let lit = frame.lit_cells();
        log::debug!(
            "frame {}x{}: {} lit cells, first {:?}",
            frame.width(),
            frame.height(),
            lit.len(),
            lit.first()
        );
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if let Err(err) = TermLogger::init(
        level,
        simplelog::Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    ) {
        eprintln!("unable to initialize logger: {}", err);
    }

    let mut scenario = match Scenario::from_file(&cli.scenario) {
        Ok(scenario) => scenario,
        Err(err) => {
            log::error!("{}: {}", cli.scenario.display(), err);
            return ExitCode::FAILURE;
        }
    };
    if cli.max_steps.is_some() {
        scenario.simulation.max_steps = cli.max_steps;
    }

    let mut bus = match scenario.build_bus() {
        Ok(bus) => bus,
        Err(err) => {
            log::error!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    if let Some(path) = &cli.image {
        match std::fs::read(path) {
            Ok(image) => {
                let loaded = bus.load(cli.image_base, &image);
                log::info!(
                    "loaded {} bytes from {} at 0x{:04x}",
                    loaded,
                    path.display(),
                    cli.image_base
                );
            }
            Err(err) => {
                log::error!("unable to read image {}: {}", path.display(), err);
                return ExitCode::FAILURE;
            }
        }
    }

    let mut stdout_sink = StdoutSink;
    let mut screen = Screen::new();
    let console_sink: &mut dyn ConsoleSink = if cli.screen {
        &mut screen
    } else {
        &mut stdout_sink
    };
    let mut frame_logger = FrameLogger;

    let mut simulation = Simulation::new(bus, scenario.script(), scenario.simulation)
        .with_console_sink(console_sink)
        .with_display_sink(&mut frame_logger);

    let result = simulation.run();
    drop(simulation);

    // The screen is only drawn once the run is over, whatever its outcome.
    if cli.screen {
        println!("{}", screen.render());
    }

    match result {
        Ok(Outcome::Finished { steps }) => {
            log::info!("program finished after {} steps", steps);
            ExitCode::SUCCESS
        }
        Ok(Outcome::StepLimit { steps }) => {
            log::info!("stopped after {} steps", steps);
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
