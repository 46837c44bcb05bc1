use crate::bus::Bus;
use crate::client::{Client, Step};
use crate::display::ConsoleSink;
use crate::framebuffer::DisplaySink;
use crate::memory::Address;
use serde::Deserialize;
use std::num::NonZeroU64;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// The client kept busy-waiting on `address` for more than the configured spin budget.
    Hang {
        address: Address,
        spins: u64,
        steps: u64,
    },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Hang {
                address,
                spins,
                steps,
            } => write!(
                f,
                "client hung polling 0x{:04x}: {} consecutive spins after {} steps",
                address, spins, steps
            ),
        }
    }
}

impl std::error::Error for Error {}

/// When the console consumer task gets to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConsumerSchedule {
    /// After every client step.
    EveryStep,
    /// After every `n`-th client step. Zero is rejected when the schedule is parsed.
    Every(NonZeroU64),
    /// Never. Any client that waits on the console will hang.
    Absent,
}

impl ConsumerSchedule {
    fn is_due(&self, step: u64) -> bool {
        match *self {
            ConsumerSchedule::EveryStep => true,
            ConsumerSchedule::Every(n) => step % n.get() == 0,
            ConsumerSchedule::Absent => false,
        }
    }
}

impl Default for ConsumerSchedule {
    fn default() -> Self {
        ConsumerSchedule::EveryStep
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Stop a client that never finishes after this many steps.
    pub max_steps: Option<u64>,
    /// Consecutive busy-wait spins tolerated before the client is declared hung.
    pub spin_budget: u64,
    pub consumer: ConsumerSchedule,
    /// Present a frame to the display sink every this many steps.
    pub frame_interval: Option<NonZeroU64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_steps: None,
            spin_budget: 10_000,
            consumer: ConsumerSchedule::default(),
            frame_interval: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The client program terminated on its own.
    Finished { steps: u64 },
    /// The client was still running when `max_steps` was reached.
    StepLimit { steps: u64 },
}

/// Cooperative driver interleaving the client program with the console consumer.
///
/// Each step runs exactly one client step, then the consumer (if it is due), then presents a
/// frame (if one is due). Only the client's busy-wait yields count towards the spin budget.
pub struct Simulation<'a, C: Client> {
    bus: Bus,
    client: C,
    config: SimulationConfig,
    console_sink: Option<&'a mut dyn ConsoleSink>,
    display_sink: Option<&'a mut dyn DisplaySink>,
    steps: u64,
    spins: u64,
    finished: bool,
}

impl<'a, C: Client> Simulation<'a, C> {
    pub fn new(bus: Bus, client: C, config: SimulationConfig) -> Self {
        Self {
            bus,
            client,
            config,
            console_sink: None,
            display_sink: None,
            steps: 0,
            spins: 0,
            finished: false,
        }
    }

    pub fn with_console_sink(mut self, sink: &'a mut dyn ConsoleSink) -> Self {
        self.console_sink = Some(sink);
        self
    }

    pub fn with_display_sink(mut self, sink: &'a mut dyn DisplaySink) -> Self {
        self.display_sink = Some(sink);
        self
    }

    /// Runs a single scheduling step.
    pub fn step(&mut self) -> Result<Step, Error> {
        if self.finished {
            return Ok(Step::Done);
        }

        let step = self.client.step(&mut self.bus);
        self.steps += 1;

        match step {
            Step::Yield { address } => {
                self.spins += 1;
                if self.spins > self.config.spin_budget {
                    log::warn!(
                        "client exceeded spin budget of {} polling 0x{:04x}",
                        self.config.spin_budget,
                        address
                    );
                    return Err(Error::Hang {
                        address,
                        spins: self.spins,
                        steps: self.steps,
                    });
                }
            }
            Step::Continue => self.spins = 0,
            Step::Done => {
                self.spins = 0;
                self.finished = true;
            }
        }

        if self.config.consumer.is_due(self.steps) {
            self.run_consumer();
        }

        if let Some(interval) = self.config.frame_interval {
            if self.steps % interval.get() == 0 {
                self.present_frame();
            }
        }

        Ok(step)
    }

    /// Steps until the client finishes or the step limit is reached.
    pub fn run(&mut self) -> Result<Outcome, Error> {
        loop {
            if let Some(max_steps) = self.config.max_steps {
                if self.steps >= max_steps {
                    log::info!("step limit of {} reached", max_steps);
                    return Ok(Outcome::StepLimit { steps: self.steps });
                }
            }
            if self.step()? == Step::Done {
                log::info!("client finished after {} steps", self.steps);
                return Ok(Outcome::Finished { steps: self.steps });
            }
        }
    }

    fn run_consumer(&mut self) {
        if let Some(byte) = self.bus.console_mut().acknowledge() {
            log::debug!("console consumed 0x{:02x} at step {}", byte, self.steps);
            if let Some(sink) = self.console_sink.as_mut() {
                sink.push_byte(byte);
            }
        }
    }

    fn present_frame(&mut self) {
        if let Some(sink) = self.display_sink.as_mut() {
            sink.present(&self.bus.frame());
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn into_parts(self) -> (Bus, C) {
        (self.bus, self.client)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::client::Transmitter;
    use crate::console::PollMode;
    use crate::decoder::AddressMap;

    fn transmitter(poll: PollMode) -> Transmitter {
        Transmitter::new(&AddressMap::default(), b'!', 1, poll)
    }

    #[test]
    fn consumer_every_step_needs_no_spins() {
        let config = SimulationConfig::default();
        let mut sim = Simulation::new(Bus::default(), transmitter(PollMode::WhileEquals(1)), config);
        assert_eq!(sim.run(), Ok(Outcome::Finished { steps: 3 }));
        assert_eq!(sim.bus().console().output(), b"!");
    }

    #[test]
    fn slow_consumer_causes_spins() {
        let config = SimulationConfig {
            consumer: ConsumerSchedule::Every(NonZeroU64::new(5).unwrap()),
            ..SimulationConfig::default()
        };
        let mut sim = Simulation::new(Bus::default(), transmitter(PollMode::WhileNonZero), config);
        assert_eq!(sim.step(), Ok(Step::Continue));
        assert_eq!(sim.step(), Ok(Step::Continue));
        assert_eq!(sim.step(), Ok(Step::Yield { address: 0xfe }));
        assert_eq!(sim.step(), Ok(Step::Yield { address: 0xfe }));
        // The consumer ran at the end of step 5.
        assert_eq!(sim.step(), Ok(Step::Yield { address: 0xfe }));
        assert_eq!(sim.step(), Ok(Step::Done));
        assert_eq!(sim.step(), Ok(Step::Done));
        assert_eq!(sim.steps(), 6);
    }

    #[test]
    fn absent_consumer_hangs() {
        let config = SimulationConfig {
            consumer: ConsumerSchedule::Absent,
            spin_budget: 50,
            ..SimulationConfig::default()
        };
        let mut sim = Simulation::new(Bus::default(), transmitter(PollMode::WhileEquals(1)), config);
        assert_eq!(
            sim.run(),
            Err(Error::Hang {
                address: 0xfe,
                spins: 51,
                steps: 53,
            })
        );
        assert!(sim.bus().console().output().is_empty());
    }

    #[test]
    fn step_limit_stops_endless_client() {
        let config = SimulationConfig {
            max_steps: Some(20),
            ..SimulationConfig::default()
        };
        let client = |_: &mut dyn crate::memory::MemoryInterface| Step::Continue;
        let mut sim = Simulation::new(Bus::default(), client, config);
        assert_eq!(sim.run(), Ok(Outcome::StepLimit { steps: 20 }));
    }

    #[test]
    fn frames_presented_on_interval() {
        let config = SimulationConfig {
            max_steps: Some(10),
            frame_interval: NonZeroU64::new(4),
            ..SimulationConfig::default()
        };
        let mut cell = 0;
        let client = move |memory: &mut dyn crate::memory::MemoryInterface| {
            memory.write_8_bits(0x200 + cell, 1);
            cell += 1;
            Step::Continue
        };
        let mut frames = vec![];
        let mut sim =
            Simulation::new(Bus::default(), client, config).with_display_sink(&mut frames);
        sim.run().unwrap();
        drop(sim);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].lit_cells(), vec![0, 1, 2, 3]);
        assert_eq!(frames[1].lit_cells().len(), 8);
    }

    #[test]
    fn console_sink_receives_bytes() {
        let mut output: Vec<u8> = vec![];
        let mut sim = Simulation::new(
            Bus::default(),
            transmitter(PollMode::WhileNonZero),
            SimulationConfig::default(),
        )
        .with_console_sink(&mut output);
        sim.run().unwrap();
        drop(sim);
        assert_eq!(output, b"!");
    }
}
