use mmio_bus::bus::Bus;
use mmio_bus::client::{Client, Step, Transmitter};
use mmio_bus::console::PollMode;
use mmio_bus::decoder::AddressMap;
use mmio_bus::display::Screen;
use mmio_bus::framebuffer::Frame;
use mmio_bus::memory::{Address, MemoryInterface};
use mmio_bus::simulation::{ConsumerSchedule, Error, Outcome, Simulation, SimulationConfig};
use std::num::NonZeroU64;

const FRAMEBUFFER: Address = 0x200;
const CELLS: u16 = 32 * 32;

/// Sends a string one byte at a time, the way the demo programs' print routine does.
struct Printer {
    bytes: Vec<u8>,
    next: usize,
    poll: PollMode,
    current: Option<Transmitter>,
}

impl Printer {
    fn new(text: &str, poll: PollMode) -> Self {
        Self {
            bytes: text.bytes().collect(),
            next: 0,
            poll,
            current: None,
        }
    }
}

impl Client for Printer {
    fn step(&mut self, memory: &mut dyn MemoryInterface) -> Step {
        if self.current.is_none() {
            let Some(byte) = self.bytes.get(self.next).copied() else {
                return Step::Done;
            };
            self.next += 1;
            self.current = Some(Transmitter::new(&AddressMap::default(), byte, 1, self.poll));
        }

        match self.current.as_mut().map(|tx| tx.step(memory)) {
            Some(Step::Done) => {
                self.current = None;
                Step::Continue
            }
            Some(step) => step,
            None => Step::Done,
        }
    }
}

/// Clears the lit cell and lights the next one, wrapping around the framebuffer.
struct WalkingPixel {
    index: u16,
    iterations: u32,
    clear_next: bool,
}

impl WalkingPixel {
    fn new(iterations: u32) -> Self {
        Self {
            index: 0,
            iterations,
            clear_next: true,
        }
    }
}

impl Client for WalkingPixel {
    fn step(&mut self, memory: &mut dyn MemoryInterface) -> Step {
        if self.iterations == 0 {
            return Step::Done;
        }
        if self.clear_next {
            memory.write_8_bits(FRAMEBUFFER + self.index, 0x00);
        } else {
            self.index = (self.index + 1) % CELLS;
            memory.write_8_bits(FRAMEBUFFER + self.index, 0xe0);
            self.iterations -= 1;
        }
        self.clear_next = !self.clear_next;
        Step::Continue
    }
}

fn run_printer(text: &str, poll: PollMode, consumer: ConsumerSchedule) -> Vec<u8> {
    let config = SimulationConfig {
        consumer,
        ..SimulationConfig::default()
    };
    let mut output = vec![];
    let mut simulation = Simulation::new(Bus::default(), Printer::new(text, poll), config)
        .with_console_sink(&mut output);
    assert!(matches!(simulation.run(), Ok(Outcome::Finished { .. })));
    drop(simulation);
    output
}

#[test]
fn ram_holds_last_written_value() {
    let mut bus = Bus::default();
    let ram = (0..=0xffffu16).filter(|addr| {
        !(0xfe..=0xff).contains(addr) && !(FRAMEBUFFER..FRAMEBUFFER + CELLS).contains(addr)
    });
    for addr in ram.clone() {
        bus.write(addr, (addr as u8) ^ 0xa5);
    }
    for addr in ram {
        assert_eq!(bus.read(addr), (addr as u8) ^ 0xa5, "address 0x{:04x}", addr);
    }
}

#[test]
fn untouched_addresses_read_zero() {
    let mut bus = Bus::default();
    bus.write(0x0010, 1);
    bus.write(FRAMEBUFFER + 3, 2);
    for addr in (0..=0xffffu16).filter(|addr| *addr != 0x0010 && *addr != FRAMEBUFFER + 3) {
        assert_eq!(bus.read(addr), 0, "address 0x{:04x}", addr);
    }
}

#[test]
fn handshake_delivers_string_in_order_while_equals() {
    let output = run_printer("Hi\n", PollMode::WhileEquals(1), ConsumerSchedule::EveryStep);
    assert_eq!(output, vec![0x48, 0x69, 0x0a]);
}

#[test]
fn handshake_delivers_string_in_order_while_non_zero() {
    let output = run_printer("Hi\n", PollMode::WhileNonZero, ConsumerSchedule::EveryStep);
    assert_eq!(output, vec![0x48, 0x69, 0x0a]);
}

#[test]
fn handshake_survives_slow_consumer_in_both_polarities() {
    let text = "This a red square walking on the screen\n";
    for poll in [PollMode::WhileEquals(1), PollMode::WhileNonZero] {
        let output = run_printer(text, poll, ConsumerSchedule::Every(NonZeroU64::new(7).unwrap()));
        assert_eq!(output, text.as_bytes(), "{:?}", poll);
    }
}

#[test]
fn overwriting_pending_byte_loses_it() {
    let mut bus = Bus::default();
    bus.write(0xff, b'a');
    bus.write(0xfe, 1);
    bus.write(0xff, b'b');

    assert_eq!(bus.console_mut().acknowledge(), Some(b'b'));
    assert_eq!(bus.console_mut().acknowledge(), None);
    assert_eq!(bus.console().output(), b"b");
}

#[test]
fn framebuffer_write_changes_only_its_cell() {
    let mut bus = Bus::default();
    bus.write(FRAMEBUFFER + 40, 0x03);
    let before = bus.frame();

    bus.write(FRAMEBUFFER + 5 * 32 + 7, 0xe0);
    let after = bus.frame();

    assert_eq!(after[5][7], 0xe0);
    for (idx, (old, new)) in before.cells().iter().zip(after.cells()).enumerate() {
        if idx != 5 * 32 + 7 {
            assert_eq!(old, new, "cell {}", idx);
        }
    }
}

#[test]
fn busy_wait_without_consumer_is_reported_as_hang() {
    let config = SimulationConfig {
        consumer: ConsumerSchedule::Absent,
        spin_budget: 1_000,
        ..SimulationConfig::default()
    };
    let mut simulation = Simulation::new(
        Bus::default(),
        Printer::new("Hi", PollMode::WhileNonZero),
        config,
    );
    match simulation.run() {
        Err(Error::Hang { address, spins, .. }) => {
            assert_eq!(address, 0xfe);
            assert_eq!(spins, 1_001);
        }
        other => panic!("expected a hang, got {:?}", other),
    }
    assert!(simulation.bus().console().output().is_empty());
}

#[test]
fn walking_pixel_leaves_single_lit_cell() {
    for iterations in [1u32, 5, 1023, 1024, 1500] {
        let mut frames: Vec<Frame> = vec![];
        let config = SimulationConfig {
            frame_interval: NonZeroU64::new(64),
            ..SimulationConfig::default()
        };
        let mut simulation = Simulation::new(Bus::default(), WalkingPixel::new(iterations), config)
            .with_display_sink(&mut frames);
        simulation.run().unwrap();

        let frame = simulation.bus().frame();
        let expected = (iterations % CELLS as u32) as usize;
        assert_eq!(frame.lit_cells(), vec![expected], "{} iterations", iterations);
        assert_eq!(frame.cells()[expected], 0xe0);
        drop(simulation);

        // Every sampled frame shows at most one lit cell.
        assert!(frames.iter().all(|frame| frame.lit_cells().len() <= 1));
    }
}

#[test]
fn screen_sink_renders_console_output_after_run() {
    let mut screen = Screen::new();
    let mut simulation = Simulation::new(
        Bus::default(),
        Printer::new("Hello\nWorld\n", PollMode::WhileEquals(1)),
        SimulationConfig::default(),
    )
    .with_console_sink(&mut screen);
    assert!(matches!(simulation.run(), Ok(Outcome::Finished { .. })));
    drop(simulation);

    assert_eq!(screen.render(), "Hello\nWorld");
    assert_eq!(screen.cursor(), (2, 0));
}
