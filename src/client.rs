use crate::console::PollMode;
use crate::decoder::AddressMap;
use crate::memory::{Address, Byte, MemoryInterface};
use serde::Deserialize;

/// What a client did during one scheduling step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Made progress and wants to run again.
    Continue,
    /// Busy-waiting on `address`; gives the other tasks a chance to run.
    Yield { address: Address },
    /// The program has terminated.
    Done,
}

/// A program that drives the bus one step at a time.
///
/// Clients only ever see the bus through [`MemoryInterface`], never the devices behind it.
pub trait Client {
    fn step(&mut self, memory: &mut dyn MemoryInterface) -> Step;
}

impl<F> Client for F
where
    F: FnMut(&mut dyn MemoryInterface) -> Step,
{
    fn step(&mut self, memory: &mut dyn MemoryInterface) -> Step {
        self(memory)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransmitState {
    LoadData,
    RaiseFlag,
    Poll,
    Done,
}

/// Client side of the console handshake for a single byte: write the data register, raise the
/// ready flag, then spin on the flag until the poll predicate reports it is no longer busy.
pub struct Transmitter {
    data_addr: Address,
    ready_addr: Address,
    byte: Byte,
    request: Byte,
    poll: PollMode,
    state: TransmitState,
}

impl Transmitter {
    pub fn new(map: &AddressMap, byte: Byte, request: Byte, poll: PollMode) -> Self {
        Self {
            data_addr: map.console_data,
            ready_addr: map.console_ready,
            byte,
            request,
            poll,
            state: TransmitState::LoadData,
        }
    }
}

impl Client for Transmitter {
    fn step(&mut self, memory: &mut dyn MemoryInterface) -> Step {
        match self.state {
            TransmitState::LoadData => {
                memory.write_8_bits(self.data_addr, self.byte);
                self.state = TransmitState::RaiseFlag;
                Step::Continue
            }
            TransmitState::RaiseFlag => {
                memory.write_8_bits(self.ready_addr, self.request);
                self.state = TransmitState::Poll;
                Step::Continue
            }
            TransmitState::Poll => {
                let flag = memory.read_8_bits(self.ready_addr);
                if self.poll.is_busy(flag) {
                    Step::Yield {
                        address: self.ready_addr,
                    }
                } else {
                    self.state = TransmitState::Done;
                    Step::Done
                }
            }
            TransmitState::Done => Step::Done,
        }
    }
}

fn default_request() -> Byte {
    1
}

/// One statement of a scripted client program.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Op {
    Write {
        address: Address,
        value: Byte,
    },
    Read {
        address: Address,
    },
    /// Sends every byte of `text` through the console handshake.
    Print {
        text: String,
        #[serde(default)]
        poll: PollMode,
        #[serde(default = "default_request")]
        request: Byte,
    },
    Fill {
        address: Address,
        len: usize,
        value: Byte,
    },
    /// Runs `body` `times` times, or forever when `times` is absent.
    Repeat {
        #[serde(default)]
        times: Option<u32>,
        body: Vec<Op>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Instr {
    Write { address: Address, value: Byte },
    Read { address: Address },
    Transmit { byte: Byte, request: Byte, poll: PollMode },
    Fill { address: Address, len: usize, value: Byte },
    Begin { times: Option<u32>, end: usize },
    End { begin: usize },
}

fn compile(ops: &[Op], instrs: &mut Vec<Instr>) {
    for op in ops {
        match op {
            Op::Write { address, value } => instrs.push(Instr::Write {
                address: *address,
                value: *value,
            }),
            Op::Read { address } => instrs.push(Instr::Read { address: *address }),
            Op::Print {
                text,
                poll,
                request,
            } => instrs.extend(text.bytes().map(|byte| Instr::Transmit {
                byte,
                request: *request,
                poll: *poll,
            })),
            Op::Fill {
                address,
                len,
                value,
            } => instrs.push(Instr::Fill {
                address: *address,
                len: *len,
                value: *value,
            }),
            Op::Repeat { times, body } => {
                let begin = instrs.len();
                instrs.push(Instr::Begin {
                    times: *times,
                    end: 0,
                });
                compile(body, instrs);
                let end = instrs.len();
                instrs.push(Instr::End { begin });
                instrs[begin] = Instr::Begin { times: *times, end };
            }
        }
    }
}

struct Loop {
    begin: usize,
    remaining: Option<u32>,
}

/// A client that runs a list of [`Op`]s. Every bus access and every loop boundary costs one
/// step; a `print` spends one step per byte on each handshake phase plus one per busy poll. The
/// step that executes the last statement is the one that reports [`Step::Done`].
pub struct Script {
    map: AddressMap,
    instrs: Vec<Instr>,
    pc: usize,
    // Cells already written by the `fill` at `pc`
    fill_offset: usize,
    loops: Vec<Loop>,
    transmitter: Option<Transmitter>,
    reads: Vec<(Address, Byte)>,
}

impl Script {
    pub fn new(ops: &[Op], map: &AddressMap) -> Self {
        let mut instrs = vec![];
        compile(ops, &mut instrs);
        Self {
            map: *map,
            instrs,
            pc: 0,
            fill_offset: 0,
            loops: vec![],
            transmitter: None,
            reads: vec![],
        }
    }

    /// Values observed by `read` statements, in execution order.
    pub fn reads(&self) -> &[(Address, Byte)] {
        &self.reads
    }

    fn end_loop(&mut self, begin: usize) {
        let Some(current) = self.loops.last_mut() else {
            log::error!("loop end at {} without a matching begin", self.pc);
            self.pc += 1;
            return;
        };
        debug_assert_eq!(current.begin, begin);
        match current.remaining.as_mut() {
            None => self.pc = begin + 1,
            Some(remaining) => {
                *remaining -= 1;
                if *remaining == 0 {
                    self.loops.pop();
                    self.pc += 1;
                } else {
                    self.pc = begin + 1;
                }
            }
        }
    }
}

impl Client for Script {
    fn step(&mut self, memory: &mut dyn MemoryInterface) -> Step {
        let Some(instr) = self.instrs.get(self.pc).copied() else {
            return Step::Done;
        };

        match instr {
            Instr::Write { address, value } => {
                memory.write_8_bits(address, value);
                self.pc += 1;
            }
            Instr::Read { address } => {
                let value = memory.read_8_bits(address);
                self.reads.push((address, value));
                self.pc += 1;
            }
            Instr::Transmit {
                byte,
                request,
                poll,
            } => {
                let map = &self.map;
                let transmitter = self
                    .transmitter
                    .get_or_insert_with(|| Transmitter::new(map, byte, request, poll));
                match transmitter.step(memory) {
                    Step::Done => {
                        self.transmitter = None;
                        self.pc += 1;
                    }
                    step => return step,
                }
            }
            Instr::Fill { len: 0, .. } => self.pc += 1,
            Instr::Fill {
                address,
                len,
                value,
            } => {
                memory.write_8_bits(address.wrapping_add(self.fill_offset as Address), value);
                self.fill_offset += 1;
                if self.fill_offset == len {
                    self.fill_offset = 0;
                    self.pc += 1;
                }
            }
            Instr::Begin { times: Some(0), end } => self.pc = end + 1,
            Instr::Begin { times, .. } => {
                self.loops.push(Loop {
                    begin: self.pc,
                    remaining: times,
                });
                self.pc += 1;
            }
            Instr::End { begin } => self.end_loop(begin),
        }

        if self.pc >= self.instrs.len() {
            Step::Done
        } else {
            Step::Continue
        }
    }
}
