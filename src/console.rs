use crate::decoder::ConsoleRegister;
use crate::memory::Byte;
use serde::Deserialize;

/// Value of the ready flag once the consumer has taken the pending byte.
pub const IDLE: Byte = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleState {
    Idle,
    Pending,
}

/// Busy-wait predicate used by a client after raising the ready flag.
///
/// Client programs disagree on how they spell "still busy": some spin while the flag still
/// holds the exact value they wrote, others spin while it is anything but idle. The consumer
/// only ever clears the flag to [`IDLE`], so both terminate against a live consumer, but they
/// behave differently when the value written does not match the one being polled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PollMode {
    /// Spin while `flag == value`.
    WhileEquals(Byte),
    /// Spin while `flag != 0`.
    WhileNonZero,
}

impl PollMode {
    pub fn is_busy(&self, flag: Byte) -> bool {
        match *self {
            PollMode::WhileEquals(value) => flag == value,
            PollMode::WhileNonZero => flag != IDLE,
        }
    }
}

impl Default for PollMode {
    fn default() -> Self {
        PollMode::WhileEquals(1)
    }
}

/// Character output port driven by a data register and a ready flag.
///
/// The client owns the data register and the transition of the flag to a non-zero value; the
/// consumer only ever clears the flag through [`ConsoleDevice::acknowledge`].
pub struct ConsoleDevice {
    data_reg: Byte,
    ready_flag: Byte,
    output: Vec<Byte>,
}

impl ConsoleDevice {
    pub fn new() -> Self {
        Self {
            data_reg: 0,
            ready_flag: IDLE,
            output: vec![],
        }
    }

    pub fn handle_write(&mut self, reg: ConsoleRegister, byte: Byte) {
        match reg {
            ConsoleRegister::Data => {
                if self.state() == ConsoleState::Pending {
                    // The hardware has no way to refuse this; the pending byte is simply lost.
                    log::debug!(
                        "console data 0x{:02x} overwritten by 0x{:02x} before it was consumed",
                        self.data_reg,
                        byte
                    );
                }
                self.data_reg = byte;
            }
            ConsoleRegister::Ready => self.ready_flag = byte,
        }
    }

    pub fn handle_read(&self, reg: ConsoleRegister) -> Byte {
        match reg {
            ConsoleRegister::Data => self.data_reg,
            ConsoleRegister::Ready => self.ready_flag,
        }
    }

    pub fn state(&self) -> ConsoleState {
        if self.ready_flag == IDLE {
            ConsoleState::Idle
        } else {
            ConsoleState::Pending
        }
    }

    /// Consumer side of the handshake. Takes the pending byte, if any, and clears the flag.
    pub fn acknowledge(&mut self) -> Option<Byte> {
        match self.state() {
            ConsoleState::Idle => None,
            ConsoleState::Pending => {
                let byte = self.data_reg;
                self.output.push(byte);
                self.ready_flag = IDLE;
                Some(byte)
            }
        }
    }

    /// Every byte acknowledged so far, in order.
    pub fn output(&self) -> &[Byte] {
        &self.output
    }
}

impl Default for ConsoleDevice {
    fn default() -> Self {
        Self::new()
    }
}
