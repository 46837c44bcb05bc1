use crate::memory::{Address, ADDRESS_SPACE_SIZE};
use serde::Deserialize;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// The console ready flag and data register were mapped to the same address.
    SharedConsoleAddress(Address),
    /// A console register falls inside the framebuffer range.
    ConsoleInFramebuffer(Address),
    /// The framebuffer has no cells.
    EmptyFramebuffer,
    /// The framebuffer extends past the end of the address space.
    FramebufferOutOfBounds { base: Address, len: usize },
    /// The framebuffer has more cells than the address space has addresses.
    FramebufferTooLarge { width: usize, height: usize },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::SharedConsoleAddress(addr) => write!(
                f,
                "console ready flag and data register share address 0x{:04x}",
                addr
            ),
            Error::ConsoleInFramebuffer(addr) => write!(
                f,
                "console register 0x{:04x} overlaps the framebuffer",
                addr
            ),
            Error::EmptyFramebuffer => write!(f, "framebuffer must have at least one cell"),
            Error::FramebufferOutOfBounds { base, len } => write!(
                f,
                "framebuffer of {} cells at 0x{:04x} does not fit in the address space",
                len, base
            ),
            Error::FramebufferTooLarge { width, height } => write!(
                f,
                "framebuffer of {}x{} cells is larger than the address space",
                width, height
            ),
        }
    }
}

impl std::error::Error for Error {}

/// Half-open range of addresses `[start, start + len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    start: Address,
    len: usize,
}

impl AddressRange {
    /// Creates a new address range from the start and end addresses, or `None` if `end` comes
    /// before `start`.
    pub fn new(start: Address, end: Address) -> Option<Self> {
        let len = end.checked_sub(start)?;
        Some(Self {
            start,
            len: len as usize,
        })
    }

    /// Creates a range of `len` addresses beginning at `start`. The range may end exactly at the
    /// top of the address space, but not beyond it.
    pub fn with_len(start: Address, len: usize) -> Option<Self> {
        if start as usize + len > ADDRESS_SPACE_SIZE {
            return None;
        }
        Some(Self { start, len })
    }

    pub fn start(&self) -> Address {
        self.start
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Checks if the address is part of this range
    pub fn contains(&self, addr: Address) -> bool {
        let addr = addr as usize;
        (self.start as usize) <= addr && addr < self.start as usize + self.len
    }

    pub fn overlaps(&self, other: &AddressRange) -> bool {
        let (a_start, b_start) = (self.start as usize, other.start as usize);
        a_start < b_start + other.len && b_start < a_start + self.len
    }

    /// Offset of `addr` from the start of the range, if it is contained.
    pub fn offset_of(&self, addr: Address) -> Option<usize> {
        if self.contains(addr) {
            Some((addr - self.start) as usize)
        } else {
            None
        }
    }
}

/// Locations of the memory-mapped devices. Anything not listed here is RAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AddressMap {
    pub console_ready: Address,
    pub console_data: Address,
    pub framebuffer_base: Address,
    pub framebuffer_width: usize,
    pub framebuffer_height: usize,
}

impl AddressMap {
    pub const CONSOLE_READY: Address = 0xfe;
    pub const CONSOLE_DATA: Address = 0xff;
    pub const FRAMEBUFFER_BASE: Address = 0x200;
    pub const FRAMEBUFFER_WIDTH: usize = 32;
    pub const FRAMEBUFFER_HEIGHT: usize = 32;

    /// Number of framebuffer cells, or `None` if it cannot fit in the address space.
    pub fn framebuffer_len(&self) -> Option<usize> {
        if self.framebuffer_width > ADDRESS_SPACE_SIZE || self.framebuffer_height > ADDRESS_SPACE_SIZE
        {
            return None;
        }
        self.framebuffer_width
            .checked_mul(self.framebuffer_height)
            .filter(|len| *len <= ADDRESS_SPACE_SIZE)
    }
}

impl Default for AddressMap {
    fn default() -> Self {
        Self {
            console_ready: Self::CONSOLE_READY,
            console_data: Self::CONSOLE_DATA,
            framebuffer_base: Self::FRAMEBUFFER_BASE,
            framebuffer_width: Self::FRAMEBUFFER_WIDTH,
            framebuffer_height: Self::FRAMEBUFFER_HEIGHT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleRegister {
    Data,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Ram,
    Console(ConsoleRegister),
    Framebuffer,
}

#[derive(Debug, Clone)]
pub struct AddressDecoder {
    map: AddressMap,
    framebuffer: AddressRange,
}

impl AddressDecoder {
    /// Validates the map and builds a decoder for it. Overlaps are rejected here so that
    /// `resolve` never has to deal with ambiguity.
    pub fn new(map: AddressMap) -> Result<Self, Error> {
        let len = map.framebuffer_len().ok_or(Error::FramebufferTooLarge {
            width: map.framebuffer_width,
            height: map.framebuffer_height,
        })?;
        if len == 0 {
            return Err(Error::EmptyFramebuffer);
        }
        let framebuffer =
            AddressRange::with_len(map.framebuffer_base, len).ok_or(Error::FramebufferOutOfBounds {
                base: map.framebuffer_base,
                len,
            })?;

        if map.console_ready == map.console_data {
            return Err(Error::SharedConsoleAddress(map.console_ready));
        }
        for addr in [map.console_data, map.console_ready] {
            let register = AddressRange { start: addr, len: 1 };
            if framebuffer.overlaps(&register) {
                return Err(Error::ConsoleInFramebuffer(addr));
            }
        }

        Ok(Self { map, framebuffer })
    }

    pub fn resolve(&self, addr: Address) -> Target {
        if addr == self.map.console_data {
            Target::Console(ConsoleRegister::Data)
        } else if addr == self.map.console_ready {
            Target::Console(ConsoleRegister::Ready)
        } else if self.framebuffer.contains(addr) {
            Target::Framebuffer
        } else {
            Target::Ram
        }
    }

    pub fn map(&self) -> &AddressMap {
        &self.map
    }

    pub fn framebuffer_range(&self) -> AddressRange {
        self.framebuffer
    }
}

impl Default for AddressDecoder {
    fn default() -> Self {
        let map = AddressMap::default();
        Self {
            framebuffer: AddressRange {
                start: map.framebuffer_base,
                len: AddressMap::FRAMEBUFFER_WIDTH * AddressMap::FRAMEBUFFER_HEIGHT,
            },
            map,
        }
    }
}
