pub type Address = u16;
pub type Byte = u8;

/// Number of addressable cells in the 16-bit address space.
pub const ADDRESS_SPACE_SIZE: usize = 1 << 16;

pub trait MemoryInterface {
    fn read_8_bits(&self, addr: Address) -> Byte;
    fn write_8_bits(&mut self, addr: Address, data: Byte);
}

/// Flat backing store covering the whole address range. Every cell starts at zero.
pub struct AddressSpace {
    memory: Box<[Byte]>,
}

impl AddressSpace {
    pub fn new() -> Self {
        Self {
            memory: vec![0; ADDRESS_SPACE_SIZE].into_boxed_slice(),
        }
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryInterface for AddressSpace {
    fn read_8_bits(&self, addr: Address) -> Byte {
        self.memory[addr as usize]
    }

    fn write_8_bits(&mut self, addr: Address, data: Byte) {
        self.memory[addr as usize] = data;
    }
}
