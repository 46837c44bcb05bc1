use crate::console::ConsoleDevice;
use crate::decoder::{self, AddressDecoder, AddressMap, Target};
use crate::framebuffer::{Frame, FramebufferDevice};
use crate::memory::{Address, AddressSpace, Byte, MemoryInterface, ADDRESS_SPACE_SIZE};

/// Single entry point for every access made by a client program.
///
/// Accesses are forwarded verbatim to whichever target owns the address; there is no
/// validation beyond decoding.
pub struct Bus {
    decoder: AddressDecoder,
    ram: AddressSpace,
    console: ConsoleDevice,
    framebuffer: FramebufferDevice,
}

impl Bus {
    pub fn new(map: AddressMap) -> Result<Self, decoder::Error> {
        Ok(Self::with_decoder(AddressDecoder::new(map)?))
    }

    fn with_decoder(decoder: AddressDecoder) -> Self {
        let map = *decoder.map();
        let framebuffer = FramebufferDevice::new(
            decoder.framebuffer_range(),
            map.framebuffer_width,
            map.framebuffer_height,
        );
        Self {
            decoder,
            ram: AddressSpace::new(),
            console: ConsoleDevice::new(),
            framebuffer,
        }
    }

    pub fn write(&mut self, addr: Address, value: Byte) {
        let target = self.decoder.resolve(addr);
        log::trace!("write 0x{:04x} <- 0x{:02x} ({:?})", addr, value, target);
        match target {
            Target::Ram => self.ram.write_8_bits(addr, value),
            Target::Console(reg) => self.console.handle_write(reg, value),
            Target::Framebuffer => self.framebuffer.write(addr, value),
        }
    }

    pub fn read(&self, addr: Address) -> Byte {
        let value = match self.decoder.resolve(addr) {
            Target::Ram => self.ram.read_8_bits(addr),
            Target::Console(reg) => self.console.handle_read(reg),
            Target::Framebuffer => self.framebuffer.read(addr),
        };
        log::trace!("read 0x{:04x} -> 0x{:02x}", addr, value);
        value
    }

    /// Writes an image starting at `base` through the decoder, so bytes landing on device
    /// addresses reach the device. Returns the number of bytes written.
    pub fn load(&mut self, base: Address, image: &[Byte]) -> usize {
        let len = image.len().min(ADDRESS_SPACE_SIZE - base as usize);
        for (offset, byte) in image[..len].iter().enumerate() {
            self.write(base + offset as Address, *byte);
        }
        len
    }

    pub fn decoder(&self) -> &AddressDecoder {
        &self.decoder
    }

    pub fn console(&self) -> &ConsoleDevice {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut ConsoleDevice {
        &mut self.console
    }

    pub fn framebuffer(&self) -> &FramebufferDevice {
        &self.framebuffer
    }

    pub fn framebuffer_mut(&mut self) -> &mut FramebufferDevice {
        &mut self.framebuffer
    }

    pub fn frame(&self) -> Frame {
        self.framebuffer.frame()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::with_decoder(AddressDecoder::default())
    }
}

impl MemoryInterface for Bus {
    fn read_8_bits(&self, addr: Address) -> Byte {
        self.read(addr)
    }

    fn write_8_bits(&mut self, addr: Address, data: Byte) {
        self.write(addr, data)
    }
}
