use crate::decoder::AddressRange;
use crate::memory::{Address, Byte};
use std::ops::Index;

/// Grid of colour indices mapped row-major at `base + row * width + col`.
pub struct FramebufferDevice {
    range: AddressRange,
    width: usize,
    height: usize,
    cells: Vec<Byte>,
}

impl FramebufferDevice {
    /// The caller is responsible for `range` holding exactly `width * height` addresses; the
    /// decoder validates this when it is built.
    pub fn new(range: AddressRange, width: usize, height: usize) -> Self {
        debug_assert_eq!(range.len(), width * height);
        Self {
            range,
            width,
            height,
            cells: vec![0; width * height],
        }
    }

    pub fn write(&mut self, addr: Address, value: Byte) {
        match self.range.offset_of(addr) {
            Some(offset) => self.cells[offset] = value,
            None => log::warn!("framebuffer write to unmapped address 0x{:04x}", addr),
        }
    }

    pub fn read(&self, addr: Address) -> Byte {
        self.range
            .offset_of(addr)
            .map(|offset| self.cells[offset])
            .unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(|c| *c = 0);
    }

    /// Snapshot of every cell as of the last completed write.
    pub fn frame(&self) -> Frame {
        Frame {
            width: self.width,
            height: self.height,
            cells: self.cells.clone(),
        }
    }

    pub fn range(&self) -> AddressRange {
        self.range
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    cells: Vec<Byte>,
}

impl Frame {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> &[Byte] {
        &self.cells
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Byte]> {
        self.cells.chunks(self.width)
    }

    /// Linear indices of every non-zero cell.
    pub fn lit_cells(&self) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| **cell != 0)
            .map(|(idx, _)| idx)
            .collect()
    }
}

impl Index<usize> for Frame {
    type Output = [Byte];

    fn index(&self, row: usize) -> &[Byte] {
        let start = row * self.width;
        &self.cells[start..start + self.width]
    }
}

/// Consumer of framebuffer snapshots, e.g. a window or a frame recorder.
pub trait DisplaySink {
    fn present(&mut self, frame: &Frame);
}

impl DisplaySink for Vec<Frame> {
    fn present(&mut self, frame: &Frame) {
        self.push(frame.clone());
    }
}
