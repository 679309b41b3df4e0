use mips_rec::backend::RegAllocator;
use std::cell::Cell;
use std::rc::Rc;

/// Allocation state for the software backend.
///
/// Micro blocks have nothing to allocate, so the only state is a reset
/// counter, shared out so tests can check the driver resets once per
/// compiled block.
pub struct SoftAllocator {
  resets: Rc<Cell<u32>>,
}

impl SoftAllocator {
  pub fn new() -> SoftAllocator {
    SoftAllocator {
      resets: Rc::new(Cell::new(0)),
    }
  }

  pub fn reset_counter(&self) -> Rc<Cell<u32>> {
    Rc::clone(&self.resets)
  }
}

impl Default for SoftAllocator {
  fn default() -> Self {
    SoftAllocator::new()
  }
}

impl RegAllocator for SoftAllocator {
  fn reset(&mut self) {
    self.resets.set(self.resets.get() + 1);
  }
}
