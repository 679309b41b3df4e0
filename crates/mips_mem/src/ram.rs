use std::cell::RefCell;
use std::rc::Rc;

/// A shared handle onto one region's backing memory.
///
/// The buffer itself belongs to the embedder for the lifetime of the map;
/// the handle only hands out little-endian byte, halfword and word accesses
/// relative to the region base. Reads mirror the writes: out-of-range
/// offsets yield `None` and stores past the end are dropped.
#[derive(Debug, Clone)]
pub struct Ram(Rc<RefCell<Box<[u8]>>>);

impl Ram {
  pub fn zeroed(len: usize) -> Ram {
    Ram(Rc::new(RefCell::new(vec![0; len].into_boxed_slice())))
  }

  pub fn from_vec(data: Vec<u8>) -> Ram {
    Ram(Rc::new(RefCell::new(data.into_boxed_slice())))
  }

  pub fn len(&self) -> usize {
    self.0.borrow().len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.borrow().is_empty()
  }

  pub fn read_byte(&self, offset: usize) -> Option<u8> {
    self.0.borrow().get(offset).copied()
  }

  pub fn read_halfword(&self, offset: usize) -> Option<u16> {
    let data = self.0.borrow();
    let bytes = data.get(offset..offset + 2)?;

    // slice length is checked just above
    #[allow(clippy::unwrap_used)]
    Some(u16::from_le_bytes(bytes.try_into().unwrap()))
  }

  pub fn read_word(&self, offset: usize) -> Option<u32> {
    let data = self.0.borrow();
    let bytes = data.get(offset..offset + 4)?;

    #[allow(clippy::unwrap_used)]
    Some(u32::from_le_bytes(bytes.try_into().unwrap()))
  }

  pub fn write_byte(&self, offset: usize, value: u8) {
    if let Some(slot) = self.0.borrow_mut().get_mut(offset) {
      *slot = value;
    }
  }

  pub fn write_halfword(&self, offset: usize, value: u16) {
    if let Some(slots) = self.0.borrow_mut().get_mut(offset..offset + 2) {
      slots.copy_from_slice(&value.to_le_bytes());
    }
  }

  pub fn write_word(&self, offset: usize, value: u32) {
    if let Some(slots) = self.0.borrow_mut().get_mut(offset..offset + 4) {
      slots.copy_from_slice(&value.to_le_bytes());
    }
  }
}

/// A read-only window onto guest code, handed to the disassembler and kept
/// on the block for staleness checks. Maps never change, so the window
/// stays readable for as long as the block lives.
#[derive(Debug, Clone)]
pub struct CodeView {
  ram: Ram,
  offset: u32,
}

impl CodeView {
  pub fn new(ram: Ram, offset: u32) -> CodeView {
    CodeView { ram, offset }
  }

  /// The `index`-th instruction word of the window.
  pub fn word(&self, index: usize) -> Option<u32> {
    self.ram.read_word(self.offset as usize + index * 4)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn words_are_little_endian() {
    let ram = Ram::from_vec(vec![0xdd, 0xcc, 0xbb, 0xaa]);
    k9::assert_equal!(ram.read_word(0), Some(0xaabb_ccdd));
    k9::assert_equal!(ram.read_halfword(2), Some(0xaabb));
  }

  #[test]
  fn byte_store_touches_one_byte() {
    let ram = Ram::zeroed(8);
    ram.write_word(0, 0xaabb_ccdd);
    ram.write_byte(1, 0x11);
    k9::assert_equal!(ram.read_word(0), Some(0xaabb_11dd));
  }

  #[test]
  fn out_of_range_accesses_are_inert() {
    let ram = Ram::zeroed(4);
    k9::assert_equal!(ram.read_word(1), None);
    k9::assert_equal!(ram.read_byte(4), None);
    ram.write_word(2, 0xffff_ffff);
    k9::assert_equal!(ram.read_halfword(2), Some(0));
  }

  #[test]
  fn code_view_indexes_words() {
    let ram = Ram::from_vec(vec![
      0x01, 0x00, 0x00, 0x00, //
      0x02, 0x00, 0x00, 0x00, //
      0x03, 0x00, 0x00, 0x00,
    ]);
    let view = CodeView::new(ram, 4);
    k9::assert_equal!(view.word(0), Some(2));
    k9::assert_equal!(view.word(1), Some(3));
    k9::assert_equal!(view.word(2), None);
  }
}
