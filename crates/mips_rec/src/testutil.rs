use crate::backend::{BlockEmitter, CodeBackend, CoprocOps};
use crate::block::Block;
use crate::state::GuestState;
use mips_mem::ram::{CodeView, Ram};
use mips_mem::MemoryMap;
use mips_opcode::{cycles_of, Opcode};
use std::cell::RefCell;
use std::rc::Rc;

pub struct NullCop;

impl CoprocOps for NullCop {
  fn mfc(&mut self, _op: &Opcode, _cop: u8, _reg: usize) -> u32 {
    0
  }
  fn mtc(&mut self, _op: &Opcode, _cop: u8, _reg: usize, _value: u32) {}
  fn op(&mut self, _op: &Opcode, _cop: u8) {}
}

pub fn state_with_map(mem: MemoryMap) -> GuestState {
  GuestState::new(mem, Rc::new(RefCell::new(NullCop)))
}

/// A backend that emits nothing, for tests that only exercise block and
/// cache bookkeeping.
pub struct TestBackend;

pub struct TestEmitter;

impl BlockEmitter for TestEmitter {
  fn prologue(&mut self) {}
  fn epilogue(&mut self, _next_pc: u32, _cycles: u32) {}
}

impl CodeBackend for TestBackend {
  type Emitter = TestEmitter;
  type Code = ();
  type Wrapper = ();
  type Lookup = ();

  fn generate_wrapper(&mut self) -> Option<()> {
    Some(())
  }
  fn generate_address_lookup(&mut self, _regions: usize) -> Option<()> {
    Some(())
  }
  fn open(&mut self) -> Option<TestEmitter> {
    Some(TestEmitter)
  }
  fn finalize(&mut self, _emitter: TestEmitter) -> Option<()> {
    Some(())
  }
  fn enter(&mut self, _wrapper: &(), _code: &(), _state: &mut GuestState) {}
}

/// Build a block straight from instruction words, bypassing the driver.
pub fn block_from_words(words: &[u32]) -> (Block<TestBackend>, Ram) {
  let mut bytes = Vec::with_capacity(words.len() * 4);
  for word in words {
    bytes.extend_from_slice(&word.to_le_bytes());
  }
  let ram = Ram::from_vec(bytes);

  let opcodes: Vec<Opcode> = words.iter().map(|w| Opcode::new(*w)).collect();
  let cycles = opcodes.iter().map(cycles_of).sum::<u32>();
  let view = CodeView::new(ram.clone(), 0);

  (
    Block::new(0x8000_0000, 0, (), opcodes, cycles, view),
    ram,
  )
}
