use mips_opcode::Opcode;

/// Callbacks serving a memory-mapped I/O region.
///
/// Each access receives the instruction that triggered it and the raw
/// (pre-unsegment) guest address, so a handler can tell the kseg mirrors
/// apart. Loads return zero-extended values; the load/store engine applies
/// sign extension for `lb` and `lh` itself. Handlers own whatever device
/// state they need.
pub trait MmioOps {
  fn sb(&mut self, op: &Opcode, addr: u32, value: u8);
  fn sh(&mut self, op: &Opcode, addr: u32, value: u16);
  fn sw(&mut self, op: &Opcode, addr: u32, value: u32);
  fn lb(&mut self, op: &Opcode, addr: u32) -> u8;
  fn lh(&mut self, op: &Opcode, addr: u32) -> u16;
  fn lw(&mut self, op: &Opcode, addr: u32) -> u32;
}
