use mips_opcode::Opcode;
use mips_rec::backend::CoprocOps;

/// A coprocessor table that swallows everything, for embedders and tests
/// that run plain CPU code.
pub struct NoopCop;

impl CoprocOps for NoopCop {
  fn mfc(&mut self, _op: &Opcode, _cop: u8, _reg: usize) -> u32 {
    0
  }

  fn mtc(&mut self, _op: &Opcode, _cop: u8, _reg: usize, _value: u32) {}

  fn op(&mut self, _op: &Opcode, _cop: u8) {}
}
