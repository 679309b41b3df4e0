use crate::backend::CodeBackend;
use mips_mem::ram::CodeView;
use mips_opcode::Opcode;

/// One recompiled block: a straight run of guest instructions sealed into
/// a native function.
///
/// Created by the recompiler driver, owned by the cache once registered.
/// The code object keeps its executable buffer alive for exactly as long
/// as the block lives, and `source` stays readable because the memory map
/// never changes after init.
pub struct Block<B: CodeBackend> {
  pc: u32,
  kunseg_pc: u32,
  code: B::Code,
  opcodes: Vec<Opcode>,
  cycles: u32,
  source: CodeView,
  hash: u32,
}

impl<B: CodeBackend> std::fmt::Debug for Block<B>
where
  B::Code: std::fmt::Debug,
{
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Block")
      .field("pc", &self.pc)
      .field("kunseg_pc", &self.kunseg_pc)
      .field("code", &self.code)
      .field("opcodes", &self.opcodes)
      .field("cycles", &self.cycles)
      .field("source", &self.source)
      .field("hash", &self.hash)
      .finish()
  }
}

impl<B: CodeBackend> Block<B> {
  pub(crate) fn new(
    pc: u32,
    kunseg_pc: u32,
    code: B::Code,
    opcodes: Vec<Opcode>,
    cycles: u32,
    source: CodeView,
  ) -> Block<B> {
    Block {
      pc,
      kunseg_pc,
      code,
      opcodes,
      cycles,
      source,
      hash: 0,
    }
  }

  pub fn pc(&self) -> u32 {
    self.pc
  }

  pub fn kunseg_pc(&self) -> u32 {
    self.kunseg_pc
  }

  pub fn code(&self) -> &B::Code {
    &self.code
  }

  pub fn opcodes(&self) -> &[Opcode] {
    &self.opcodes
  }

  /// Cycle total of the whole block, skipped delay slots and NOPs
  /// included.
  pub fn cycles(&self) -> u32 {
    self.cycles
  }

  /// The hash sealed at registration time.
  pub fn hash(&self) -> u32 {
    self.hash
  }

  /// FNV-1a over the guest words the block was compiled from, one word
  /// per disassembled opcode. Deterministic within a process, which is
  /// all the staleness check needs; the value is not wire-visible.
  pub fn calculate_hash(&self) -> u32 {
    const OFFSET: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    let mut hash = OFFSET;
    for index in 0..self.opcodes.len() {
      let word = self.source.word(index).unwrap_or(0);
      for byte in word.to_le_bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(PRIME);
      }
    }
    hash
  }

  /// Whether the guest code covered by this block changed since
  /// registration.
  pub fn is_outdated(&self) -> bool {
    self.calculate_hash() != self.hash
  }

  pub(crate) fn seal_hash(&mut self) {
    self.hash = self.calculate_hash();
  }

  /// Whether the block's covered code range intersects the unsegmented
  /// range `[kstart, kend)`.
  pub(crate) fn covers(&self, kstart: u64, kend: u64) -> bool {
    let start = u64::from(self.kunseg_pc);
    let end = start + 4 * self.opcodes.len() as u64;
    start < kend && kstart < end
  }
}
