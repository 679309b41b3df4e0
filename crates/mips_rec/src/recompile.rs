use crate::backend::{
  BlockEmitter, CodeBackend, Disassembler, EmitCtx, EmitStatus, OpcodeEmitter, RegAllocator,
};
use crate::block::Block;
use mips_mem::ram::CodeView;
use mips_mem::{kunseg, MemoryMap, Resolved};
use mips_opcode::cycles_of;

#[derive(Debug, PartialEq, Eq)]
pub enum CompileError {
  /// The starting PC does not resolve to direct guest memory.
  UnmappedPc(u32),
  /// The backend could not produce a code buffer.
  OutOfMemory,
}

/// Turn a guest PC into a compiled block.
///
/// The pipeline: resolve the PC, disassemble from the resolved window,
/// reset the register allocator, then emit the prologue, each opcode in
/// order and the exit jump, and seal the result. Cycle accounting runs
/// ahead of emission so skipped delay slots and NOPs still count.
pub(crate) fn recompile<B: CodeBackend>(
  backend: &mut B,
  emitter: &mut dyn OpcodeEmitter<B>,
  disasm: &mut dyn Disassembler,
  alloc: &mut dyn RegAllocator,
  mem: &MemoryMap,
  pc: u32,
) -> Result<Block<B>, CompileError> {
  let view = match mem.resolve(pc) {
    Some(Resolved::Ram { ram, offset }) => CodeView::new(ram, offset),
    _ => return Err(CompileError::UnmappedPc(pc)),
  };

  let opcodes = disasm.disassemble(&view);

  // no allocation state leaks between blocks
  alloc.reset();

  let mut handle = backend.open().ok_or(CompileError::OutOfMemory)?;
  handle.prologue();

  let mut cycles = 0u32;
  let mut skip_next = false;

  for (index, op) in opcodes.iter().enumerate() {
    cycles = cycles.wrapping_add(cycles_of(op));

    if skip_next {
      // folded into the branch emitted just before it
      skip_next = false;
      continue;
    }

    if op.is_nop() {
      continue;
    }

    let ctx = EmitCtx {
      opcodes: &opcodes,
      index,
      pc: pc.wrapping_add(index as u32 * 4),
      cycles,
    };
    skip_next = emitter.rec_opcode(&mut handle, ctx) == EmitStatus::SkipDelaySlot;
  }

  handle.epilogue(pc.wrapping_add(opcodes.len() as u32 * 4), cycles);

  let code = backend.finalize(handle).ok_or(CompileError::OutOfMemory)?;

  Ok(Block::new(pc, kunseg(pc), code, opcodes, cycles, view))
}
