use crate::state::GuestState;
use mips_mem::ram::CodeView;
use mips_opcode::Opcode;

/// What a per-opcode emission produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitStatus {
  /// Plain emission; the driver moves on to the next opcode.
  Emitted,
  /// The emitter consumed the following opcode as a branch delay slot.
  /// The driver skips its emission but still counts its cycles.
  SkipDelaySlot,
}

/// Everything an emitter gets to look at for one opcode: the whole list
/// (branches read their delay slot out of it), the position, the guest PC
/// of the opcode, and the cycles accumulated so far including this opcode.
pub struct EmitCtx<'a> {
  pub opcodes: &'a [Opcode],
  pub index: usize,
  pub pc: u32,
  pub cycles: u32,
}

impl EmitCtx<'_> {
  pub fn opcode(&self) -> Opcode {
    self.opcodes[self.index]
  }

  pub fn delay_slot(&self) -> Option<Opcode> {
    self.opcodes.get(self.index + 1).copied()
  }
}

/// The code-emission backend.
///
/// One backend serves one [`Dynarec`]. It produces three kinds of
/// artifact: the wrapper trampoline and the address-lookup stub, generated
/// once at init, and one code object per recompiled block. Dropping a code
/// object must release its executable memory.
///
/// ## Register contract for native backends
///
/// The wrapper saves every callee-saved host register on entry, whether
/// the block uses it or not, so emitted blocks may freely treat the whole
/// callee-saved set as the guest register file. It then loads the
/// state-pointer register with the address of the [`GuestState`] and
/// tail-jumps to the block. Blocks never return; every exit path jumps to
/// the wrapper's fixed exit label, whose epilogue restores the
/// callee-saved set and returns to the embedder.
///
/// The address-lookup stub may repurpose the state-pointer register to
/// walk the memory map, but must restore it before the segfault tail-call
/// and must not clobber any callee-saved register it has not declared as
/// scratch.
///
/// [`Dynarec`]: crate::Dynarec
pub trait CodeBackend {
  /// In-progress emission handle for one block.
  type Emitter: BlockEmitter;
  /// Finalised executable function. Owned by the block; its `Drop`
  /// releases the executable buffer.
  type Code;
  /// Handle for the generated wrapper trampoline.
  type Wrapper;
  /// Handle for the generated address-lookup stub. The reference scan it
  /// implements is [`crate::lookup::stub`]: highest-indexed map entry
  /// downward, direct regions only, segfault tail-call on a miss.
  type Lookup;

  /// Generate the wrapper trampoline. Called once at init; `None` aborts
  /// initialisation.
  fn generate_wrapper(&mut self) -> Option<Self::Wrapper>;

  /// Generate the address-lookup stub for a map of `regions` entries.
  /// Called once at init; the generator may reorder hot maps first.
  fn generate_address_lookup(&mut self, regions: usize) -> Option<Self::Lookup>;

  /// Open a fresh emission handle for one block. `None` means the backend
  /// is out of executable memory.
  fn open(&mut self) -> Option<Self::Emitter>;

  /// Seal the handle into an executable code object.
  fn finalize(&mut self, emitter: Self::Emitter) -> Option<Self::Code>;

  /// Enter a block through the wrapper. Returns once the block has jumped
  /// to the wrapper's exit. This is the only place a native backend runs
  /// guest-derived machine code.
  fn enter(&mut self, wrapper: &Self::Wrapper, code: &Self::Code, state: &mut GuestState);
}

/// Driver-side operations on a backend's emission handle.
pub trait BlockEmitter {
  /// Entry sequence for a block that is jumped to, not called, with a
  /// frame large enough to spill the guest register file.
  fn prologue(&mut self);

  /// Terminal jump to the wrapper exit. `next_pc` and `cycles` are what
  /// the fallthrough path commits to the state on its way out.
  fn epilogue(&mut self, next_pc: u32, cycles: u32);
}

/// The per-opcode emitter.
///
/// Emitted code must follow the register contract of [`CodeBackend`] and
/// jump to the wrapper exit on every path out of the block. A branch
/// emitter folds its delay slot (read from the context) into its own
/// emission and reports [`EmitStatus::SkipDelaySlot`].
pub trait OpcodeEmitter<B: CodeBackend> {
  fn rec_opcode(&mut self, emitter: &mut B::Emitter, ctx: EmitCtx<'_>) -> EmitStatus;
}

/// Turns a window of guest code into the opcode list of one block. The
/// returned list is freed by dropping it.
pub trait Disassembler {
  fn disassemble(&mut self, code: &CodeView) -> Vec<Opcode>;
}

/// Register-allocation state, reset before each block so nothing leaks
/// between compilations. Construction and `Drop` play the init/free
/// roles.
pub trait RegAllocator {
  fn reset(&mut self);
}

/// Coprocessor operation table supplied by the embedder. The core never
/// interprets it; emitted coprocessor instructions call through it with
/// the triggering opcode and unit number.
pub trait CoprocOps {
  /// Move-from-coprocessor: the value for guest register writes.
  fn mfc(&mut self, op: &Opcode, cop: u8, reg: usize) -> u32;
  /// Move-to-coprocessor.
  fn mtc(&mut self, op: &Opcode, cop: u8, reg: usize, value: u32);
  /// Any other coprocessor operation.
  fn op(&mut self, op: &Opcode, cop: u8);
}
