use mips_opcode::{Kind, Opcode};
use mips_rec::backend::{BlockEmitter, CodeBackend};
use mips_rec::state::{ExitFlags, GuestState};
use mips_rec::rw;
use std::rc::Rc;

/// One interpretable "instruction" of a compiled block.
#[derive(Debug, Clone, Copy)]
pub enum MicroOp {
  /// Guest memory access through the generic dispatcher on `state.rw`.
  Rw(Opcode),
  /// Guest memory access through the address-lookup fast path; only
  /// correct when the access cannot hit an I/O region.
  FastRw(Opcode),
  /// Straight-line computation.
  Alu(Opcode),
  /// Call into the coprocessor operation table.
  Cop(Opcode),
  /// Immediate register write, used for branch linkage.
  SetReg { reg: usize, value: u32 },
  /// Unconditional exit to a fixed target.
  Branch { target: u32, cycles: u32 },
  /// Unconditional exit to a register target.
  BranchReg { rs: usize, cycles: u32 },
  /// Conditional exit; falls through into the rest of the block when not
  /// taken.
  CondBranch {
    eq: bool,
    rs: usize,
    rt: usize,
    target: u32,
    cycles: u32,
  },
  /// Exit with extra flags raised (syscall, break).
  Trap {
    flags: ExitFlags,
    next_pc: u32,
    cycles: u32,
  },
  /// The fallthrough exit the driver appends to every block.
  Exit { next_pc: u32, cycles: u32 },
}

/// The open emission handle for one block.
#[derive(Default)]
pub struct MicroBuffer {
  ops: Vec<MicroOp>,
}

impl MicroBuffer {
  pub fn push(&mut self, op: MicroOp) {
    self.ops.push(op);
  }

  pub fn len(&self) -> usize {
    self.ops.len()
  }

  pub fn is_empty(&self) -> bool {
    self.ops.is_empty()
  }
}

impl BlockEmitter for MicroBuffer {
  fn prologue(&mut self) {
    // micro blocks carry no spill frame; the interpreter below reads the
    // guest registers straight off the state
  }

  fn epilogue(&mut self, next_pc: u32, cycles: u32) {
    self.ops.push(MicroOp::Exit { next_pc, cycles });
  }
}

/// A sealed block body. The backend's stand-in for executable memory.
#[derive(Debug)]
pub struct MicroCode {
  ops: Box<[MicroOp]>,
}

impl MicroCode {
  pub fn ops(&self) -> &[MicroOp] {
    &self.ops
  }
}

/// Marker for the generated wrapper. The register shuffle a native
/// wrapper performs has no software equivalent; entry bookkeeping happens
/// in [`SoftBackend::enter`] directly.
pub struct SoftWrapper;

/// Marker for the generated address-lookup stub. The scan itself runs
/// through the routine installed on `state.lookup`.
pub struct SoftLookup;

/// The software backend: compiles blocks to [`MicroOp`] lists and enters
/// them by interpretation.
#[derive(Default)]
pub struct SoftBackend;

impl SoftBackend {
  pub fn new() -> SoftBackend {
    SoftBackend
  }
}

impl CodeBackend for SoftBackend {
  type Emitter = MicroBuffer;
  type Code = MicroCode;
  type Wrapper = SoftWrapper;
  type Lookup = SoftLookup;

  fn generate_wrapper(&mut self) -> Option<SoftWrapper> {
    Some(SoftWrapper)
  }

  fn generate_address_lookup(&mut self, _regions: usize) -> Option<SoftLookup> {
    Some(SoftLookup)
  }

  fn open(&mut self) -> Option<MicroBuffer> {
    Some(MicroBuffer::default())
  }

  fn finalize(&mut self, emitter: MicroBuffer) -> Option<MicroCode> {
    Some(MicroCode {
      ops: emitter.ops.into_boxed_slice(),
    })
  }

  fn enter(&mut self, _wrapper: &SoftWrapper, code: &MicroCode, state: &mut GuestState) {
    run(code, state);
  }
}

/// Interpret one block until it exits.
///
/// Faults never break the loop: a failed access raises the stop flag on
/// the state and yields zero, and the block keeps running to its exit
/// jump, exactly like generated code would.
fn run(code: &MicroCode, state: &mut GuestState) {
  for micro in code.ops.iter() {
    match *micro {
      MicroOp::Rw(op) => {
        let base = state.regs[op.rs()];
        let data = state.regs[op.rt()];
        let rw = state.rw;
        let out = rw(state, &op, base, data);
        if op.kind().is_load() {
          state.regs.set(op.rt(), out);
        }
      }

      MicroOp::FastRw(op) => {
        let base = state.regs[op.rs()];
        let data = state.regs[op.rt()];
        let addr = base.wrapping_add(op.imm() as i32 as u32);
        let lookup = state.lookup;
        let out = match lookup(state, addr) {
          Some(hit) => rw::ram_access(&op, &hit.ram, hit.offset, data),
          // the lookup already raised the fault
          None => 0,
        };
        if op.kind().is_load() {
          state.regs.set(op.rt(), out);
        }
      }

      MicroOp::Alu(op) => alu(state, op),

      MicroOp::Cop(op) => {
        if let Kind::Cop(unit) = op.kind() {
          let cop = Rc::clone(&state.cop);
          match op.rs() {
            // mfc / cfc
            0x00 | 0x02 => {
              let value = cop.borrow_mut().mfc(&op, unit, op.rd());
              state.regs.set(op.rt(), value);
            }
            // mtc / ctc
            0x04 | 0x06 => {
              let value = state.regs[op.rt()];
              cop.borrow_mut().mtc(&op, unit, op.rd(), value);
            }
            _ => cop.borrow_mut().op(&op, unit),
          }
        }
      }

      MicroOp::SetReg { reg, value } => state.regs.set(reg, value),

      MicroOp::Branch { target, cycles } => {
        state.next_pc = target;
        state.exit_cycles = cycles;
        return;
      }

      MicroOp::BranchReg { rs, cycles } => {
        state.next_pc = state.regs[rs];
        state.exit_cycles = cycles;
        return;
      }

      MicroOp::CondBranch {
        eq,
        rs,
        rt,
        target,
        cycles,
      } => {
        if (state.regs[rs] == state.regs[rt]) == eq {
          state.next_pc = target;
          state.exit_cycles = cycles;
          return;
        }
      }

      MicroOp::Trap {
        flags,
        next_pc,
        cycles,
      } => {
        state.exit_flags.insert(flags);
        state.next_pc = next_pc;
        state.exit_cycles = cycles;
        return;
      }

      MicroOp::Exit { next_pc, cycles } => {
        state.next_pc = next_pc;
        state.exit_cycles = cycles;
        return;
      }
    }
  }
}

fn alu(state: &mut GuestState, op: Opcode) {
  use Kind::*;

  let regs = &mut state.regs;
  let imm = op.imm() as i32 as u32;

  match op.kind() {
    // overflow traps are not modelled; add and addu agree here
    Addi | Addiu => regs.set(op.rt(), regs[op.rs()].wrapping_add(imm)),
    Slti => regs.set(op.rt(), u32::from((regs[op.rs()] as i32) < op.imm() as i32)),
    Sltiu => regs.set(op.rt(), u32::from(regs[op.rs()] < imm)),
    Andi => regs.set(op.rt(), regs[op.rs()] & op.uimm()),
    Ori => regs.set(op.rt(), regs[op.rs()] | op.uimm()),
    Xori => regs.set(op.rt(), regs[op.rs()] ^ op.uimm()),
    Lui => regs.set(op.rt(), op.uimm() << 16),

    Add | Addu => regs.set(op.rd(), regs[op.rs()].wrapping_add(regs[op.rt()])),
    Sub | Subu => regs.set(op.rd(), regs[op.rs()].wrapping_sub(regs[op.rt()])),
    And => regs.set(op.rd(), regs[op.rs()] & regs[op.rt()]),
    Or => regs.set(op.rd(), regs[op.rs()] | regs[op.rt()]),
    Xor => regs.set(op.rd(), regs[op.rs()] ^ regs[op.rt()]),
    Nor => regs.set(op.rd(), !(regs[op.rs()] | regs[op.rt()])),
    Slt => regs.set(
      op.rd(),
      u32::from((regs[op.rs()] as i32) < (regs[op.rt()] as i32)),
    ),
    Sltu => regs.set(op.rd(), u32::from(regs[op.rs()] < regs[op.rt()])),

    Sll => regs.set(op.rd(), regs[op.rt()] << op.shamt()),
    Srl => regs.set(op.rd(), regs[op.rt()] >> op.shamt()),
    Sra => regs.set(op.rd(), ((regs[op.rt()] as i32) >> op.shamt()) as u32),
    Sllv => regs.set(op.rd(), regs[op.rt()] << (regs[op.rs()] & 31)),
    Srlv => regs.set(op.rd(), regs[op.rt()] >> (regs[op.rs()] & 31)),
    Srav => regs.set(
      op.rd(),
      ((regs[op.rt()] as i32) >> (regs[op.rs()] & 31)) as u32,
    ),

    Mfhi => {
      let hi = regs.hi;
      regs.set(op.rd(), hi);
    }
    Mflo => {
      let lo = regs.lo;
      regs.set(op.rd(), lo);
    }
    Mthi => regs.hi = regs[op.rs()],
    Mtlo => regs.lo = regs[op.rs()],

    Mult => {
      let product = i64::from(regs[op.rs()] as i32) * i64::from(regs[op.rt()] as i32);
      regs.hi = (product >> 32) as u32;
      regs.lo = product as u32;
    }
    Multu => {
      let product = u64::from(regs[op.rs()]) * u64::from(regs[op.rt()]);
      regs.hi = (product >> 32) as u32;
      regs.lo = product as u32;
    }
    Div => {
      let (n, d) = (regs[op.rs()] as i32, regs[op.rt()] as i32);
      if d != 0 {
        regs.lo = n.wrapping_div(d) as u32;
        regs.hi = n.wrapping_rem(d) as u32;
      }
    }
    Divu => {
      let (n, d) = (regs[op.rs()], regs[op.rt()]);
      if d != 0 {
        regs.lo = n / d;
        regs.hi = n % d;
      }
    }

    other => log::debug!("micro interpreter ignores {other:?}"),
  }
}
