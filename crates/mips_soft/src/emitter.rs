use crate::backend::{MicroBuffer, MicroOp, SoftBackend};
use mips_opcode::{cycles_of, Kind, Opcode};
use mips_rec::backend::{EmitCtx, EmitStatus, OpcodeEmitter};
use mips_rec::state::ExitFlags;
use std::cell::Cell;
use std::rc::Rc;

/// The per-opcode emitter matching [`SoftBackend`].
///
/// Branches fold their delay slot into their own emission and report
/// [`EmitStatus::SkipDelaySlot`]; everything else compiles to a single
/// micro op. The call counter is shared out so tests can watch when
/// compilation actually happens.
pub struct MicroEmitter {
  direct: bool,
  calls: Rc<Cell<u32>>,
}

impl MicroEmitter {
  pub fn new() -> MicroEmitter {
    MicroEmitter {
      direct: false,
      calls: Rc::new(Cell::new(0)),
    }
  }

  /// Compile memory accesses against the address-lookup fast path instead
  /// of the generic dispatcher. Only sound when no access can land on an
  /// I/O region.
  pub fn direct() -> MicroEmitter {
    MicroEmitter {
      direct: true,
      ..MicroEmitter::new()
    }
  }

  /// Number of `rec_opcode` calls so far, shared with the emitter.
  pub fn call_counter(&self) -> Rc<Cell<u32>> {
    Rc::clone(&self.calls)
  }

  fn straight_micro(&self, op: Opcode) -> Option<MicroOp> {
    let kind = op.kind();

    if op.is_nop() {
      return None;
    }
    if kind.is_mem() {
      return Some(if self.direct {
        MicroOp::FastRw(op)
      } else {
        MicroOp::Rw(op)
      });
    }
    if let Kind::Cop(_) = kind {
      return Some(MicroOp::Cop(op));
    }
    if kind.has_delay_slot() {
      // branches have no single-micro form
      return None;
    }

    Some(MicroOp::Alu(op))
  }

  /// Emit the delay slot ahead of its branch and return the exit cycle
  /// count covering both.
  fn fold_slot(&self, em: &mut MicroBuffer, ctx: &EmitCtx<'_>) -> u32 {
    let mut cycles = ctx.cycles;

    if let Some(slot) = ctx.delay_slot() {
      cycles = cycles.wrapping_add(cycles_of(&slot));
      match self.straight_micro(slot) {
        Some(micro) => em.push(micro),
        None if slot.is_nop() => {}
        None => log::warn!("branch {slot:?} in a delay slot, dropped"),
      }
    }

    cycles
  }

  fn jump(&self, em: &mut MicroBuffer, ctx: &EmitCtx<'_>, target: u32) -> EmitStatus {
    let cycles = self.fold_slot(em, ctx);
    em.push(MicroOp::Branch { target, cycles });
    EmitStatus::SkipDelaySlot
  }

  fn jump_reg(&self, em: &mut MicroBuffer, ctx: &EmitCtx<'_>, rs: usize) -> EmitStatus {
    let cycles = self.fold_slot(em, ctx);
    em.push(MicroOp::BranchReg { rs, cycles });
    EmitStatus::SkipDelaySlot
  }

  fn trap(&self, em: &mut MicroBuffer, ctx: &EmitCtx<'_>, flags: ExitFlags) -> EmitStatus {
    em.push(MicroOp::Trap {
      flags,
      next_pc: ctx.pc.wrapping_add(4),
      cycles: ctx.cycles,
    });
    EmitStatus::Emitted
  }
}

impl Default for MicroEmitter {
  fn default() -> Self {
    MicroEmitter::new()
  }
}

impl OpcodeEmitter<SoftBackend> for MicroEmitter {
  fn rec_opcode(&mut self, em: &mut MicroBuffer, ctx: EmitCtx<'_>) -> EmitStatus {
    use Kind::*;

    self.calls.set(self.calls.get() + 1);
    let op = ctx.opcode();

    match op.kind() {
      J => self.jump(em, &ctx, jump_target(ctx.pc, op)),
      Jal => {
        em.push(MicroOp::SetReg {
          reg: 31,
          value: ctx.pc.wrapping_add(8),
        });
        self.jump(em, &ctx, jump_target(ctx.pc, op))
      }
      Jr => self.jump_reg(em, &ctx, op.rs()),
      Jalr => {
        em.push(MicroOp::SetReg {
          reg: op.rd(),
          value: ctx.pc.wrapping_add(8),
        });
        self.jump_reg(em, &ctx, op.rs())
      }

      Beq | Bne => {
        let eq = op.kind() == Beq;
        let cycles = self.fold_slot(em, &ctx);
        em.push(MicroOp::CondBranch {
          eq,
          rs: op.rs(),
          rt: op.rt(),
          target: branch_target(ctx.pc, op),
          cycles,
        });
        EmitStatus::SkipDelaySlot
      }

      Syscall => self.trap(em, &ctx, ExitFlags::SYSCALL),
      Break => self.trap(em, &ctx, ExitFlags::BREAK),

      _ => {
        match self.straight_micro(op) {
          Some(micro) => em.push(micro),
          None => log::warn!("micro emitter cannot compile {op:?}"),
        }
        EmitStatus::Emitted
      }
    }
  }
}

/// `j`/`jal`: the target field replaces the low 28 bits of the PC of the
/// delay slot.
fn jump_target(pc: u32, op: Opcode) -> u32 {
  (pc.wrapping_add(4) & 0xf000_0000) | (op.target() << 2)
}

/// Conditional branches displace from the delay slot.
fn branch_target(pc: u32, op: Opcode) -> u32 {
  pc.wrapping_add(4)
    .wrapping_add(((op.imm() as i32) << 2) as u32)
}
