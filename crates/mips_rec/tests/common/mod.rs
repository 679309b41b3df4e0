#![allow(dead_code)]

use mips_mem::ram::Ram;
use mips_mem::MapRegion;
use mips_rec::Dynarec;
use mips_soft::{MicroEmitter, NoopCop, SoftAllocator, SoftBackend, WordDisassembler};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Test programs live at the bottom of guest memory and run through the
/// kseg0 mirror.
pub const CODE_BASE: u32 = 0x8000_0000;

pub struct Harness {
  pub dynarec: Dynarec<SoftBackend>,
  pub ram: Ram,
  pub calls: Rc<Cell<u32>>,
  pub resets: Rc<Cell<u32>>,
}

pub fn setup(program: &[u32]) -> Harness {
  setup_with(program, MicroEmitter::new(), Vec::new())
}

pub fn setup_direct(program: &[u32]) -> Harness {
  setup_with(program, MicroEmitter::direct(), Vec::new())
}

pub fn setup_with(program: &[u32], emitter: MicroEmitter, extra: Vec<MapRegion>) -> Harness {
  let ram = Ram::zeroed(0x1000);
  for (index, word) in program.iter().enumerate() {
    ram.write_word(index * 4, *word);
  }

  let calls = emitter.call_counter();
  let alloc = SoftAllocator::new();
  let resets = alloc.reset_counter();

  let mut regions = vec![MapRegion::ram(0, ram.clone())];
  regions.extend(extra);

  let dynarec = Dynarec::init(
    SoftBackend::new(),
    regions,
    Rc::new(RefCell::new(NoopCop)),
    Box::new(emitter),
    Box::new(WordDisassembler::with_limit(program.len().max(1))),
    Box::new(alloc),
  )
  .unwrap();

  Harness {
    dynarec,
    ram,
    calls,
    resets,
  }
}

fn itype(op: u32, rs: usize, rt: usize, imm: u32) -> u32 {
  (op << 26) | ((rs as u32) << 21) | ((rt as u32) << 16) | (imm & 0xffff)
}

pub const NOP: u32 = 0;
pub const SYSCALL: u32 = 0x0000_000c;
pub const BREAK: u32 = 0x0000_000d;

pub fn addiu(rt: usize, rs: usize, imm: i16) -> u32 {
  itype(0x09, rs, rt, imm as u16 as u32)
}

pub fn ori(rt: usize, rs: usize, imm: u16) -> u32 {
  itype(0x0d, rs, rt, u32::from(imm))
}

pub fn lui(rt: usize, imm: u16) -> u32 {
  itype(0x0f, 0, rt, u32::from(imm))
}

pub fn lb(rt: usize, rs: usize, imm: i16) -> u32 {
  itype(0x20, rs, rt, imm as u16 as u32)
}

pub fn lbu(rt: usize, rs: usize, imm: i16) -> u32 {
  itype(0x24, rs, rt, imm as u16 as u32)
}

pub fn lw(rt: usize, rs: usize, imm: i16) -> u32 {
  itype(0x23, rs, rt, imm as u16 as u32)
}

pub fn lwl(rt: usize, rs: usize, imm: i16) -> u32 {
  itype(0x22, rs, rt, imm as u16 as u32)
}

pub fn lwr(rt: usize, rs: usize, imm: i16) -> u32 {
  itype(0x26, rs, rt, imm as u16 as u32)
}

pub fn sb(rt: usize, rs: usize, imm: i16) -> u32 {
  itype(0x28, rs, rt, imm as u16 as u32)
}

pub fn sw(rt: usize, rs: usize, imm: i16) -> u32 {
  itype(0x2b, rs, rt, imm as u16 as u32)
}

pub fn swl(rt: usize, rs: usize, imm: i16) -> u32 {
  itype(0x2a, rs, rt, imm as u16 as u32)
}

pub fn swr(rt: usize, rs: usize, imm: i16) -> u32 {
  itype(0x2e, rs, rt, imm as u16 as u32)
}

pub fn beq(rs: usize, rt: usize, offset: i16) -> u32 {
  itype(0x04, rs, rt, offset as u16 as u32)
}

pub fn bne(rs: usize, rt: usize, offset: i16) -> u32 {
  itype(0x05, rs, rt, offset as u16 as u32)
}

pub fn j(addr: u32) -> u32 {
  (0x02 << 26) | ((addr >> 2) & 0x03ff_ffff)
}

pub fn jal(addr: u32) -> u32 {
  (0x03 << 26) | ((addr >> 2) & 0x03ff_ffff)
}

pub fn jr(rs: usize) -> u32 {
  ((rs as u32) << 21) | 0x08
}
