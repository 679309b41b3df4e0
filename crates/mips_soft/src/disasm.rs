use mips_mem::ram::CodeView;
use mips_opcode::Opcode;
use mips_rec::backend::Disassembler;

/// Word-at-a-time disassembler.
///
/// Reads until an unconditional jump (keeping its delay slot with the
/// block), the end of the mapped window, or the word limit. Conditional
/// branches stay inside the block; their not-taken path falls through to
/// the instructions after them.
pub struct WordDisassembler {
  pub max_words: usize,
}

impl WordDisassembler {
  pub fn new() -> WordDisassembler {
    WordDisassembler { max_words: 128 }
  }

  pub fn with_limit(max_words: usize) -> WordDisassembler {
    WordDisassembler { max_words }
  }
}

impl Default for WordDisassembler {
  fn default() -> Self {
    WordDisassembler::new()
  }
}

impl Disassembler for WordDisassembler {
  fn disassemble(&mut self, code: &CodeView) -> Vec<Opcode> {
    let mut opcodes = Vec::new();

    for index in 0..self.max_words {
      let Some(word) = code.word(index) else { break };
      let op = Opcode::new(word);
      opcodes.push(op);

      if op.kind().is_unconditional_jump() {
        if let Some(slot) = code.word(index + 1) {
          opcodes.push(Opcode::new(slot));
        }
        break;
      }
    }

    opcodes
  }
}
