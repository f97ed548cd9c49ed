//! Decoded machine-code instructions and function/block skeletons.
//!
//! Producing these is explicitly out of scope (spec §1): a real embedder
//! plugs in a disassembler. These types are the narrow data contract the
//! core consumes from that external decoder.

/// One decoded-instruction operand. `Fp` carries the raw bit pattern of a
/// floating-point immediate (the IR type it should be interpreted as is
/// supplied separately by the semantic tape, not by the operand itself).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum McOperand {
    Reg(u32),
    Imm(i64),
    Fp(u64),
}

impl McOperand {
    pub fn as_reg(&self) -> Option<u32> {
        match self {
            McOperand::Reg(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_imm(&self) -> Option<i64> {
        match self {
            McOperand::Imm(i) => Some(*i),
            _ => None,
        }
    }
}

/// One decoded target-ISA instruction.
#[derive(Debug, Clone)]
pub struct DecodedInstruction {
    pub address: u64,
    pub size: u8,
    pub mc_opcode: u32,
    pub operands: Vec<McOperand>,
    /// Human-readable mnemonic, used only for diagnostics (spec §7).
    pub mnemonic: String,
    /// Whether this is a call-class instruction. Calls are recognized
    /// structurally by the function translator rather than through the
    /// semantics tape: the tape describes per-instruction register/memory
    /// effects, not control transfer to another function (spec §4.3).
    pub is_call: bool,
    /// A direct call that never returns to this function; its call block
    /// ends the function instead of falling through to a continuation
    /// (spec §4.3 `create_external_tail_call_bb`).
    pub is_tail_call: bool,
}

impl DecodedInstruction {
    pub fn new(address: u64, size: u8, mc_opcode: u32, mnemonic: impl Into<String>) -> Self {
        Self {
            address,
            size,
            mc_opcode,
            operands: Vec::new(),
            mnemonic: mnemonic.into(),
            is_call: false,
            is_tail_call: false,
        }
    }

    pub fn with_operands(mut self, operands: Vec<McOperand>) -> Self {
        self.operands = operands;
        self
    }

    pub fn with_call(mut self) -> Self {
        self.is_call = true;
        self
    }

    pub fn with_tail_call(mut self) -> Self {
        self.is_call = true;
        self.is_tail_call = true;
        self
    }

    pub fn operand(&self, idx: u32) -> Option<&McOperand> {
        self.operands.get(idx as usize)
    }

    pub fn end_address(&self) -> u64 {
        self.address + self.size as u64
    }
}

/// A decoded basic block: a run of instructions between two addresses.
#[derive(Debug, Clone)]
pub struct McBasicBlock {
    pub start: u64,
    pub end: u64,
    pub instructions: Vec<DecodedInstruction>,
}

impl McBasicBlock {
    pub fn new(start: u64, end: u64, instructions: Vec<DecodedInstruction>) -> Self {
        Self {
            start,
            end,
            instructions,
        }
    }
}

/// A decoded function: its entry address plus its basic blocks, in the
/// order the decoder discovered them.
#[derive(Debug, Clone)]
pub struct McFunction {
    pub start_addr: u64,
    pub basic_blocks: Vec<McBasicBlock>,
}

impl McFunction {
    pub fn new(start_addr: u64, basic_blocks: Vec<McBasicBlock>) -> Self {
        Self {
            start_addr,
            basic_blocks,
        }
    }
}
