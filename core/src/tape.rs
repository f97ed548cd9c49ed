//! Semantics Tape Reader (STR, spec §4.1).
//!
//! The three parallel tables a semantic-table generator hands the
//! translator (spec §3):
//!
//! - `OpcodeToSemaIdx[mc_opcode]` — index into `SemanticsArray` where that
//!   opcode's emission program starts, or the sentinel [`NO_SEMANTICS`] if
//!   the table generator never covered this opcode.
//! - `SemanticsArray` — the flat token stream the reader walks.
//! - `ConstantArray` — out-of-line 64-bit constants, referenced from the
//!   tape by index rather than embedded inline (spec §3 "Data Model").
//!
//! [`TapeReader`] is a forward-only cursor over one instruction's program.

use crate::error::TranslationError;
use crate::ir::Evt;
use crate::opcode::{EvtTag, SemanticOp};

/// Sentinel stored in `OpcodeToSemaIdx` for an opcode the table generator
/// never assigned a semantics program to (spec §7 kind 1, "unknown
/// instruction").
pub const NO_SEMANTICS: u32 = u32::MAX;

pub struct SemanticTables {
    opcode_to_sema_idx: Vec<u32>,
    semantics_array: Vec<u32>,
    constant_array: Vec<u64>,
}

impl SemanticTables {
    pub fn new(
        opcode_to_sema_idx: Vec<u32>,
        semantics_array: Vec<u32>,
        constant_array: Vec<u64>,
    ) -> Self {
        Self {
            opcode_to_sema_idx,
            semantics_array,
            constant_array,
        }
    }

    /// Start index of `mc_opcode`'s semantics program, or `None` if the
    /// opcode has no entry (out of range) or is marked [`NO_SEMANTICS`].
    pub fn sema_start(&self, mc_opcode: u32) -> Option<u32> {
        let idx = *self.opcode_to_sema_idx.get(mc_opcode as usize)?;
        if idx == NO_SEMANTICS {
            None
        } else {
            Some(idx)
        }
    }

    pub fn reader_at(&self, start: u32) -> TapeReader<'_> {
        TapeReader {
            tables: self,
            pos: start,
        }
    }

    fn token(&self, pos: u32) -> Result<u32, TranslationError> {
        self.semantics_array.get(pos as usize).copied().ok_or_else(|| {
            TranslationError::AssertionViolation(format!(
                "semantics tape read past end of array at index {pos}"
            ))
        })
    }

    fn constant(&self, index: u32) -> Result<u64, TranslationError> {
        self.constant_array.get(index as usize).copied().ok_or_else(|| {
            TranslationError::AssertionViolation(format!(
                "constant array index {index} out of range"
            ))
        })
    }
}

/// Forward-only cursor over a single instruction's semantics program.
pub struct TapeReader<'t> {
    tables: &'t SemanticTables,
    pos: u32,
}

impl<'t> TapeReader<'t> {
    /// Raw next token, advancing the cursor (spec §4.1 `Next`).
    pub fn next(&mut self) -> Result<u32, TranslationError> {
        let tok = self.tables.token(self.pos)?;
        self.pos += 1;
        Ok(tok)
    }

    /// Next token decoded as a semantic opcode.
    pub fn next_op(&mut self) -> Result<SemanticOp, TranslationError> {
        Ok(SemanticOp::decode(self.next()?))
    }

    /// Next token decoded as a value type (spec §4.1 `NextVT`). An
    /// unrecognized type tag is a generator bug, not a target limitation —
    /// always fatal (spec §7 kind 4).
    pub fn next_vt(&mut self) -> Result<Evt, TranslationError> {
        let tok = self.next()?;
        let tag = EvtTag::from_u32(tok).ok_or_else(|| {
            TranslationError::AssertionViolation(format!("unrecognized value-type tag {tok}"))
        })?;
        Ok(tag.to_evt())
    }

    /// Next token read as an MC operand index (used by `CONSTANT_OP`,
    /// which names an already-decoded instruction operand rather than a
    /// `ConstantArray` slot).
    pub fn next_operand_index(&mut self) -> Result<u32, TranslationError> {
        self.next()
    }

    /// Next token read as an index into `ConstantArray`, resolved to the
    /// constant itself (used by `MOV_CONSTANT`).
    pub fn next_constant(&mut self) -> Result<u64, TranslationError> {
        let idx = self.next()?;
        self.tables.constant(idx)
    }

    pub fn pos(&self) -> u32 {
        self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::{BuiltinOp, PseudoOp};

    fn sample_tables() -> SemanticTables {
        // opcode 0 -> program at index 0, opcode 1 has no semantics.
        let opcode_to_sema_idx = vec![0, NO_SEMANTICS];
        let semantics_array = vec![
            BuiltinOp::Add.to_u32(),
            EvtTag::I32 as u32,
            0, // constant array index
            PseudoOp::EndOfInstruction.to_u32(),
        ];
        let constant_array = vec![0xdead_beef];
        SemanticTables::new(opcode_to_sema_idx, semantics_array, constant_array)
    }

    #[test]
    fn sema_start_respects_sentinel() {
        let tables = sample_tables();
        assert_eq!(tables.sema_start(0), Some(0));
        assert_eq!(tables.sema_start(1), None);
        assert_eq!(tables.sema_start(99), None);
    }

    #[test]
    fn reader_walks_tokens_in_order() {
        let tables = sample_tables();
        let mut r = tables.reader_at(0);
        assert_eq!(r.next_op().unwrap(), SemanticOp::Builtin(BuiltinOp::Add));
        assert_eq!(r.next_vt().unwrap(), Evt::I32);
        assert_eq!(r.next_constant().unwrap(), 0xdead_beef);
        assert_eq!(r.next_op().unwrap(), SemanticOp::Pseudo(PseudoOp::EndOfInstruction));
    }

    #[test]
    fn reading_past_end_is_an_error() {
        let tables = sample_tables();
        let mut r = tables.reader_at(3);
        r.next().unwrap();
        assert!(r.next().is_err());
    }
}
