//! Target Hook Surface (THS, spec §4.6).
//!
//! A concrete target (AArch64, x86-64, ...) implements these five
//! operations to plug its ISA-specific overrides into the otherwise
//! target-agnostic instruction translator. Spec §1 treats target-specific
//! overrides as external collaborators specified only by this interface.
//!
//! Default implementations all decline, i.e. "this target has no
//! override here, fall back to tape interpretation" — a target that
//! implements none of these still gets a working (if minimal) translation
//! for every instruction whose semantics are fully tape-encoded.

use crate::error::Result;
use crate::instruction::DecodedInstruction;
use crate::ir::{IrBuilder, ValueId};
use crate::tape::TapeReader;

/// Read-only view of the instruction currently being translated, handed
/// to target hooks so they can inspect operands without reaching back
/// into [`crate::instruction_translator::InstructionTranslator`] internals.
pub struct InstrCtx<'a> {
    pub inst: &'a DecodedInstruction,
}

pub trait TargetHooks {
    /// Whole-instruction override: if this returns `Ok(true)`, the
    /// instruction is considered fully translated and the tape is never
    /// consulted (spec §4.2 step 3).
    fn translate_target_inst(
        &mut self,
        _builder: &mut IrBuilder<'_>,
        _ctx: &InstrCtx<'_>,
    ) -> Result<bool> {
        Ok(false)
    }

    /// Handle a semantic opcode in the target range
    /// `[BUILTIN_OP_END, DC_OPCODE_START)` (spec §3). `reader` is
    /// positioned just past the opcode's generic `ResEVT` token (spec
    /// §4.2 opcode dispatch), so an implementation can pull whatever
    /// opcode-specific trailing operands its own tape encoding defines,
    /// the same way `CUSTOM_OP`/`COMPLEX_PATTERN` read theirs.
    fn translate_target_opcode(
        &mut self,
        _builder: &mut IrBuilder<'_>,
        _ctx: &InstrCtx<'_>,
        _opcode: u32,
        _reader: &mut TapeReader<'_>,
    ) -> Result<bool> {
        Ok(false)
    }

    /// Compute the value named by a complex addressing/operand pattern
    /// (the `COMPLEX_PATTERN` pseudo-opcode).
    fn translate_complex_pattern(
        &mut self,
        _builder: &mut IrBuilder<'_>,
        _ctx: &InstrCtx<'_>,
        _pattern_id: u32,
    ) -> Result<Option<ValueId>> {
        Ok(None)
    }

    /// Compute the value for a target-specific custom operand kind (the
    /// `CUSTOM_OP` pseudo-opcode).
    fn translate_custom_operand(
        &mut self,
        _builder: &mut IrBuilder<'_>,
        _ctx: &InstrCtx<'_>,
        _op_type: u32,
        _mi_operand_no: u32,
    ) -> Result<Option<ValueId>> {
        Ok(None)
    }

    /// Side effects for an implicit register operand (the `IMPLICIT`
    /// pseudo-opcode).
    fn translate_implicit(
        &mut self,
        _builder: &mut IrBuilder<'_>,
        _ctx: &InstrCtx<'_>,
        _reg_no: u32,
    ) -> Result<bool> {
        Ok(false)
    }
}
