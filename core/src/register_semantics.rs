//! Register Semantics Interface (RSI, spec §4.5).
//!
//! RSI is the external collaborator that knows how the architectural
//! register file is laid out, aliased, and saved/restored — all of that
//! is explicitly out of scope for this crate (spec §1). This module only
//! states the contract the core requires of it.

use crate::ir::{BlockId, Evt, FunctionId, IrBuilder, ValueId};
use crate::instruction::DecodedInstruction;

/// The back-reference to an externally owned register-semantics object.
///
/// RSI does not own the IR function, block, or value stack — it only
/// reads and writes through the [`IrBuilder`] it is handed, at the
/// insertion point the caller (the [`crate::function_translator::FunctionTranslator`])
/// has already set. Its lifetime outlives the function translation (spec §3 Ownership).
pub trait RegisterSemantics {
    /// Called once per decoded instruction, before any semantic opcode is
    /// translated (spec §4.2 step 1).
    fn switch_to_inst(&mut self, inst: &DecodedInstruction);

    /// Called once an MC basic block's IR block has been opened for
    /// insertion (spec §4.3 `switch_to_bb`).
    fn switch_to_bb(&mut self, builder: &mut IrBuilder<'_>, block: BlockId);

    /// Called when an MC basic block has been finalized (spec §4.3 `finalize_bb`).
    fn finalize_bb(&mut self, builder: &mut IrBuilder<'_>, block: BlockId);

    /// Called once at function teardown, after call-block post-processing
    /// (spec §4.3 "Post-processing").
    fn finalize_function(&mut self, builder: &mut IrBuilder<'_>, exit_block: BlockId);

    /// Read a register as its natural (possibly non-integer) IR type.
    fn get_reg(&mut self, builder: &mut IrBuilder<'_>, reg_no: u32) -> ValueId;

    /// Write a register. The value's type must already match `get_reg_type(reg_no)`.
    fn set_reg(&mut self, builder: &mut IrBuilder<'_>, reg_no: u32, value: ValueId);

    /// Read a register, coerced to its integer type (`get_reg_int_type`).
    fn get_reg_as_int(&mut self, builder: &mut IrBuilder<'_>, reg_no: u32) -> ValueId;

    /// Sub-register update: insert `narrow` into the low bits of `whole`,
    /// returning the updated whole-register integer value (spec §4.2
    /// "width/type coercion rules").
    fn insert_bits_in_value(
        &mut self,
        builder: &mut IrBuilder<'_>,
        whole: ValueId,
        narrow: ValueId,
    ) -> ValueId;

    fn get_reg_int_type(&self, reg_no: u32) -> Evt;
    fn get_reg_type(&self, reg_no: u32) -> Evt;
    fn get_reg_set_type(&self) -> Evt;

    /// The register number holding the architectural program counter
    /// (`MRI.get_program_counter()`).
    fn program_counter_reg(&self) -> u32;

    /// Lazily create (or return the existing) regset-diff function used
    /// when `enable_regset_diff` is on (spec §4.3 Construction).
    fn get_or_create_regset_diff_function(&mut self, builder: &mut IrBuilder<'_>) -> FunctionId;

    /// Emit register-saving code immediately before a call block's call
    /// instruction (spec §4.3 Post-processing). Returns how many
    /// instructions were inserted, so the caller can adjust the index it
    /// passes to [`RegisterSemantics::restore_local_regs`].
    fn save_all_local_regs(&mut self, builder: &mut IrBuilder<'_>, block: BlockId, before_idx: usize) -> usize;

    /// Emit register-restoring code immediately after a call block's call
    /// instruction (spec §4.3 Post-processing). `after_idx` is the index
    /// immediately following the call instruction, already adjusted for
    /// whatever `save_all_local_regs` inserted earlier in the same block.
    fn restore_local_regs(&mut self, builder: &mut IrBuilder<'_>, block: BlockId, after_idx: usize);

    /// Human-readable register name, for diagnostics only (spec §7, §4.5).
    fn reg_name(&self, reg_no: u32) -> &str;
}
