//! Instruction Translator (IT, spec §4.2) — the component that walks one
//! decoded instruction's semantics tape and emits IR for it. This is the
//! largest single piece of the translation engine (spec §1: "roughly 40%
//! of the core").
//!
//! Algorithm (spec §4.2):
//! 1. Tell RSI a new instruction is starting.
//! 2. Give the target a chance to override the whole instruction.
//! 3. Otherwise look up the instruction's semantics program and walk it,
//!    dispatching each semantic opcode, until `END_OF_INSTRUCTION`.
//! 4. Assert the value stack is empty at that point (spec §8).
//!
//! Recovery from an unknown instruction/opcode/predicate/pattern (spec §7
//! kinds 1-3) is the function translator's job, not this module's: it
//! propagates the error so the caller can decide, under
//! [`crate::policy::TranslationPolicy::translate_unknown_to_undef`],
//! whether to fall back to an undefined block.

use crate::error::{Result, TranslationError};
use crate::instruction::{DecodedInstruction, McOperand};
use crate::ir::{BlockId, DebugSink, Evt, IrBuilder, IrOp, ValueId};
use crate::opcode::{BuiltinOp, Predicate, PseudoOp, SemanticOp};
use crate::policy::TranslationPolicy;
use crate::register_semantics::RegisterSemantics;
use crate::target_hooks::{InstrCtx, TargetHooks};
use crate::tape::{SemanticTables, TapeReader};
use crate::value_stack::ValueStack;

/// Map a binary `BuiltinOp` onto the IR opcode that computes it.
fn binop_ir(op: BuiltinOp) -> IrOp {
    match op {
        BuiltinOp::Add => IrOp::Add,
        BuiltinOp::Sub => IrOp::Sub,
        BuiltinOp::Mul => IrOp::Mul,
        BuiltinOp::UDiv => IrOp::UDiv,
        BuiltinOp::SDiv => IrOp::SDiv,
        BuiltinOp::URem => IrOp::URem,
        BuiltinOp::SRem => IrOp::SRem,
        BuiltinOp::And => IrOp::And,
        BuiltinOp::Or => IrOp::Or,
        BuiltinOp::Xor => IrOp::Xor,
        BuiltinOp::Shl => IrOp::Shl,
        BuiltinOp::LShr => IrOp::LShr,
        BuiltinOp::AShr => IrOp::AShr,
        BuiltinOp::FAdd => IrOp::FAdd,
        BuiltinOp::FSub => IrOp::FSub,
        BuiltinOp::FMul => IrOp::FMul,
        BuiltinOp::FDiv => IrOp::FDiv,
        BuiltinOp::FRem => IrOp::FRem,
        other => unreachable!("{other:?} is not a binary op"),
    }
}

/// Map a cast `BuiltinOp` onto the IR opcode that performs it.
fn cast_ir(op: BuiltinOp) -> IrOp {
    match op {
        BuiltinOp::Trunc => IrOp::Trunc,
        BuiltinOp::BitCast => IrOp::BitCast,
        BuiltinOp::ZExt => IrOp::ZExt,
        BuiltinOp::SExt => IrOp::SExt,
        BuiltinOp::FpToUi => IrOp::FpToUi,
        BuiltinOp::FpToSi => IrOp::FpToSi,
        BuiltinOp::UiToFp => IrOp::UiToFp,
        BuiltinOp::SiToFp => IrOp::SiToFp,
        BuiltinOp::FpTrunc => IrOp::FpTrunc,
        BuiltinOp::FpExt => IrOp::FpExt,
        other => unreachable!("{other:?} is not a cast op"),
    }
}

/// The standard integer type of exactly `bits` bits (used by the
/// wide-multiply intrinsics, which compute a product spanning the sum of
/// the lo- and hi-half widths read off the tape).
fn int_of_width(bits: u32) -> Result<Evt> {
    let ty = match bits {
        1 => Evt::I1,
        8 => Evt::I8,
        16 => Evt::I16,
        32 => Evt::I32,
        64 => Evt::I64,
        128 => Evt::I128,
        other => {
            return Err(TranslationError::AssertionViolation(format!(
                "no standard integer type of width {other}"
            )))
        }
    };
    Ok(ty)
}

/// Spec §4.2 step 5: `PC ← PC + decoded.size`, performed before any other
/// semantic effect so that later operations in the same instruction (and
/// any register read) observe the post-increment PC.
fn advance_pc(builder: &mut IrBuilder<'_>, rsi: &mut dyn RegisterSemantics, size: u64) {
    let pc_reg = rsi.program_counter_reg();
    let pc_int = rsi.get_reg_as_int(builder, pc_reg);
    let int_ty = rsi.get_reg_int_type(pc_reg);
    let size_const = builder.const_int(int_ty, size);
    let advanced = builder.binop(IrOp::Add, pc_int, size_const);
    let natural_ty = rsi.get_reg_type(pc_reg);
    let stored = if natural_ty == int_ty {
        advanced
    } else {
        builder.cast(IrOp::BitCast, advanced, natural_ty)
    };
    rsi.set_reg(builder, pc_reg, stored);
}

fn branch_target(inst: &DecodedInstruction) -> Result<u64> {
    match inst.operand(0) {
        Some(McOperand::Imm(addr)) => Ok(*addr as u64),
        _ => Err(TranslationError::AssertionViolation(format!(
            "direct branch at {:#x} has no immediate target operand",
            inst.address
        ))),
    }
}

/// Translate one decoded instruction, appending IR at the builder's
/// current insertion point.
///
/// `exit_block` is the function's shared exit block, the target of
/// indirect transfers (spec §4.3, and the `BRIND` case below).
#[allow(clippy::too_many_arguments)]
pub fn translate_inst(
    builder: &mut IrBuilder<'_>,
    tables: &SemanticTables,
    rsi: &mut dyn RegisterSemantics,
    hooks: &mut dyn TargetHooks,
    inst: &DecodedInstruction,
    exit_block: BlockId,
    policy: &TranslationPolicy,
) -> Result<()> {
    rsi.switch_to_inst(inst);
    let ctx = InstrCtx { inst };

    // Spec §4.2 step 2: a debugging aid only, never a correctness channel
    // (spec §5) — gated on the same policy flag as the other two debug
    // sinks (spec §6).
    if policy.enable_inst_addr_save {
        let addr = builder.const_int(Evt::I64, inst.address);
        builder.store_debug_sink(DebugSink::CurrentInstr, addr);
    }

    if hooks.translate_target_inst(builder, &ctx)? {
        return Ok(());
    }

    let start = tables.sema_start(inst.mc_opcode).ok_or_else(|| TranslationError::UnknownInstruction {
        mc_opcode: inst.mc_opcode,
        address: inst.address,
    })?;

    // Spec §4.2 step 5: the PC update must be the first observable semantic
    // effect of a known instruction, before the tape is walked at all
    // (spec §8 "PC-first").
    advance_pc(builder, rsi, inst.size as u64);

    let mut reader = tables.reader_at(start);
    let mut vs = ValueStack::new();

    loop {
        let op = reader.next_op()?;
        if matches!(op, SemanticOp::Pseudo(PseudoOp::EndOfInstruction)) {
            vs.check_empty_at_instruction_end()?;
            break;
        }

        // Spec §4.2 "Opcode dispatch": `ResEVT = NextVT()` is the first
        // action for every semantic opcode — builtin, target-range, and
        // pseudo alike — before any opcode-specific operand is read.
        let res_evt = reader.next_vt()?.resolve_iptr();

        match op {
            SemanticOp::Builtin(op) => {
                translate_builtin(op, res_evt, builder, &mut reader, &mut vs, inst, exit_block)?
            }
            SemanticOp::Target(code) => {
                let handled = hooks.translate_target_opcode(builder, &ctx, code, &mut reader)?;
                if !handled {
                    return Err(TranslationError::UnknownOpcode {
                        opcode: code,
                        mnemonic: inst.mnemonic.clone(),
                        address: inst.address,
                    });
                }
            }
            SemanticOp::Pseudo(PseudoOp::EndOfInstruction) => unreachable!("handled above"),
            SemanticOp::Pseudo(op) => {
                translate_pseudo(op, res_evt, builder, &mut reader, &mut vs, &ctx, rsi, hooks)?
            }
        }
    }

    Ok(())
}

fn translate_builtin(
    op: BuiltinOp,
    res_evt: Evt,
    builder: &mut IrBuilder<'_>,
    reader: &mut TapeReader<'_>,
    vs: &mut ValueStack,
    inst: &DecodedInstruction,
    exit_block: BlockId,
) -> Result<()> {
    if op.is_binary() {
        let rhs = vs.pop()?;
        let lhs = vs.pop()?;
        let result = builder.binop_typed(binop_ir(op), lhs, rhs, res_evt);
        vs.push(result);
        return Ok(());
    }
    if op.is_cast() {
        let value = vs.pop()?;
        let result = builder.cast(cast_ir(op), value, res_evt);
        vs.push(result);
        return Ok(());
    }

    match op {
        BuiltinOp::Rotl => {
            // Spec §9 open question: behavior at amount == 0 or == width is
            // left exactly as this expansion computes it (an AShr/LShr by
            // the full width), not specially guarded.
            let amt = vs.pop()?;
            let value = vs.pop()?;
            let ty = res_evt;
            let width = ty.bit_width();
            let width_const = builder.const_int(ty.clone(), width as u64);
            let complement = builder.binop(IrOp::Sub, width_const, amt);
            let hi = builder.binop(IrOp::Shl, value, amt);
            let lo = builder.binop(IrOp::LShr, value, complement);
            let result = builder.binop(IrOp::Or, hi, lo);
            vs.push(result);
        }
        BuiltinOp::InsertVectorElt => {
            let idx = vs.pop()?;
            let elt = vs.pop()?;
            let vec = vs.pop()?;
            vs.push(builder.insert_vector_elt(vec, elt, idx));
        }
        BuiltinOp::ExtractVectorElt => {
            let idx = vs.pop()?;
            let vec = vs.pop()?;
            vs.push(builder.extract_vector_elt(vec, idx, res_evt));
        }
        BuiltinOp::SmulLoHi | BuiltinOp::UmulLoHi => {
            // Spec §4.2: the generic ResEVT just read is the lo-half type;
            // the hi-half type is an explicit second `NextVT()` read.
            let lo_ty = res_evt;
            let hi_ty = reader.next_vt()?.resolve_iptr();
            let rhs = vs.pop()?;
            let lhs = vs.pop()?;
            let wide_ty = int_of_width(lo_ty.bit_width() + hi_ty.bit_width())?;
            let ext_op = if op == BuiltinOp::SmulLoHi { IrOp::SExt } else { IrOp::ZExt };
            let lhs_wide = builder.cast(ext_op, lhs, wide_ty.clone());
            let rhs_wide = builder.cast(ext_op, rhs, wide_ty.clone());
            let product = builder.binop_typed(IrOp::Mul, lhs_wide, rhs_wide, wide_ty.clone());
            let lo = builder.cast(IrOp::Trunc, product, lo_ty.clone());
            let shift_amt = builder.const_int(wide_ty.clone(), lo_ty.bit_width() as u64);
            let shifted = builder.binop_typed(IrOp::LShr, product, shift_amt, wide_ty);
            let hi = builder.cast(IrOp::Trunc, shifted, hi_ty);
            vs.push(lo);
            vs.push(hi);
        }
        BuiltinOp::Load => {
            let ptr = vs.pop()?;
            vs.push(builder.load(ptr, res_evt));
        }
        BuiltinOp::Store => {
            let value = vs.pop()?;
            let ptr = vs.pop()?;
            builder.store(ptr, value);
        }
        BuiltinOp::Br => {
            let target_addr = branch_target(inst)?;
            let target = get_or_create_block(builder, target_addr);
            builder.br(target);
        }
        BuiltinOp::BrInd => {
            // Testable property (spec §8): indirect transfers lower to
            // exactly `call translate_at(v); br exit`, never a direct call.
            let addr = vs.pop()?;
            builder.translate_at(addr);
            builder.br(exit_block);
        }
        BuiltinOp::Trap => builder.trap(),
        BuiltinOp::AtomicFence => {
            let scope = vs.pop()?;
            let ordering = vs.pop()?;
            check_atomic_constant(builder, ordering, scope)?;
            builder.atomic_fence(ordering, scope);
        }
        BuiltinOp::FSqrt => {
            let value = vs.pop()?;
            let ty = builder.value_type(value);
            vs.push(builder.intrinsic(IrOp::FSqrt, vec![value], ty));
        }
        BuiltinOp::BSwap => {
            let value = vs.pop()?;
            let ty = builder.value_type(value);
            vs.push(builder.intrinsic(IrOp::BSwap, vec![value], ty));
        }
        _ => unreachable!("{op:?} handled by is_binary/is_cast above"),
    }
    Ok(())
}

/// Look up or create the target block for a resolved branch address,
/// without requiring callers to reach into the module/function plumbing
/// themselves (spec §4.4 BBM).
fn get_or_create_block(builder: &mut IrBuilder<'_>, address: u64) -> BlockId {
    let func_id = builder.func_id();
    let func = builder.module_mut().function_mut(func_id);
    crate::block_manager::BlockManager::get_or_create(func, address)
}

/// Spec §7 kind 5: an atomic ordering/scope constant outside the known
/// set is always fatal, never recoverable under the undef policy.
fn check_atomic_constant(builder: &IrBuilder<'_>, ordering: ValueId, scope: ValueId) -> Result<()> {
    use crate::ir::ValueKind;
    let ord = match &builder.func().value(ordering).kind {
        ValueKind::ConstInt(n) => *n as i64,
        _ => {
            return Err(TranslationError::AssertionViolation(
                "atomic ordering operand is not a constant".into(),
            ))
        }
    };
    let scope_val = match &builder.func().value(scope).kind {
        ValueKind::ConstInt(n) => *n as i64,
        _ => {
            return Err(TranslationError::AssertionViolation(
                "atomic scope operand is not a constant".into(),
            ))
        }
    };
    const KNOWN_ORDERINGS: std::ops::RangeInclusive<i64> = 0..=5;
    const KNOWN_SCOPES: std::ops::RangeInclusive<i64> = 0..=2;
    if !KNOWN_ORDERINGS.contains(&ord) || !KNOWN_SCOPES.contains(&scope_val) {
        return Err(TranslationError::InvalidAtomicOrdering {
            ordering: ord,
            scope: scope_val,
        });
    }
    Ok(())
}

/// Resolve a `PUT_RC`/`GET_RC` tape token — an MC operand index, not a
/// raw register number (spec §4.2: "the `_RC` variants consult the MC
/// operand index from the tape") — to the register number that operand
/// names, the same indirection `CONSTANT_OP` performs.
fn resolve_rc_operand(ctx: &InstrCtx<'_>, operand_idx: u32) -> Result<u32> {
    let operand = ctx.inst.operand(operand_idx).ok_or_else(|| {
        TranslationError::AssertionViolation(format!(
            "_RC opcode referenced missing operand {operand_idx} of {}",
            ctx.inst.mnemonic
        ))
    })?;
    operand.as_reg().ok_or_else(|| {
        TranslationError::AssertionViolation(format!(
            "_RC opcode operand {operand_idx} of {} is not a register",
            ctx.inst.mnemonic
        ))
    })
}

fn translate_pseudo(
    op: PseudoOp,
    res_evt: Evt,
    builder: &mut IrBuilder<'_>,
    reader: &mut TapeReader<'_>,
    vs: &mut ValueStack,
    ctx: &InstrCtx<'_>,
    rsi: &mut dyn RegisterSemantics,
    hooks: &mut dyn TargetHooks,
) -> Result<()> {
    match op {
        PseudoOp::EndOfInstruction => unreachable!("handled by the caller's loop"),
        PseudoOp::GetReg => {
            // Direct register number from the tape, no operand lookup
            // (spec §4.2, distinct from GET_RC below).
            let reg_no = reader.next()?;
            vs.push(rsi.get_reg(builder, reg_no));
        }
        PseudoOp::GetRc => {
            let operand_idx = reader.next_operand_index()?;
            let reg_no = resolve_rc_operand(ctx, operand_idx)?;
            vs.push(rsi.get_reg_as_int(builder, reg_no));
        }
        PseudoOp::PutReg => {
            // Direct register number from the tape, no operand lookup.
            let reg_no = reader.next()?;
            let value = vs.pop()?;
            rsi.set_reg(builder, reg_no, value);
        }
        PseudoOp::PutRc => {
            // Width/type coercion rule (spec §4.2): the narrow value is
            // spliced into the whole register's integer form, then
            // bitcast back to the register's natural type before writing.
            let operand_idx = reader.next_operand_index()?;
            let reg_no = resolve_rc_operand(ctx, operand_idx)?;
            let narrow = vs.pop()?;
            let whole = rsi.get_reg_as_int(builder, reg_no);
            let updated = rsi.insert_bits_in_value(builder, whole, narrow);
            let natural_ty = rsi.get_reg_type(reg_no);
            let int_ty = rsi.get_reg_int_type(reg_no);
            let coerced = if natural_ty == int_ty {
                updated
            } else {
                builder.cast(IrOp::BitCast, updated, natural_ty)
            };
            rsi.set_reg(builder, reg_no, coerced);
        }
        PseudoOp::CustomOp => {
            let op_type = reader.next()?;
            let mi_operand_no = reader.next()?;
            match hooks.translate_custom_operand(builder, ctx, op_type, mi_operand_no)? {
                Some(value) => vs.push(value),
                None => {
                    return Err(TranslationError::UnknownCustomOperand {
                        op_type,
                        mi_operand_no,
                        mnemonic: ctx.inst.mnemonic.clone(),
                        address: ctx.inst.address,
                    })
                }
            }
        }
        PseudoOp::ComplexPattern => {
            let pattern_id = reader.next()?;
            match hooks.translate_complex_pattern(builder, ctx, pattern_id)? {
                Some(value) => vs.push(value),
                None => {
                    return Err(TranslationError::UnknownComplexPattern {
                        pattern_id,
                        mnemonic: ctx.inst.mnemonic.clone(),
                        address: ctx.inst.address,
                    })
                }
            }
        }
        PseudoOp::Implicit => {
            let reg_no = reader.next()?;
            hooks.translate_implicit(builder, ctx, reg_no)?;
        }
        PseudoOp::Predicate => {
            let predicate_id = reader.next()?;
            let predicate = Predicate::from_u32(predicate_id).ok_or_else(|| {
                TranslationError::UnknownPredicate {
                    predicate_id,
                    mnemonic: ctx.inst.mnemonic.clone(),
                    address: ctx.inst.address,
                }
            })?;
            translate_predicate(predicate, res_evt, builder, reader, vs)?;
        }
        PseudoOp::ConstantOp => {
            let operand_idx = reader.next_operand_index()?;
            let operand = ctx.inst.operand(operand_idx).ok_or_else(|| {
                TranslationError::AssertionViolation(format!(
                    "CONSTANT_OP referenced missing operand {operand_idx} of {}",
                    ctx.inst.mnemonic
                ))
            })?;
            let bits = match operand {
                McOperand::Imm(i) => *i as u64,
                McOperand::Fp(bits) => *bits,
                McOperand::Reg(_) => {
                    return Err(TranslationError::AssertionViolation(format!(
                        "CONSTANT_OP operand {operand_idx} of {} is a register",
                        ctx.inst.mnemonic
                    )))
                }
            };
            vs.push(builder.const_int(res_evt, bits));
        }
        PseudoOp::MovConstant => {
            let bits = reader.next_constant()?;
            vs.push(builder.const_int(res_evt, bits));
        }
    }
    Ok(())
}

/// Named memory/composite predicates (spec §4.2 table). Alignment and
/// non-temporal hints are accepted but not separately encoded in the IR —
/// this IR has no memory-operand attribute list to carry them in.
fn translate_predicate(
    predicate: Predicate,
    res_evt: Evt,
    builder: &mut IrBuilder<'_>,
    _reader: &mut TapeReader<'_>,
    vs: &mut ValueStack,
) -> Result<()> {
    use Predicate::*;
    match predicate {
        Memop => {
            // Identity marker: the surrounding GET_REG/PUT_RC steps already
            // did the real work; this predicate exists only as a tag in
            // the original table and carries no IR of its own here.
        }
        LoadI16 => {
            let ptr = vs.pop()?;
            vs.push(builder.load(ptr, Evt::I16));
        }
        LoadI32 => {
            let ptr = vs.pop()?;
            vs.push(builder.load(ptr, Evt::I32));
        }
        AlignedLoad | Load => {
            let ptr = vs.pop()?;
            vs.push(builder.load(ptr, res_evt));
        }
        AlignedLoad256 => {
            let ptr = vs.pop()?;
            vs.push(builder.load(ptr, Evt::vector(Evt::I32, 8)));
        }
        AlignedLoad512 => {
            let ptr = vs.pop()?;
            vs.push(builder.load(ptr, Evt::vector(Evt::I32, 16)));
        }
        AlignedStore | NontemporalStore => {
            let value = vs.pop()?;
            let ptr = vs.pop()?;
            builder.store(ptr, value);
        }
        AlignedStore256 | AlignedStore512 => {
            let value = vs.pop()?;
            let ptr = vs.pop()?;
            builder.store(ptr, value);
        }
        ZextLoadI8 | ZextLoadI16 => {
            let narrow_ty = if predicate == ZextLoadI8 { Evt::I8 } else { Evt::I16 };
            let ptr = vs.pop()?;
            let loaded = builder.load(ptr, narrow_ty);
            vs.push(builder.cast(IrOp::ZExt, loaded, res_evt));
        }
        SextLoadI8 | SextLoadI16 | SextLoadI32 => {
            let narrow_ty = match predicate {
                SextLoadI8 => Evt::I8,
                SextLoadI16 => Evt::I16,
                _ => Evt::I32,
            };
            let ptr = vs.pop()?;
            let loaded = builder.load(ptr, narrow_ty);
            vs.push(builder.cast(IrOp::SExt, loaded, res_evt));
        }
        AndSu => {
            let rhs = vs.pop()?;
            let lhs = vs.pop()?;
            vs.push(builder.binop(IrOp::And, lhs, rhs));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BlockState, IrModule};
    use crate::opcode::{EvtTag, BUILTIN_OP_END};

    struct NoopRsi;
    impl RegisterSemantics for NoopRsi {
        fn switch_to_inst(&mut self, _inst: &DecodedInstruction) {}
        fn switch_to_bb(&mut self, _builder: &mut IrBuilder<'_>, _block: BlockId) {}
        fn finalize_bb(&mut self, _builder: &mut IrBuilder<'_>, _block: BlockId) {}
        fn finalize_function(&mut self, _builder: &mut IrBuilder<'_>, _exit_block: BlockId) {}
        fn get_reg(&mut self, builder: &mut IrBuilder<'_>, _reg_no: u32) -> ValueId {
            builder.const_int(Evt::I64, 0)
        }
        fn set_reg(&mut self, _builder: &mut IrBuilder<'_>, _reg_no: u32, _value: ValueId) {}
        fn get_reg_as_int(&mut self, builder: &mut IrBuilder<'_>, _reg_no: u32) -> ValueId {
            builder.const_int(Evt::I64, 0)
        }
        fn insert_bits_in_value(
            &mut self,
            _builder: &mut IrBuilder<'_>,
            whole: ValueId,
            _narrow: ValueId,
        ) -> ValueId {
            whole
        }
        fn get_reg_int_type(&self, _reg_no: u32) -> Evt {
            Evt::I64
        }
        fn get_reg_type(&self, _reg_no: u32) -> Evt {
            Evt::I64
        }
        fn get_reg_set_type(&self) -> Evt {
            Evt::I64
        }
        fn program_counter_reg(&self) -> u32 {
            0
        }
        fn get_or_create_regset_diff_function(
            &mut self,
            _builder: &mut IrBuilder<'_>,
        ) -> crate::ir::FunctionId {
            crate::ir::FunctionId(0)
        }
        fn save_all_local_regs(&mut self, _b: &mut IrBuilder<'_>, _block: BlockId, _idx: usize) -> usize {
            0
        }
        fn restore_local_regs(&mut self, _b: &mut IrBuilder<'_>, _block: BlockId, _idx: usize) {}
        fn reg_name(&self, _reg_no: u32) -> &str {
            "r?"
        }
    }

    struct NoopHooks;
    impl TargetHooks for NoopHooks {}

    /// `GET_RC`/`PUT_RC` tape operands are MC operand *indices*, resolved
    /// against the instruction's own operand list (spec §4.2); every
    /// opcode token here is followed by its generic `ResEVT` tag (spec
    /// §4.2 opcode dispatch), matching the real tape format rather than a
    /// hand-simplified one.
    fn binop_tables() -> SemanticTables {
        let opcode_to_sema_idx = vec![0];
        let semantics_array = vec![
            PseudoOp::GetRc.to_u32(),
            EvtTag::I64 as u32,
            0, // MC operand index 0
            PseudoOp::GetRc.to_u32(),
            EvtTag::I64 as u32,
            1, // MC operand index 1
            BuiltinOp::Add.to_u32(),
            EvtTag::I64 as u32,
            PseudoOp::PutRc.to_u32(),
            EvtTag::I64 as u32,
            0, // MC operand index 0 (destination)
            PseudoOp::EndOfInstruction.to_u32(),
        ];
        SemanticTables::new(opcode_to_sema_idx, semantics_array, vec![])
    }

    #[test]
    fn binop_instruction_leaves_stack_empty() {
        let mut module = IrModule::new();
        let f = module.get_or_create_function(0x1000);
        let entry = module
            .function_mut(f)
            .create_open_block(0x1000, "entry".into());
        let exit = module
            .function_mut(f)
            .create_open_block(0x1008, "exit".into());
        let mut builder = IrBuilder::new(&mut module, f);
        builder.set_insertion_block(entry);

        let tables = binop_tables();
        let inst = DecodedInstruction::new(0x1000, 4, 0, "add")
            .with_operands(vec![McOperand::Reg(5), McOperand::Reg(6)]);
        let mut rsi = NoopRsi;
        let mut hooks = NoopHooks;
        let policy = TranslationPolicy::new();
        translate_inst(&mut builder, &tables, &mut rsi, &mut hooks, &inst, exit, &policy).unwrap();
    }

    #[test]
    fn unknown_instruction_is_reported() {
        let mut module = IrModule::new();
        let f = module.get_or_create_function(0x1000);
        let entry = module
            .function_mut(f)
            .create_open_block(0x1000, "entry".into());
        let exit = module
            .function_mut(f)
            .create_open_block(0x1008, "exit".into());
        let mut builder = IrBuilder::new(&mut module, f);
        builder.set_insertion_block(entry);

        let tables = SemanticTables::new(vec![crate::tape::NO_SEMANTICS], vec![], vec![]);
        let inst = DecodedInstruction::new(0x1000, 4, 0, "???");
        let mut rsi = NoopRsi;
        let mut hooks = NoopHooks;
        let policy = TranslationPolicy::new();
        let err = translate_inst(&mut builder, &tables, &mut rsi, &mut hooks, &inst, exit, &policy).unwrap_err();
        assert!(matches!(err, TranslationError::UnknownInstruction { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn direct_branch_resolves_target_block_without_translate_at() {
        let mut module = IrModule::new();
        let f = module.get_or_create_function(0x1000);
        let entry = module
            .function_mut(f)
            .create_open_block(0x1000, "entry".into());
        let exit = module
            .function_mut(f)
            .create_open_block(0x2000, "exit".into());
        let mut builder = IrBuilder::new(&mut module, f);
        builder.set_insertion_block(entry);

        let opcode_to_sema_idx = vec![0];
        let semantics_array = vec![
            BuiltinOp::Br.to_u32(),
            EvtTag::I64 as u32,
            PseudoOp::EndOfInstruction.to_u32(),
        ];
        let tables = SemanticTables::new(opcode_to_sema_idx, semantics_array, vec![]);
        let inst = DecodedInstruction::new(0x1000, 4, 0, "b")
            .with_operands(vec![McOperand::Imm(0x1004)]);
        let mut rsi = NoopRsi;
        let mut hooks = NoopHooks;
        let policy = TranslationPolicy::new();
        translate_inst(&mut builder, &tables, &mut rsi, &mut hooks, &inst, exit, &policy).unwrap();

        let func = module.function(f);
        assert_eq!(func.block_count(), 3); // entry, exit, newly created target
        assert!(func.find_block(0x1004).is_some());
        let entry_block = func.block(entry);
        assert!(entry_block.has_terminator());
    }

    #[test]
    fn indirect_branch_emits_translate_at_then_br_exit() {
        let mut module = IrModule::new();
        let f = module.get_or_create_function(0x1000);
        let entry = module
            .function_mut(f)
            .create_open_block(0x1000, "entry".into());
        let exit = module
            .function_mut(f)
            .create_open_block(0x2000, "exit".into());
        let mut builder = IrBuilder::new(&mut module, f);
        builder.set_insertion_block(entry);

        let opcode_to_sema_idx = vec![0];
        let semantics_array = vec![
            PseudoOp::GetReg.to_u32(),
            EvtTag::I64 as u32,
            0,
            BuiltinOp::BrInd.to_u32(),
            EvtTag::I64 as u32,
            PseudoOp::EndOfInstruction.to_u32(),
        ];
        let tables = SemanticTables::new(opcode_to_sema_idx, semantics_array, vec![]);
        let inst = DecodedInstruction::new(0x1000, 4, 0, "br.ind");
        let mut rsi = NoopRsi;
        let mut hooks = NoopHooks;
        let policy = TranslationPolicy::new();
        translate_inst(&mut builder, &tables, &mut rsi, &mut hooks, &inst, exit, &policy).unwrap();

        let func = module.function(f);
        let entry_block = func.block(entry);
        // The PC-advance (spec §4.2 step 5) prepends an `Add` ahead of the
        // branch's own two instructions.
        assert_eq!(entry_block.len(), 3);
        let first = func.value(entry_block.insts[0]);
        match &first.kind {
            crate::ir::ValueKind::Inst { op, .. } => assert_eq!(*op, IrOp::Add),
            _ => panic!("expected Add from the PC advance"),
        }
        let second = func.value(entry_block.insts[1]);
        match &second.kind {
            crate::ir::ValueKind::Inst { op, .. } => assert_eq!(*op, IrOp::TranslateAt),
            _ => panic!("expected TranslateAt"),
        }
        let third = func.value(entry_block.insts[2]);
        match &third.kind {
            crate::ir::ValueKind::Inst { op, target_block, .. } => {
                assert_eq!(*op, IrOp::Br);
                assert_eq!(*target_block, Some(exit));
            }
            _ => panic!("expected Br"),
        }
        assert_eq!(entry_block.state, BlockState::Finalized);
    }

    #[test]
    fn bad_atomic_constant_is_fatal_even_with_known_opcode() {
        let mut module = IrModule::new();
        let f = module.get_or_create_function(0x1000);
        let entry = module
            .function_mut(f)
            .create_open_block(0x1000, "entry".into());
        let exit = module
            .function_mut(f)
            .create_open_block(0x2000, "exit".into());
        let mut builder = IrBuilder::new(&mut module, f);
        builder.set_insertion_block(entry);

        let opcode_to_sema_idx = vec![0];
        let semantics_array = vec![
            PseudoOp::ConstantOp.to_u32(),
            EvtTag::I64 as u32,
            0,
            PseudoOp::ConstantOp.to_u32(),
            EvtTag::I64 as u32,
            1,
            BuiltinOp::AtomicFence.to_u32(),
            EvtTag::I64 as u32,
            PseudoOp::EndOfInstruction.to_u32(),
        ];
        let tables = SemanticTables::new(opcode_to_sema_idx, semantics_array, vec![]);
        let inst = DecodedInstruction::new(0x1000, 4, 0, "fence").with_operands(vec![
            McOperand::Imm(999), // invalid ordering
            McOperand::Imm(0),
        ]);
        let mut rsi = NoopRsi;
        let mut hooks = NoopHooks;
        let policy = TranslationPolicy::new();
        let err = translate_inst(&mut builder, &tables, &mut rsi, &mut hooks, &inst, exit, &policy).unwrap_err();
        assert!(matches!(err, TranslationError::InvalidAtomicOrdering { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn target_range_opcode_without_a_hook_is_unknown_opcode() {
        assert!(BUILTIN_OP_END < crate::opcode::DC_OPCODE_START);
        let mut module = IrModule::new();
        let f = module.get_or_create_function(0x1000);
        let entry = module
            .function_mut(f)
            .create_open_block(0x1000, "entry".into());
        let exit = module
            .function_mut(f)
            .create_open_block(0x2000, "exit".into());
        let mut builder = IrBuilder::new(&mut module, f);
        builder.set_insertion_block(entry);

        let opcode_to_sema_idx = vec![0];
        let semantics_array = vec![
            BUILTIN_OP_END + 1,
            EvtTag::I64 as u32,
            PseudoOp::EndOfInstruction.to_u32(),
        ];
        let tables = SemanticTables::new(opcode_to_sema_idx, semantics_array, vec![]);
        let inst = DecodedInstruction::new(0x1000, 4, 0, "vendor.op");
        let mut rsi = NoopRsi;
        let mut hooks = NoopHooks;
        let policy = TranslationPolicy::new();
        let err = translate_inst(&mut builder, &tables, &mut rsi, &mut hooks, &inst, exit, &policy).unwrap_err();
        assert!(matches!(err, TranslationError::UnknownOpcode { .. }));
    }
}
