//! Function Translator (FT, spec §4.3).
//!
//! Owns one MC function's translation end to end: constructing the entry
//! and exit blocks, walking each decoded MC basic block through the
//! [`crate::instruction_translator`], splitting calls into their own
//! `{call, br}` blocks, and post-processing those call blocks with
//! RSI-provided register save/restore code once the function's control
//! flow is otherwise complete.

use tracing::{trace, warn, info_span};

use crate::block_manager::BlockManager;
use crate::error::Result;
use crate::instruction::{DecodedInstruction, McBasicBlock, McFunction, McOperand};
use crate::instruction_translator::translate_inst;
use crate::ir::{BlockId, DebugSink, Evt, FunctionId, IrBuilder, IrModule, ValueId};
use crate::policy::TranslationPolicy;
use crate::register_semantics::RegisterSemantics;
use crate::tape::SemanticTables;
use crate::target_hooks::TargetHooks;

pub struct FunctionTranslator<'p> {
    policy: &'p TranslationPolicy,
}

impl<'p> FunctionTranslator<'p> {
    pub fn new(policy: &'p TranslationPolicy) -> Self {
        Self { policy }
    }

    /// Translate one decoded MC function, returning the IR function it was
    /// built into.
    pub fn translate(
        &self,
        module: &mut IrModule,
        tables: &SemanticTables,
        rsi: &mut dyn RegisterSemantics,
        hooks: &mut dyn TargetHooks,
        mc_func: &McFunction,
    ) -> Result<FunctionId> {
        let span = info_span!("translate_function", address = format_args!("{:#x}", mc_func.start_addr));
        let _enter = span.enter();

        let func_id = module.get_or_create_function(mc_func.start_addr);
        let hex = mc_func.start_addr;
        let entry_block = module
            .function_mut(func_id)
            .create_open_block(mc_func.start_addr, format!("entry_fn_{hex:x}"));
        let exit_block = module
            .function_mut(func_id)
            .create_open_block(mc_func.start_addr, format!("exit_fn_{hex:x}"));

        let mut builder = IrBuilder::new(module, func_id);

        builder.set_insertion_block(entry_block);
        if self.policy.enable_inst_addr_save {
            let addr = builder.const_int(Evt::I64, mc_func.start_addr);
            builder.store_debug_sink(DebugSink::CurrentFn, addr);
        }

        // Spec §4.3 Construction: when regset diffing is on, snapshot the
        // incoming regset into a save buffer in the entry block, to be
        // compared against its live state at every return path.
        let diff_exit = if self.policy.enable_regset_diff {
            let regset_ty = rsi.get_reg_set_type();
            let live = builder.func().param;
            let snapshot = builder.load(live, regset_ty);
            let save_buf = builder.alloca();
            builder.store(save_buf, snapshot);

            let diff_exit = builder
                .module_mut()
                .function_mut(func_id)
                .create_open_block(mc_func.start_addr, format!("diff_exit_fn_{hex:x}"));
            builder.set_insertion_block(diff_exit);
            let diff_fn = rsi.get_or_create_regset_diff_function(&mut builder);
            let diff_target = builder.function_addr(diff_fn.0 as u64);
            let func_addr = builder.function_addr(mc_func.start_addr);
            builder.call_with_args(diff_target, vec![func_addr, save_buf, live]);
            builder.ret_void();

            builder.set_insertion_block(entry_block);
            Some(diff_exit)
        } else {
            None
        };

        let start_block = get_or_create_block(&mut builder, mc_func.start_addr);
        builder.br(start_block);

        let mut call_sites: Vec<(BlockId, usize)> = Vec::new();

        for mc_block in &mc_func.basic_blocks {
            self.translate_block(
                &mut builder,
                tables,
                rsi,
                hooks,
                mc_block,
                exit_block,
                &mut call_sites,
            )?;
        }

        self.finalize_exit(&mut builder, exit_block, diff_exit);

        // Post-processing (spec §4.3): now that every call block's shape
        // is fixed, splice save/restore around each one. Indices are
        // adjusted for however many instructions the save pass inserted,
        // so restore always lands immediately after the call.
        for (block, call_idx) in call_sites {
            let inserted = rsi.save_all_local_regs(&mut builder, block, call_idx);
            rsi.restore_local_regs(&mut builder, block, call_idx + inserted + 1);
        }

        rsi.finalize_function(&mut builder, exit_block);
        Ok(func_id)
    }

    #[allow(clippy::too_many_arguments)]
    fn translate_block(
        &self,
        builder: &mut IrBuilder<'_>,
        tables: &SemanticTables,
        rsi: &mut dyn RegisterSemantics,
        hooks: &mut dyn TargetHooks,
        mc_block: &McBasicBlock,
        exit_block: BlockId,
        call_sites: &mut Vec<(BlockId, usize)>,
    ) -> Result<()> {
        let span = info_span!("translate_block", address = format_args!("{:#x}", mc_block.start));
        let _enter = span.enter();

        let block_id = {
            let func_id = builder.func_id();
            let func = builder.module_mut().function_mut(func_id);
            let id = BlockManager::get_or_create(func, mc_block.start);
            func.prepare_for_insertion(id)?;
            id
        };
        builder.set_insertion_block(block_id);
        rsi.switch_to_bb(builder, block_id);
        if self.policy.enable_inst_addr_save {
            let addr = builder.const_int(Evt::I64, mc_block.start);
            builder.store_debug_sink(DebugSink::CurrentBb, addr);
        }
        trace!(address = format_args!("{:#x}", mc_block.start), "switched to basic block");

        for inst in &mc_block.instructions {
            if inst.is_call {
                self.translate_call(builder, rsi, inst, mc_block, exit_block, call_sites);
                // A call ends its MC block by construction (spec §4.3):
                // nothing in this block can follow it.
                rsi.finalize_bb(builder, block_id);
                return Ok(());
            }

            match translate_inst(builder, tables, rsi, hooks, inst, exit_block, self.policy) {
                Ok(()) => {}
                Err(err) if err.is_recoverable() && self.policy.translate_unknown_to_undef => {
                    warn!(
                        address = format_args!("{:#x}", inst.address),
                        mnemonic = %inst.mnemonic,
                        error = %err,
                        "recovering unknown instruction as undefined block"
                    );
                    let func_id = builder.func_id();
                    let func = builder.module_mut().function_mut(func_id);
                    func.reset_to_undef(block_id);
                    rsi.finalize_bb(builder, block_id);
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }

        // No explicit terminator emitted: fall through to the next block.
        if !builder.module().function(builder.func_id()).block(block_id).has_terminator() {
            let next = get_or_create_block(builder, mc_block.end);
            builder.br(next);
        }
        rsi.finalize_bb(builder, block_id);
        Ok(())
    }

    fn translate_call(
        &self,
        builder: &mut IrBuilder<'_>,
        rsi: &mut dyn RegisterSemantics,
        inst: &DecodedInstruction,
        mc_block: &McBasicBlock,
        exit_block: BlockId,
        call_sites: &mut Vec<(BlockId, usize)>,
    ) {
        let regset = builder.func().param;
        let target = match inst.operand(0) {
            Some(McOperand::Imm(addr)) => builder.function_addr(*addr as u64),
            Some(McOperand::Reg(reg_no)) => {
                let guest_target = rsi.get_reg(builder, *reg_no);
                builder.translate_at(guest_target)
            }
            _ => unreachable!("call instruction at {:#x} has no target operand", inst.address),
        };
        let call_idx = builder.func().block(builder.current_block()).len();
        builder.call_direct(target, regset);
        call_sites.push((builder.current_block(), call_idx));

        if inst.is_tail_call {
            // Open question (spec §9, recorded in policy.rs): the
            // tail-call path intentionally bypasses the shared exit
            // block, and with it the regset-diff wrapper.
            builder.ret_void();
        } else {
            let continuation = get_or_create_block(builder, mc_block.end);
            builder.br(continuation);
        }
    }

    /// Finalize the shared exit block: either a plain `ret void`, or — when
    /// regset diffing is on — a branch into the entry-constructed
    /// `diff_exit` block that performs the diff call and returns (spec
    /// §4.3 Construction).
    fn finalize_exit(&self, builder: &mut IrBuilder<'_>, exit_block: BlockId, diff_exit: Option<BlockId>) {
        builder.set_insertion_block(exit_block);
        match diff_exit {
            Some(diff_exit) => builder.br(diff_exit),
            None => builder.ret_void(),
        }
    }

    /// External tail calls (spec §4.3): open the not-yet-translated
    /// placeholder block at `addr` — known by the embedder to be the
    /// entry of a function outside this translation unit reached by a
    /// tail jump rather than a call instruction — and replace it with a
    /// direct call followed immediately by `ret void`, bypassing the
    /// shared exit block and, with it, the regset-diff wrapper (spec §9
    /// open question).
    pub fn create_external_tail_call_bb(
        &self,
        builder: &mut IrBuilder<'_>,
        addr: u64,
    ) -> Result<BlockId> {
        let block_id = {
            let func_id = builder.func_id();
            let func = builder.module_mut().function_mut(func_id);
            let id = BlockManager::get_or_create(func, addr);
            func.prepare_for_insertion(id)?;
            id
        };
        builder.set_insertion_block(block_id);
        let regset = builder.func().param;
        let target = builder.function_addr(addr);
        builder.call_direct(target, regset);
        builder.ret_void();
        Ok(block_id)
    }
}

fn get_or_create_block(builder: &mut IrBuilder<'_>, address: u64) -> BlockId {
    let func_id = builder.func_id();
    let func = builder.module_mut().function_mut(func_id);
    BlockManager::get_or_create(func, address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BlockState, Evt, IrModule, ValueKind};
    use crate::opcode::{BuiltinOp, EvtTag, PseudoOp};

    struct FakeRsi {
        save_calls: Vec<(BlockId, usize)>,
        restore_calls: Vec<(BlockId, usize)>,
    }

    impl FakeRsi {
        fn new() -> Self {
            Self {
                save_calls: Vec::new(),
                restore_calls: Vec::new(),
            }
        }
    }

    impl RegisterSemantics for FakeRsi {
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
            builder: &mut IrBuilder<'_>,
        ) -> FunctionId {
            builder.module_mut().get_or_create_function(0xffff_0000)
        }
        fn save_all_local_regs(&mut self, builder: &mut IrBuilder<'_>, block: BlockId, before_idx: usize) -> usize {
            self.save_calls.push((block, before_idx));
            builder.insert_at(block, before_idx, Evt::I1, crate::ir::IrOp::Trap, vec![]);
            1
        }
        fn restore_local_regs(&mut self, _builder: &mut IrBuilder<'_>, block: BlockId, after_idx: usize) {
            self.restore_calls.push((block, after_idx));
        }
        fn reg_name(&self, _reg_no: u32) -> &str {
            "r?"
        }
    }

    struct NoopHooks;
    impl TargetHooks for NoopHooks {}

    fn add_reg_tables() -> SemanticTables {
        SemanticTables::new(
            vec![0],
            vec![
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
            ],
            vec![],
        )
    }

    #[test]
    fn straight_line_block_falls_through_to_next_address() {
        let mut module = IrModule::new();
        let policy = TranslationPolicy::new();
        let ft = FunctionTranslator::new(&policy);
        let tables = add_reg_tables();
        let mut rsi = FakeRsi::new();
        let mut hooks = NoopHooks;

        let inst = DecodedInstruction::new(0x1000, 4, 0, "add")
            .with_operands(vec![McOperand::Reg(5), McOperand::Reg(6)]);
        let block = McBasicBlock::new(0x1000, 0x1004, vec![inst]);
        let mc_func = McFunction::new(0x1000, vec![block]);

        let func_id = ft
            .translate(&mut module, &tables, &mut rsi, &mut hooks, &mc_func)
            .unwrap();

        let func = module.function(func_id);
        let entry = func.find_block(0x1000).unwrap();
        assert!(func.block(entry).has_terminator());
        assert!(func.find_block(0x1004).is_some());
    }

    #[test]
    fn call_instruction_produces_a_two_instruction_call_block() {
        let mut module = IrModule::new();
        let policy = TranslationPolicy::new();
        let ft = FunctionTranslator::new(&policy);
        let tables = add_reg_tables();
        let mut rsi = FakeRsi::new();
        let mut hooks = NoopHooks;

        let call_inst = DecodedInstruction::new(0x1000, 4, 0, "call")
            .with_operands(vec![McOperand::Imm(0x5000)])
            .with_call();
        let block = McBasicBlock::new(0x1000, 0x1004, vec![call_inst]);
        let mc_func = McFunction::new(0x1000, vec![block]);

        let func_id = ft
            .translate(&mut module, &tables, &mut rsi, &mut hooks, &mc_func)
            .unwrap();

        let func = module.function(func_id);
        let entry = func.find_block(0x1000).unwrap();
        // Before post-processing's save/restore splice the shape is
        // exactly {call, br}; the fake RSI above inserts one trap as its
        // "save", so after post-processing it is {trap, call, br}.
        assert_eq!(func.block(entry).len(), 3);
        let ops: Vec<_> = func
            .block(entry)
            .insts
            .iter()
            .map(|v| match &func.value(*v).kind {
                ValueKind::Inst { op, .. } => *op,
                _ => panic!("expected instruction value"),
            })
            .collect();
        assert_eq!(
            ops,
            vec![crate::ir::IrOp::Trap, crate::ir::IrOp::CallDirect, crate::ir::IrOp::Br]
        );
        assert_eq!(rsi.save_calls, vec![(entry, 0)]);
        assert_eq!(rsi.restore_calls, vec![(entry, 2)]);
    }

    #[test]
    fn unknown_instruction_recovers_to_trap_unreachable_under_policy() {
        let mut module = IrModule::new();
        let policy = TranslationPolicy::new().with_undef_on_unknown(true);
        let ft = FunctionTranslator::new(&policy);
        let tables = SemanticTables::new(vec![crate::tape::NO_SEMANTICS], vec![], vec![]);
        let mut rsi = FakeRsi::new();
        let mut hooks = NoopHooks;

        let inst = DecodedInstruction::new(0x1000, 4, 0, "???");
        let block = McBasicBlock::new(0x1000, 0x1004, vec![inst]);
        let mc_func = McFunction::new(0x1000, vec![block]);

        let func_id = ft
            .translate(&mut module, &tables, &mut rsi, &mut hooks, &mc_func)
            .unwrap();

        let func = module.function(func_id);
        let entry = func.find_block(0x1000).unwrap();
        assert_eq!(func.block(entry).len(), 2);
        assert_eq!(func.block(entry).state, BlockState::Finalized);
    }

    #[test]
    fn regset_diff_wraps_the_shared_exit_block() {
        let mut module = IrModule::new();
        let policy = TranslationPolicy::new().with_regset_diff(true);
        let ft = FunctionTranslator::new(&policy);
        let tables = add_reg_tables();
        let mut rsi = FakeRsi::new();
        let mut hooks = NoopHooks;

        let inst = DecodedInstruction::new(0x1000, 4, 0, "add")
            .with_operands(vec![McOperand::Reg(5), McOperand::Reg(6)]);
        let block = McBasicBlock::new(0x1000, 0x1004, vec![inst]);
        let mc_func = McFunction::new(0x1000, vec![block]);

        let func_id = ft
            .translate(&mut module, &tables, &mut rsi, &mut hooks, &mc_func)
            .unwrap();

        let func = module.function(func_id);
        // Construction order (spec §4.3) is entry, exit, diff_exit, then
        // the real first MC block — so with regset diffing on, the diff
        // block is always the third block created; its last instruction
        // must be Ret and the one before it CallDirect. The shared exit
        // block itself now holds nothing but the Br into this block.
        let diff_exit_id = BlockId(2);
        let insts = &func.block(diff_exit_id).insts;
        let last_two: Vec<_> = insts
            .iter()
            .rev()
            .take(2)
            .map(|v| match &func.value(*v).kind {
                ValueKind::Inst { op, .. } => *op,
                _ => panic!("expected instruction"),
            })
            .collect();
        assert_eq!(last_two, vec![crate::ir::IrOp::Ret, crate::ir::IrOp::CallDirect]);

        let exit_id = BlockId(1);
        let exit_ops: Vec<_> = func
            .block(exit_id)
            .insts
            .iter()
            .map(|v| match &func.value(*v).kind {
                ValueKind::Inst { op, .. } => *op,
                _ => panic!("expected instruction"),
            })
            .collect();
        assert_eq!(exit_ops, vec![crate::ir::IrOp::Br]);
    }

    #[test]
    fn tail_call_skips_shared_exit_and_its_diff_call() {
        let mut module = IrModule::new();
        let policy = TranslationPolicy::new().with_regset_diff(true);
        let ft = FunctionTranslator::new(&policy);
        let tables = add_reg_tables();
        let mut rsi = FakeRsi::new();
        let mut hooks = NoopHooks;

        let call_inst = DecodedInstruction::new(0x1000, 4, 0, "tailcall")
            .with_operands(vec![McOperand::Imm(0x9000)])
            .with_tail_call();
        let block = McBasicBlock::new(0x1000, 0x1004, vec![call_inst]);
        let mc_func = McFunction::new(0x1000, vec![block]);

        let func_id = ft
            .translate(&mut module, &tables, &mut rsi, &mut hooks, &mc_func)
            .unwrap();

        let func = module.function(func_id);
        let entry = func.find_block(0x1000).unwrap();
        let ops: Vec<_> = func
            .block(entry)
            .insts
            .iter()
            .map(|v| match &func.value(*v).kind {
                ValueKind::Inst { op, .. } => *op,
                _ => panic!("expected instruction"),
            })
            .collect();
        // {save-trap, call, ret} — never reaches the diffed exit block.
        assert_eq!(
            ops,
            vec![crate::ir::IrOp::Trap, crate::ir::IrOp::CallDirect, crate::ir::IrOp::Ret]
        );
    }
}
