//! Minimal typed, SSA-form IR and a thin builder facade over it (IRB,
//! spec §4 "IR Builder Facade").
//!
//! This is deliberately small: it exists so the translation engine has
//! something concrete to emit into and so its invariants (spec §8) are
//! checkable without a real downstream compiler. A real embedder swaps
//! this module out for bindings to its own IR (LLVM, Cranelift, a custom
//! SSA form) while keeping the same [`IrBuilder`] surface the rest of the
//! crate calls through.

use std::collections::HashMap;

/// A value type tag read off the semantic tape (spec §4.1 `NextVT`).
///
/// `IPtr` is the unresolved `iPTR` tag; [`Evt::resolve_iptr`] turns it
/// into a concrete integer type. Per spec §9 open questions this is
/// hard-coded to 64 bits rather than consulting a real data layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Evt {
    I1,
    I8,
    I16,
    I32,
    I64,
    I128,
    F32,
    F64,
    Ptr,
    IPtr,
    Vector { elem: Box<Evt>, lanes: u32 },
}

impl Evt {
    pub fn vector(elem: Evt, lanes: u32) -> Evt {
        Evt::Vector {
            elem: Box::new(elem),
            lanes,
        }
    }

    /// Resolve the `iPTR` placeholder to a concrete pointer-sized integer.
    /// Spec §9: hard-coded to 64 bits, should consult the data layout.
    pub fn resolve_iptr(self) -> Evt {
        match self {
            Evt::IPtr => Evt::I64,
            Evt::Vector { elem, lanes } => Evt::Vector {
                elem: Box::new(elem.resolve_iptr()),
                lanes,
            },
            other => other,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Evt::I1 | Evt::I8 | Evt::I16 | Evt::I32 | Evt::I64 | Evt::I128
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Evt::F32 | Evt::F64)
    }

    /// Bit width of a scalar (non-vector, resolved) type.
    pub fn bit_width(&self) -> u32 {
        match self {
            Evt::I1 => 1,
            Evt::I8 => 8,
            Evt::I16 => 16,
            Evt::I32 => 32,
            Evt::I64 => 64,
            Evt::I128 => 128,
            Evt::F32 => 32,
            Evt::F64 => 64,
            Evt::Ptr => 64,
            Evt::IPtr => panic!("bit_width of unresolved iPTR; call resolve_iptr first"),
            Evt::Vector { elem, lanes } => elem.bit_width() * lanes,
        }
    }

    /// The same-bit-width integer type (used for bitcasts before writing
    /// a value into a register, spec §4.2 "width/type coercion rules").
    pub fn same_width_int(&self) -> Evt {
        match self.bit_width() {
            1 => Evt::I1,
            8 => Evt::I8,
            16 => Evt::I16,
            32 => Evt::I32,
            64 => Evt::I64,
            128 => Evt::I128,
            other => panic!("no standard integer type of width {other}"),
        }
    }
}

macro_rules! index_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);
    };
}

index_type!(ValueId);
index_type!(BlockId);
index_type!(FunctionId);

/// Standard IR-level opcodes the translation engine emits (spec §3: "a
/// standard IR-level opcode... drawn from a shared enum"), plus the
/// control-flow and call forms needed to finish a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrOp {
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
    Trunc,
    ZExt,
    SExt,
    BitCast,
    FpToUi,
    FpToSi,
    UiToFp,
    SiToFp,
    FpTrunc,
    FpExt,
    IntToPtr,
    PtrToInt,
    ICmpEq,
    Select,
    FSqrt,
    BSwap,
    InsertVectorElt,
    ExtractVectorElt,
    Load,
    Store,
    Br,
    Unreachable,
    Ret,
    CallDirect,
    CallIndirect,
    TranslateAt,
    Trap,
    AtomicFence,
    /// Volatile store of a pointer-sized value to one of the three
    /// process-wide debug symbols (spec §6 "Special runtime symbols").
    VolatileStore,
    /// Stack-allocate a slot the size of the regset-diff save buffer
    /// (spec §4.3 Construction, entry-block regset snapshot).
    Alloca,
}

impl IrOp {
    pub fn is_terminator(self) -> bool {
        matches!(self, IrOp::Br | IrOp::Unreachable | IrOp::Ret)
    }
}

/// One of the three exported, untyped pointer-sized globals a generated
/// function may volatile-store into when
/// [`crate::policy::TranslationPolicy::enable_inst_addr_save`] is on (spec
/// §6). These are a debugging aid only, never a correctness channel (spec
/// §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSink {
    CurrentFn,
    CurrentBb,
    CurrentInstr,
}

#[derive(Debug, Clone)]
pub enum ValueKind {
    Param,
    ConstInt(u64),
    ConstVector(Vec<u64>),
    /// A compile-time-known function address, used as a `CallDirect` target.
    FunctionAddr(u64),
    Inst {
        op: IrOp,
        operands: Vec<ValueId>,
        /// Branch target, set only for `Br`.
        target_block: Option<BlockId>,
        /// Destination symbol, set only for `VolatileStore`.
        debug_sink: Option<DebugSink>,
    },
}

#[derive(Debug, Clone)]
pub struct ValueData {
    pub ty: Evt,
    pub kind: ValueKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Placeholder,
    Open,
    Finalized,
}

#[derive(Debug, Clone)]
pub struct BasicBlockData {
    pub address: u64,
    pub name: String,
    pub insts: Vec<ValueId>,
    pub state: BlockState,
}

impl BasicBlockData {
    /// The block's instruction values, as `(op, operands)` pairs, useful
    /// for the §8 shape assertions without exposing the full arena.
    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    pub fn has_terminator(&self) -> bool {
        self.state == BlockState::Finalized
    }
}

pub struct IrFunction {
    pub address: u64,
    pub param: ValueId,
    values: Vec<ValueData>,
    blocks: Vec<BasicBlockData>,
    addr_to_block: HashMap<u64, BlockId>,
}

impl IrFunction {
    fn new(address: u64) -> Self {
        let mut values = Vec::new();
        values.push(ValueData {
            ty: Evt::Ptr,
            kind: ValueKind::Param,
        });
        Self {
            address,
            param: ValueId(0),
            values,
            blocks: Vec::new(),
            addr_to_block: HashMap::new(),
        }
    }

    fn push_value(&mut self, ty: Evt, kind: ValueKind) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(ValueData { ty, kind });
        id
    }

    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id.0 as usize]
    }

    pub fn value_type(&self, id: ValueId) -> Evt {
        self.value(id).ty.clone()
    }

    pub fn block(&self, id: BlockId) -> &BasicBlockData {
        &self.blocks[id.0 as usize]
    }

    fn block_mut(&mut self, id: BlockId) -> &mut BasicBlockData {
        &mut self.blocks[id.0 as usize]
    }

    pub fn find_block(&self, address: u64) -> Option<BlockId> {
        self.addr_to_block.get(&address).copied()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Create a placeholder block at `address` (spec §4.4 BBM.get_or_create):
    /// body is `trap(); unreachable` — exactly two instructions.
    pub fn create_placeholder_block(&mut self, address: u64, name: String) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlockData {
            address,
            name,
            insts: Vec::new(),
            state: BlockState::Placeholder,
        });
        self.addr_to_block.insert(address, id);
        let trap = self.push_value(Evt::I1, ValueKind::Inst {
            op: IrOp::Trap,
            operands: vec![],
            target_block: None,
            debug_sink: None,
        });
        let unreachable = self.push_value(Evt::I1, ValueKind::Inst {
            op: IrOp::Unreachable,
            operands: vec![],
            target_block: None,
            debug_sink: None,
        });
        let block = self.block_mut(id);
        block.insts.push(trap);
        block.insts.push(unreachable);
        block.state = BlockState::Placeholder;
        id
    }

    /// Create a fresh, already-open, empty block (for call/successor blocks
    /// that are never a placeholder).
    pub fn create_open_block(&mut self, address: u64, name: String) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlockData {
            address,
            name,
            insts: Vec::new(),
            state: BlockState::Open,
        });
        id
    }

    /// Discard whatever has been built into `id` so far and replace it
    /// with `{trap(); unreachable()}`, finalized. Used to recover from an
    /// unknown instruction/opcode/predicate/pattern under
    /// [`crate::policy::TranslationPolicy::translate_unknown_to_undef`]
    /// (spec §7 kinds 1-3).
    pub fn reset_to_undef(&mut self, id: BlockId) {
        let trap = self.push_value(
            Evt::I1,
            ValueKind::Inst {
                op: IrOp::Trap,
                operands: vec![],
                target_block: None,
                debug_sink: None,
            },
        );
        let unreachable = self.push_value(
            Evt::I1,
            ValueKind::Inst {
                op: IrOp::Unreachable,
                operands: vec![],
                target_block: None,
                debug_sink: None,
            },
        );
        let block = self.block_mut(id);
        block.insts.clear();
        block.insts.push(trap);
        block.insts.push(unreachable);
        block.state = BlockState::Finalized;
    }

    /// Erase a placeholder's `{trap, unreachable}` body and mark it open
    /// for insertion (spec §4.3 `prepare_for_insertion`).
    pub fn prepare_for_insertion(&mut self, id: BlockId) -> crate::error::Result<()> {
        let block = self.block_mut(id);
        if block.state != BlockState::Placeholder {
            return Err(crate::error::TranslationError::AssertionViolation(format!(
                "block {} opened twice (state {:?})",
                block.name, block.state
            )));
        }
        if block.insts.len() != 2 {
            return Err(crate::error::TranslationError::AssertionViolation(format!(
                "placeholder block {} had {} instructions, expected 2",
                block.name,
                block.insts.len()
            )));
        }
        block.insts.clear();
        block.state = BlockState::Open;
        Ok(())
    }
}

pub struct IrModule {
    functions: Vec<IrFunction>,
    addr_to_function: HashMap<u64, FunctionId>,
}

impl Default for IrModule {
    fn default() -> Self {
        Self::new()
    }
}

impl IrModule {
    pub fn new() -> Self {
        Self {
            functions: Vec::new(),
            addr_to_function: HashMap::new(),
        }
    }

    pub fn function(&self, id: FunctionId) -> &IrFunction {
        &self.functions[id.0 as usize]
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut IrFunction {
        &mut self.functions[id.0 as usize]
    }

    pub fn find_function(&self, address: u64) -> Option<FunctionId> {
        self.addr_to_function.get(&address).copied()
    }

    /// Look up or create (as an empty, untranslated) IR function at
    /// `address` (spec §4.3 Construction).
    pub fn get_or_create_function(&mut self, address: u64) -> FunctionId {
        if let Some(id) = self.find_function(address) {
            return id;
        }
        let id = FunctionId(self.functions.len() as u32);
        self.functions.push(IrFunction::new(address));
        self.addr_to_function.insert(address, id);
        id
    }
}

/// The thin typed builder the translation engine emits through (IRB).
pub struct IrBuilder<'m> {
    module: &'m mut IrModule,
    func: FunctionId,
    block: Option<BlockId>,
}

impl<'m> IrBuilder<'m> {
    pub fn new(module: &'m mut IrModule, func: FunctionId) -> Self {
        Self {
            module,
            func,
            block: None,
        }
    }

    pub fn module(&self) -> &IrModule {
        self.module
    }

    pub fn module_mut(&mut self) -> &mut IrModule {
        self.module
    }

    pub fn func_id(&self) -> FunctionId {
        self.func
    }

    pub fn func(&self) -> &IrFunction {
        self.module.function(self.func)
    }

    fn func_mut(&mut self) -> &mut IrFunction {
        self.module.function_mut(self.func)
    }

    pub fn set_insertion_block(&mut self, block: BlockId) {
        self.block = Some(block);
    }

    /// Insert an instruction at a specific position within `block`,
    /// regardless of whether the block is already finalized. Used by RSI
    /// implementations for call-block post-processing (spec §4.3), which
    /// splices register save/restore code around an already-built
    /// `{call, br}` block.
    pub fn insert_at(
        &mut self,
        block: BlockId,
        idx: usize,
        ty: Evt,
        op: IrOp,
        operands: Vec<ValueId>,
    ) -> ValueId {
        let f = self.func_mut();
        let id = f.push_value(
            ty,
            ValueKind::Inst {
                op,
                operands,
                target_block: None,
                debug_sink: None,
            },
        );
        f.block_mut(block).insts.insert(idx, id);
        id
    }

    pub fn current_block(&self) -> BlockId {
        self.block.expect("insertion point not set")
    }

    pub fn value_type(&self, id: ValueId) -> Evt {
        self.func().value_type(id)
    }

    fn append(&mut self, ty: Evt, op: IrOp, operands: Vec<ValueId>) -> ValueId {
        self.append_full(ty, op, operands, None, None)
    }

    fn append_with_target(
        &mut self,
        ty: Evt,
        op: IrOp,
        operands: Vec<ValueId>,
        target_block: Option<BlockId>,
    ) -> ValueId {
        self.append_full(ty, op, operands, target_block, None)
    }

    fn append_full(
        &mut self,
        ty: Evt,
        op: IrOp,
        operands: Vec<ValueId>,
        target_block: Option<BlockId>,
        debug_sink: Option<DebugSink>,
    ) -> ValueId {
        let block_id = self.current_block();
        let terminator = op.is_terminator();
        let f = self.func_mut();
        let id = f.push_value(
            ty,
            ValueKind::Inst {
                op,
                operands,
                target_block,
                debug_sink,
            },
        );
        let block = f.block_mut(block_id);
        block.insts.push(id);
        if terminator {
            block.state = BlockState::Finalized;
        }
        id
    }

    // --- constants ---

    pub fn const_int(&mut self, ty: Evt, value: u64) -> ValueId {
        self.func_mut().push_value(ty, ValueKind::ConstInt(value))
    }

    pub fn const_vector(&mut self, elem_ty: Evt, lanes: &[u64]) -> ValueId {
        let ty = Evt::vector(elem_ty, lanes.len() as u32);
        self.func_mut()
            .push_value(ty, ValueKind::ConstVector(lanes.to_vec()))
    }

    pub fn function_addr(&mut self, address: u64) -> ValueId {
        self.func_mut()
            .push_value(Evt::Ptr, ValueKind::FunctionAddr(address))
    }

    // --- binary / cast / compare ---

    pub fn binop(&mut self, op: IrOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        let ty = self.value_type(lhs);
        self.append(ty, op, vec![lhs, rhs])
    }

    /// A binary op whose result type is the tape's explicit `ResEVT`
    /// rather than inferred from an operand (spec §4.2 opcode dispatch).
    pub fn binop_typed(&mut self, op: IrOp, lhs: ValueId, rhs: ValueId, ty: Evt) -> ValueId {
        self.append(ty, op, vec![lhs, rhs])
    }

    pub fn cast(&mut self, op: IrOp, value: ValueId, to_ty: Evt) -> ValueId {
        self.append(to_ty, op, vec![value])
    }

    pub fn icmp_eq(&mut self, lhs: ValueId, rhs: ValueId, result_ty: Evt) -> ValueId {
        self.append(result_ty, IrOp::ICmpEq, vec![lhs, rhs])
    }

    pub fn select(&mut self, cond: ValueId, if_true: ValueId, if_false: ValueId) -> ValueId {
        let ty = self.value_type(if_true);
        self.append(ty, IrOp::Select, vec![cond, if_true, if_false])
    }

    pub fn intrinsic(&mut self, op: IrOp, args: Vec<ValueId>, ty: Evt) -> ValueId {
        self.append(ty, op, args)
    }

    pub fn insert_vector_elt(&mut self, vec: ValueId, elt: ValueId, idx: ValueId) -> ValueId {
        let ty = self.value_type(vec);
        self.append(ty, IrOp::InsertVectorElt, vec![vec, elt, idx])
    }

    pub fn extract_vector_elt(&mut self, vec: ValueId, idx: ValueId, elem_ty: Evt) -> ValueId {
        self.append(elem_ty, IrOp::ExtractVectorElt, vec![vec, idx])
    }

    // --- memory ---

    pub fn load(&mut self, ptr: ValueId, ty: Evt) -> ValueId {
        self.append(ty, IrOp::Load, vec![ptr])
    }

    pub fn store(&mut self, ptr: ValueId, value: ValueId) {
        self.append(Evt::I1, IrOp::Store, vec![ptr, value]);
    }

    /// Volatile-store `value` into one of the three process-wide debug
    /// symbols (spec §6, gated on
    /// [`crate::policy::TranslationPolicy::enable_inst_addr_save`]).
    pub fn store_debug_sink(&mut self, sink: DebugSink, value: ValueId) {
        self.append_full(Evt::I1, IrOp::VolatileStore, vec![value], None, Some(sink));
    }

    // --- control flow ---

    pub fn br(&mut self, target: BlockId) {
        self.append_with_target(Evt::I1, IrOp::Br, vec![], Some(target));
    }

    pub fn unreachable(&mut self) {
        self.append(Evt::I1, IrOp::Unreachable, vec![]);
    }

    pub fn ret_void(&mut self) {
        self.append(Evt::I1, IrOp::Ret, vec![]);
    }

    pub fn trap(&mut self) {
        self.append(Evt::I1, IrOp::Trap, vec![]);
    }

    pub fn atomic_fence(&mut self, ordering: ValueId, scope: ValueId) {
        self.append(Evt::I1, IrOp::AtomicFence, vec![ordering, scope]);
    }

    /// `call translate_at(addr) -> i8*`, the runtime resolver for indirect
    /// transfers (spec §4.3, §6).
    pub fn translate_at(&mut self, addr: ValueId) -> ValueId {
        self.append(Evt::Ptr, IrOp::TranslateAt, vec![addr])
    }

    /// Stack-allocate one pointer-sized slot, used as the regset-diff save
    /// buffer in the function's entry block (spec §4.3 Construction).
    pub fn alloca(&mut self) -> ValueId {
        self.append(Evt::Ptr, IrOp::Alloca, vec![])
    }

    /// A call to a fixed-arity diagnostic/runtime function, as opposed to
    /// the two-argument `(target, regset)` calling convention every
    /// translated function shares (spec §6 "Generated IR ABI").
    pub fn call_with_args(&mut self, target: ValueId, args: Vec<ValueId>) -> ValueId {
        let mut operands = vec![target];
        operands.extend(args);
        self.append(Evt::I1, IrOp::CallDirect, operands)
    }

    /// A call whose target is a compile-time-constant function address.
    pub fn call_direct(&mut self, target: ValueId, regset: ValueId) -> ValueId {
        self.append(Evt::I1, IrOp::CallDirect, vec![target, regset])
    }

    /// A call whose target is a runtime pointer (from `translate_at`).
    pub fn call_indirect(&mut self, target_ptr: ValueId, regset: ValueId) -> ValueId {
        self.append(Evt::I1, IrOp::CallIndirect, vec![target_ptr, regset])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_block_has_exactly_trap_and_unreachable() {
        let mut module = IrModule::new();
        let f = module.get_or_create_function(0x1000);
        let func = module.function_mut(f);
        let bb = func.create_placeholder_block(0x1004, "bb_1004".into());
        assert_eq!(func.block(bb).len(), 2);
        assert_eq!(func.block(bb).state, BlockState::Placeholder);
    }

    #[test]
    fn prepare_for_insertion_clears_placeholder_body() {
        let mut module = IrModule::new();
        let f = module.get_or_create_function(0x1000);
        let bb = module
            .function_mut(f)
            .create_placeholder_block(0x1004, "bb_1004".into());
        module.function_mut(f).prepare_for_insertion(bb).unwrap();
        let func = module.function(f);
        assert!(func.block(bb).is_empty());
        assert_eq!(func.block(bb).state, BlockState::Open);
    }

    #[test]
    fn prepare_for_insertion_twice_is_an_assertion_violation() {
        let mut module = IrModule::new();
        let f = module.get_or_create_function(0x1000);
        let bb = module
            .function_mut(f)
            .create_placeholder_block(0x1004, "bb_1004".into());
        module.function_mut(f).prepare_for_insertion(bb).unwrap();
        let err = module.function_mut(f).prepare_for_insertion(bb).unwrap_err();
        assert!(matches!(err, crate::error::TranslationError::AssertionViolation(_)));
    }

    #[test]
    fn get_or_create_function_is_idempotent() {
        let mut module = IrModule::new();
        let a = module.get_or_create_function(0x2000);
        let b = module.get_or_create_function(0x2000);
        assert_eq!(a, b);
    }
}
