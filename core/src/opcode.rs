//! The semantic-opcode vocabulary read off the tape (spec §3).
//!
//! A semantic opcode is a tagged variant over three disjoint numeric
//! ranges: standard ("builtin") IR-level opcodes below `BUILTIN_OP_END`,
//! target-range opcodes between `BUILTIN_OP_END` and `DC_OPCODE_START`,
//! and pseudo-opcodes at or above `DC_OPCODE_START` (spec §9 design
//! note: "tagged variant for semantic opcodes").
//!
//! [`BuiltinOp`] is the tape's own opcode set — distinct from
//! [`crate::ir::IrOp`], the actual emitted-IR instruction tag. Most
//! `BuiltinOp` variants map one-to-one onto an `IrOp` call; a few
//! (`Rotl`, `{S,U}mulLoHi`, `BrInd`) expand into several IR instructions
//! and so have no single `IrOp` counterpart.

/// End of the standard/builtin opcode range (exclusive).
pub const BUILTIN_OP_END: u32 = 64;

/// Start of the pseudo-opcode range (inclusive). Opcodes in
/// `[BUILTIN_OP_END, DC_OPCODE_START)` are target-range opcodes.
pub const DC_OPCODE_START: u32 = 128;

/// Standard IR-level opcodes, drawn from the shared enum spec §3 refers
/// to. Discriminants are stable tape encoding, not display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum BuiltinOp {
    Add = 0,
    Sub = 1,
    Mul = 2,
    UDiv = 3,
    SDiv = 4,
    URem = 5,
    SRem = 6,
    And = 7,
    Or = 8,
    Xor = 9,
    Shl = 10,
    LShr = 11,
    AShr = 12,
    FAdd = 13,
    FSub = 14,
    FMul = 15,
    FDiv = 16,
    FRem = 17,
    Trunc = 18,
    BitCast = 19,
    ZExt = 20,
    SExt = 21,
    FpToUi = 22,
    FpToSi = 23,
    UiToFp = 24,
    SiToFp = 25,
    FpTrunc = 26,
    FpExt = 27,
    Rotl = 28,
    InsertVectorElt = 29,
    ExtractVectorElt = 30,
    SmulLoHi = 31,
    UmulLoHi = 32,
    Load = 33,
    Store = 34,
    Br = 35,
    BrInd = 36,
    Trap = 37,
    AtomicFence = 38,
    FSqrt = 39,
    BSwap = 40,
}

impl BuiltinOp {
    pub fn from_u32(token: u32) -> Option<Self> {
        use BuiltinOp::*;
        let op = match token {
            0 => Add,
            1 => Sub,
            2 => Mul,
            3 => UDiv,
            4 => SDiv,
            5 => URem,
            6 => SRem,
            7 => And,
            8 => Or,
            9 => Xor,
            10 => Shl,
            11 => LShr,
            12 => AShr,
            13 => FAdd,
            14 => FSub,
            15 => FMul,
            16 => FDiv,
            17 => FRem,
            18 => Trunc,
            19 => BitCast,
            20 => ZExt,
            21 => SExt,
            22 => FpToUi,
            23 => FpToSi,
            24 => UiToFp,
            25 => SiToFp,
            26 => FpTrunc,
            27 => FpExt,
            28 => Rotl,
            29 => InsertVectorElt,
            30 => ExtractVectorElt,
            31 => SmulLoHi,
            32 => UmulLoHi,
            33 => Load,
            34 => Store,
            35 => Br,
            36 => BrInd,
            37 => Trap,
            38 => AtomicFence,
            39 => FSqrt,
            40 => BSwap,
            _ => return None,
        };
        Some(op)
    }

    pub fn to_u32(self) -> u32 {
        self as u32
    }

    pub fn is_binary(self) -> bool {
        use BuiltinOp::*;
        matches!(
            self,
            Add | Sub
                | Mul
                | UDiv
                | SDiv
                | URem
                | SRem
                | And
                | Or
                | Xor
                | Shl
                | LShr
                | AShr
                | FAdd
                | FSub
                | FMul
                | FDiv
                | FRem
        )
    }

    pub fn is_shift(self) -> bool {
        matches!(self, BuiltinOp::Shl | BuiltinOp::LShr | BuiltinOp::AShr)
    }

    pub fn is_cast(self) -> bool {
        use BuiltinOp::*;
        matches!(
            self,
            Trunc | BitCast | ZExt | SExt | FpToUi | FpToSi | UiToFp | SiToFp | FpTrunc | FpExt
        )
    }
}

/// Pseudo-opcodes, namespace `DC_OPCODE_START` and above (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PseudoOp {
    EndOfInstruction = 0,
    PutRc = 1,
    PutReg = 2,
    GetRc = 3,
    GetReg = 4,
    CustomOp = 5,
    ComplexPattern = 6,
    Predicate = 7,
    ConstantOp = 8,
    MovConstant = 9,
    Implicit = 10,
}

impl PseudoOp {
    pub fn from_u32(token: u32) -> Option<Self> {
        use PseudoOp::*;
        let offset = token.checked_sub(DC_OPCODE_START)?;
        let op = match offset {
            0 => EndOfInstruction,
            1 => PutRc,
            2 => PutReg,
            3 => GetRc,
            4 => GetReg,
            5 => CustomOp,
            6 => ComplexPattern,
            7 => Predicate,
            8 => ConstantOp,
            9 => MovConstant,
            10 => Implicit,
            _ => return None,
        };
        Some(op)
    }

    pub fn to_u32(self) -> u32 {
        DC_OPCODE_START + self as u32
    }
}

/// A fully-classified semantic opcode, decoded from a raw tape token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticOp {
    Builtin(BuiltinOp),
    /// Raw opcode number in `[BUILTIN_OP_END, DC_OPCODE_START)`, dispatched
    /// to [`crate::target_hooks::TargetHooks::translate_target_opcode`].
    Target(u32),
    Pseudo(PseudoOp),
}

impl SemanticOp {
    pub fn decode(token: u32) -> SemanticOp {
        if token < BUILTIN_OP_END {
            // A token in the builtin range that isn't a recognized BuiltinOp
            // is still classified as Builtin so callers get a precise
            // "unknown opcode" diagnostic rather than silently treating it
            // as a target opcode.
            match BuiltinOp::from_u32(token) {
                Some(op) => SemanticOp::Builtin(op),
                None => SemanticOp::Target(token),
            }
        } else if token < DC_OPCODE_START {
            SemanticOp::Target(token)
        } else {
            match PseudoOp::from_u32(token) {
                Some(op) => SemanticOp::Pseudo(op),
                None => SemanticOp::Target(token),
            }
        }
    }
}

/// Value-type tags read via `STR::NextVT` (spec §4.1). Discriminants are
/// the tape encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum EvtTag {
    I1 = 0,
    I8 = 1,
    I16 = 2,
    I32 = 3,
    I64 = 4,
    I128 = 5,
    F32 = 6,
    F64 = 7,
    Ptr = 8,
    /// `iPTR`: resolved by the instruction translator, not the tape reader.
    IPtr = 9,
}

impl EvtTag {
    pub fn from_u32(token: u32) -> Option<Self> {
        use EvtTag::*;
        let tag = match token {
            0 => I1,
            1 => I8,
            2 => I16,
            3 => I32,
            4 => I64,
            5 => I128,
            6 => F32,
            7 => F64,
            8 => Ptr,
            9 => IPtr,
            _ => return None,
        };
        Some(tag)
    }

    pub fn to_evt(self) -> crate::ir::Evt {
        use crate::ir::Evt;
        match self {
            EvtTag::I1 => Evt::I1,
            EvtTag::I8 => Evt::I8,
            EvtTag::I16 => Evt::I16,
            EvtTag::I32 => Evt::I32,
            EvtTag::I64 => Evt::I64,
            EvtTag::I128 => Evt::I128,
            EvtTag::F32 => Evt::F32,
            EvtTag::F64 => Evt::F64,
            EvtTag::Ptr => Evt::Ptr,
            EvtTag::IPtr => Evt::IPtr,
        }
    }
}

/// Named memory/composite-operation predicates carried by the
/// `PREDICATE` pseudo-opcode (spec §4.2 table). Unknown predicate ids
/// fail (kind 3, spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    Memop,
    LoadI16,
    LoadI32,
    AlignedLoad,
    AlignedLoad256,
    AlignedLoad512,
    Load,
    AlignedStore,
    NontemporalStore,
    AlignedStore256,
    AlignedStore512,
    ZextLoadI8,
    ZextLoadI16,
    SextLoadI8,
    SextLoadI16,
    SextLoadI32,
    AndSu,
}

impl Predicate {
    pub fn from_u32(token: u32) -> Option<Self> {
        use Predicate::*;
        let p = match token {
            0 => Memop,
            1 => LoadI16,
            2 => LoadI32,
            3 => AlignedLoad,
            4 => AlignedLoad256,
            5 => AlignedLoad512,
            6 => Load,
            7 => AlignedStore,
            8 => NontemporalStore,
            9 => AlignedStore256,
            10 => AlignedStore512,
            11 => ZextLoadI8,
            12 => ZextLoadI16,
            13 => SextLoadI8,
            14 => SextLoadI16,
            15 => SextLoadI32,
            16 => AndSu,
            _ => return None,
        };
        Some(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_classifies_three_ranges() {
        assert_eq!(
            SemanticOp::decode(BuiltinOp::Add.to_u32()),
            SemanticOp::Builtin(BuiltinOp::Add)
        );
        assert_eq!(SemanticOp::decode(BUILTIN_OP_END + 3), SemanticOp::Target(BUILTIN_OP_END + 3));
        assert_eq!(
            SemanticOp::decode(PseudoOp::EndOfInstruction.to_u32()),
            SemanticOp::Pseudo(PseudoOp::EndOfInstruction)
        );
    }

    #[test]
    fn pseudo_round_trips() {
        for op in [
            PseudoOp::EndOfInstruction,
            PseudoOp::PutRc,
            PseudoOp::GetRc,
            PseudoOp::MovConstant,
            PseudoOp::Implicit,
        ] {
            assert_eq!(PseudoOp::from_u32(op.to_u32()), Some(op));
        }
    }
}
