//! Error kinds for the translation engine (spec §7).
//!
//! Kinds 1-3 (unknown instruction/opcode/predicate-or-pattern) are
//! recoverable under [`crate::policy::TranslationPolicy::translate_unknown_to_undef`].
//! Kinds 4-5 (assertion violations, invalid atomic constants) are always
//! fatal: they indicate a bug in the semantic-table generator or in this
//! crate, not a target limitation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("unknown instruction: mc_opcode {mc_opcode} at address {address:#x}")]
    UnknownInstruction { mc_opcode: u32, address: u64 },

    #[error("unknown semantic opcode {opcode} while translating {mnemonic} at {address:#x}")]
    UnknownOpcode {
        opcode: u32,
        mnemonic: String,
        address: u64,
    },

    #[error("unknown predicate {predicate_id} while translating {mnemonic} at {address:#x}")]
    UnknownPredicate {
        predicate_id: u32,
        mnemonic: String,
        address: u64,
    },

    #[error("unknown complex pattern {pattern_id} while translating {mnemonic} at {address:#x}")]
    UnknownComplexPattern {
        pattern_id: u32,
        mnemonic: String,
        address: u64,
    },

    #[error(
        "unknown custom operand (op_type {op_type}, operand {mi_operand_no}) \
         while translating {mnemonic} at {address:#x}"
    )]
    UnknownCustomOperand {
        op_type: u32,
        mi_operand_no: u32,
        mnemonic: String,
        address: u64,
    },

    #[error("translation invariant violated: {0}")]
    AssertionViolation(String),

    #[error("invalid atomic ordering/scope constant: ordering {ordering}, scope {scope}")]
    InvalidAtomicOrdering { ordering: i64, scope: i64 },
}

impl TranslationError {
    /// Whether this error kind is locally recoverable under the
    /// `translate_unknown_to_undef` policy (spec §7 kinds 1-3).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TranslationError::UnknownInstruction { .. }
                | TranslationError::UnknownOpcode { .. }
                | TranslationError::UnknownPredicate { .. }
                | TranslationError::UnknownComplexPattern { .. }
                | TranslationError::UnknownCustomOperand { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TranslationError>;
