//! Per-function / per-instruction semantic translation engine for a static
//! binary translator.
//!
//! Consumes already-decoded machine instructions of a target ISA and emits
//! equivalent code into a typed, SSA-form intermediate representation by
//! driving a table-driven semantics interpreter (the compact "semantic
//! tape" format, see [`tape`]) over a decoded MC function, while
//! coordinating with an externally owned register-semantics collaborator
//! ([`register_semantics`]) to read and write the architectural register
//! file.
//!
//! Machine-code decoding, the concrete register-file layout, module-level
//! housekeeping, and ISA-specific overrides are all external collaborators;
//! this crate only states the contracts it needs from them
//! ([`register_semantics::RegisterSemantics`], [`target_hooks::TargetHooks`]).

pub mod block_manager;
pub mod error;
pub mod function_translator;
pub mod instruction;
pub mod instruction_translator;
pub mod ir;
pub mod opcode;
pub mod policy;
pub mod register_semantics;
pub mod tape;
pub mod target_hooks;
pub mod value_stack;

pub use block_manager::BlockManager;
pub use error::{Result, TranslationError};
pub use function_translator::FunctionTranslator;
pub use instruction::{DecodedInstruction, McBasicBlock, McFunction, McOperand};
pub use policy::TranslationPolicy;
pub use register_semantics::RegisterSemantics;
pub use tape::SemanticTables;
pub use target_hooks::TargetHooks;
