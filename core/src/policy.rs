//! Translation policy flags (spec §6).
//!
//! Mirrors the builder shape of `pico-aot-codegen::config::AotConfig`:
//! a plain struct with a `new`/`Default` constructor and chainable
//! `with_*` setters, all flags off by default.

/// Policy flags that change the translator's behavior without changing
/// which instructions or opcodes it understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationPolicy {
    /// Wrap every function return in a call to the RSI-provided regset-diff
    /// function (spec §4.3, §6). Does not apply to the external-tail-call
    /// path (spec §9 open question).
    pub enable_regset_diff: bool,

    /// Volatile-store the current instruction address to a process-wide
    /// sink before translating each instruction (spec §4.2 step 2, §6).
    pub enable_inst_addr_save: bool,

    /// On an unknown instruction, opcode, predicate, complex pattern, or
    /// custom operand, emit `trap; unreachable` and report success instead
    /// of failing the whole function (spec §6, §7).
    pub translate_unknown_to_undef: bool,
}

impl Default for TranslationPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl TranslationPolicy {
    pub const fn new() -> Self {
        Self {
            enable_regset_diff: false,
            enable_inst_addr_save: false,
            translate_unknown_to_undef: false,
        }
    }

    pub const fn with_regset_diff(mut self, enable: bool) -> Self {
        self.enable_regset_diff = enable;
        self
    }

    pub const fn with_inst_addr_save(mut self, enable: bool) -> Self {
        self.enable_inst_addr_save = enable;
        self
    }

    pub const fn with_undef_on_unknown(mut self, enable: bool) -> Self {
        self.translate_unknown_to_undef = enable;
        self
    }
}
