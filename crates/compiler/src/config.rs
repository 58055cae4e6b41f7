//! Pipeline-wide configuration, threaded explicitly through `compile`
//! rather than stored in globals.

/// Compiler-wide knobs for the backend and VM invocation contract.
#[derive(Debug, Clone, Default)]
pub struct CompilerConfig {
    /// Emit `DEBUG_TRAP` after every lowered statement, so a VM run in
    /// `RunMode::Debug` reports each step to stderr.
    pub debug_trap: bool,

    /// Serialize the emitted program in binary form (`Program::to_binary`)
    /// instead of the canonical textual mnemonic form.
    pub emit_binary: bool,
}

impl CompilerConfig {
    pub fn new() -> Self {
        CompilerConfig::default()
    }

    pub fn with_debug_trap(mut self, enabled: bool) -> Self {
        self.debug_trap = enabled;
        self
    }

    pub fn with_emit_binary(mut self, enabled: bool) -> Self {
        self.emit_binary = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_flags() {
        let config = CompilerConfig::new().with_debug_trap(true).with_emit_binary(true);
        assert!(config.debug_trap);
        assert!(config.emit_binary);
    }

    #[test]
    fn default_is_quiet_and_textual() {
        let config = CompilerConfig::default();
        assert!(!config.debug_trap);
        assert!(!config.emit_binary);
    }
}
