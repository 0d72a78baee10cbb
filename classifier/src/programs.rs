use std::collections::{HashMap, HashSet};

pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
pub const TOKEN_2022_PROGRAM_ID: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";

const KNOWN_SWAP_PROGRAMS: &[(&str, &str)] = &[
    ("JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4", "Jupiter"),
    ("JUP4Fb2cqiRUcaTHdrPC8h2gNsA2ETXiPDD33WcGuJB", "Jupiter"),
    ("675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8", "Raydium"),
    ("CAMMCzo5YL8w4VFF8KVHrK22GGUsp5VTaW7grrKgrWqK", "Raydium"),
    ("whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc", "Orca"),
    ("6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P", "Pump.fun"),
];

/// Program allow-lists driving instruction-level classification.
#[derive(Debug, Clone)]
pub struct ProgramRegistry {
    swap_programs: HashMap<String, String>,
    transfer_programs: HashSet<String>,
}

impl Default for ProgramRegistry {
    fn default() -> Self {
        Self {
            swap_programs: KNOWN_SWAP_PROGRAMS
                .iter()
                .map(|(id, label)| (id.to_string(), label.to_string()))
                .collect(),
            transfer_programs: [SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID, TOKEN_2022_PROGRAM_ID]
                .iter()
                .map(|id| id.to_string())
                .collect(),
        }
    }
}

impl ProgramRegistry {
    pub fn with_swap_program(
        mut self,
        program_id: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        self.swap_programs.insert(program_id.into(), label.into());
        self
    }

    pub fn with_transfer_program(mut self, program_id: impl Into<String>) -> Self {
        self.transfer_programs.insert(program_id.into());
        self
    }

    /// Display label of a swap program, `None` when the program is not a known swapper.
    pub fn swapper(&self, program_id: &str) -> Option<&str> {
        self.swap_programs.get(program_id).map(String::as_str)
    }

    pub fn is_transfer_program(&self, program_id: &str) -> bool {
        self.transfer_programs.contains(program_id)
    }
}
