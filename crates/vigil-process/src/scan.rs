//! Process-table scans.
//!
//! The supervised web service is recognised by a fragment of its command line
//! (its launch signature), e.g. `server/_core/index.ts`.

use sysinfo::System;

/// A process whose command line contains the signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedProcess {
    pub pid: u32,
    pub command_line: String,
}

/// Scan the process table for processes whose command line contains
/// `signature`. The calling process is never reported.
pub fn find_by_signature(signature: &str) -> Vec<MatchedProcess> {
    if signature.is_empty() {
        return Vec::new();
    }

    let own_pid = std::process::id();
    let mut system = System::new();
    system.refresh_processes();

    let mut matches: Vec<MatchedProcess> = system
        .processes()
        .iter()
        .filter_map(|(pid, process)| {
            let pid = pid.as_u32();
            if pid == own_pid {
                return None;
            }
            let command_line = process.cmd().join(" ");
            command_line
                .contains(signature)
                .then_some(MatchedProcess { pid, command_line })
        })
        .collect();

    matches.sort_by_key(|m| m.pid);
    matches
}

/// True when at least one process matches the signature.
pub fn is_running_by_signature(signature: &str) -> bool {
    !find_by_signature(signature).is_empty()
}
