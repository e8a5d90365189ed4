//! Protocol-agnostic request value object (spec.md §4.4): the memcached
//! ASCII codec and the RESP codec both parse into this one `Command` enum,
//! so [`crate::engine::Cache`] dispatch logic is written once.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `quit` (spec.md §4.4.2's RESP table and §6.1's ASCII grammar both
    /// name it): no cache operation, just a signal to the embedder that the
    /// connection should close after this request.
    Quit,
    Get { keys: Vec<Vec<u8>>, with_cas: bool },
    Set { key: Vec<u8>, flags: u32, exptime: u32, value: Vec<u8>, noreply: bool },
    Add { key: Vec<u8>, flags: u32, exptime: u32, value: Vec<u8>, noreply: bool },
    Replace { key: Vec<u8>, flags: u32, exptime: u32, value: Vec<u8>, noreply: bool },
    Append { key: Vec<u8>, value: Vec<u8>, noreply: bool },
    Prepend { key: Vec<u8>, value: Vec<u8>, noreply: bool },
    Cas { key: Vec<u8>, flags: u32, exptime: u32, value: Vec<u8>, cas: u64, noreply: bool },
    Delete { key: Vec<u8>, noreply: bool },
    Incr { key: Vec<u8>, delta: u64, noreply: bool },
    Decr { key: Vec<u8>, delta: u64, noreply: bool },
    FlushAll { noreply: bool },
}

impl Command {
    /// `true` for commands the composer must not reply to (spec.md §6.1's
    /// `noreply` flag), except replies that are never suppressed
    /// regardless of `noreply` (value payloads for `get`/`gets`).
    pub fn is_noreply(&self) -> bool {
        match self {
            Command::Quit => true,
            Command::Get { .. } => false,
            Command::Set { noreply, .. }
            | Command::Add { noreply, .. }
            | Command::Replace { noreply, .. }
            | Command::Append { noreply, .. }
            | Command::Prepend { noreply, .. }
            | Command::Cas { noreply, .. }
            | Command::Delete { noreply, .. }
            | Command::Incr { noreply, .. }
            | Command::Decr { noreply, .. }
            | Command::FlushAll { noreply } => *noreply,
        }
    }
}
