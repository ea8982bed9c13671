/// Errors surfaced by kernel operations.
///
/// Unknown ids and rejected payloads are reported outcomes, never panics.
/// Empty injections or heals are not errors at all.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("process not found: {0}")]
    ProcessNotFound(u32),
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}
