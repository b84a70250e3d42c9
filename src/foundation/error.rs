/// Crate-wide result alias.
pub type OverlordResult<T> = Result<T, OverlordError>;

/// `DescriptorRead` is usually recovered where it occurs by substituting a default.
#[derive(thiserror::Error, Debug)]
pub enum OverlordError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("session already running: {0}")]
    AlreadyRunning(String),

    #[error("executable not found: {0}")]
    ExecutableNotFound(String),

    #[error("descriptor read error: {0}")]
    DescriptorRead(String),

    /// A working directory could not be removed within the retry budget.
    #[error("directory cleanup failed: {0}")]
    DirectoryCleanup(String),

    #[error("archive write error: {0}")]
    ArchiveWrite(String),

    #[error("launch error: {0}")]
    Launch(String),

    #[error("serialization error: {0}")]
    Serde(String),

    /// Any other error, usually an I/O failure with context attached.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OverlordError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn already_running(msg: impl Into<String>) -> Self {
        Self::AlreadyRunning(msg.into())
    }

    pub fn executable_not_found(msg: impl Into<String>) -> Self {
        Self::ExecutableNotFound(msg.into())
    }

    pub fn descriptor_read(msg: impl Into<String>) -> Self {
        Self::DescriptorRead(msg.into())
    }

    pub fn directory_cleanup(msg: impl Into<String>) -> Self {
        Self::DirectoryCleanup(msg.into())
    }

    pub fn archive_write(msg: impl Into<String>) -> Self {
        Self::ArchiveWrite(msg.into())
    }

    pub fn launch(msg: impl Into<String>) -> Self {
        Self::Launch(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
