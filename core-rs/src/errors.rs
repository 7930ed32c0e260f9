//! Error types for the worktree manager

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WtmError {
    #[error("{file} not found in {dir}")]
    ConfigNotFound { file: String, dir: String },

    #[error("{0}")]
    ConfigInvalid(String),

    #[error("Invalid port range format for {variable}: expected \"number..\" or \"number..number\", got \"{value}\"")]
    InvalidRangeFormat { variable: String, value: String },

    #[error("Invalid port range for {variable}: {reason} (got \"{value}\")")]
    InvalidRangeBounds {
        variable: String,
        value: String,
        reason: String,
    },

    #[error("Invalid assignment format: {0}")]
    InvalidAssignmentFormat(String),

    #[error("Port must be between 1024 and 65535, got {port} for {variable}")]
    PortOutOfBounds { variable: String, port: u64 },

    #[error("Port {port} for {variable} is already allocated or reserved")]
    PortConflict { port: u16, variable: String },

    #[error("No available ports in range {range} for {variable}")]
    PortRangeExhausted { variable: String, range: String },

    #[error("Invalid JSON in {path}: {reason}")]
    CorruptState { path: String, reason: String },

    #[error("Command failed with exit code {exit_code}: {command}")]
    SubprocessFailure {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Unknown project type")]
    UnknownProjectType { action: String },

    #[error("Not a git repository: {0}")]
    NotAGitRepository(String),

    #[error("Worktree already exists at {0}")]
    WorktreeExists(String),

    #[error("Worktree does not exist: {0}")]
    WorktreeNotFound(String),

    #[error("Worktree has modified or untracked files: {path}")]
    WorktreeDirty { path: String, status: String },

    #[error("Worktree number must be a positive integer, got '{0}'")]
    InvalidWorktreeNumber(String),

    #[error("Branch '{0}' does not exist")]
    BranchNotFound(String),

    #[error("Directory does not exist: {0}")]
    DirectoryNotFound(String),

    #[error("No roots registered")]
    NoRootsRegistered,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WtmError {
    /// Multi-line remediation text shown under the one-line message, if any
    pub fn hint(&self) -> Option<String> {
        match self {
            WtmError::ConfigNotFound { file, .. } => Some(format!(
                "Please create a {} file with port configuration.\n\n\
                 Example:\n\
                 environment:\n  HTTP_PORT:\n    port_range: \"8000..\"\n  VITE_PORT:\n    port_range: \"5173..\"",
                file
            )),
            WtmError::InvalidAssignmentFormat(_) => {
                Some("Expected format: VAR_NAME=PORT (e.g., DB_PORT=33060)".to_string())
            }
            WtmError::PortConflict { .. } => Some(
                "Run `worktree allocations --by-port` to see which worktree holds it.".to_string(),
            ),
            WtmError::PortRangeExhausted { .. } => Some(
                "All ports in this range are allocated or reserved.\n\
                 Widen the port_range in .worktree.yml or remove unused worktrees."
                    .to_string(),
            ),
            WtmError::CorruptState { path, .. } => Some(format!(
                "The allocation table was not modified. Inspect or repair {} by hand,\n\
                 or rebuild it from disk with `worktree scan`.",
                path
            )),
            WtmError::SubprocessFailure { stderr, .. } if !stderr.trim().is_empty() => {
                Some(stderr.trim().to_string())
            }
            WtmError::UnknownProjectType { action } => Some(format!(
                "Could not detect project type for {action}.\n\n\
                 To use a custom {action} method, add one of:\n  \
                 - hooks/{action} in .worktree.yml\n  \
                 - .worktree/hooks/{action} executable file"
            )),
            WtmError::NotAGitRepository(_) => Some(
                "The current directory must be the main checkout of a git repository.".to_string(),
            ),
            WtmError::WorktreeExists(path) => Some(format!(
                "Please remove the existing worktree first:\n  git worktree remove {}",
                path
            )),
            WtmError::WorktreeDirty { status, .. } => Some(format!(
                "{}\n\nOptions:\n  \
                 1. Commit or stash the changes first\n  \
                 2. Run again with --force to discard them",
                status.trim_end()
            )),
            WtmError::BranchNotFound(branch) => Some(format!(
                "Create it first or pick another base with --base:\n  git branch {}",
                branch
            )),
            WtmError::NoRootsRegistered => Some(
                "Register project directories with:\n  worktree root add <directory>".to_string(),
            ),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, WtmError>;
