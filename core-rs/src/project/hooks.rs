//! Lifecycle hooks declared in `.worktree.yml`
//!
//! ```yaml
//! hooks:
//!   install: composer install
//!   migrate:
//!     - php artisan migrate --force
//!     - php artisan db:seed
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle step a hook can replace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Install,
    Migrate,
    Up,
    Down,
}

impl HookKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::Install => "install",
            HookKind::Migrate => "migrate",
            HookKind::Up => "up",
            HookKind::Down => "down",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hook is one command or a list run in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HookCommand {
    Single(String),
    List(Vec<String>),
}

impl HookCommand {
    pub fn commands(&self) -> Vec<&str> {
        match self {
            HookCommand::Single(command) => vec![command.as_str()],
            HookCommand::List(commands) => commands.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hooks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<HookCommand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrate: Option<HookCommand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up: Option<HookCommand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub down: Option<HookCommand>,
}

impl Hooks {
    pub fn get(&self, kind: HookKind) -> Option<&HookCommand> {
        match kind {
            HookKind::Install => self.install.as_ref(),
            HookKind::Migrate => self.migrate.as_ref(),
            HookKind::Up => self.up.as_ref(),
            HookKind::Down => self.down.as_ref(),
        }
    }
}
