/// Pinned environment tracking
///
/// A pin is stored as the string `"{project}-{environment}"`. It refers to
/// positions, so reordering or removing environments can leave a key that
/// no longer resolves; such a key simply pins nothing.

use crate::settings::Settings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Position of an environment inside the settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PinKey {
    pub project: usize,
    pub environment: usize,
}

impl PinKey {
    pub fn new(project: usize, environment: usize) -> Self {
        PinKey { project, environment }
    }
}

impl fmt::Display for PinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.project, self.environment)
    }
}

impl FromStr for PinKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (project, environment) = s
            .split_once('-')
            .ok_or_else(|| format!("Invalid pin key: {}", s))?;
        Ok(PinKey {
            project: project.parse().map_err(|_| format!("Invalid pin key: {}", s))?,
            environment: environment.parse().map_err(|_| format!("Invalid pin key: {}", s))?,
        })
    }
}

/// Toggle a pin: the same key unpins, any other key replaces the current one.
pub fn toggle_pin(current: Option<&str>, key: &str) -> Option<String> {
    if current == Some(key) {
        None
    } else {
        Some(key.to_string())
    }
}

/// The single pinned environment, persisted as an optional string
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PinTracker {
    pinned: Option<String>,
}

impl PinTracker {
    pub fn new(pinned: Option<String>) -> Self {
        PinTracker { pinned }
    }

    pub fn pinned(&self) -> Option<&str> {
        self.pinned.as_deref()
    }

    /// Toggle `key` and return the new state
    pub fn toggle(&mut self, key: &PinKey) -> Option<&str> {
        self.pinned = toggle_pin(self.pinned.as_deref(), &key.to_string());
        self.pinned.as_deref()
    }

    /// The pinned position, if it still points at an existing environment
    pub fn resolve(&self, settings: &Settings) -> Option<PinKey> {
        let key: PinKey = self.pinned.as_deref()?.parse().ok()?;
        settings
            .environment(key.project, key.environment)
            .map(|_| key)
    }
}
