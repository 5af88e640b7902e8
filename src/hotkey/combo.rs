//! Hotkey configuration and combination tracking
//!
//! The tracker owns the set of keys currently held and answers one question
//! after every change: is the configured combination fully down?

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::keys::{resolve_key, KeyCode, Modifier, UnresolvedKeyError};

/// User-facing hotkey configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    /// Main key name, resolved with [`resolve_key`]
    pub key: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            ctrl: true,
            shift: true,
            alt: false,
            key: "f12".to_string(),
        }
    }
}

impl HotkeyConfig {
    /// Requested modifiers, in display order
    pub fn modifiers(&self) -> impl Iterator<Item = Modifier> {
        [
            (self.ctrl, Modifier::Ctrl),
            (self.shift, Modifier::Shift),
            (self.alt, Modifier::Alt),
        ]
        .into_iter()
        .filter_map(|(enabled, modifier)| enabled.then_some(modifier))
    }

    /// Derive the key set the tracker checks against
    pub fn required_keys(&self) -> Result<RequiredKeySet, UnresolvedKeyError> {
        let main = resolve_key(&self.key)?;
        Ok(RequiredKeySet {
            modifier_groups: self.modifiers().map(Modifier::codes).collect(),
            main,
        })
    }
}

impl fmt::Display for HotkeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in self.modifiers() {
            write!(f, "{}+", modifier)?;
        }
        write!(f, "{}", self.key.trim().to_uppercase())
    }
}

impl FromStr for HotkeyConfig {
    type Err = UnresolvedKeyError;

    /// Parse `Ctrl+Shift+F12` style strings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut config = HotkeyConfig {
            ctrl: false,
            shift: false,
            alt: false,
            key: String::new(),
        };
        let mut main_keys = Vec::new();

        // "ctrl++" names the '=' / '+' key; keep a trailing empty token as "+"
        let tokens: Vec<&str> = s.split('+').collect();
        for (i, token) in tokens.iter().enumerate() {
            let token = token.trim();
            if token.is_empty() {
                if i == tokens.len() - 1 && i > 0 && tokens[i - 1].trim().is_empty() {
                    main_keys.push("=");
                }
                continue;
            }
            match Modifier::from_name(token) {
                Some(Modifier::Ctrl) => config.ctrl = true,
                Some(Modifier::Shift) => config.shift = true,
                Some(Modifier::Alt) => config.alt = true,
                None => main_keys.push(token),
            }
        }

        match main_keys.as_slice() {
            [key] => {
                resolve_key(key)?;
                config.key = key.to_lowercase();
                Ok(config)
            }
            _ => Err(UnresolvedKeyError::new(s)),
        }
    }
}

/// Keys that must be down at the same time for the hotkey to be satisfied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredKeySet {
    /// One entry per requested modifier: its left and right codes
    modifier_groups: Vec<[KeyCode; 2]>,
    main: KeyCode,
}

impl RequiredKeySet {
    pub fn main_key(&self) -> KeyCode {
        self.main
    }

    /// Every code that participates in the combination
    pub fn codes(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.modifier_groups
            .iter()
            .flatten()
            .copied()
            .chain(std::iter::once(self.main))
    }

    /// Whether `code` is part of the combination
    pub fn involves(&self, code: KeyCode) -> bool {
        self.codes().any(|c| c == code)
    }

    /// All modifier groups have one side down and the main key is down
    pub fn is_satisfied(&self, pressed: &HashSet<KeyCode>) -> bool {
        self.modifier_groups
            .iter()
            .all(|group| group.iter().any(|code| pressed.contains(code)))
            && pressed.contains(&self.main)
    }
}

/// Tracks held keys and evaluates the combination on every change
#[derive(Debug)]
pub struct CombinationTracker {
    required: RequiredKeySet,
    pressed: HashSet<KeyCode>,
}

impl CombinationTracker {
    pub fn new(required: RequiredKeySet) -> Self {
        Self {
            required,
            pressed: HashSet::new(),
        }
    }

    pub fn required(&self) -> &RequiredKeySet {
        &self.required
    }

    /// Record a key press, returning whether the combination is satisfied
    pub fn on_key_down(&mut self, code: KeyCode) -> bool {
        self.pressed.insert(code);
        self.is_satisfied()
    }

    /// Record a key release, returning whether the combination is satisfied
    ///
    /// Releasing a key that was never seen going down is a no-op.
    pub fn on_key_up(&mut self, code: KeyCode) -> bool {
        self.pressed.remove(&code);
        self.is_satisfied()
    }

    pub fn is_satisfied(&self) -> bool {
        self.required.is_satisfied(&self.pressed)
    }

    /// Forget every held key
    pub fn clear(&mut self) {
        self.pressed.clear();
    }

    pub fn pressed(&self) -> &HashSet<KeyCode> {
        &self.pressed
    }
}
