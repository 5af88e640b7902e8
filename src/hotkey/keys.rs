//! Key name resolution and virtual key definitions
//!
//! Key codes follow the Windows virtual-key numbering, which is what the
//! low-level keyboard hook reports. Other backends translate their native
//! codes into this space before handing events to the tracker.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// A native virtual key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyCode(pub u32);

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// Virtual key constants used by the resolver and the platform backends
pub mod vk {
    use super::KeyCode;

    pub const BACK: KeyCode = KeyCode(0x08);
    pub const TAB: KeyCode = KeyCode(0x09);
    pub const RETURN: KeyCode = KeyCode(0x0D);
    pub const ESCAPE: KeyCode = KeyCode(0x1B);
    pub const SPACE: KeyCode = KeyCode(0x20);
    pub const PRIOR: KeyCode = KeyCode(0x21);
    pub const NEXT: KeyCode = KeyCode(0x22);
    pub const END: KeyCode = KeyCode(0x23);
    pub const HOME: KeyCode = KeyCode(0x24);
    pub const LEFT: KeyCode = KeyCode(0x25);
    pub const UP: KeyCode = KeyCode(0x26);
    pub const RIGHT: KeyCode = KeyCode(0x27);
    pub const DOWN: KeyCode = KeyCode(0x28);
    pub const INSERT: KeyCode = KeyCode(0x2D);
    pub const DELETE: KeyCode = KeyCode(0x2E);
    /// `0`; digits `1`..`9` follow contiguously
    pub const DIGIT0: KeyCode = KeyCode(0x30);
    /// `A`; letters follow contiguously as upper-case ASCII
    pub const A: KeyCode = KeyCode(0x41);
    /// Numpad `0`; numpad digits follow contiguously
    pub const NUMPAD0: KeyCode = KeyCode(0x60);
    pub const MULTIPLY: KeyCode = KeyCode(0x6A);
    pub const ADD: KeyCode = KeyCode(0x6B);
    pub const SUBTRACT: KeyCode = KeyCode(0x6D);
    pub const DECIMAL: KeyCode = KeyCode(0x6E);
    pub const DIVIDE: KeyCode = KeyCode(0x6F);
    /// `F1`; function keys up to `F24` follow contiguously
    pub const F1: KeyCode = KeyCode(0x70);
    pub const CLEAR: KeyCode = KeyCode(0x0C);

    pub const LSHIFT: KeyCode = KeyCode(0xA0);
    pub const RSHIFT: KeyCode = KeyCode(0xA1);
    pub const LCONTROL: KeyCode = KeyCode(0xA2);
    pub const RCONTROL: KeyCode = KeyCode(0xA3);
    pub const LMENU: KeyCode = KeyCode(0xA4);
    pub const RMENU: KeyCode = KeyCode(0xA5);

    pub const OEM_1: KeyCode = KeyCode(0xBA);
    pub const OEM_PLUS: KeyCode = KeyCode(0xBB);
    pub const OEM_COMMA: KeyCode = KeyCode(0xBC);
    pub const OEM_MINUS: KeyCode = KeyCode(0xBD);
    pub const OEM_PERIOD: KeyCode = KeyCode(0xBE);
    pub const OEM_2: KeyCode = KeyCode(0xBF);
    pub const OEM_3: KeyCode = KeyCode(0xC0);
    pub const OEM_4: KeyCode = KeyCode(0xDB);
    pub const OEM_5: KeyCode = KeyCode(0xDC);
    pub const OEM_6: KeyCode = KeyCode(0xDD);
    pub const OEM_7: KeyCode = KeyCode(0xDE);

    /// Offset a contiguous range base (digits, letters, F-keys, numpad)
    pub const fn offset(base: KeyCode, n: u32) -> KeyCode {
        KeyCode(base.0 + n)
    }
}

/// A modifier that a hotkey can require
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Ctrl,
    Shift,
    Alt,
}

impl Modifier {
    /// Left and right physical keys; either one satisfies the modifier
    pub fn codes(self) -> [KeyCode; 2] {
        match self {
            Modifier::Ctrl => [vk::LCONTROL, vk::RCONTROL],
            Modifier::Shift => [vk::LSHIFT, vk::RSHIFT],
            Modifier::Alt => [vk::LMENU, vk::RMENU],
        }
    }

    /// Parse a modifier token such as `ctrl` or `Option`
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ctrl" | "control" => Some(Modifier::Ctrl),
            "shift" => Some(Modifier::Shift),
            "alt" | "option" => Some(Modifier::Alt),
            _ => None,
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::Ctrl => write!(f, "Ctrl"),
            Modifier::Shift => write!(f, "Shift"),
            Modifier::Alt => write!(f, "Alt"),
        }
    }
}

/// The key name does not map to any virtual key
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown key name: {name:?}")]
pub struct UnresolvedKeyError {
    pub name: String,
}

impl UnresolvedKeyError {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

fn key_table() -> &'static HashMap<String, KeyCode> {
    static TABLE: OnceLock<HashMap<String, KeyCode>> = OnceLock::new();

    TABLE.get_or_init(|| {
        let mut table = HashMap::new();

        for n in 0..24 {
            table.insert(format!("f{}", n + 1), vk::offset(vk::F1, n));
        }
        for n in 0..10 {
            table.insert(n.to_string(), vk::offset(vk::DIGIT0, n));
            table.insert(format!("num{}", n), vk::offset(vk::NUMPAD0, n));
            table.insert(format!("numpad{}", n), vk::offset(vk::NUMPAD0, n));
        }

        let named = [
            ("up", vk::UP),
            ("down", vk::DOWN),
            ("left", vk::LEFT),
            ("right", vk::RIGHT),
            ("space", vk::SPACE),
            ("tab", vk::TAB),
            ("enter", vk::RETURN),
            ("return", vk::RETURN),
            ("esc", vk::ESCAPE),
            ("escape", vk::ESCAPE),
            ("backspace", vk::BACK),
            ("delete", vk::DELETE),
            ("del", vk::DELETE),
            ("home", vk::HOME),
            ("end", vk::END),
            ("pageup", vk::PRIOR),
            ("pgup", vk::PRIOR),
            ("pagedown", vk::NEXT),
            ("pgdn", vk::NEXT),
            ("insert", vk::INSERT),
            ("ins", vk::INSERT),
            (";", vk::OEM_1),
            ("=", vk::OEM_PLUS),
            (",", vk::OEM_COMMA),
            ("-", vk::OEM_MINUS),
            (".", vk::OEM_PERIOD),
            ("/", vk::OEM_2),
            ("`", vk::OEM_3),
            ("[", vk::OEM_4),
            ("\\", vk::OEM_5),
            ("]", vk::OEM_6),
            ("'", vk::OEM_7),
        ];
        for (name, code) in named {
            table.insert(name.to_string(), code);
        }

        table
    })
}

/// Resolve a human-readable key name (case-insensitive) to its virtual key
pub fn resolve_key(name: &str) -> Result<KeyCode, UnresolvedKeyError> {
    let normalized = name.trim().to_lowercase();

    if let Some(code) = key_table().get(&normalized) {
        return Ok(*code);
    }

    // Any other single ASCII letter maps to its upper-case code
    let mut chars = normalized.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => {
            Ok(KeyCode(c.to_ascii_uppercase() as u32))
        }
        _ => Err(UnresolvedKeyError::new(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_keys() {
        assert_eq!(resolve_key("f1"), Ok(KeyCode(0x70)));
        assert_eq!(resolve_key("F12"), Ok(KeyCode(0x7B)));
        assert_eq!(resolve_key("f24"), Ok(KeyCode(0x87)));
        assert!(resolve_key("f25").is_err());
    }

    #[test]
    fn test_letters_and_digits() {
        assert_eq!(resolve_key("a"), Ok(KeyCode(0x41)));
        assert_eq!(resolve_key("Z"), Ok(KeyCode(0x5A)));
        assert_eq!(resolve_key("0"), Ok(KeyCode(0x30)));
        assert_eq!(resolve_key("9"), Ok(KeyCode(0x39)));
    }

    #[test]
    fn test_numpad_and_navigation() {
        assert_eq!(resolve_key("num3"), Ok(KeyCode(0x63)));
        assert_eq!(resolve_key("numpad3"), Ok(KeyCode(0x63)));
        assert_eq!(resolve_key("PageUp"), Ok(vk::PRIOR));
        assert_eq!(resolve_key("esc"), resolve_key("escape"));
        assert_eq!(resolve_key(" enter "), Ok(vk::RETURN));
    }

    #[test]
    fn test_punctuation() {
        assert_eq!(resolve_key(";"), Ok(KeyCode(0xBA)));
        assert_eq!(resolve_key("/"), Ok(KeyCode(0xBF)));
        assert_eq!(resolve_key("\\"), Ok(KeyCode(0xDC)));
        assert_eq!(resolve_key("'"), Ok(KeyCode(0xDE)));
    }

    #[test]
    fn test_unknown_names() {
        let err = resolve_key("hyper").unwrap_err();
        assert_eq!(err.name, "hyper");
        assert!(resolve_key("").is_err());
        assert!(resolve_key("é").is_err());
        assert!(resolve_key("!").is_err());
    }

    #[test]
    fn test_modifier_pairs() {
        assert_eq!(Modifier::Ctrl.codes(), [vk::LCONTROL, vk::RCONTROL]);
        assert_eq!(Modifier::Shift.codes(), [vk::LSHIFT, vk::RSHIFT]);
        assert_eq!(Modifier::Alt.codes(), [vk::LMENU, vk::RMENU]);
        assert_eq!(Modifier::from_name("Control"), Some(Modifier::Ctrl));
        assert_eq!(Modifier::from_name("option"), Some(Modifier::Alt));
        assert_eq!(Modifier::from_name("meta"), None);
    }
}
