//! shortcut-overlay: global hotkey engine for the shortcut overlay
//!
//! Watches system-wide keyboard input for a configured modifier+key
//! combination and reports when it is engaged and released:
//! - Key-name resolution to native virtual key codes
//! - Held-key tracking and combination matching
//! - Debounced Activated / Deactivated edges
//! - A hook thread with start/stop/reconfigure lifecycle

pub mod config;
pub mod events;
pub mod hotkey;
pub mod lifecycle;
