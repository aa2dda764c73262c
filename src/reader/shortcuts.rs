//! Keyboard shortcuts for the reader window.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::state::Panel;

/// What had focus when the key was pressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Focus {
    #[default]
    Document,
    Input,
    TextArea,
    ContentEditable,
}

impl Focus {
    fn is_text_entry(&self) -> bool {
        !matches!(self, Focus::Document)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyEvent {
    pub key: String,
    pub ctrl: bool,
    /// Cmd on macOS, treated as Ctrl
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
    pub focus: Focus,
}

impl KeyEvent {
    pub fn key(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Default::default()
        }
    }

    /// `Shift+Ctrl+Alt+Key`, modifiers in that order.
    pub fn combo(&self) -> String {
        let mut combo = String::new();
        if self.shift {
            combo.push_str("Shift+");
        }
        if self.ctrl || self.meta {
            combo.push_str("Ctrl+");
        }
        if self.alt {
            combo.push_str("Alt+");
        }
        combo.push_str(&self.key);
        combo
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "panel", rename_all = "snake_case")]
pub enum ShortcutAction {
    Home,
    ToggleHelp,
    Escape,
    ToggleFullscreen,
    TogglePanel(Panel),
    PreviousPage,
    NextPage,
}

#[derive(Debug, Clone, Default)]
pub struct ShortcutMap {
    bindings: HashMap<String, ShortcutAction>,
}

impl ShortcutMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reader() -> Self {
        let mut map = Self::new();
        map.bind_all(&["h", "H"], ShortcutAction::Home);
        map.bind("?", ShortcutAction::ToggleHelp);
        map.bind("Escape", ShortcutAction::Escape);
        map.bind_all(&["f", "F"], ShortcutAction::ToggleFullscreen);
        map.bind_all(&["s", "S"], ShortcutAction::TogglePanel(Panel::Settings));
        map.bind_all(&["t", "T"], ShortcutAction::TogglePanel(Panel::Navigation));
        map.bind_all(&["b", "B"], ShortcutAction::TogglePanel(Panel::Bookmarks));
        map.bind_all(&["ArrowLeft", "ArrowUp"], ShortcutAction::PreviousPage);
        map.bind_all(&["ArrowRight", "ArrowDown"], ShortcutAction::NextPage);
        map
    }

    pub fn bind(&mut self, combo: &str, action: ShortcutAction) {
        self.bindings.insert(combo.to_string(), action);
    }

    fn bind_all(&mut self, combos: &[&str], action: ShortcutAction) {
        for combo in combos {
            self.bind(combo, action);
        }
    }

    /// Tries the full combo, then the bare key. Typing into a text field never matches.
    pub fn resolve(&self, event: &KeyEvent) -> Option<ShortcutAction> {
        if event.focus.is_text_entry() {
            return None;
        }
        self.bindings
            .get(&event.combo())
            .or_else(|| self.bindings.get(&event.key))
            .copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortcutHelpEntry {
    pub keys: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortcutHelpSection {
    pub title: &'static str,
    pub entries: Vec<ShortcutHelpEntry>,
}

fn section(title: &'static str, entries: &[(&'static str, &'static str)]) -> ShortcutHelpSection {
    ShortcutHelpSection {
        title,
        entries: entries
            .iter()
            .map(|&(keys, description)| ShortcutHelpEntry { keys, description })
            .collect(),
    }
}

/// Rows of the help overlay.
pub fn shortcut_help() -> Vec<ShortcutHelpSection> {
    vec![
        section(
            "Navigation",
            &[
                ("H", "Go back to Library"),
                ("?", "Show/Hide this help"),
                ("Esc", "Back / Close Panel"),
            ],
        ),
        section(
            "Reader",
            &[
                ("→ / ↓", "Next Page"),
                ("← / ↑", "Previous Page"),
                ("F", "Toggle Fullscreen"),
                ("T", "Toggle Table of Contents"),
                ("B", "Toggle Bookmark"),
                ("S", "Open Settings"),
            ],
        ),
        section(
            "General",
            &[
                ("/", "Search"),
                ("[", "Previous Tab/Panel"),
                ("]", "Next Tab/Panel"),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combo_order() {
        let event = KeyEvent {
            key: "k".into(),
            ctrl: true,
            shift: true,
            alt: true,
            ..Default::default()
        };
        assert_eq!(event.combo(), "Shift+Ctrl+Alt+k");

        let meta = KeyEvent { key: "k".into(), meta: true, ..Default::default() };
        assert_eq!(meta.combo(), "Ctrl+k");
        assert_eq!(KeyEvent::key("Escape").combo(), "Escape");
    }

    #[test]
    fn test_reader_map() {
        let map = ShortcutMap::reader();
        assert_eq!(map.resolve(&KeyEvent::key("H")), Some(ShortcutAction::Home));
        assert_eq!(map.resolve(&KeyEvent::key("ArrowUp")), Some(ShortcutAction::PreviousPage));
        assert_eq!(map.resolve(&KeyEvent::key("ArrowDown")), Some(ShortcutAction::NextPage));
        assert_eq!(
            map.resolve(&KeyEvent::key("t")),
            Some(ShortcutAction::TogglePanel(Panel::Navigation))
        );
        assert_eq!(map.resolve(&KeyEvent::key("x")), None);
    }

    #[test]
    fn test_falls_back_to_bare_key() {
        let map = ShortcutMap::reader();
        let question = KeyEvent { key: "?".into(), shift: true, ..Default::default() };
        assert_eq!(map.resolve(&question), Some(ShortcutAction::ToggleHelp));
    }

    #[test]
    fn test_combo_binding_wins() {
        let mut map = ShortcutMap::reader();
        map.bind("Ctrl+f", ShortcutAction::TogglePanel(Panel::Search));
        let event = KeyEvent { key: "f".into(), ctrl: true, ..Default::default() };
        assert_eq!(map.resolve(&event), Some(ShortcutAction::TogglePanel(Panel::Search)));
        assert_eq!(map.resolve(&KeyEvent::key("f")), Some(ShortcutAction::ToggleFullscreen));
    }

    #[test]
    fn test_text_entry_is_ignored() {
        let map = ShortcutMap::reader();
        for focus in [Focus::Input, Focus::TextArea, Focus::ContentEditable] {
            let event = KeyEvent { key: "ArrowRight".into(), focus, ..Default::default() };
            assert_eq!(map.resolve(&event), None);
        }
    }

    #[test]
    fn test_help_sections() {
        let help = shortcut_help();
        let titles: Vec<_> = help.iter().map(|s| s.title).collect();
        assert_eq!(titles, vec!["Navigation", "Reader", "General"]);
        assert_eq!(help[1].entries.len(), 6);
        assert_eq!(help[0].entries[0].description, "Go back to Library");
    }

    #[test]
    fn test_action_wire_format() {
        let json = serde_json::to_string(&ShortcutAction::TogglePanel(Panel::Bookmarks)).unwrap();
        assert_eq!(json, r#"{"type":"toggle_panel","panel":"bookmarks"}"#);
        let json = serde_json::to_string(&ShortcutAction::NextPage).unwrap();
        assert_eq!(json, r#"{"type":"next_page"}"#);
    }
}
