//! UI state held for the reader and library windows.

use serde::{Deserialize, Serialize};

use super::shortcuts::ShortcutAction;
use crate::commands::book::{BookSort, FormatFilter, LibraryQuery, LibrarySection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Panel {
    Settings,
    Navigation,
    Search,
    Bookmarks,
    Annotations,
}

/// What the shell has to do after a shortcut is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderEffect {
    None,
    NavigateHome,
    ToggleFullscreen,
    PreviousPage,
    NextPage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderState {
    pub book_id: Option<i64>,
    pub toolbar_visible: bool,
    pub active_panel: Option<Panel>,
    pub help_open: bool,
    pub loading: bool,
    pub error: Option<String>,
}

impl Default for ReaderState {
    fn default() -> Self {
        Self {
            book_id: None,
            toolbar_visible: true,
            active_panel: None,
            help_open: false,
            loading: true,
            error: None,
        }
    }
}

impl ReaderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_book(&mut self, book_id: Option<i64>) {
        self.book_id = book_id;
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    /// Recording an error also ends loading.
    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
        self.loading = false;
    }

    pub fn toggle_toolbar(&mut self) {
        self.toolbar_visible = !self.toolbar_visible;
    }

    pub fn set_toolbar_visible(&mut self, visible: bool) {
        self.toolbar_visible = visible;
    }

    /// Opens `panel`, or closes it when it is already open.
    pub fn toggle_panel(&mut self, panel: Panel) {
        self.active_panel = if self.active_panel == Some(panel) {
            None
        } else {
            Some(panel)
        };
    }

    pub fn close_panel(&mut self) {
        self.active_panel = None;
    }

    pub fn apply(&mut self, action: ShortcutAction) -> ReaderEffect {
        match action {
            ShortcutAction::Home => ReaderEffect::NavigateHome,
            ShortcutAction::ToggleHelp => {
                self.help_open = !self.help_open;
                ReaderEffect::None
            }
            ShortcutAction::Escape => {
                if self.active_panel.is_some() {
                    self.close_panel();
                    ReaderEffect::None
                } else if self.help_open {
                    self.help_open = false;
                    ReaderEffect::None
                } else {
                    ReaderEffect::NavigateHome
                }
            }
            ShortcutAction::ToggleFullscreen => ReaderEffect::ToggleFullscreen,
            ShortcutAction::TogglePanel(panel) => {
                self.toggle_panel(panel);
                ReaderEffect::None
            }
            ShortcutAction::PreviousPage => ReaderEffect::PreviousPage,
            ShortcutAction::NextPage => ReaderEffect::NextPage,
        }
    }

    /// Back to the defaults, when the reader closes.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

/// Library window filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryView {
    pub view_mode: ViewMode,
    pub search: String,
    pub format: FormatFilter,
    pub sort: BookSort,
    pub selected_collection: Option<i64>,
    pub section: LibrarySection,
}

impl LibraryView {
    /// Picking a collection leaves the sidebar sections; picking a section leaves the collection.
    pub fn select_collection(&mut self, collection: Option<i64>) {
        self.selected_collection = collection;
        if collection.is_some() {
            self.section = LibrarySection::Library;
        }
    }

    pub fn select_section(&mut self, section: LibrarySection) {
        self.section = section;
        self.selected_collection = None;
    }

    pub fn to_query(&self) -> LibraryQuery {
        LibraryQuery {
            format: self.format,
            section: self.section,
            collection: self.selected_collection,
            sort: self.sort,
            search: self.search.trim().to_string(),
        }
    }
}
