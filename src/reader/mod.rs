pub mod page_cache;
pub mod paginator;
pub mod shortcuts;
pub mod state;

pub use page_cache::ComicPageCache;
pub use paginator::Paginator;
pub use shortcuts::{shortcut_help, KeyEvent, ShortcutAction, ShortcutMap};
pub use state::{LibraryView, Panel, ReaderEffect, ReaderState};
