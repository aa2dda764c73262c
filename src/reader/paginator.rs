//! Page arithmetic for the comic and PDF viewers.

use serde::{Deserialize, Serialize};

use crate::commands::settings::{PageLayoutMode, ReadingDirection};

/// Two pages side by side: double-page mode and a landscape viewport.
pub fn is_spread(mode: PageLayoutMode, landscape: bool) -> bool {
    mode == PageLayoutMode::Double && landscape
}

pub fn page_step(spread: bool) -> u32 {
    if spread {
        2
    } else {
        1
    }
}

/// Spreads start on odd pages: an even page steps back to the page before it.
pub fn spread_start_page(page: u32, spread: bool) -> u32 {
    if spread && page > 1 && page % 2 == 0 {
        page - 1
    } else {
        page
    }
}

/// Clamps into `1..=total`. An unknown total (0) only enforces the lower bound.
pub fn clamp_page(page: u32, total: u32) -> u32 {
    if total == 0 {
        page.max(1)
    } else {
        page.clamp(1, total)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginator {
    page: u32,
    total: u32,
    direction: ReadingDirection,
    mode: PageLayoutMode,
    landscape: bool,
}

impl Paginator {
    pub fn new(
        page: u32,
        total: u32,
        direction: ReadingDirection,
        mode: PageLayoutMode,
        landscape: bool,
    ) -> Self {
        let mut paginator = Self {
            page,
            total,
            direction,
            mode,
            landscape,
        };
        paginator.normalize();
        paginator
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn is_spread(&self) -> bool {
        is_spread(self.mode, self.landscape)
    }

    pub fn step(&self) -> u32 {
        page_step(self.is_spread())
    }

    /// Brings the page back into bounds and onto a spread start.
    pub fn normalize(&mut self) {
        let page = clamp_page(self.page, self.total);
        self.page = spread_start_page(page, self.is_spread());
    }

    pub fn set_total(&mut self, total: u32) {
        self.total = total;
        self.normalize();
    }

    pub fn set_layout(&mut self, mode: PageLayoutMode, landscape: bool) {
        self.mode = mode;
        self.landscape = landscape;
        self.normalize();
    }

    pub fn set_direction(&mut self, direction: ReadingDirection) {
        self.direction = direction;
    }

    fn offset_target(&self, offset: i64) -> Option<u32> {
        let target = self.page as i64 + offset;
        (target >= 1 && target <= self.total as i64).then_some(target as u32)
    }

    fn back_offset(&self) -> i64 {
        let step = self.step() as i64;
        match self.direction {
            ReadingDirection::Ltr => -step,
            ReadingDirection::Rtl => step,
        }
    }

    pub fn can_go_back(&self) -> bool {
        self.offset_target(self.back_offset()).is_some()
    }

    pub fn can_go_forward(&self) -> bool {
        self.offset_target(-self.back_offset()).is_some()
    }

    /// Moves one step towards the start of the reading direction. Out-of-range moves do nothing.
    pub fn go_back(&mut self) -> bool {
        self.move_by(self.back_offset())
    }

    pub fn go_forward(&mut self) -> bool {
        self.move_by(-self.back_offset())
    }

    fn move_by(&mut self, offset: i64) -> bool {
        match self.offset_target(offset) {
            Some(target) => {
                self.page = target;
                true
            }
            None => false,
        }
    }

    /// Jumps to a page from the navigation panel, snapped to its spread.
    pub fn jump_to(&mut self, page: u32) -> bool {
        let target = spread_start_page(page, self.is_spread());
        if target >= 1 && target <= self.total {
            self.page = target;
            true
        } else {
            false
        }
    }

    /// The page or pair of pages on screen.
    pub fn visible_pages(&self) -> Vec<u32> {
        if self.is_spread() && self.page < self.total {
            vec![self.page, self.page + 1]
        } else {
            vec![self.page]
        }
    }

    /// Comic progress: position of the start page.
    pub fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.page as f64 / self.total as f64 * 100.0
    }

    /// PDF progress: counts the right-hand page of a spread as read.
    pub fn spread_progress_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let visible = if self.is_spread() {
            (self.page + 1).min(self.total)
        } else {
            self.page
        };
        visible as f64 / self.total as f64 * 100.0
    }
}
