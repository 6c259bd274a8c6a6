//! Newest-first page windows over a 1-based message index.

use crate::domain::PageRequest;

/// Inclusive range of message indices covered by one page.
///
/// Page 1 ends at the newest message (index `total`); each later page ends
/// `page_size` indices further back. Windows that fall before index 1 are
/// empty; a partial last page is clamped to start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    start: u32,
    end: u32,
}

impl PageWindow {
    /// Computes the window for `page` in a mailbox holding `total` messages.
    pub fn compute(total: u32, page: &PageRequest) -> Option<Self> {
        let total = i128::from(total);
        let size = i128::from(page.page_size);
        let number = i128::from(page.page_number);

        let end = total - size * (number - 1);
        if total == 0 || end <= 0 {
            return None;
        }
        let start = (total - size * number + 1).max(1);

        // Both bounds lie in 1..=total here.
        Some(Self {
            start: start as u32,
            end: end as u32,
        })
    }

    /// Lowest index in the window.
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Highest index in the window.
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Number of messages in the window.
    pub fn count(&self) -> usize {
        (self.end - self.start + 1) as usize
    }

    /// Indices from highest to lowest.
    pub fn iter_desc(&self) -> impl Iterator<Item = u32> {
        (self.start..=self.end).rev()
    }

    /// Whether `index` falls inside the window.
    pub fn contains(&self, index: u32) -> bool {
        (self.start..=self.end).contains(&index)
    }

    /// IMAP sequence set (`start:end`).
    pub fn sequence_set(&self) -> String {
        format!("{}:{}", self.start, self.end)
    }
}
