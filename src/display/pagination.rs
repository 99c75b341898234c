use crate::core::catalog::RowCount;
use crate::core::query_builder::SortSpec;
use crate::utils::data::{format_number, page_start};

/// Where a rendered window sits within the whole browse.
#[derive(Debug, Clone, PartialEq)]
pub struct PageInfo {
    pub page_size: u32,
    pub offset: u64,
    pub shown: usize,
    pub has_more: bool,
    pub total: RowCount,
    /// Largest row position fetched so far for the table.
    pub high_water: u64,
    pub sort: SortSpec,
    pub filter: Option<String>,
}

impl PageInfo {
    /// Total rows, if known. A window that ends the result pins the total
    /// exactly even when no count was available.
    pub fn known_total(&self) -> Option<u64> {
        if !self.has_more && (self.shown > 0 || self.offset == 0) {
            return Some(self.offset + self.shown as u64);
        }
        self.total.value()
    }

    /// 1-based page number of this window.
    pub fn current_page(&self) -> u64 {
        self.offset / u64::from(self.page_size.max(1)) + 1
    }

    pub fn total_pages(&self) -> Option<u64> {
        self.known_total()
            .map(|total| total.div_ceil(u64::from(self.page_size.max(1))).max(1))
    }

    pub fn is_first_page(&self) -> bool {
        self.offset == 0
    }

    pub fn next_offset(&self) -> Option<u64> {
        self.has_more
            .then(|| self.offset + u64::from(self.page_size))
    }

    pub fn previous_offset(&self) -> Option<u64> {
        (!self.is_first_page()).then(|| self.offset.saturating_sub(u64::from(self.page_size)))
    }

    /// Offset of the last page; `None` while the total is unknown.
    pub fn last_offset(&self) -> Option<u64> {
        self.known_total()
            .map(|total| page_start(total.saturating_sub(1), self.page_size))
    }

    /// "Rows a–b of N", "Rows a–b of ≥ N" or "No matching rows".
    pub fn status_line(&self) -> String {
        if self.shown == 0 {
            if self.offset == 0 {
                return "No matching rows".to_string();
            }
            return format!("No rows at offset {}", format_number(self.offset));
        }

        let first = self.offset + 1;
        let last = self.offset + self.shown as u64;
        let total = match (self.known_total(), self.total) {
            (Some(total), RowCount::Estimated(_)) if self.has_more => {
                format!("~{}", format_number(total.max(last)))
            }
            (Some(total), _) => format_number(total.max(last)),
            (None, _) => format!("≥ {}", format_number(self.high_water.max(last))),
        };

        let mut line = format!(
            "Rows {}–{} of {}",
            format_number(first),
            format_number(last),
            total
        );
        if let Some(column) = &self.sort.column {
            line.push_str(&format!(" | sorted by {} {}", column, self.sort.direction.arrow()));
        }
        if let Some(filter) = &self.filter {
            line.push_str(&format!(" | filter: {}", filter));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(offset: u64, shown: usize, has_more: bool, total: RowCount) -> PageInfo {
        PageInfo {
            page_size: 200,
            offset,
            shown,
            has_more,
            total,
            high_water: offset + shown as u64,
            sort: SortSpec::natural(),
            filter: None,
        }
    }

    #[test]
    fn test_status_line_with_exact_total() {
        let info = page(200, 200, true, RowCount::Exact(10_000));
        assert_eq!(info.status_line(), "Rows 201–400 of 10,000");
        assert_eq!(info.current_page(), 2);
        assert_eq!(info.total_pages(), Some(50));
    }

    #[test]
    fn test_status_line_with_unknown_total() {
        let info = page(400, 200, true, RowCount::Unknown);
        assert_eq!(info.status_line(), "Rows 401–600 of ≥ 600");
        assert_eq!(info.last_offset(), None);
    }

    #[test]
    fn test_last_window_pins_total() {
        let info = page(9_800, 200, false, RowCount::Unknown);
        assert_eq!(info.known_total(), Some(10_000));
        assert_eq!(info.status_line(), "Rows 9,801–10,000 of 10,000");
        assert_eq!(info.next_offset(), None);
        assert_eq!(info.last_offset(), Some(9_800));
    }

    #[test]
    fn test_estimated_total_is_marked() {
        let info = page(0, 200, true, RowCount::Estimated(5_000));
        assert_eq!(info.status_line(), "Rows 1–200 of ~5,000");
    }

    #[test]
    fn test_empty_results() {
        assert_eq!(page(0, 0, false, RowCount::Unknown).status_line(), "No matching rows");
        assert_eq!(
            page(1_000, 0, false, RowCount::Unknown).status_line(),
            "No rows at offset 1,000"
        );
    }

    #[test]
    fn test_navigation_offsets() {
        let info = page(200, 200, true, RowCount::Exact(450));
        assert_eq!(info.next_offset(), Some(400));
        assert_eq!(info.previous_offset(), Some(0));
        assert_eq!(info.last_offset(), Some(400));
        assert_eq!(page(0, 200, true, RowCount::Unknown).previous_offset(), None);
    }

    #[test]
    fn test_sort_and_filter_in_status() {
        let mut info = page(0, 5, false, RowCount::Exact(5));
        info.sort = SortSpec::descending("age");
        info.filter = Some("age > 20".to_string());
        assert_eq!(
            info.status_line(),
            "Rows 1–5 of 5 | sorted by age ↓ | filter: age > 20"
        );
    }
}
