//! Leaderboard pagination
//!
//! The ranker never counts the full result set; a page is fetched by ranking
//! `page_size + 1` rows from the page offset, and the extra row only signals
//! that another page exists.

/// Sanitized page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: usize,
    pub page_size: usize,
    /// Rows to skip before this page
    pub offset: usize,
}

impl Pagination {
    /// Rows to rank for this page, including the look-ahead row
    pub fn fetch_limit(&self) -> usize {
        self.page_size.saturating_add(1)
    }
}

/// Calculate pagination from a requested page and size
///
/// # Arguments
/// * `requested_page` - Page number requested by user (0 is treated as 1)
/// * `requested_size` - Rows per page, clamped to `1..=max_page_size`
/// * `max_page_size` - Upper bound from configuration
///
/// # Examples
/// ```
/// use chartpulse_rank::pagination::calculate_pagination;
///
/// let p = calculate_pagination(3, 20, 100);
/// assert_eq!(p.offset, 40);
///
/// // Oversized pages are clamped
/// let p = calculate_pagination(1, 5000, 100);
/// assert_eq!(p.page_size, 100);
/// ```
pub fn calculate_pagination(
    requested_page: usize,
    requested_size: usize,
    max_page_size: usize,
) -> Pagination {
    let page = requested_page.max(1);
    let page_size = requested_size.clamp(1, max_page_size.max(1));
    let offset = (page - 1).saturating_mul(page_size);

    Pagination {
        page,
        page_size,
        offset,
    }
}
