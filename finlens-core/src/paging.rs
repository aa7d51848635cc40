//! Fixed-size page slicing for display

/// One entry of a rendered page-number list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMarker {
    Page(usize),
    Ellipsis,
}

/// Items on 1-based `page`. Out-of-range pages and a zero page size give an empty slice.
pub fn page_slice<T>(items: &[T], page: usize, size: usize) -> &[T] {
    if page == 0 || size == 0 {
        return &[];
    }
    let start = (page - 1).saturating_mul(size);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(size).min(items.len());
    &items[start..end]
}

pub fn total_pages(total: usize, size: usize) -> usize {
    if size == 0 {
        return 0;
    }
    total.div_ceil(size)
}

/// Page numbers to render: first and last always, up to three around `current`,
/// and an ellipsis where pages are skipped. Empty when there is at most one page.
pub fn page_markers(current: usize, total_pages: usize) -> Vec<PageMarker> {
    if total_pages <= 1 {
        return Vec::new();
    }
    let current = current.clamp(1, total_pages);
    let mut out = vec![PageMarker::Page(1)];

    if current > 3 {
        out.push(PageMarker::Ellipsis);
    }
    let lo = current.saturating_sub(1).max(2);
    let hi = (current + 1).min(total_pages - 1);
    for p in lo..=hi {
        out.push(PageMarker::Page(p));
    }
    if current + 2 < total_pages {
        out.push(PageMarker::Ellipsis);
    }

    out.push(PageMarker::Page(total_pages));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use PageMarker::{Ellipsis, Page};

    #[test]
    fn test_slices_25_by_12() {
        let items: Vec<u32> = (0..25).collect();
        assert_eq!(page_slice(&items, 1, 12).len(), 12);
        assert_eq!(page_slice(&items, 2, 12), &items[12..24]);
        assert_eq!(page_slice(&items, 3, 12), &[24]);
        assert!(page_slice(&items, 4, 12).is_empty());
        assert_eq!(total_pages(items.len(), 12), 3);
    }

    #[test]
    fn test_degenerate_inputs() {
        let items = [1, 2, 3];
        assert!(page_slice(&items, 0, 2).is_empty());
        assert!(page_slice(&items, 1, 0).is_empty());
        assert!(page_slice(&items, usize::MAX, usize::MAX).is_empty());
        assert_eq!(total_pages(0, 12), 0);
        assert_eq!(total_pages(3, 0), 0);
    }

    #[test]
    fn test_markers_small() {
        assert!(page_markers(1, 1).is_empty());
        assert_eq!(page_markers(1, 2), vec![Page(1), Page(2)]);
        assert_eq!(page_markers(2, 3), vec![Page(1), Page(2), Page(3)]);
    }

    #[test]
    fn test_markers_middle_has_both_gaps() {
        assert_eq!(
            page_markers(5, 10),
            vec![Page(1), Ellipsis, Page(4), Page(5), Page(6), Ellipsis, Page(10)]
        );
    }

    #[test]
    fn test_markers_edges() {
        assert_eq!(page_markers(1, 10), vec![Page(1), Page(2), Ellipsis, Page(10)]);
        assert_eq!(page_markers(10, 10), vec![Page(1), Ellipsis, Page(9), Page(10)]);
        assert_eq!(page_markers(3, 10), vec![Page(1), Page(2), Page(3), Page(4), Ellipsis, Page(10)]);
    }
}
