use serde::Serialize;

/// One page of a listing plus the numbers a pager needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page actually returned, after clamping.
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

/// Slices `items` into pages of `page_size`. Out-of-range page numbers are
/// clamped to the first or last page instead of failing.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size);
    let page = page.clamp(1, total_pages.max(1));

    Page {
        items: items
            .iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .cloned()
            .collect(),
        page,
        total_pages,
        total_items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::first(1, 1, 5)]
    #[case::middle(2, 2, 5)]
    #[case::last(3, 3, 2)]
    #[case::zero_clamps_to_first(0, 1, 5)]
    #[case::past_end_clamps_to_last(4, 3, 2)]
    #[case::far_past_end(usize::MAX, 3, 2)]
    fn twelve_items_in_pages_of_five(
        #[case] requested: usize,
        #[case] returned: usize,
        #[case] len: usize,
    ) {
        let items: Vec<u32> = (1..=12).collect();
        let page = paginate(&items, requested, 5);
        assert_eq!(page.page, returned);
        assert_eq!(page.items.len(), len);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_items, 12);
    }

    #[test]
    fn last_page_holds_the_tail() {
        let items: Vec<u32> = (1..=12).collect();
        assert_eq!(paginate(&items, 3, 5).items, vec![11, 12]);
    }

    #[test]
    fn empty_listing_has_no_pages() {
        let page = paginate::<u32>(&[], 1, 5);
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 0);
        assert_eq!(page.page, 1);
    }

    #[test]
    fn zero_page_size_is_treated_as_one() {
        let page = paginate(&[1, 2, 3], 2, 0);
        assert_eq!(page.items, vec![2]);
        assert_eq!(page.total_pages, 3);
    }
}
