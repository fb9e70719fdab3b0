//! Client-side paging over an in-memory sequence.

use std::ops::Range;

/// One page of a filtered sequence. `number` is 1-based and always within
/// `1..=total_pages`.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub total_pages: usize,
    pub total_items: usize,
    /// Positions of `items` within the filtered sequence.
    pub range: Range<usize>,
}

impl<T> Page<T> {
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Number of pages needed for `total_items`; never less than one.
pub fn total_pages(total_items: usize, page_size: usize) -> usize {
    let page_size = page_size.max(1);
    total_items.div_ceil(page_size).max(1)
}

/// Filters `source` and returns the requested page, clamped into range.
/// A page size of zero is treated as one.
pub fn paginate<T, F>(source: &[T], filter: F, page_size: usize, requested: usize) -> Page<T>
where
    T: Clone,
    F: Fn(&T) -> bool,
{
    let page_size = page_size.max(1);
    let filtered: Vec<&T> = source.iter().filter(|item| filter(item)).collect();
    let total_items = filtered.len();
    let total_pages = total_pages(total_items, page_size);
    let number = requested.clamp(1, total_pages);

    let start = ((number - 1) * page_size).min(total_items);
    let end = (start + page_size).min(total_items);

    Page {
        items: filtered[start..end].iter().map(|item| (*item).clone()).collect(),
        number,
        total_pages,
        total_items,
        range: start..end,
    }
}

/// Remembers the current page of a listing and goes back to page 1
/// whenever the active filter or the size of the source changes.
#[derive(Debug, Clone)]
pub struct PageCursor<K> {
    page_size: usize,
    current: usize,
    filter_key: Option<K>,
    source_len: Option<usize>,
}

impl<K: PartialEq + Clone> PageCursor<K> {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            current: 1,
            filter_key: None,
            source_len: None,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn goto(&mut self, page: usize) {
        self.current = page.max(1);
    }

    pub fn next(&mut self) {
        self.current = self.current.saturating_add(1);
    }

    pub fn previous(&mut self) {
        self.current = self.current.saturating_sub(1).max(1);
    }

    /// Computes the page for `source` under `key`, resetting first if the
    /// key or the source length moved since the last call. The stored page
    /// number is pulled back into range afterwards.
    pub fn page<T, F>(&mut self, source: &[T], key: &K, filter: F) -> Page<T>
    where
        T: Clone,
        F: Fn(&T) -> bool,
    {
        let key_changed = self.filter_key.as_ref() != Some(key);
        let len_changed = self.source_len != Some(source.len());
        if key_changed || len_changed {
            self.current = 1;
            self.filter_key = Some(key.clone());
            self.source_len = Some(source.len());
        }
        let page = paginate(source, filter, self.page_size, self.current);
        self.current = page.number;
        page
    }
}

#[cfg(test)]
#[path = "tests/pagination_tests.rs"]
mod tests;
