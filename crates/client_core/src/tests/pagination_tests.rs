use super::*;

fn numbers(n: usize) -> Vec<usize> {
    (0..n).collect()
}

#[test]
fn twenty_three_items_in_pages_of_nine() {
    let source = numbers(23);

    let first = paginate(&source, |_| true, 9, 1);
    let second = paginate(&source, |_| true, 9, 2);
    let third = paginate(&source, |_| true, 9, 3);

    assert_eq!(first.total_pages, 3);
    assert_eq!(first.items.len(), 9);
    assert_eq!(second.items.len(), 9);
    assert_eq!(third.items.len(), 5);
    assert_eq!(third.range, 18..23);
    assert!(!third.has_next());
    assert!(third.has_previous());
}

#[test]
fn out_of_range_requests_are_clamped() {
    let source = numbers(23);

    let beyond = paginate(&source, |_| true, 9, 5);
    let last = paginate(&source, |_| true, 9, 3);
    assert_eq!(beyond, last);

    let zero = paginate(&source, |_| true, 9, 0);
    let first = paginate(&source, |_| true, 9, 1);
    assert_eq!(zero, first);
}

#[test]
fn pages_concatenate_to_filtered_sequence() {
    let source = numbers(57);
    let even = |n: &usize| n % 2 == 0;
    let expected: Vec<usize> = source.iter().copied().filter(even).collect();

    for page_size in 1..=12 {
        let total = paginate(&source, even, page_size, 1).total_pages;
        assert_eq!(total, expected.len().div_ceil(page_size));
        let joined: Vec<usize> = (1..=total)
            .flat_map(|number| paginate(&source, even, page_size, number).items)
            .collect();
        assert_eq!(joined, expected, "page size {page_size}");
    }
}

#[test]
fn empty_source_yields_single_empty_page() {
    let page = paginate(&Vec::<usize>::new(), |_| true, 10, 4);
    assert_eq!(page.number, 1);
    assert_eq!(page.total_pages, 1);
    assert_eq!(page.total_items, 0);
    assert!(page.is_empty());
    assert_eq!(page.range, 0..0);
}

#[test]
fn zero_page_size_behaves_like_one() {
    let source = numbers(3);
    let page = paginate(&source, |_| true, 0, 2);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.items, vec![1]);
}

#[test]
fn total_pages_has_floor_of_one() {
    assert_eq!(total_pages(0, 9), 1);
    assert_eq!(total_pages(9, 9), 1);
    assert_eq!(total_pages(10, 9), 2);
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    All,
    Pending,
}

#[test]
fn cursor_resets_when_filter_changes() {
    let source = numbers(23);
    let mut cursor = PageCursor::new(9);

    cursor.page(&source, &Kind::All, |_| true);
    cursor.goto(3);
    let third = cursor.page(&source, &Kind::All, |_| true);
    assert_eq!(third.number, 3);

    let pending = cursor.page(&source, &Kind::Pending, |_| false);
    assert_eq!(cursor.current(), 1);
    assert_eq!(pending.number, 1);
    assert_eq!(pending.total_pages, 1);
    assert!(pending.is_empty());
}

#[test]
fn cursor_resets_when_source_length_changes() {
    let mut source = numbers(30);
    let mut cursor = PageCursor::new(10);

    cursor.page(&source, &(), |_| true);
    cursor.goto(2);
    assert_eq!(cursor.page(&source, &(), |_| true).number, 2);

    source.push(30);
    assert_eq!(cursor.page(&source, &(), |_| true).number, 1);
}

#[test]
fn cursor_navigation_stays_in_bounds() {
    let source = numbers(15);
    let mut cursor = PageCursor::new(10);
    cursor.page(&source, &(), |_| true);

    cursor.previous();
    assert_eq!(cursor.current(), 1);

    cursor.next();
    cursor.next();
    let page = cursor.page(&source, &(), |_| true);
    assert_eq!(page.number, 2);
    assert_eq!(cursor.current(), 2);
    assert_eq!(page.items, (10..15).collect::<Vec<_>>());
}
