/// Cursor pagination options shared by every `List*` query. Callers fetch
/// `limit + 1` rows; when exactly that many come back, the last row's id is
/// returned as the next cursor and trimmed from the result.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageOpts<C> {
    pub limit: i64,
    pub cursor: Option<C>,
}

pub struct Page<T, C> {
    pub items: Vec<T>,
    pub next_cursor: Option<C>,
}

/// Apply the limit+1 trick to a result set fetched with `LIMIT limit + 1`.
pub fn paginate<T, C: Clone>(mut rows: Vec<T>, limit: i64, cursor_of: impl Fn(&T) -> C) -> Page<T, C> {
    let next_cursor = if rows.len() as i64 > limit {
        rows.pop();
        rows.last().map(&cursor_of)
    } else {
        None
    };
    Page { items: rows, next_cursor }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_page_has_no_next_cursor() {
        let rows = vec![1, 2, 3];
        let page = paginate(rows, 3, |r| *r);
        assert_eq!(page.items, vec![1, 2, 3]);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn overflow_row_becomes_next_cursor_and_is_trimmed() {
        let rows = vec![1, 2, 3, 4];
        let page = paginate(rows, 3, |r| *r);
        assert_eq!(page.items, vec![1, 2, 3]);
        assert_eq!(page.next_cursor, Some(3));
    }

    #[test]
    fn concatenating_pages_covers_every_row_once() {
        let all = vec![1, 2, 3, 4, 5, 6, 7];
        let mut seen = Vec::new();
        let mut start = 0usize;
        loop {
            let chunk = all[start..].to_vec();
            let page = paginate(chunk, 3, |r| *r);
            let consumed = page.items.len();
            seen.extend(page.items);
            if page.next_cursor.is_none() {
                break;
            }
            start += consumed;
        }
        assert_eq!(seen, all);
    }
}
