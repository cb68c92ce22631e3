/// Items grouped in pages, stored contiguously. `bounds[p]..bounds[p + 1]` is the range of page
/// `p` in `items`, so `bounds` always has one more entry than there are pages.
#[derive(Debug, PartialEq, Clone)]
pub(crate) struct Paged<T> {
    items: Box<[T]>,
    bounds: Box<[usize]>,
}

impl<T> Default for Paged<T> {
    fn default() -> Self {
        Self {
            items: Box::new([]),
            bounds: Box::new([0]),
        }
    }
}

impl<T> Paged<T> {
    /// Total number of items, all pages included.
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn page_count(&self) -> usize {
        self.bounds.len() - 1
    }

    /// Every item, page after page.
    pub(crate) fn items(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub(crate) fn pages(&self) -> Pages<'_, T> {
        Pages {
            next_page: 0,
            paged: self,
        }
    }
}

impl<T> FromIterator<Vec<T>> for Paged<T> {
    fn from_iter<I: IntoIterator<Item = Vec<T>>>(pages: I) -> Self {
        let mut items = Vec::new();
        let mut bounds = vec![0];
        for page in pages {
            items.extend(page);
            bounds.push(items.len());
        }
        Self {
            items: items.into_boxed_slice(),
            bounds: bounds.into_boxed_slice(),
        }
    }
}

/// Yields one slice per page of a `Paged`, empty pages included.
pub(crate) struct Pages<'a, T> {
    next_page: usize,
    paged: &'a Paged<T>,
}

impl<'a, T> Iterator for Pages<'a, T> {
    type Item = &'a [T];

    fn next(&mut self) -> Option<Self::Item> {
        let bounds = self.paged.bounds.get(self.next_page..self.next_page + 2)?;
        self.next_page += 1;
        self.paged.items.get(bounds[0]..bounds[1])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.paged.page_count().saturating_sub(self.next_page);
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for Pages<'_, T> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice() -> Paged<&'static str> {
        vec![
            vec!["O", "B-DATE", "I-DATE", "O", "B-TOTAL"],
            vec!["B-ADDRESS", "I-ADDRESS", "O"],
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_layout() {
        let paged = invoice();
        assert_eq!(&*paged.bounds, &[0, 5, 8]);
        assert_eq!(paged.len(), 8);
        assert_eq!(paged.page_count(), 2);
        assert_eq!(paged.items().nth(4), Some(&"B-TOTAL"));
    }

    #[test]
    fn test_pages() {
        let paged = invoice();
        let mut pages = paged.pages();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages.nth(1), Some(&["B-ADDRESS", "I-ADDRESS", "O"][..]));
        assert_eq!(pages.len(), 0);
        assert_eq!(pages.next(), None);
    }

    #[test]
    fn test_empty_pages_are_kept() {
        let paged: Paged<i32> = vec![vec![1], vec![], vec![2, 3]].into_iter().collect();
        let pages: Vec<Vec<i32>> = paged.pages().map(Vec::from).collect();
        assert_eq!(pages, vec![vec![1], vec![], vec![2, 3]]);
    }

    #[test]
    fn test_default_has_no_page() {
        let paged: Paged<u8> = Paged::default();
        assert_eq!(paged.page_count(), 0);
        assert_eq!(paged.pages().next(), None);
    }
}
