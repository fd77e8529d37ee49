//! Fixed-size pages over an already filtered list.

use serde::Serialize;

/// One page of results. Page numbers start at 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub number: usize,
    pub num_pages: usize,
    pub per_page: usize,
    /// Items across all pages.
    pub total: usize,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    /// Cut page `requested` out of `items`.
    ///
    /// Missing or zero page numbers give the first page, numbers past the end
    /// give the last one. An empty list still has one (empty) page.
    pub fn paginate(items: Vec<T>, requested: Option<usize>, per_page: usize) -> Self {
        let per_page = per_page.max(1);
        let total = items.len();
        let num_pages = total.div_ceil(per_page).max(1);
        let number = requested.unwrap_or(1).clamp(1, num_pages);

        let items = items
            .into_iter()
            .skip((number - 1) * per_page)
            .take(per_page)
            .collect();

        Self {
            number,
            num_pages,
            per_page,
            total,
            items,
        }
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }
}

/// `page` query parameter, if present and numeric.
pub fn page_param<K, V>(pairs: &[(K, V)]) -> Option<usize>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    pairs
        .iter()
        .find(|(k, _)| k.as_ref() == "page")
        .and_then(|(_, v)| v.as_ref().trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_middle_page() {
        let page = Page::paginate((1..=120).collect(), Some(2), 50);
        assert_eq!(page.num_pages, 3);
        assert_eq!(page.items.first(), Some(&51));
        assert_eq!(page.items.len(), 50);
        assert!(page.has_next());
        assert!(page.has_previous());
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let last = Page::paginate((1..=120).collect(), Some(99), 50);
        assert_eq!(last.number, 3);
        assert_eq!(last.items.len(), 20);

        let first = Page::paginate((1..=120).collect::<Vec<i32>>(), Some(0), 50);
        assert_eq!(first.number, 1);
    }

    #[test]
    fn test_empty_list_has_one_page() {
        let page = Page::<u8>::paginate(Vec::new(), None, 50);
        assert_eq!(page.num_pages, 1);
        assert!(page.items.is_empty());
        assert!(!page.has_next());
    }

    #[test]
    fn test_page_param() {
        let pairs = vec![("filtro_Curso".to_string(), "Letras".to_string()), ("page".into(), "3".into())];
        assert_eq!(page_param(&pairs), Some(3));
        assert_eq!(page_param(&[("page", "abc")]), None);
    }
}
