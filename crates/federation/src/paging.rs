//! Cursor paging over ordered collections.
//!
//! Stored collections keep their items newest first. A [`Page`] selects a
//! window of them:
//!
//! - `max_id` only, or no boundary: items older than `max_id`, newest first.
//! - `min_id` only: the `limit` items immediately newer than `min_id`,
//!   still returned newest first.
//! - both: items strictly between the two boundaries.
//!
//! The `next` link of a page points below its oldest item and the `prev` link
//! above its newest item, so following `next` from page N and `prev` from page
//! N+1 meets at adjacent items.

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::{FederationError, FederationResult};

/// Query parameter carrying the lower boundary.
pub const MIN_ID_KEY: &str = "min_id";
/// Query parameter carrying the upper boundary.
pub const MAX_ID_KEY: &str = "max_id";
/// Query parameter carrying the page size.
pub const LIMIT_KEY: &str = "limit";
/// Legacy query parameter switching paging on.
pub const PAGE_KEY: &str = "page";

/// Page size bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    /// Size of `first` pages and of legacy `page=true` requests.
    pub default: usize,
    /// Smallest accepted size.
    pub min: usize,
    /// Largest accepted size.
    pub max: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default: 40,
            min: 1,
            max: 80,
        }
    }
}

impl PageLimits {
    /// Clamp a requested size into range.
    #[must_use]
    pub fn clamp(&self, limit: usize) -> usize {
        limit.max(self.min).min(self.max)
    }
}

/// Direction a page walks the collection in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// From newer to older items.
    Descending,
    /// From older to newer items.
    Ascending,
}

/// A requested window over a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Exclusive lower boundary item id.
    pub min: Option<String>,
    /// Exclusive upper boundary item id.
    pub max: Option<String>,
    /// Maximum number of items.
    pub limit: usize,
}

impl Page {
    /// First page of a collection.
    #[must_use]
    pub const fn first(limit: usize) -> Self {
        Self {
            min: None,
            max: None,
            limit,
        }
    }

    /// Paging direction implied by the boundaries.
    #[must_use]
    pub const fn order(&self) -> Order {
        if self.min.is_some() && self.max.is_none() {
            Order::Ascending
        } else {
            Order::Descending
        }
    }

    /// Whether the request named a boundary.
    #[must_use]
    pub const fn has_cursor(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    /// The page after this one, below `lowest`.
    #[must_use]
    pub fn next(&self, lowest: &str) -> Self {
        Self {
            min: None,
            max: Some(lowest.to_string()),
            limit: self.limit,
        }
    }

    /// The page before this one, above `highest`.
    #[must_use]
    pub fn prev(&self, highest: &str) -> Self {
        Self {
            min: Some(highest.to_string()),
            max: None,
            limit: self.limit,
        }
    }

    /// Select this page's items from a newest-first slice.
    ///
    /// A boundary id that is not part of the collection selects nothing.
    #[must_use]
    pub fn apply<'a>(&self, items: &'a [Value]) -> &'a [Value] {
        let position = |id: &str| items.iter().position(|item| item_id(item).as_deref() == Some(id));

        let start = match &self.max {
            Some(max) => match position(max) {
                Some(index) => index + 1,
                None => return &[],
            },
            None => 0,
        };
        let end = match &self.min {
            Some(min) => match position(min) {
                Some(index) => index,
                None => return &[],
            },
            None => items.len(),
        };
        if start >= end {
            return &[];
        }

        let window = &items[start..end];
        match self.order() {
            Order::Descending => &window[..window.len().min(self.limit)],
            Order::Ascending => &window[window.len().saturating_sub(self.limit)..],
        }
    }

    /// Link to this page: `base` with `extra` parameters, then the boundaries and limit.
    #[must_use]
    pub fn to_link(&self, base: &Url, extra: &[(String, String)]) -> Url {
        let mut link = base.clone();
        link.set_query(None);
        {
            let mut query = link.query_pairs_mut();
            for (key, value) in extra {
                query.append_pair(key, value);
            }
            if let Some(min) = &self.min {
                query.append_pair(MIN_ID_KEY, min);
            }
            if let Some(max) = &self.max {
                query.append_pair(MAX_ID_KEY, max);
            }
            query.append_pair(LIMIT_KEY, &self.limit.to_string());
        }
        link
    }
}

/// Identity of a collection item: the IRI itself or an embedded value's `id`.
#[must_use]
pub fn item_id(item: &Value) -> Option<String> {
    match item {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("id").and_then(Value::as_str).map(String::from),
        _ => None,
    }
}

/// Paging parameters as they arrive in a query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    /// Lower boundary item id.
    pub min_id: Option<String>,
    /// Upper boundary item id.
    pub max_id: Option<String>,
    /// Requested page size.
    pub limit: Option<String>,
    /// Legacy paging switch.
    pub page: Option<String>,
}

impl PageQuery {
    /// Interpret the query. `None` requests the collection root.
    ///
    /// A boundary or a limit switches paging on; `page=true` alone does too,
    /// with the default limit.
    pub fn to_page(&self, limits: &PageLimits) -> FederationResult<Option<Page>> {
        let min = non_empty(self.min_id.as_deref());
        let max = non_empty(self.max_id.as_deref());

        let limit = match non_empty(self.limit.as_deref()) {
            Some(raw) => {
                let parsed: usize = raw.parse().map_err(|_| {
                    FederationError::BadRequest(format!("invalid {LIMIT_KEY}: {raw}"))
                })?;
                if parsed < 1 {
                    return Err(FederationError::BadRequest(format!(
                        "{LIMIT_KEY} must be at least 1"
                    )));
                }
                Some(limits.clamp(parsed))
            }
            None => None,
        };

        let legacy_page = match non_empty(self.page.as_deref()) {
            Some(raw) => raw.parse::<bool>().map_err(|_| {
                FederationError::BadRequest(format!("invalid {PAGE_KEY}: {raw}"))
            })?,
            None => false,
        };

        if min.is_none() && max.is_none() && limit.is_none() && !legacy_page {
            return Ok(None);
        }

        Ok(Some(Page {
            min,
            max,
            limit: limit.unwrap_or(limits.default),
        }))
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items(n: usize) -> Vec<Value> {
        // newest first: item n-1 .. item 0
        (0..n).rev().map(|i| json!(format!("https://a.example/{i}"))).collect()
    }

    fn ids(slice: &[Value]) -> Vec<String> {
        slice.iter().filter_map(item_id).collect()
    }

    #[test]
    fn test_first_page_is_newest() {
        let all = items(9);
        let page = Page::first(4);
        assert_eq!(
            ids(page.apply(&all)),
            vec!["https://a.example/8", "https://a.example/7", "https://a.example/6", "https://a.example/5"]
        );
    }

    #[test]
    fn test_next_and_prev_meet_at_adjacent_items() {
        let all = items(9);
        let first = Page::first(4);
        let first_items = ids(first.apply(&all));

        let second = first.next(first_items.last().unwrap());
        let second_items = ids(second.apply(&all));
        assert_eq!(second_items[0], "https://a.example/4");
        assert!(second_items.iter().all(|id| !first_items.contains(id)));

        let back = second.prev(&second_items[0]);
        assert_eq!(ids(back.apply(&all)), first_items);
    }

    #[test]
    fn test_ascending_takes_items_nearest_min() {
        let all = items(9);
        let page = Page {
            min: Some("https://a.example/2".to_string()),
            max: None,
            limit: 3,
        };
        assert_eq!(page.order(), Order::Ascending);
        assert_eq!(
            ids(page.apply(&all)),
            vec!["https://a.example/5", "https://a.example/4", "https://a.example/3"]
        );
    }

    #[test]
    fn test_min_at_newest_item_is_empty() {
        let all = items(1);
        let page = Page {
            min: Some("https://a.example/0".to_string()),
            max: None,
            limit: 40,
        };
        assert!(page.apply(&all).is_empty());
    }

    #[test]
    fn test_unknown_boundary_is_empty() {
        let all = items(3);
        let page = Page {
            min: None,
            max: Some("https://elsewhere.example/x".to_string()),
            limit: 40,
        };
        assert!(page.apply(&all).is_empty());
    }

    #[test]
    fn test_both_boundaries() {
        let all = items(9);
        let page = Page {
            min: Some("https://a.example/2".to_string()),
            max: Some("https://a.example/6".to_string()),
            limit: 40,
        };
        assert_eq!(
            ids(page.apply(&all)),
            vec!["https://a.example/5", "https://a.example/4", "https://a.example/3"]
        );
    }

    #[test]
    fn test_query_without_paging_params_is_root() {
        let query = PageQuery::default();
        assert_eq!(query.to_page(&PageLimits::default()).unwrap(), None);

        let query = PageQuery {
            page: Some("false".to_string()),
            ..PageQuery::default()
        };
        assert_eq!(query.to_page(&PageLimits::default()).unwrap(), None);
    }

    #[test]
    fn test_legacy_page_true_uses_default_limit() {
        let query = PageQuery {
            page: Some("true".to_string()),
            ..PageQuery::default()
        };
        let page = query.to_page(&PageLimits::default()).unwrap().unwrap();
        assert_eq!(page, Page::first(40));
    }

    #[test]
    fn test_limit_is_clamped() {
        let query = PageQuery {
            limit: Some("1000".to_string()),
            ..PageQuery::default()
        };
        let page = query.to_page(&PageLimits::default()).unwrap().unwrap();
        assert_eq!(page.limit, 80);
    }

    #[test]
    fn test_zero_or_garbage_limit_is_rejected() {
        for raw in ["0", "-3", "ten"] {
            let query = PageQuery {
                limit: Some(raw.to_string()),
                ..PageQuery::default()
            };
            assert!(query.to_page(&PageLimits::default()).is_err(), "{raw}");
        }
    }

    #[test]
    fn test_link_keeps_extra_params() {
        let base = Url::parse("https://hearth.example/objects/1/replies").unwrap();
        let page = Page::first(20).next("https://hearth.example/objects/9");
        let link = page.to_link(&base, &[("only_other_accounts".to_string(), "true".to_string())]);
        let pairs: Vec<(String, String)> = link.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("only_other_accounts".to_string(), "true".to_string()),
                ("max_id".to_string(), "https://hearth.example/objects/9".to_string()),
                ("limit".to_string(), "20".to_string()),
            ]
        );
    }
}
