//! Wire representation of paged collections.

use activitypub_federation::kinds::collection::{
    CollectionPageType, CollectionType, OrderedCollectionPageType, OrderedCollectionType,
};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::paging::{LIMIT_KEY, Page, PageLimits, item_id};
use crate::vocab::AS_CONTEXT;

/// Whether a collection is exposed as ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStyle {
    /// `OrderedCollection` with `orderedItems`.
    Ordered,
    /// `Collection` with `items`.
    Unordered,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum RootKind {
    Ordered(OrderedCollectionType),
    Unordered(CollectionType),
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum PageKind {
    Ordered(OrderedCollectionPageType),
    Unordered(CollectionPageType),
}

/// Collection root: the entry point pointing at the first page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRoot {
    #[serde(rename = "@context")]
    context: &'static str,
    /// Canonical collection IRI plus echoed non-paging parameters.
    pub id: Url,
    #[serde(rename = "type")]
    kind: RootKind,
    /// Number of items in the whole collection.
    pub total_items: usize,
    /// Link to the first page.
    pub first: Url,
}

/// One page of a collection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionPage {
    #[serde(rename = "@context")]
    context: &'static str,
    /// Link reproducing exactly this page.
    pub id: Url,
    #[serde(rename = "type")]
    kind: PageKind,
    /// Parent collection IRI, with echoed non-paging parameters.
    pub part_of: Url,
    /// Link to older items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<Url>,
    /// Link to newer items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<Url>,
    /// Number of items in the whole collection.
    pub total_items: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    ordered_items: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    items: Option<Vec<Value>>,
}

impl CollectionPage {
    /// Items on this page, whichever property carries them.
    #[must_use]
    pub fn page_items(&self) -> &[Value] {
        self.ordered_items
            .as_deref()
            .or(self.items.as_deref())
            .unwrap_or_default()
    }
}

/// Either representation of a collection.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PagedCollection {
    /// No cursor was supplied.
    Root(CollectionRoot),
    /// A cursor was supplied.
    Page(CollectionPage),
}

/// What to render.
#[derive(Debug, Clone)]
pub struct CollectionRequest {
    /// Canonical collection IRI, without query.
    pub id: Url,
    /// Non-paging query parameters to echo in every link.
    pub extra_params: Vec<(String, String)>,
    /// Ordered or unordered vocabulary.
    pub style: CollectionStyle,
    /// Requested window; `None` for the root.
    pub page: Option<Page>,
    /// Drop repeated ids inside the served page.
    pub dedupe: bool,
}

/// Turns stored item lists into roots and pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectionPager {
    limits: PageLimits,
}

impl CollectionPager {
    /// Pager with the given page size bounds.
    #[must_use]
    pub const fn new(limits: PageLimits) -> Self {
        Self { limits }
    }

    /// Page size bounds.
    #[must_use]
    pub const fn limits(&self) -> &PageLimits {
        &self.limits
    }

    /// Render the root or the requested page of a newest-first item list.
    #[must_use]
    pub fn render(&self, request: &CollectionRequest, items: &[Value]) -> PagedCollection {
        match &request.page {
            None => PagedCollection::Root(self.root(request, items.len())),
            Some(page) => PagedCollection::Page(self.page(request, page, items)),
        }
    }

    fn root(&self, request: &CollectionRequest, total_items: usize) -> CollectionRoot {
        let id = with_params(&request.id, &request.extra_params);
        let mut first = id.clone();
        first
            .query_pairs_mut()
            .append_pair(LIMIT_KEY, &self.limits.default.to_string());

        CollectionRoot {
            context: AS_CONTEXT,
            id,
            kind: match request.style {
                CollectionStyle::Ordered => RootKind::Ordered(OrderedCollectionType::OrderedCollection),
                CollectionStyle::Unordered => RootKind::Unordered(CollectionType::Collection),
            },
            total_items,
            first,
        }
    }

    fn page(&self, request: &CollectionRequest, page: &Page, items: &[Value]) -> CollectionPage {
        let mut selected = page.apply(items).to_vec();
        if request.dedupe {
            selected = dedupe_ordered_items(selected);
        }

        let lowest = selected.last().and_then(item_id);
        let highest = selected.first().and_then(item_id);

        let next = lowest.map(|lo| page.next(&lo).to_link(&request.id, &request.extra_params));
        let prev = highest
            .filter(|_| page.has_cursor())
            .map(|hi| page.prev(&hi).to_link(&request.id, &request.extra_params));

        let (kind, ordered_items, plain_items) = match request.style {
            CollectionStyle::Ordered => (
                PageKind::Ordered(OrderedCollectionPageType::OrderedCollectionPage),
                Some(selected),
                None,
            ),
            CollectionStyle::Unordered => (
                PageKind::Unordered(CollectionPageType::CollectionPage),
                None,
                Some(selected),
            ),
        };

        CollectionPage {
            context: AS_CONTEXT,
            id: page.to_link(&request.id, &request.extra_params),
            kind,
            part_of: with_params(&request.id, &request.extra_params),
            next,
            prev,
            total_items: items.len(),
            ordered_items,
            items: plain_items,
        }
    }
}

/// Drop items whose id already appeared earlier, keeping first occurrences in order.
#[must_use]
pub fn dedupe_ordered_items(items: Vec<Value>) -> Vec<Value> {
    let mut seen: Vec<String> = Vec::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| match item_id(item) {
            Some(id) if seen.contains(&id) => false,
            Some(id) => {
                seen.push(id);
                true
            }
            None => true,
        })
        .collect()
}

fn with_params(base: &Url, params: &[(String, String)]) -> Url {
    let mut url = base.clone();
    url.set_query(None);
    if !params.is_empty() {
        let mut query = url.query_pairs_mut();
        for (key, value) in params {
            query.append_pair(key, value);
        }
    }
    url
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outbox() -> Url {
        Url::parse("https://hearth.example/users/alice/outbox").unwrap()
    }

    fn items(n: usize) -> Vec<Value> {
        (0..n)
            .rev()
            .map(|i| json!(format!("https://hearth.example/objects/{i}")))
            .collect()
    }

    fn request(page: Option<Page>) -> CollectionRequest {
        CollectionRequest {
            id: outbox(),
            extra_params: Vec::new(),
            style: CollectionStyle::Ordered,
            page,
            dedupe: false,
        }
    }

    #[test]
    fn test_root_links_first_page() {
        let pager = CollectionPager::default();
        let PagedCollection::Root(root) = pager.render(&request(None), &items(3)) else {
            panic!("expected root");
        };
        assert_eq!(root.id, outbox());
        assert_eq!(root.total_items, 3);
        assert_eq!(root.first.as_str(), "https://hearth.example/users/alice/outbox?limit=40");

        let json = serde_json::to_value(&root).unwrap();
        assert_eq!(json["type"], "OrderedCollection");
        assert_eq!(json["totalItems"], 3);
    }

    #[test]
    fn test_first_page_has_next_but_no_prev() {
        let pager = CollectionPager::default();
        let PagedCollection::Page(page) = pager.render(&request(Some(Page::first(40))), &items(9))
        else {
            panic!("expected page");
        };
        assert_eq!(page.total_items, 9);
        assert_eq!(page.page_items().len(), 9);
        assert_eq!(page.part_of, outbox());
        assert!(page.next.is_some());
        assert!(page.prev.is_none());

        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["type"], "OrderedCollectionPage");
        assert!(json.get("items").is_none());
        assert_eq!(json["orderedItems"].as_array().unwrap().len(), 9);
    }

    #[test]
    fn test_empty_page_has_no_links() {
        let pager = CollectionPager::default();
        let page = Page {
            min: Some("https://hearth.example/objects/0".to_string()),
            max: None,
            limit: 40,
        };
        let mut req = request(Some(page));
        req.style = CollectionStyle::Unordered;
        let PagedCollection::Page(page) = pager.render(&req, &items(1)) else {
            panic!("expected page");
        };
        assert!(page.page_items().is_empty());
        assert_eq!(page.total_items, 1);
        assert!(page.next.is_none());
        assert!(page.prev.is_none());

        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["type"], "CollectionPage");
        assert_eq!(json["items"], json!([]));
    }

    #[test]
    fn test_following_first_reaches_page_part_of_root() {
        let pager = CollectionPager::default();
        let PagedCollection::Root(root) = pager.render(&request(None), &items(5)) else {
            panic!("expected root");
        };
        let limit = root
            .first
            .query_pairs()
            .find(|(key, _)| key == LIMIT_KEY)
            .map(|(_, value)| value.into_owned());
        let query = crate::paging::PageQuery {
            limit,
            ..Default::default()
        };
        let page = query.to_page(pager.limits()).unwrap();
        let PagedCollection::Page(page) = pager.render(&request(page), &items(5)) else {
            panic!("expected page");
        };
        assert_eq!(page.part_of, root.id);
    }

    #[test]
    fn test_extra_params_echoed_in_root() {
        let pager = CollectionPager::default();
        let mut req = request(None);
        req.extra_params = vec![("only_other_accounts".to_string(), "false".to_string())];
        let PagedCollection::Root(root) = pager.render(&req, &items(1)) else {
            panic!("expected root");
        };
        assert_eq!(
            root.id.as_str(),
            "https://hearth.example/users/alice/outbox?only_other_accounts=false"
        );
        assert_eq!(
            root.first.as_str(),
            "https://hearth.example/users/alice/outbox?only_other_accounts=false&limit=40"
        );
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let deduped = dedupe_ordered_items(vec![
            json!("https://a.example/1"),
            json!({ "id": "https://a.example/2" }),
            json!("https://a.example/1"),
            json!("https://a.example/2"),
            json!("https://a.example/3"),
        ]);
        assert_eq!(
            deduped,
            vec![
                json!("https://a.example/1"),
                json!({ "id": "https://a.example/2" }),
                json!("https://a.example/3"),
            ]
        );
    }
}
