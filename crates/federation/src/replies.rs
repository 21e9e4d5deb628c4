//! Reply threads of local objects.

use serde_json::Value;
use url::Url;

use crate::collection::{CollectionRequest, CollectionStyle, PagedCollection};
use crate::error::{FederationError, FederationResult};
use crate::federator::Federator;
use crate::paging::{PageQuery, item_id};
use crate::vocab::{Object, Reference};

/// Query parameter restricting replies to other authors.
pub const ONLY_OTHER_ACCOUNTS_KEY: &str = "only_other_accounts";

/// Parse `only_other_accounts`; absent means `true`.
pub fn parse_only_other_accounts(raw: Option<&str>) -> FederationResult<bool> {
    match raw {
        None => Ok(true),
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(other) => Err(FederationError::BadRequest(format!(
            "invalid {ONLY_OTHER_ACCOUNTS_KEY}: {other}"
        ))),
    }
}

impl Federator {
    /// The `replies` of a stored object as a root or page.
    ///
    /// With `only_other_accounts`, replies whose stored author is also the
    /// object's author are left out. Replies not stored here are kept.
    pub async fn get_replies(
        &self,
        object: &Url,
        only_other_accounts: bool,
        query: &PageQuery,
    ) -> FederationResult<PagedCollection> {
        let page = query.to_page(self.pager.limits())?;
        let value = {
            let _lock = self.lock(object).await?;
            self.db.get(object).await?
        };
        if value.is_tombstone() {
            return Err(FederationError::Gone(object.to_string()));
        }

        let mut items = self.reply_items(&value).await?;
        if only_other_accounts {
            let authors = value.iris("attributedTo");
            let mut kept = Vec::with_capacity(items.len());
            for item in items {
                if !self.is_reply_by(&item, &authors).await? {
                    kept.push(item);
                }
            }
            items = kept;
        }

        let request = CollectionRequest {
            id: replies_iri(object)?,
            extra_params: vec![(
                ONLY_OTHER_ACCOUNTS_KEY.to_string(),
                only_other_accounts.to_string(),
            )],
            style: CollectionStyle::Unordered,
            page,
            dedupe: true,
        };
        Ok(self.pager.render(&request, &items))
    }

    async fn reply_items(&self, value: &Object) -> FederationResult<Vec<Value>> {
        match value.references("replies").into_iter().next() {
            Some(Reference::Embedded(collection)) => Ok(collection.items()),
            Some(Reference::Iri(collection_id)) => {
                let _lock = self.lock(&collection_id).await?;
                match self.db.get(&collection_id).await {
                    Ok(collection) => Ok(collection.items()),
                    Err(e) if e.is_not_found() => Ok(Vec::new()),
                    Err(e) => Err(e),
                }
            }
            None => Ok(Vec::new()),
        }
    }

    async fn is_reply_by(&self, item: &Value, authors: &[Url]) -> FederationResult<bool> {
        if authors.is_empty() {
            return Ok(false);
        }
        let Some(id) = item_id(item).and_then(|id| Url::parse(&id).ok()) else {
            return Ok(false);
        };
        let _lock = self.lock(&id).await?;
        match self.db.get(&id).await {
            Ok(reply) => Ok(reply.iris("attributedTo").iter().any(|a| authors.contains(a))),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Served IRI of an object's reply thread.
pub fn replies_iri(object: &Url) -> FederationResult<Url> {
    let mut iri = object.clone();
    iri.set_query(None);
    iri.path_segments_mut()
        .map_err(|()| FederationError::BadRequest(format!("{object} cannot carry replies")))?
        .pop_if_empty()
        .push("replies");
    Ok(iri)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::collection::PagedCollection;
    use crate::database::Database;
    use crate::federator::Settings;
    use crate::processor::tests::{fixture, iri, object};

    const NOTE: &str = "https://hearth.example/objects/n1";
    const ALICE: &str = "https://hearth.example/users/alice";

    async fn seed_thread(fx: &crate::processor::tests::Fixture) {
        fx.db
            .create(&object(json!({
                "id": NOTE,
                "type": "Note",
                "attributedTo": ALICE,
                "replies": {
                    "type": "Collection",
                    "items": [
                        "https://remote.example/notes/2",
                        "https://hearth.example/objects/n3"
                    ]
                }
            })))
            .await
            .unwrap();
        fx.db
            .create(&object(json!({
                "id": "https://hearth.example/objects/n3",
                "type": "Note",
                "attributedTo": ALICE,
                "inReplyTo": NOTE
            })))
            .await
            .unwrap();
    }

    fn page_query(min_id: Option<&str>) -> PageQuery {
        PageQuery {
            min_id: min_id.map(str::to_string),
            limit: Some("40".to_string()),
            ..PageQuery::default()
        }
    }

    #[test]
    fn test_only_other_accounts_parsing() {
        assert!(parse_only_other_accounts(None).unwrap());
        assert!(!parse_only_other_accounts(Some("false")).unwrap());
        assert!(parse_only_other_accounts(Some("maybe")).is_err());
    }

    #[test]
    fn test_replies_iri() {
        assert_eq!(
            replies_iri(&iri(NOTE)).unwrap(),
            iri("https://hearth.example/objects/n1/replies")
        );
    }

    #[tokio::test]
    async fn test_replies_filter_self_replies() {
        let fx = fixture(Settings::default());
        seed_thread(&fx).await;

        let PagedCollection::Page(page) = fx
            .federator
            .get_replies(&iri(NOTE), true, &page_query(None))
            .await
            .unwrap()
        else {
            panic!("expected a page");
        };
        assert_eq!(page.page_items(), &[json!("https://remote.example/notes/2")]);
        assert_eq!(page.total_items, 1);
        assert!(page.id.as_str().contains("only_other_accounts=true"));

        let PagedCollection::Page(page) = fx
            .federator
            .get_replies(&iri(NOTE), false, &page_query(None))
            .await
            .unwrap()
        else {
            panic!("expected a page");
        };
        assert_eq!(page.total_items, 2);
    }

    #[tokio::test]
    async fn test_replies_min_id_past_newest_is_empty() {
        let fx = fixture(Settings::default());
        seed_thread(&fx).await;

        let PagedCollection::Page(page) = fx
            .federator
            .get_replies(&iri(NOTE), true, &page_query(Some("https://remote.example/notes/2")))
            .await
            .unwrap()
        else {
            panic!("expected a page");
        };
        assert!(page.page_items().is_empty());
        assert_eq!(page.total_items, 1);
        assert!(page.next.is_none());
        assert!(page.prev.is_none());
    }

    #[tokio::test]
    async fn test_replies_root_without_cursor() {
        let fx = fixture(Settings::default());
        seed_thread(&fx).await;

        let PagedCollection::Root(root) = fx
            .federator
            .get_replies(&iri(NOTE), false, &PageQuery::default())
            .await
            .unwrap()
        else {
            panic!("expected a root");
        };
        assert_eq!(root.total_items, 2);
        assert_eq!(
            root.first.as_str(),
            "https://hearth.example/objects/n1/replies?only_other_accounts=false&limit=40"
        );
    }
}
