//! Filtered, cursor-paginated listing.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use storedge_core::{AppError, OwnerId, Tag};
use storedge_db::{Catalog, Cursor, ListQuery, Page};

use crate::context::RequestContext;

/// Listing parameters as supplied by a caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListRequest {
    pub owner_id: Option<String>,
    pub tag: Option<String>,
    /// Case-insensitive substring of the name. Blank means no filter.
    pub query: Option<String>,
    /// 0 selects the default page size.
    #[serde(default)]
    pub limit: u32,
    pub cursor: Option<String>,
}

impl ListRequest {
    pub fn to_query(&self) -> Result<ListQuery, AppError> {
        let owner_id = self.owner_id.as_deref().map(OwnerId::parse).transpose()?;
        let tag = self.tag.as_deref().map(Tag::parse).transpose()?;
        let query = self
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string);
        let after = self.cursor.as_deref().map(Cursor::decode).transpose()?;

        Ok(ListQuery {
            owner_id,
            tag,
            query,
            limit: self.limit,
            after,
        })
    }
}

#[derive(Clone)]
pub struct ListingService {
    catalog: Arc<dyn Catalog>,
}

impl ListingService {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    #[tracing::instrument(skip(self, ctx))]
    pub async fn list(&self, ctx: &RequestContext, request: &ListRequest) -> Result<Page, AppError> {
        let query = request.to_query()?;
        let page = ctx.run("list", self.catalog.list(&query)).await?;
        tracing::debug!(
            items = page.items.len(),
            has_more = page.next_cursor.is_some(),
            "Listed files"
        );
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storedge_core::{FieldName, Reason};

    #[test]
    fn test_blank_filters_are_dropped() {
        let query = ListRequest {
            query: Some("   ".to_string()),
            ..ListRequest::default()
        }
        .to_query()
        .unwrap();
        assert!(query.query.is_none());
        assert!(query.owner_id.is_none());
        assert!(query.after.is_none());
    }

    #[test]
    fn test_bad_cursor_and_tag_rejected() {
        let err = ListRequest {
            cursor: Some("not a cursor".to_string()),
            ..ListRequest::default()
        }
        .to_query()
        .unwrap_err();
        assert!(err.is_invalid(FieldName::Cursor, Reason::BadFormat));

        let err = ListRequest {
            tag: Some("Bad Tag".to_string()),
            ..ListRequest::default()
        }
        .to_query()
        .unwrap_err();
        assert!(matches!(err, AppError::Invalid { field: FieldName::Tags, .. }));
    }
}
