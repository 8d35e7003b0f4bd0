//! Comment counters on files (`oc:comments-href`, `oc:comments-count`,
//! `oc:comments-unread`).

use std::sync::Arc;

use async_trait::async_trait;

use nimbus_core::result::AppResult;
use nimbus_database::traits::NodeLookup;

use crate::error::DavResult;
use crate::methods::PropFind;
use crate::plugins::files::node_for;
use crate::properties::{PropName, PropValue};
use crate::server::{DavContext, ServerPlugin};
use crate::view::DavEntry;

/// Source of comment statistics for a file id.
#[async_trait]
pub trait CommentCounter: Send + Sync + std::fmt::Debug {
    async fn count(&self, file_id: i64) -> AppResult<u64>;

    async fn unread(&self, uid: &str, file_id: i64) -> AppResult<u64>;
}

/// Counter for installations without the comments app.
#[derive(Debug, Clone, Default)]
pub struct NoComments;

#[async_trait]
impl CommentCounter for NoComments {
    async fn count(&self, _file_id: i64) -> AppResult<u64> {
        Ok(0)
    }

    async fn unread(&self, _uid: &str, _file_id: i64) -> AppResult<u64> {
        Ok(0)
    }
}

#[derive(Debug, Clone)]
pub struct CommentPropertiesPlugin {
    counter: Arc<dyn CommentCounter>,
    nodes: Arc<dyn NodeLookup>,
    /// Root of the comments collection, e.g. `/remote.php/dav/comments/files/`.
    comments_root: String,
}

impl CommentPropertiesPlugin {
    pub fn new(
        counter: Arc<dyn CommentCounter>,
        nodes: Arc<dyn NodeLookup>,
        dav_base_uri: &str,
    ) -> Self {
        Self {
            counter,
            nodes,
            comments_root: format!("{}/comments/files/", dav_base_uri.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl ServerPlugin for CommentPropertiesPlugin {
    fn name(&self) -> &'static str {
        "comment-properties"
    }

    async fn propfind(
        &self,
        ctx: &DavContext,
        entry: &DavEntry,
        props: &mut PropFind,
    ) -> DavResult<()> {
        let href = PropName::oc("comments-href");
        let count = PropName::oc("comments-count");
        let unread = PropName::oc("comments-unread");
        if !props.wants(&href) && !props.wants(&count) && !props.wants(&unread) {
            return Ok(());
        }
        let Ok(view) = ctx.view() else {
            return Ok(());
        };
        // Comments hang off file ids.
        let Some(node) = node_for(self.nodes.as_ref(), view, &entry.path).await? else {
            return Ok(());
        };

        props.set(href, PropValue::text(format!("{}{}", self.comments_root, node.id)));
        if props.wants(&count) {
            let total = self.counter.count(node.id).await?;
            props.set(count, PropValue::text(total.to_string()));
        }
        if props.wants(&unread) {
            if let Some(uid) = ctx.uid() {
                let unread_count = self.counter.unread(uid, node.id).await?;
                props.set(unread, PropValue::text(unread_count.to_string()));
            }
        }
        Ok(())
    }
}
