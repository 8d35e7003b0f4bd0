//! `oc:share-types`: which kinds of shares the caller created on an item.

use std::sync::Arc;

use async_trait::async_trait;

use nimbus_database::traits::NodeLookup;
use nimbus_entity::share::ShareType;
use nimbus_service::ShareProvider;

use crate::error::DavResult;
use crate::methods::PropFind;
use crate::plugins::files::node_for;
use crate::properties::{PropName, PropValue};
use crate::server::{DavContext, ServerPlugin};
use crate::view::DavEntry;

#[derive(Debug, Clone)]
pub struct SharesPlugin {
    shares: Arc<ShareProvider>,
    nodes: Arc<dyn NodeLookup>,
}

impl SharesPlugin {
    pub fn new(shares: Arc<ShareProvider>, nodes: Arc<dyn NodeLookup>) -> Self {
        Self { shares, nodes }
    }
}

#[async_trait]
impl ServerPlugin for SharesPlugin {
    fn name(&self) -> &'static str {
        "shares"
    }

    async fn propfind(
        &self,
        ctx: &DavContext,
        entry: &DavEntry,
        props: &mut PropFind,
    ) -> DavResult<()> {
        let name = PropName::oc("share-types");
        if !props.wants(&name) {
            return Ok(());
        }
        let (Some(uid), Ok(view)) = (ctx.uid(), ctx.view()) else {
            return Ok(());
        };

        let mut xml = String::new();
        if let Some(node) = node_for(self.nodes.as_ref(), view, &entry.path).await? {
            for share_type in ShareType::PUBLIC_TYPES {
                let shares = self
                    .shares
                    .get_shares_by(uid, share_type, Some(node.id), false, 1, 0)
                    .await?;
                if !shares.is_empty() {
                    xml.push_str(&format!("<oc:share-type>{}</oc:share-type>", share_type.code()));
                }
            }
        }
        props.set(name, PropValue::Xml(xml));
        Ok(())
    }
}
