//! Dead properties: anything a client PROPPATCHes that no other plugin owns.

use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;

use nimbus_database::traits::PropertyStore;

use crate::error::DavResult;
use crate::methods::{PropFind, PropPatch};
use crate::properties::{PropName, PropValue, PropfindRequest};
use crate::server::{DavContext, DavRequest, DavResponse, ServerPlugin};
use crate::view::DavEntry;

/// Runs after the built-in plugins so their properties are never stored.
const CUSTOM_PROPERTIES_PRIORITY: i32 = 150;

#[derive(Debug, Clone)]
pub struct CustomPropertiesPlugin {
    store: Arc<dyn PropertyStore>,
}

impl CustomPropertiesPlugin {
    pub fn new(store: Arc<dyn PropertyStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ServerPlugin for CustomPropertiesPlugin {
    fn name(&self) -> &'static str {
        "custom-properties"
    }

    fn priority(&self) -> i32 {
        CUSTOM_PROPERTIES_PRIORITY
    }

    async fn propfind(
        &self,
        ctx: &DavContext,
        entry: &DavEntry,
        props: &mut PropFind,
    ) -> DavResult<()> {
        let (Some(uid), Ok(view)) = (ctx.uid(), ctx.view()) else {
            return Ok(());
        };
        // Dead properties are only returned when asked for by name.
        if !matches!(props.request(), PropfindRequest::Prop(_)) {
            return Ok(());
        }

        let stored = self.store.get(uid, &view.storage_path(&entry.path)).await?;
        for (clark, value) in stored {
            if let Some(name) = PropName::parse_clark(&clark) {
                let value = if value.trim_start().starts_with('<') {
                    PropValue::Xml(value)
                } else {
                    PropValue::Text(value)
                };
                props.set(name, value);
            }
        }
        Ok(())
    }

    async fn proppatch(
        &self,
        ctx: &DavContext,
        entry: &DavEntry,
        patch: &mut PropPatch,
    ) -> DavResult<()> {
        let (Some(uid), Ok(view)) = (ctx.uid(), ctx.view()) else {
            return Ok(());
        };
        let path = view.storage_path(&entry.path);

        for op in patch.pending() {
            let clark = op.name.clark();
            match &op.value {
                Some(value) => self.store.set(uid, &path, &clark, &value.value()).await?,
                None => {
                    self.store.remove(uid, &path, &clark).await?;
                }
            }
            patch.handle(&op.name, StatusCode::OK);
        }
        Ok(())
    }

    async fn after_method(
        &self,
        req: &DavRequest,
        ctx: &DavContext,
        response: &mut DavResponse,
    ) -> DavResult<()> {
        let (Some(uid), Some(view)) = (ctx.uid(), ctx.view.as_ref()) else {
            return Ok(());
        };
        if !response.status().is_success() {
            return Ok(());
        }
        match req.method.as_str() {
            "DELETE" => {
                self.store.delete_path(uid, &view.storage_path(&req.path)).await?;
            }
            "MOVE" => {
                let destination = req.destination(&ctx.base_uri)?;
                let target = view.storage_path(&destination);
                // Properties of an overwritten destination go with it.
                self.store.delete_path(uid, &target).await?;
                self.store
                    .move_path(uid, &view.storage_path(&req.path), &target)
                    .await?;
            }
            _ => {}
        }
        Ok(())
    }
}
