//! Deferred filesystem setup: once the caller is authenticated the view is
//! resolved and the plugins that need it are attached.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::DavResult;
use crate::plugins::{
    ChecksumUpdatePlugin, CommentPropertiesPlugin, CopyEtagHeaderPlugin, CustomPropertiesPlugin,
    FilesPlugin, FilesReportPlugin, QuotaPlugin, SharesPlugin, TagsPlugin, ViewOnlyPlugin,
};
use crate::server::factory::DavServices;
use crate::server::{DavContext, DavRequest, DavServer, Flow, ServerPlugin};
use crate::view::ViewResolver;

/// Runs after authentication (priority 10) and before locking (50).
pub const VIEW_SETUP_PRIORITY: i32 = 30;

#[derive(Debug, Clone)]
pub struct ViewSetupPlugin {
    services: Arc<DavServices>,
    resolver: Arc<dyn ViewResolver>,
}

impl ViewSetupPlugin {
    pub fn new(services: Arc<DavServices>, resolver: Arc<dyn ViewResolver>) -> Self {
        Self { services, resolver }
    }

    fn attach_plugins(&self, ctx: &mut DavContext) {
        let services = &self.services;
        ctx.add_plugin(Arc::new(FilesPlugin::new(
            services.nodes.clone(),
            services.users.clone(),
        )));
        ctx.add_plugin(Arc::new(QuotaPlugin));
        ctx.add_plugin(Arc::new(ChecksumUpdatePlugin));
        ctx.add_plugin(Arc::new(ViewOnlyPlugin::new(
            services.sharing.allow_view_without_download,
        )));

        if ctx.is_logged_in() {
            ctx.add_plugin(Arc::new(TagsPlugin::new(services.tags.clone())));
            ctx.add_plugin(Arc::new(SharesPlugin::new(
                services.shares.clone(),
                services.nodes.clone(),
            )));
            ctx.add_plugin(Arc::new(CommentPropertiesPlugin::new(
                services.comments.clone(),
                services.nodes.clone(),
                &services.config.base_uri,
            )));
            ctx.add_plugin(Arc::new(FilesReportPlugin::new(
                services.tags.clone(),
                services.system_tags.clone(),
                services.nodes.clone(),
            )));
            ctx.add_plugin(Arc::new(CustomPropertiesPlugin::new(
                services.properties.clone(),
            )));
        }

        ctx.add_plugin(Arc::new(CopyEtagHeaderPlugin));

        for plugin in services.app_plugins.plugins(ctx) {
            ctx.add_plugin(plugin);
        }
    }
}

#[async_trait]
impl ServerPlugin for ViewSetupPlugin {
    fn name(&self) -> &'static str {
        "view-setup"
    }

    fn priority(&self) -> i32 {
        VIEW_SETUP_PRIORITY
    }

    async fn before_method(
        &self,
        _server: &DavServer,
        req: &DavRequest,
        ctx: &mut DavContext,
    ) -> DavResult<Flow> {
        if ctx.view.is_some() {
            return Ok(Flow::Continue);
        }
        let view = self.resolver.resolve(ctx).await?;
        debug!(
            owner = view.owner(),
            storage = view.storage_id(),
            path = %req.path,
            "DAV view resolved"
        );
        ctx.view = Some(Arc::new(view));
        self.attach_plugins(ctx);
        Ok(Flow::Continue)
    }
}
