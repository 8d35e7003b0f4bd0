//! Assembles a [`DavServer`] per request.

use std::path::PathBuf;
use std::sync::Arc;

use nimbus_auth::Authenticator;
use nimbus_core::config::dav::DavConfig;
use nimbus_core::config::sharing::SharingConfig;
use nimbus_database::traits::{NodeLookup, PropertyStore, SystemTagMapper, TagStore, UserBackend};
use nimbus_service::ShareProvider;

use crate::auth::{BasicAuthPlugin, PublicShareAuthPlugin};
use crate::plugins::{
    AnonymousOptionsPlugin, BlockLegacyClientPlugin, BrowserErrorPagePlugin, CommentCounter,
    DummyGetResponsePlugin, ExceptionLoggerPlugin, FakeLockerPlugin, LockPlugin,
    MaintenancePlugin, NoComments, RequestIdHeaderPlugin, ViewSetupPlugin,
};
use crate::server::lock::LockManager;
use crate::server::{DavContext, DavRequest, DavServer, ServerPlugin};
use crate::view::{HomeViewResolver, ShareViewResolver, ViewResolver};

/// Plugins contributed by installed apps, attached after the view is set up.
pub trait AppPluginSource: Send + Sync + std::fmt::Debug {
    fn plugins(&self, ctx: &DavContext) -> Vec<Arc<dyn ServerPlugin>>;
}

#[derive(Debug, Clone, Default)]
pub struct NoAppPlugins;

impl AppPluginSource for NoAppPlugins {
    fn plugins(&self, _ctx: &DavContext) -> Vec<Arc<dyn ServerPlugin>> {
        Vec::new()
    }
}

/// A fixed plugin list handed to every request.
#[derive(Debug, Clone, Default)]
pub struct StaticAppPlugins {
    plugins: Vec<Arc<dyn ServerPlugin>>,
}

impl StaticAppPlugins {
    pub fn new(plugins: Vec<Arc<dyn ServerPlugin>>) -> Self {
        Self { plugins }
    }
}

impl AppPluginSource for StaticAppPlugins {
    fn plugins(&self, _ctx: &DavContext) -> Vec<Arc<dyn ServerPlugin>> {
        self.plugins.clone()
    }
}

/// Long-lived collaborators of the DAV plugins.
#[derive(Debug, Clone)]
pub struct DavServices {
    pub config: DavConfig,
    pub sharing: SharingConfig,
    pub authenticator: Authenticator,
    pub shares: Arc<ShareProvider>,
    pub nodes: Arc<dyn NodeLookup>,
    pub users: Arc<dyn UserBackend>,
    pub properties: Arc<dyn PropertyStore>,
    pub tags: Arc<dyn TagStore>,
    pub system_tags: Arc<dyn SystemTagMapper>,
    pub comments: Arc<dyn CommentCounter>,
    pub app_plugins: Arc<dyn AppPluginSource>,
    pub locks: LockManager,
}

impl DavServices {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: DavConfig,
        sharing: SharingConfig,
        shares: Arc<ShareProvider>,
        users: Arc<dyn UserBackend>,
        nodes: Arc<dyn NodeLookup>,
        properties: Arc<dyn PropertyStore>,
        tags: Arc<dyn TagStore>,
        system_tags: Arc<dyn SystemTagMapper>,
    ) -> Self {
        Self {
            config,
            sharing,
            authenticator: Authenticator::new(users.clone()),
            shares,
            nodes,
            users,
            properties,
            tags,
            system_tags,
            comments: Arc::new(NoComments),
            app_plugins: Arc::new(NoAppPlugins),
            locks: LockManager::new(),
        }
    }

    pub fn with_comments(mut self, comments: Arc<dyn CommentCounter>) -> Self {
        self.comments = comments;
        self
    }

    pub fn with_app_plugins(mut self, app_plugins: Arc<dyn AppPluginSource>) -> Self {
        self.app_plugins = app_plugins;
        self
    }
}

/// Builds one server per request with the plugin chain in its fixed order.
#[derive(Debug, Clone)]
pub struct ServerFactory {
    services: Arc<DavServices>,
}

impl ServerFactory {
    pub fn new(services: DavServices) -> Self {
        Self {
            services: Arc::new(services),
        }
    }

    pub fn services(&self) -> &DavServices {
        &self.services
    }

    /// Server for `request`, mounted at `base_uri`. `auth_plugin`
    /// authenticates the caller; `view_callback` resolves the file tree
    /// once that succeeded.
    pub fn create_server(
        &self,
        is_public_share: bool,
        base_uri: &str,
        request: &DavRequest,
        auth_plugin: Arc<dyn ServerPlugin>,
        view_callback: Arc<dyn ViewResolver>,
    ) -> DavServer {
        let config = &self.services.config;
        let mut server = DavServer::new(base_uri, is_public_share);

        server.add_plugin(Arc::new(MaintenancePlugin::new(config.maintenance)));
        server.add_plugin(Arc::new(BlockLegacyClientPlugin::new(
            config.minimum_supported_desktop_version.clone(),
        )));
        server.add_plugin(Arc::new(AnonymousOptionsPlugin));
        server.add_plugin(auth_plugin);
        server.add_plugin(Arc::new(DummyGetResponsePlugin));
        server.add_plugin(Arc::new(ExceptionLoggerPlugin::new("webdav")));
        server.add_plugin(Arc::new(LockPlugin::new(self.services.locks.clone())));
        server.add_plugin(Arc::new(RequestIdHeaderPlugin));

        // Finder, OneNote and the Windows mini-redirector refuse to write
        // without LOCK support.
        if FakeLockerPlugin::wanted_by(request.user_agent()) {
            server.add_plugin(Arc::new(FakeLockerPlugin));
        }
        if BrowserErrorPagePlugin::is_browser_request(request) {
            server.add_plugin(Arc::new(BrowserErrorPagePlugin));
        }

        server.add_plugin(Arc::new(ViewSetupPlugin::new(
            self.services.clone(),
            view_callback,
        )));
        server
    }

    pub fn basic_auth(&self) -> Arc<dyn ServerPlugin> {
        Arc::new(BasicAuthPlugin::new(
            self.services.authenticator.clone(),
            self.services.config.auth_realm.clone(),
        ))
    }

    pub fn public_share_auth(&self, token: &str) -> Arc<dyn ServerPlugin> {
        Arc::new(PublicShareAuthPlugin::new(
            self.services.shares.clone(),
            self.services.config.auth_realm.clone(),
            token,
        ))
    }

    fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.services.config.data_dir)
    }

    /// Home tree resolver; `url_owner` is the account named in the URL.
    pub fn home_view(&self, url_owner: Option<String>) -> Arc<dyn ViewResolver> {
        Arc::new(HomeViewResolver::new(
            self.data_dir(),
            self.services.config.quota_bytes,
            url_owner,
        ))
    }

    pub fn share_view(&self) -> Arc<dyn ViewResolver> {
        Arc::new(ShareViewResolver::new(
            self.data_dir(),
            self.services.nodes.clone(),
        ))
    }

    /// Server for `<base_uri>/files/<uid>`.
    pub fn home_server(&self, uid: &str, request: &DavRequest) -> DavServer {
        let base_uri = format!("{}/files/{uid}", self.services.config.base_uri);
        self.create_server(
            false,
            &base_uri,
            request,
            self.basic_auth(),
            self.home_view(Some(uid.to_string())),
        )
    }

    /// Server for `<public_base_uri>/files/<token>`.
    pub fn public_server(&self, token: &str, request: &DavRequest) -> DavServer {
        let base_uri = format!("{}/files/{token}", self.services.config.public_base_uri);
        self.create_server(
            true,
            &base_uri,
            request,
            self.public_share_auth(token),
            self.share_view(),
        )
    }
}
