//! Logs errors raised while serving a request.

use async_trait::async_trait;
use tracing::{debug, error};

use crate::error::DavError;
use crate::server::{DavContext, DavRequest, ServerPlugin};

/// Client-side conditions log at `debug`, server faults at `error`.
#[derive(Debug, Clone)]
pub struct ExceptionLoggerPlugin {
    app: &'static str,
}

impl ExceptionLoggerPlugin {
    pub fn new(app: &'static str) -> Self {
        Self { app }
    }
}

#[async_trait]
impl ServerPlugin for ExceptionLoggerPlugin {
    fn name(&self) -> &'static str {
        "exception-logger"
    }

    fn on_exception(&self, req: &DavRequest, ctx: &DavContext, err: &DavError) {
        if err.is_expected() {
            debug!(
                app = self.app,
                method = %req.method,
                path = %req.path,
                status = err.status.as_u16(),
                exception = err.exception,
                request_id = %ctx.request_id,
                "{}",
                err.message
            );
        } else {
            error!(
                app = self.app,
                method = %req.method,
                path = %req.path,
                status = err.status.as_u16(),
                exception = err.exception,
                request_id = %ctx.request_id,
                uid = ctx.uid().unwrap_or_default(),
                "{}",
                err.message
            );
        }
    }
}
