//! HTTP listener for the WebDAV endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use percent_encoding::percent_decode_str;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing;

use nimbus_core::error::AppError;

use crate::error::DavError;
use crate::properties::build_error_xml;
use crate::server::factory::ServerFactory;
use crate::server::{DavRequest, DavResponse, xml_response};

/// Which server a request path belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `<base_uri>/files/<uid>/...`
    Home { uid: String, base_uri: String },
    /// Anything else below `<base_uri>`, served from the caller's home.
    Legacy { base_uri: String },
    /// `<public_base_uri>/files/<token>/...`
    Public { token: String, base_uri: String },
    NotFound,
}

/// Path under `prefix`, `None` when `path` is not `prefix` or below it.
fn below<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let prefix = prefix.trim_end_matches('/');
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some("")
    } else {
        rest.strip_prefix('/')
    }
}

fn first_segment(rest: &str) -> Option<String> {
    let segment = rest.split('/').next().filter(|s| !s.is_empty())?;
    percent_decode_str(segment)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

/// Map a raw request path onto its server.
pub fn route(path: &str, base_uri: &str, public_base_uri: &str) -> Route {
    let base = base_uri.trim_end_matches('/');
    let public_base = public_base_uri.trim_end_matches('/');

    if let Some(rest) = below(path, public_base).and_then(|r| below(r, "files")) {
        return match first_segment(rest) {
            Some(token) => Route::Public {
                base_uri: format!("{public_base}/files/{}", rest.split('/').next().unwrap_or_default()),
                token,
            },
            None => Route::NotFound,
        };
    }

    let Some(rest) = below(path, base) else {
        return Route::NotFound;
    };
    if let Some(files) = below(rest, "files") {
        return match first_segment(files) {
            Some(uid) => Route::Home {
                base_uri: format!("{base}/files/{}", files.split('/').next().unwrap_or_default()),
                uid,
            },
            None => Route::NotFound,
        };
    }
    Route::Legacy {
        base_uri: base.to_string(),
    }
}

/// Accepts WebDAV connections and runs each request through a fresh
/// server from the [`ServerFactory`].
#[derive(Debug)]
pub struct DavListener {
    factory: Arc<ServerFactory>,
}

impl DavListener {
    pub fn new(factory: ServerFactory) -> Self {
        Self {
            factory: Arc::new(factory),
        }
    }

    /// Serve until `cancel` flips to `true`.
    pub async fn start(&self, mut cancel: watch::Receiver<bool>) -> Result<(), AppError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.factory.services().config.port));

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::internal(format!("Failed to bind WebDAV listener: {e}")))?;

        tracing::info!("WebDAV listener on {}", addr);

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let factory = Arc::clone(&self.factory);
                            tokio::spawn(async move {
                                Self::handle_connection(factory, stream, peer_addr).await;
                            });
                        }
                        Err(e) => {
                            tracing::error!("WebDAV accept error: {}", e);
                        }
                    }
                }
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        tracing::info!("WebDAV listener shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    async fn handle_connection(
        factory: Arc<ServerFactory>,
        stream: tokio::net::TcpStream,
        peer_addr: SocketAddr,
    ) {
        let io = hyper_util::rt::TokioIo::new(stream);

        let service = hyper::service::service_fn(move |req: Request<Incoming>| {
            let factory = Arc::clone(&factory);
            async move {
                let (parts, body) = req.into_parts();
                let body = match body.collect().await {
                    Ok(collected) => collected.to_bytes(),
                    Err(e) => {
                        tracing::error!("Failed to read request body: {}", e);
                        Bytes::new()
                    }
                };

                let response = Self::dispatch(&factory, Request::from_parts(parts, body)).await;
                let (parts, body) = response.into_parts();
                Ok::<_, hyper::Error>(Response::from_parts(parts, Full::new(body)))
            }
        });

        let conn = hyper::server::conn::http1::Builder::new().serve_connection(io, service);
        if let Err(e) = conn.await {
            tracing::error!("WebDAV connection error from {}: {}", peer_addr, e);
        }
    }

    /// Route one request to a freshly assembled server.
    pub async fn dispatch(factory: &ServerFactory, req: Request<Bytes>) -> DavResponse {
        let config = &factory.services().config;
        let (parts, body) = req.into_parts();
        let uri = parts.uri.path().to_string();

        let route = route(&uri, &config.base_uri, &config.public_base_uri);
        let base_uri = match &route {
            Route::Home { base_uri, .. }
            | Route::Legacy { base_uri }
            | Route::Public { base_uri, .. } => base_uri.clone(),
            Route::NotFound => {
                return error_response(&DavError::not_found(format!("No WebDAV endpoint at {uri}")));
            }
        };

        let request = match DavRequest::new(parts.method, &uri, &base_uri, parts.headers, body) {
            Ok(request) => request,
            Err(err) => return error_response(&err),
        };

        let (is_public, auth, view) = match route {
            Route::Home { uid, .. } => (false, factory.basic_auth(), factory.home_view(Some(uid))),
            Route::Public { token, .. } => {
                (true, factory.public_share_auth(&token), factory.share_view())
            }
            _ => (false, factory.basic_auth(), factory.home_view(None)),
        };
        let server = factory.create_server(is_public, &base_uri, &request, auth, view);
        server.exec(request).await
    }
}

fn error_response(err: &DavError) -> DavResponse {
    xml_response(err.status, build_error_xml(err.exception, &err.message))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "/remote.php/dav";
    const PUBLIC: &str = "/public.php/dav";

    #[test]
    fn test_route_home() {
        assert_eq!(
            route("/remote.php/dav/files/alice/docs/a.txt", BASE, PUBLIC),
            Route::Home {
                uid: "alice".into(),
                base_uri: "/remote.php/dav/files/alice".into(),
            }
        );
        assert_eq!(
            route("/remote.php/dav/files/j%40doe", BASE, PUBLIC),
            Route::Home {
                uid: "j@doe".into(),
                base_uri: "/remote.php/dav/files/j%40doe".into(),
            }
        );
    }

    #[test]
    fn test_route_public_and_legacy() {
        assert_eq!(
            route("/public.php/dav/files/abc123/", BASE, PUBLIC),
            Route::Public {
                token: "abc123".into(),
                base_uri: "/public.php/dav/files/abc123".into(),
            }
        );
        assert_eq!(
            route("/remote.php/dav/", BASE, PUBLIC),
            Route::Legacy {
                base_uri: BASE.into()
            }
        );
    }

    #[test]
    fn test_route_not_found() {
        assert_eq!(route("/remote.php/davx", BASE, PUBLIC), Route::NotFound);
        assert_eq!(route("/remote.php/dav/files/", BASE, PUBLIC), Route::NotFound);
        assert_eq!(route("/index.php", BASE, PUBLIC), Route::NotFound);
    }
}
