// Per-request client metadata shared by route stages and controller actions

use axum::{
    extract::{ConnectInfo, FromRequestParts, OriginalUri},
    http::{request::Parts, Extensions, HeaderMap, Uri},
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt, UserAgent};
use std::convert::Infallible;
use std::net::SocketAddr;

use crate::middleware::auth::AuthenticatedUser;

/// Where the client address is read from. `build_router` places it in the
/// request extensions; absent means `Peer`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClientIpSource {
    /// Socket peer only, forwarded headers are ignored
    #[default]
    Peer,
    /// `X-Forwarded-For` first hop, then `X-Real-IP`, then the socket peer.
    /// Only correct behind a proxy that overwrites both headers.
    Forwarded,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub bearer_token: Option<String>,
    /// Set once the authenticate stage has accepted the request
    pub user: Option<AuthenticatedUser>,
}

impl RequestContext {
    pub fn capture(headers: &HeaderMap, extensions: &Extensions) -> Self {
        Self {
            ip_address: client_ip(headers, extensions),
            user_agent: headers
                .typed_get::<UserAgent>()
                .map(|ua| ua.as_str().to_string()),
            bearer_token: headers
                .typed_get::<Authorization<Bearer>>()
                .map(|auth| auth.token().to_string()),
            user: extensions.get::<AuthenticatedUser>().cloned(),
        }
    }
}

/// Path as the client sent it, before any router nesting stripped the prefix
pub fn original_path(uri: &Uri, extensions: &Extensions) -> String {
    extensions
        .get::<OriginalUri>()
        .map(|OriginalUri(original)| original.path().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> Option<String> {
    let peer = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    match extensions.get::<ClientIpSource>().copied().unwrap_or_default() {
        ClientIpSource::Peer => peer,
        ClientIpSource::Forwarded => forwarded_ip(headers).or(peer),
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(forwarded) = header_value("x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|v| !v.is_empty()) {
            return Some(first.to_string());
        }
    }

    header_value("x-real-ip").map(str::to_string)
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::capture(&parts.headers, &parts.extensions))
    }
}
