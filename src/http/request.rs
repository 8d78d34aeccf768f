//! Request fact extraction.
//!
//! # Responsibilities
//! - Read Host (or the URI authority for HTTP/2), Origin and tenant headers
//! - Extract the bearer token from `Authorization`, or from the `token` query
//!   parameter outside production
//! - Identify the client by its peer IP address
//!
//! # Design Decisions
//! - Non-UTF-8 header values count as absent
//! - Forwarded-for headers are ignored; only the socket peer is trusted

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderMap, Request},
};

use crate::config::SecurityConfig;
use crate::security::{RequestContext, UNKNOWN_CLIENT};

const TOKEN_QUERY_PARAM: &str = "token";

/// Build the admission context for a request.
pub fn extract_context(req: &Request<Body>, security: &SecurityConfig) -> RequestContext {
    let headers = req.headers();

    let host = header_str(headers, header::HOST.as_str())
        .or_else(|| req.uri().authority().map(|a| a.as_str()))
        .map(String::from);

    let bearer_token = bearer_from_header(headers).or_else(|| {
        if security.production {
            None
        } else {
            token_from_query(req.uri().query())
        }
    });

    RequestContext {
        client_address: client_address(req),
        host,
        origin: header_str(headers, header::ORIGIN.as_str()).map(String::from),
        tenant_code: header_str(headers, &security.tenant_header)
            .map(|t| t.trim().to_string())
            .unwrap_or_default(),
        bearer_token,
        method: req.method().clone(),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn bearer_from_header(headers: &HeaderMap) -> Option<String> {
    let value = header_str(headers, header::AUTHORIZATION.as_str())?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}

fn token_from_query(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == TOKEN_QUERY_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|token| !token.is_empty())
}

/// Peer IP of the connection, or [`UNKNOWN_CLIENT`].
pub fn client_address(req: &Request<Body>) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
