use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use log::debug;
use warp::http::header::{self, HeaderMap, HeaderValue};
use warp::http::Method;
use warp::path::FullPath;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use super::handlers::{ApiContext, ApiReply, CapturedRequest, DefaultSite};

const JSON_UTF8: &str = "application/json; charset=utf-8";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

/// Largest request body the catch-all route records.
pub const MAX_CAPTURED_BODY: usize = 4 * 1024 * 1024;

fn with_context(
    ctx: Arc<ApiContext>,
) -> impl Filter<Extract = (Arc<ApiContext>,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

fn with_origin(origin: HeaderValue) -> impl Filter<Extract = (HeaderValue,), Error = Infallible> + Clone {
    warp::any().map(move || origin.clone())
}

fn endpoint(name: &'static str) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::path(name).and(warp::path::end())
}

/// Turns an [`ApiReply`] into a response carrying the CORS headers.
pub fn api_response(reply: ApiReply, origin: &HeaderValue) -> Response {
    let mut response = match reply.body {
        Some(body) => {
            let mut response = body.to_string().into_response();
            let headers = response.headers_mut();
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_UTF8));
            headers.insert(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            );
            response
        }
        None => reply.status.into_response(),
    };
    *response.status_mut() = reply.status;

    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    response
}

fn authorization(headers: &HeaderMap) -> Option<&[u8]> {
    headers.get(header::AUTHORIZATION).map(HeaderValue::as_bytes)
}

/// Mounts `handler` at `/<name>`.
///
/// Once the path matches, a rejection from `handler` (unreadable body or
/// query) becomes a `400` behind the same auth check, so the request never
/// reaches the catch-all route.
fn api_endpoint<F>(
    name: &'static str,
    handler: F,
    ctx: Arc<ApiContext>,
    origin: HeaderValue,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone
where
    F: Filter<Extract = (ApiReply,), Error = Rejection> + Clone + Send + Sync + 'static,
{
    let unreadable = warp::header::headers_cloned()
        .and(with_context(ctx))
        .map(|headers: HeaderMap, ctx: Arc<ApiContext>| {
            ctx.unreadable_request(authorization(&headers))
        });

    endpoint(name)
        .and(handler.or(unreadable).unify())
        .and(with_origin(origin))
        .map(|reply: ApiReply, origin: HeaderValue| api_response(reply, &origin))
}

/// `/register`, `/deregister`, `/poll` and `/metrics`, plus their CORS
/// preflight.
pub fn api_routes(
    ctx: Arc<ApiContext>,
    origin: HeaderValue,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let preflight = warp::options()
        .and(
            endpoint("register")
                .or(endpoint("deregister"))
                .unify()
                .or(endpoint("poll"))
                .unify()
                .or(endpoint("metrics"))
                .unify(),
        )
        .and(with_origin(origin.clone()))
        .map(|origin: HeaderValue| api_response(ApiReply::preflight(), &origin));

    let register = warp::header::headers_cloned()
        .and(warp::body::bytes())
        .and(with_context(ctx.clone()))
        .map(|headers: HeaderMap, body: Bytes, ctx: Arc<ApiContext>| {
            ctx.guarded(authorization(&headers), |c| c.register(&body))
        });

    let deregister = warp::header::headers_cloned()
        .and(warp::body::bytes())
        .and(with_context(ctx.clone()))
        .map(|headers: HeaderMap, body: Bytes, ctx: Arc<ApiContext>| {
            ctx.guarded(authorization(&headers), |c| c.deregister(&body))
        });

    let poll = warp::header::headers_cloned()
        .and(warp::query::<HashMap<String, String>>())
        .and(with_context(ctx.clone()))
        .map(
            |headers: HeaderMap, query: HashMap<String, String>, ctx: Arc<ApiContext>| {
                ctx.guarded(authorization(&headers), |c| c.poll(&query))
            },
        );

    // Nothing in here can reject once the path matched.
    let metrics = endpoint("metrics")
        .and(warp::header::headers_cloned())
        .and(with_context(ctx.clone()))
        .and(with_origin(origin.clone()))
        .map(
            |headers: HeaderMap, ctx: Arc<ApiContext>, origin: HeaderValue| {
                api_response(
                    ctx.guarded(authorization(&headers), ApiContext::metrics),
                    &origin,
                )
            },
        );

    preflight
        .or(api_endpoint("register", register, ctx.clone(), origin.clone()))
        .unify()
        .or(api_endpoint("deregister", deregister, ctx.clone(), origin.clone()))
        .unify()
        .or(api_endpoint("poll", poll, ctx, origin))
        .unify()
        .or(metrics)
        .unify()
}

/// Copies at most `limit` bytes of a request body and leaves the rest
/// unread. A read error ends the body where it stopped.
pub async fn read_capped<S, B, E>(stream: S, limit: usize) -> Bytes
where
    S: Stream<Item = Result<B, E>>,
    B: Buf,
    E: std::fmt::Display,
{
    futures_util::pin_mut!(stream);
    let mut body = BytesMut::new();
    while body.len() < limit {
        match stream.next().await {
            Some(Ok(mut chunk)) => {
                while chunk.has_remaining() && body.len() < limit {
                    let part = chunk.chunk();
                    let take = part.len().min(limit - body.len());
                    body.extend_from_slice(&part[..take]);
                    chunk.advance(take);
                }
            }
            Some(Err(e)) => {
                debug!("Request body read failed: {}", e);
                break;
            }
            None => break,
        }
    }
    body.freeze()
}

async fn captured_body<S, B, E>(stream: S) -> Result<Bytes, Rejection>
where
    S: Stream<Item = Result<B, E>>,
    B: Buf,
    E: std::fmt::Display,
{
    Ok(read_capped(stream, MAX_CAPTURED_BODY).await)
}

/// Catch-all route answering with the reflection page.
pub fn default_route(
    site: Arc<DefaultSite>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let server = HeaderValue::from_str(site.domain())
        .unwrap_or_else(|_| HeaderValue::from_static(env!("CARGO_PKG_NAME")));

    warp::method()
        .and(warp::path::full())
        .and(
            warp::query::raw()
                .map(Some)
                .or(warp::any().map(|| None))
                .unify(),
        )
        .and(warp::header::headers_cloned())
        .and(warp::addr::remote())
        .and(warp::body::stream().and_then(captured_body))
        .map(
            move |method: Method,
                  path: FullPath,
                  query: Option<String>,
                  headers: HeaderMap,
                  remote: Option<SocketAddr>,
                  body: Bytes| {
                let target = match query {
                    Some(query) => format!("{}?{}", path.as_str(), query),
                    None => path.as_str().to_string(),
                };
                let request = CapturedRequest {
                    method,
                    target,
                    headers,
                    remote,
                    body,
                };
                let (page, _) = site.capture(&request);

                let mut response = page.body.into_response();
                let headers = response.headers_mut();
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static(page.content_type),
                );
                headers.insert(header::SERVER, server.clone());
                response
            },
        )
}

/// The API routes first, everything else to the catch-all.
pub fn routes(
    api: Arc<ApiContext>,
    site: Arc<DefaultSite>,
    origin: HeaderValue,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    api_routes(api, origin).or(default_route(site)).unify()
}

/// Parses the configured CORS origin.
pub fn origin_header(origin_url: &str) -> Result<HeaderValue, header::InvalidHeaderValue> {
    HeaderValue::from_str(origin_url)
}
