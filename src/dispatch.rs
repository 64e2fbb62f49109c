//! Request entry point: access guard, authentication, method routing and the
//! outermost error boundary.

use std::panic::AssertUnwindSafe;
use std::str::FromStr;

use actix_web::{
    HttpRequest, HttpResponse, ResponseError,
    http::header::{self, HeaderValue},
    web,
};
use futures::FutureExt;
use log::{debug, error, warn};
use strum::{Display, EnumString};

use crate::auth::{AuthOutcome, authenticate};
use crate::config::{ConfigStore, DavConfig};
use crate::consts::{ALLOWED_METHODS, CORS_ALLOWED_HEADERS, METHOD_OVERRIDE_HEADER};
use crate::errors::{self, RuntimeError};
use crate::guard::{AccessGuard, FailureOutcome};
use crate::handlers;
use crate::locks::LockManager;
use crate::props::PropertyStore;

/// Everything the server shares between requests.
pub struct DavState {
    pub config: ConfigStore,
    pub guard: AccessGuard,
    pub locks: LockManager,
    pub props: PropertyStore,
}

impl DavState {
    pub fn new(config: DavConfig) -> Self {
        Self {
            config: ConfigStore::new(config),
            guard: AccessGuard::new(),
            locks: LockManager::new(),
            props: PropertyStore::new(),
        }
    }
}

/// Verbs the dispatcher routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum DavMethod {
    Get,
    Put,
    Delete,
    Options,
    Propfind,
    Proppatch,
    Mkcol,
    Copy,
    Move,
    Lock,
    Unlock,
}

/// Map the request onto a [`DavMethod`].
///
/// GET, PUT, DELETE and OPTIONS are taken as is. Anything else is looked up by the
/// `method` override header if present, by the raw verb otherwise, and must name one
/// of the DAV extension methods.
pub fn resolve_method(req: &HttpRequest) -> Result<DavMethod, RuntimeError> {
    match req.method().as_str() {
        "GET" => return Ok(DavMethod::Get),
        "PUT" => return Ok(DavMethod::Put),
        "DELETE" => return Ok(DavMethod::Delete),
        "OPTIONS" => return Ok(DavMethod::Options),
        _ => (),
    }

    let name = req
        .headers()
        .get(METHOD_OVERRIDE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .unwrap_or_else(|| req.method().as_str());

    match DavMethod::from_str(name) {
        Ok(
            DavMethod::Get | DavMethod::Put | DavMethod::Delete | DavMethod::Options,
        )
        | Err(_) => Err(RuntimeError::MethodNotAllowed(name.to_string())),
        Ok(method) => Ok(method),
    }
}

/// Client address: `x-real-ip`, else the first `x-forwarded-for` hop, else the peer.
pub fn client_ip(req: &HttpRequest) -> String {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    header("x-real-ip")
        .or_else(|| header("x-forwarded-for"))
        .or_else(|| req.peer_addr().map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Access guard and authenticator, in that order.
fn check_access(
    req: &HttpRequest,
    state: &DavState,
    config: &DavConfig,
    ip: &str,
) -> Result<(), RuntimeError> {
    if state.guard.is_blocked(ip, config.block_duration) {
        warn!(target: "security", "Rejected request from blocked {ip}");
        return Err(RuntimeError::AccessDenied(ip.to_string()));
    }
    if !state.guard.is_allowed(ip, &config.whitelist) {
        return Err(RuntimeError::AccessDenied(ip.to_string()));
    }

    match authenticate(
        req.headers().get(header::AUTHORIZATION),
        config.required_auth.as_ref(),
        config.allow_anonymous,
    ) {
        AuthOutcome::AnonymousAllowed => Ok(()),
        AuthOutcome::Authenticated(username) => {
            debug!(target: "security", "{ip} authenticated as {username}");
            state.guard.record_success(ip);
            Ok(())
        }
        AuthOutcome::Rejected => {
            match state.guard.record_failure(ip, config.max_failed_attempts) {
                FailureOutcome::Blocked => warn!(
                    target: "security",
                    "{ip} is blocked for {}s",
                    config.block_duration.as_secs()
                ),
                FailureOutcome::Counted(count) => debug!(
                    target: "security",
                    "{ip} has {} attempt(s) left",
                    config.max_failed_attempts.saturating_sub(count)
                ),
            }
            Err(RuntimeError::AuthRejected)
        }
    }
}

async fn handle(
    req: &HttpRequest,
    payload: web::Payload,
    state: &DavState,
    config: &DavConfig,
    ip: &str,
) -> Result<HttpResponse, RuntimeError> {
    check_access(req, state, config, ip)?;

    let method = resolve_method(req)?;
    debug!(target: "dav", "{method} {} from {ip}", req.uri().path());

    let root = config.path.as_path();
    match method {
        DavMethod::Get => handlers::get(req, root).await,
        DavMethod::Put => handlers::put(req, payload, root).await,
        DavMethod::Delete => handlers::delete(req, state, root).await,
        DavMethod::Options => Ok(handlers::options()),
        DavMethod::Propfind => handlers::propfind(req, state, root).await,
        DavMethod::Proppatch => handlers::proppatch(req, state, root),
        DavMethod::Mkcol => handlers::mkcol(req, root).await,
        DavMethod::Copy => handlers::copy(req, root).await,
        DavMethod::Move => handlers::r#move(req, state, root).await,
        DavMethod::Lock => handlers::lock(req, state, root),
        DavMethod::Unlock => handlers::unlock(req, state, root),
    }
}

fn add_cors_headers(response: &mut HttpResponse) {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(CORS_ALLOWED_HEADERS),
    );
}

/// Run a handler future, turning errors and panics into responses.
async fn respond<F>(req: &HttpRequest, handling: F) -> HttpResponse
where
    F: Future<Output = Result<HttpResponse, RuntimeError>>,
{
    match AssertUnwindSafe(handling).catch_unwind().await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            if e.status_code().is_server_error() {
                errors::log_error_chain(format!(
                    "{} {} failed: {e}",
                    req.method(),
                    req.uri().path()
                ));
            } else {
                debug!(target: "dav", "{} {}: {e}", req.method(), req.uri().path());
            }
            e.error_response()
        }
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_default();
            error!(
                target: "dav",
                "Handler for {} {} panicked: {reason}",
                req.method(),
                req.uri().path()
            );
            RuntimeError::Internal(reason).error_response()
        }
    }
}

/// The one service of the server. Never fails: errors and panics become responses.
pub async fn dispatch(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<DavState>,
) -> HttpResponse {
    let config = state.config.snapshot();
    let ip = client_ip(&req);

    let mut response = respond(&req, handle(&req, payload, &state, &config, &ip)).await;

    if config.enable_cors && response.status().is_success() {
        add_cors_headers(&mut response);
    }
    response
}
