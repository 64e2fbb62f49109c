//! One handler per DAV method. The dispatcher has already checked access and
//! credentials when these run.

use std::io::ErrorKind;
use std::path::Path;

use actix_files::NamedFile;
use actix_web::{HttpRequest, HttpResponse, http::StatusCode, http::header, web};
use log::{debug, error, info};

use crate::consts::{ALLOWED_METHODS, DAV_COMPLIANCE, DAV_XML_CONTENT_TYPE};
use crate::dav_xml::{self, PropEntry};
use crate::dispatch::DavState;
use crate::errors::RuntimeError;
use crate::file_op;
use crate::file_utils::{Resource, content_type_for, resolve_destination, resolve_path};
use crate::listing::{self, Entry};
use crate::path_utils::encode_href;
use crate::renderer;

/// Resolve the request target against `root`
fn target(req: &HttpRequest, root: &Path) -> Result<Resource, RuntimeError> {
    resolve_path(root, req.uri().path())
}

/// Metadata of an existing resource, `NotFound` otherwise
async fn stat(resource: &Resource) -> Result<std::fs::Metadata, RuntimeError> {
    tokio::fs::metadata(&resource.path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => RuntimeError::NotFound(resource.href.clone()),
        _ => RuntimeError::IoError(format!("Failed to stat {}", resource.path.display()), e),
    })
}

fn header_str<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn destination(req: &HttpRequest, root: &Path) -> Result<Resource, RuntimeError> {
    let destination = header_str(req, "Destination")
        .ok_or_else(|| RuntimeError::BadRequest("missing Destination header".to_string()))?;
    resolve_destination(root, destination)
}

fn multistatus(body: Vec<u8>) -> HttpResponse {
    HttpResponse::build(StatusCode::MULTI_STATUS)
        .content_type(DAV_XML_CONTENT_TYPE)
        .body(body)
}

/// Directory listing or file contents
pub async fn get(req: &HttpRequest, root: &Path) -> Result<HttpResponse, RuntimeError> {
    let resource = target(req, root)?;
    let metadata = stat(&resource).await?;

    if metadata.is_dir() {
        let entries = listing::read_entries(&resource).await?;
        let page = renderer::page(
            &resource.href,
            resource.parent_href().as_deref(),
            &entries,
        );
        return Ok(HttpResponse::Ok()
            .content_type(mime::TEXT_HTML_UTF_8)
            .body(page.into_string()));
    }

    let file = NamedFile::open_async(&resource.path).await.map_err(|e| {
        RuntimeError::IoError(format!("Failed to open {}", resource.path.display()), e)
    })?;
    Ok(file
        .set_content_type(content_type_for(&resource.path))
        .disable_content_disposition()
        .into_response(req))
}

/// Store the request body, replacing any existing file
pub async fn put(
    req: &HttpRequest,
    payload: web::Payload,
    root: &Path,
) -> Result<HttpResponse, RuntimeError> {
    let resource = target(req, root)?;
    if resource.path.is_dir() {
        return Err(RuntimeError::Conflict(format!(
            "{} is a collection",
            resource.href
        )));
    }

    let written = file_op::write_file(payload, &resource.path).await?;
    info!(target: "dav", "Stored {} ({written} bytes)", resource.href);
    Ok(HttpResponse::Created().finish())
}

pub async fn delete(
    req: &HttpRequest,
    state: &DavState,
    root: &Path,
) -> Result<HttpResponse, RuntimeError> {
    let resource = target(req, root)?;
    if resource.is_root() {
        return Err(RuntimeError::MethodNotAllowed(
            "DELETE on the root collection".to_string(),
        ));
    }
    stat(&resource).await?;

    file_op::remove(&resource.path).await?;
    state.locks.purge(&resource.href);
    state.props.purge(&resource.href);

    info!(target: "dav", "Deleted {}", resource.href);
    Ok(HttpResponse::NoContent().finish())
}

pub fn options() -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((header::ALLOW, ALLOWED_METHODS))
        .insert_header(("DAV", DAV_COMPLIANCE))
        .insert_header(("MS-Author-Via", "DAV"))
        .finish()
}

/// Create a collection along with missing ancestors
pub async fn mkcol(req: &HttpRequest, root: &Path) -> Result<HttpResponse, RuntimeError> {
    let resource = target(req, root)?;
    if tokio::fs::symlink_metadata(&resource.path).await.is_ok() {
        return Err(RuntimeError::Conflict(format!(
            "{} already exists",
            resource.href
        )));
    }

    tokio::fs::create_dir_all(&resource.path)
        .await
        .map_err(|e| {
            error!(target: "fs", "Failed to create {}: {e}", resource.path.display());
            RuntimeError::Conflict(format!("cannot create {}", resource.href))
        })?;

    info!(target: "dav", "Created collection {}", resource.href);
    Ok(HttpResponse::Created().finish())
}

pub async fn copy(req: &HttpRequest, root: &Path) -> Result<HttpResponse, RuntimeError> {
    let dest = destination(req, root)?;
    let source = target(req, root)?;
    stat(&source).await?;
    if dest.is_root() || dest.href == source.href {
        return Err(RuntimeError::Conflict(format!(
            "cannot copy {} onto {}",
            source.href, dest.href
        )));
    }

    file_op::copy(source.path, dest.path).await?;
    info!(target: "dav", "Copied {} to {}", source.href, dest.href);
    Ok(HttpResponse::Created().finish())
}

/// Rename the resource. Locks and properties of the source subtree are dropped.
pub async fn r#move(
    req: &HttpRequest,
    state: &DavState,
    root: &Path,
) -> Result<HttpResponse, RuntimeError> {
    let dest = destination(req, root)?;
    let source = target(req, root)?;
    if source.is_root() {
        return Err(RuntimeError::MethodNotAllowed(
            "MOVE of the root collection".to_string(),
        ));
    }
    stat(&source).await?;
    if dest.is_root() || dest.href == source.href {
        return Err(RuntimeError::Conflict(format!(
            "cannot move {} onto {}",
            source.href, dest.href
        )));
    }

    file_op::rename(&source.path, &dest.path).await?;
    state.locks.purge(&source.href);
    state.props.purge(&source.href);

    info!(target: "dav", "Moved {} to {}", source.href, dest.href);
    Ok(HttpResponse::Created().finish())
}

fn prop_entry(state: &DavState, entry: &Entry) -> PropEntry {
    PropEntry {
        href: encode_href(&entry.href, entry.is_dir),
        display_name: entry.name.clone(),
        is_collection: entry.is_dir,
        content_length: entry.size,
        last_modified: entry.last_modified,
        content_type: (!entry.is_dir).then(|| content_type_for(Path::new(&entry.name)).to_string()),
        lock: state.locks.get(&entry.href),
    }
}

/// Properties of the resource and, unless `Depth: 0`, of its direct children.
///
/// Deeper levels are never reported, `Depth: infinity` behaves like `1`.
pub async fn propfind(
    req: &HttpRequest,
    state: &DavState,
    root: &Path,
) -> Result<HttpResponse, RuntimeError> {
    let resource = target(req, root)?;
    let metadata = stat(&resource).await?;
    let depth = header_str(req, "Depth").unwrap_or("1");

    let this = Entry::from_metadata(resource.name().to_string(), resource.href.clone(), &metadata);
    let mut entries = vec![prop_entry(state, &this)];
    if this.is_dir && depth != "0" {
        entries.extend(
            listing::read_entries(&resource)
                .await?
                .iter()
                .map(|child| prop_entry(state, child)),
        );
    }

    debug!(target: "dav", "PROPFIND {} depth {depth}: {} entries", resource.href, entries.len());
    Ok(multistatus(dav_xml::propfind_multistatus(&entries)?))
}

/// Acknowledge a property update. The submitted changes are not applied.
pub fn proppatch(
    req: &HttpRequest,
    state: &DavState,
    root: &Path,
) -> Result<HttpResponse, RuntimeError> {
    let resource = target(req, root)?;
    state.props.touch(&resource.href);

    debug!(target: "dav", "PROPPATCH {} acknowledged without changes", resource.href);
    Ok(multistatus(dav_xml::proppatch_multistatus(&encode_href(
        &resource.href,
        resource.path.is_dir(),
    ))?))
}

pub fn lock(req: &HttpRequest, state: &DavState, root: &Path) -> Result<HttpResponse, RuntimeError> {
    let resource = target(req, root)?;
    let entry = state.locks.lock(&resource.href, header_str(req, "Owner"));
    let body = dav_xml::lock_discovery(&entry)?;

    Ok(HttpResponse::Ok()
        .content_type(DAV_XML_CONTENT_TYPE)
        .insert_header(("Lock-Token", format!("<{}>", entry.token)))
        .body(body))
}

pub fn unlock(
    req: &HttpRequest,
    state: &DavState,
    root: &Path,
) -> Result<HttpResponse, RuntimeError> {
    use crate::locks::UnlockOutcome;

    let resource = target(req, root)?;
    let token = header_str(req, "Lock-Token")
        .ok_or_else(|| RuntimeError::PreconditionFailed("missing Lock-Token header".to_string()))?;

    match state.locks.unlock(&resource.href, token) {
        UnlockOutcome::Released => Ok(HttpResponse::NoContent().finish()),
        UnlockOutcome::TokenMismatch => Err(RuntimeError::PreconditionFailed(format!(
            "{token} does not hold the lock on {}",
            resource.href
        ))),
    }
}
