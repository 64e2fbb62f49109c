//! DAV XML bodies: PROPFIND and PROPPATCH multistatus, LOCK activelock.

use std::io::Write;
use std::time::SystemTime;

use actix_web::http::header::HttpDate;
use xml::EmitterConfig;
use xml::common::XmlVersion;
use xml::writer::{EventWriter, Result, XmlEvent};

use crate::consts::{DAV_NAMESPACE, LOCK_TIMEOUT_SECS};
use crate::locks::LockEntry;

const STATUS_OK: &str = "HTTP/1.1 200 OK";

/// Live properties of one resource, as reported by PROPFIND.
#[derive(Debug, Clone)]
pub struct PropEntry {
    /// Percent-encoded href, collections end with `/`
    pub href: String,
    pub display_name: String,
    pub is_collection: bool,
    /// Files only
    pub content_length: Option<u64>,
    pub last_modified: Option<SystemTime>,
    /// Files only
    pub content_type: Option<String>,
    pub lock: Option<LockEntry>,
}

fn writer(buf: &mut Vec<u8>) -> Result<EventWriter<&mut Vec<u8>>> {
    let mut w = EmitterConfig::new()
        .perform_indent(false)
        .write_document_declaration(false)
        .create_writer(buf);
    w.write(XmlEvent::StartDocument {
        version: XmlVersion::Version10,
        encoding: Some("utf-8"),
        standalone: None,
    })?;
    Ok(w)
}

fn text_element<W: Write>(w: &mut EventWriter<W>, name: &str, text: &str) -> Result<()> {
    w.write(XmlEvent::start_element(name))?;
    w.write(XmlEvent::characters(text))?;
    w.write(XmlEvent::end_element())
}

fn empty_element<W: Write>(w: &mut EventWriter<W>, name: &str) -> Result<()> {
    w.write(XmlEvent::start_element(name))?;
    w.write(XmlEvent::end_element())
}

/// `<D:multistatus>` with one `<D:response>` per entry, for PROPFIND.
pub fn propfind_multistatus(entries: &[PropEntry]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut w = writer(&mut buf)?;

    w.write(XmlEvent::start_element("D:multistatus").ns("D", DAV_NAMESPACE))?;
    for entry in entries {
        w.write(XmlEvent::start_element("D:response"))?;
        text_element(&mut w, "D:href", &entry.href)?;
        w.write(XmlEvent::start_element("D:propstat"))?;
        w.write(XmlEvent::start_element("D:prop"))?;

        text_element(&mut w, "D:displayname", &entry.display_name)?;
        w.write(XmlEvent::start_element("D:resourcetype"))?;
        if entry.is_collection {
            empty_element(&mut w, "D:collection")?;
        }
        w.write(XmlEvent::end_element())?;
        if let Some(length) = entry.content_length {
            text_element(&mut w, "D:getcontentlength", &length.to_string())?;
        }
        if let Some(modified) = entry.last_modified {
            text_element(&mut w, "D:getlastmodified", &HttpDate::from(modified).to_string())?;
        }
        if let Some(content_type) = &entry.content_type {
            text_element(&mut w, "D:getcontenttype", content_type)?;
        }
        w.write(XmlEvent::start_element("D:supportedlock"))?;
        w.write(XmlEvent::start_element("D:lockentry"))?;
        write_lock_kind(&mut w)?;
        w.write(XmlEvent::end_element())?;
        w.write(XmlEvent::end_element())?;
        if let Some(lock) = &entry.lock {
            w.write(XmlEvent::start_element("D:lockdiscovery"))?;
            write_activelock(&mut w, lock)?;
            w.write(XmlEvent::end_element())?;
        }

        w.write(XmlEvent::end_element())?; // prop
        text_element(&mut w, "D:status", STATUS_OK)?;
        w.write(XmlEvent::end_element())?; // propstat
        w.write(XmlEvent::end_element())?; // response
    }
    w.write(XmlEvent::end_element())?;

    Ok(buf)
}

/// PROPPATCH answer. Submitted mutations are not applied, the response always
/// reports success for the resource.
pub fn proppatch_multistatus(href: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut w = writer(&mut buf)?;

    w.write(XmlEvent::start_element("D:multistatus").ns("D", DAV_NAMESPACE))?;
    w.write(XmlEvent::start_element("D:response"))?;
    text_element(&mut w, "D:href", href)?;
    w.write(XmlEvent::start_element("D:propstat"))?;
    empty_element(&mut w, "D:prop")?;
    text_element(&mut w, "D:status", STATUS_OK)?;
    w.write(XmlEvent::end_element())?;
    w.write(XmlEvent::end_element())?;
    w.write(XmlEvent::end_element())?;

    Ok(buf)
}

/// LOCK answer: `<D:prop><D:lockdiscovery>` around the new activelock.
pub fn lock_discovery(lock: &LockEntry) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut w = writer(&mut buf)?;

    w.write(XmlEvent::start_element("D:prop").ns("D", DAV_NAMESPACE))?;
    w.write(XmlEvent::start_element("D:lockdiscovery"))?;
    write_activelock(&mut w, lock)?;
    w.write(XmlEvent::end_element())?;
    w.write(XmlEvent::end_element())?;

    Ok(buf)
}

fn write_lock_kind<W: Write>(w: &mut EventWriter<W>) -> Result<()> {
    w.write(XmlEvent::start_element("D:lockscope"))?;
    empty_element(w, "D:exclusive")?;
    w.write(XmlEvent::end_element())?;
    w.write(XmlEvent::start_element("D:locktype"))?;
    empty_element(w, "D:write")?;
    w.write(XmlEvent::end_element())
}

fn write_activelock<W: Write>(w: &mut EventWriter<W>, lock: &LockEntry) -> Result<()> {
    w.write(XmlEvent::start_element("D:activelock"))?;
    write_lock_kind(w)?;
    text_element(w, "D:depth", "infinity")?;
    text_element(w, "D:owner", &lock.owner)?;
    text_element(w, "D:timeout", &format!("Second-{LOCK_TIMEOUT_SECS}"))?;
    w.write(XmlEvent::start_element("D:locktoken"))?;
    text_element(w, "D:href", &lock.token)?;
    w.write(XmlEvent::end_element())?;
    w.write(XmlEvent::end_element())
}
