use std::path::{Component, Path, PathBuf};

use actix_web::http::Uri;
use percent_encoding::percent_decode_str;

use crate::errors::RuntimeError;

/// A request path mapped onto the served root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Decoded, normalized URI path. Always starts with `/`, never ends with one
    /// except for the root itself. Locks and properties are keyed by this.
    pub href: String,

    /// Location on disk, guaranteed to be inside the root.
    pub path: PathBuf,
}

impl Resource {
    pub fn is_root(&self) -> bool {
        self.href == "/"
    }

    /// Name of the last path segment, empty for the root.
    pub fn name(&self) -> &str {
        self.href.rsplit('/').next().unwrap_or_default()
    }

    /// Href of the parent collection, `None` for the root.
    pub fn parent_href(&self) -> Option<String> {
        if self.is_root() {
            return None;
        }
        match self.href.rfind('/') {
            Some(0) | None => Some("/".to_string()),
            Some(idx) => Some(self.href[..idx].to_string()),
        }
    }

    /// Href of a direct child of this resource.
    pub fn child_href(&self, name: &str) -> String {
        if self.is_root() {
            format!("/{name}")
        } else {
            format!("{}/{name}", self.href)
        }
    }
}

/// Map a raw (percent-encoded) URI path onto `root`.
///
/// `.` segments and empty segments are dropped, `..` pops a segment. Popping past the
/// root, or a segment that would not stay a single normal path component on this
/// platform, is rejected.
pub fn resolve_path(root: &Path, uri_path: &str) -> Result<Resource, RuntimeError> {
    let decoded = percent_decode_str(uri_path)
        .decode_utf8()
        .map_err(|e| RuntimeError::InvalidPathError(format!("{uri_path}: {e}")))?;

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => (),
            ".." => {
                if segments.pop().is_none() {
                    return Err(RuntimeError::InvalidPathError(format!(
                        "{uri_path} escapes the served root"
                    )));
                }
            }
            name => {
                let mut components = Path::new(name).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(_)), None) if !name.contains('\0') => {
                        segments.push(name)
                    }
                    _ => {
                        return Err(RuntimeError::InvalidPathError(format!(
                            "{uri_path} contains an illegal segment"
                        )));
                    }
                }
            }
        }
    }

    let path = segments
        .iter()
        .fold(root.to_path_buf(), |path, segment| path.join(segment));

    Ok(Resource {
        href: format!("/{}", segments.join("/")),
        path,
    })
}

/// Resolve the target of a COPY or MOVE from its `Destination` header.
///
/// Clients send either an absolute URL or an absolute path; only the path part is used.
pub fn resolve_destination(root: &Path, destination: &str) -> Result<Resource, RuntimeError> {
    let uri = destination
        .parse::<Uri>()
        .map_err(|e| RuntimeError::BadRequest(format!("Invalid Destination {destination}: {e}")))?;
    resolve_path(root, uri.path())
}

/// Content type for a file, guessed from its extension.
pub fn content_type_for(path: &Path) -> mime::Mime {
    mime_guess::from_path(path).first_or_octet_stream()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("/", "/", "")]
    #[case("", "/", "")]
    #[case("/a/b.txt", "/a/b.txt", "a/b.txt")]
    #[case("//a///b.txt", "/a/b.txt", "a/b.txt")]
    #[case("/a/./b/../c", "/a/c", "a/c")]
    #[case("/dir/", "/dir", "dir")]
    #[case("/with%20space.txt", "/with space.txt", "with space.txt")]
    fn resolves_inside_root(#[case] input: &str, #[case] href: &str, #[case] rel: &str) {
        let root = Path::new("/srv/dav");
        let resource = resolve_path(root, input).unwrap();
        assert_eq!(resource.href, href);
        assert_eq!(resource.path, root.join(rel));
    }

    #[rstest]
    #[case("/..")]
    #[case("/../etc/passwd")]
    #[case("/a/../../b")]
    #[case("/%2e%2e/secret")]
    #[case("/a/%2e%2e/%2e%2e/b")]
    #[case("/bad%ff")]
    fn rejects_escapes_and_bad_encoding(#[case] input: &str) {
        assert!(matches!(
            resolve_path(Path::new("/srv/dav"), input),
            Err(RuntimeError::InvalidPathError(_))
        ));
    }

    #[rstest]
    #[case("http://localhost:8080/dst.txt", "/dst.txt")]
    #[case("/dir/dst.txt", "/dir/dst.txt")]
    #[case("https://example.com/a%20b/", "/a b")]
    fn destinations(#[case] header: &str, #[case] href: &str) {
        let resource = resolve_destination(Path::new("/srv/dav"), header).unwrap();
        assert_eq!(resource.href, href);
    }

    #[test]
    fn hrefs_of_relatives() {
        let root = Path::new("/srv/dav");
        let top = resolve_path(root, "/").unwrap();
        assert!(top.is_root());
        assert_eq!(top.parent_href(), None);
        assert_eq!(top.child_href("a"), "/a");

        let nested = resolve_path(root, "/a/b").unwrap();
        assert_eq!(nested.name(), "b");
        assert_eq!(nested.parent_href().as_deref(), Some("/a"));
        assert_eq!(nested.child_href("c"), "/a/b/c");

        let first = resolve_path(root, "/a").unwrap();
        assert_eq!(first.parent_href().as_deref(), Some("/"));
    }

    #[rstest]
    #[case("b.txt", "text/plain")]
    #[case("index.html", "text/html")]
    #[case("photo.jpg", "image/jpeg")]
    #[case("noextension", "application/octet-stream")]
    #[case("archive.unknownext", "application/octet-stream")]
    fn content_types(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(content_type_for(Path::new(name)).essence_str(), expected);
    }
}
