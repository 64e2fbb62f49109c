use actix_web::{
    HttpResponse, ResponseError,
    http::{StatusCode, header},
};
use thiserror::Error;

use crate::consts::AUTH_REALM;

#[derive(Debug, Error)]
pub enum StartupError {
    /// Any kind of IO errors
    #[error("{0}\ncaused by: {1}")]
    IoError(String, std::io::Error),

    /// The served root exists but is something other than a directory
    #[error("The root path '{0}' exists but is not a directory")]
    RootIsNotADirectory(String),

    /// Might occur when the password hash is not in `method:hex` form
    #[error("Invalid format for password hash. Expected sha256:hash or sha512:hash")]
    InvalidHashFormat,

    /// Might occur when the hash method is neither sha256 nor sha512
    #[error("{0} is not a valid hashing method. Expected sha256 or sha512")]
    InvalidHashMethod(String),

    /// Might occur when the hash is not hex encoded
    #[error("Invalid format for password hash. Expected hex code")]
    InvalidPasswordHash,
}

/// Failures of a single request.
///
/// Handlers return these and the dispatcher turns them into a response through
/// [`ResponseError`], so the status code mapping lives in exactly one place.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Missing, malformed or wrong HTTP Basic credentials
    #[error("Authentication required")]
    AuthRejected,

    /// Client IP is blocked or not whitelisted
    #[error("Access denied for {0}")]
    AccessDenied(String),

    /// The addressed resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unknown verb, or a verb that makes no sense on the addressed resource
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// The resource state prevents the operation, e.g. MKCOL on an existing file
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A lock token did not match the lock held on the resource
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// A required header is missing or unusable
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Any error related to an invalid path (bad encoding, traversal outside the root)
    #[error("Invalid path\ncaused by: {0}")]
    InvalidPathError(String),

    /// Any kind of IO errors
    #[error("{0}\ncaused by: {1}")]
    IoError(String, std::io::Error),

    /// Failure while emitting a DAV XML body
    #[error("Failed to write XML response\ncaused by: {0}")]
    XmlError(#[from] xml::writer::Error),

    /// Anything unanticipated, including panicking handlers
    #[error("{0}")]
    Internal(String),
}

impl ResponseError for RuntimeError {
    fn status_code(&self) -> StatusCode {
        use RuntimeError as E;
        use StatusCode as S;
        match self {
            E::AuthRejected => S::UNAUTHORIZED,
            E::AccessDenied(_) => S::FORBIDDEN,
            E::NotFound(_) => S::NOT_FOUND,
            E::MethodNotAllowed(_) => S::METHOD_NOT_ALLOWED,
            E::Conflict(_) => S::CONFLICT,
            E::PreconditionFailed(_) => S::PRECONDITION_FAILED,
            E::BadRequest(_) | E::InvalidPathError(_) => S::BAD_REQUEST,
            E::IoError(_, _) | E::XmlError(_) | E::Internal(_) => S::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let mut resp = HttpResponse::build(status);

        if let Self::AuthRejected = self {
            resp.insert_header((
                header::WWW_AUTHENTICATE,
                format!("Basic realm=\"{AUTH_REALM}\""),
            ));
        }

        // Server side failures carry filesystem paths, keep those in the logs only.
        let body = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        resp.content_type(mime::TEXT_PLAIN_UTF_8).body(body)
    }
}

pub fn log_error_chain(description: String) {
    for cause in description.lines() {
        log::error!("{cause}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(RuntimeError::AuthRejected, StatusCode::UNAUTHORIZED)]
    #[case(RuntimeError::AccessDenied("10.0.0.1".into()), StatusCode::FORBIDDEN)]
    #[case(RuntimeError::NotFound("/a".into()), StatusCode::NOT_FOUND)]
    #[case(RuntimeError::MethodNotAllowed("TRACE".into()), StatusCode::METHOD_NOT_ALLOWED)]
    #[case(RuntimeError::Conflict("/a".into()), StatusCode::CONFLICT)]
    #[case(RuntimeError::PreconditionFailed("/a".into()), StatusCode::PRECONDITION_FAILED)]
    #[case(RuntimeError::BadRequest("no Destination".into()), StatusCode::BAD_REQUEST)]
    #[case(RuntimeError::InvalidPathError("..".into()), StatusCode::BAD_REQUEST)]
    #[case(
        RuntimeError::IoError("write".into(), std::io::Error::other("disk full")),
        StatusCode::INTERNAL_SERVER_ERROR
    )]
    fn status_codes(#[case] err: RuntimeError, #[case] expected: StatusCode) {
        assert_eq!(err.status_code(), expected);
        assert_eq!(err.error_response().status(), expected);
    }

    #[test]
    fn auth_rejected_carries_challenge() {
        let resp = RuntimeError::AuthRejected.error_response();
        assert_eq!(
            resp.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Basic realm=\"WebDAV\""
        );
    }
}
