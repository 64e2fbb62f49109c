use actix_web::http::header::HeaderValue;
use actix_web_httpauth::headers::authorization::{Basic, Scheme};
use sha2::{Digest, Sha256, Sha512};

#[derive(Clone, Debug, PartialEq, Eq)]
/// HTTP Basic authentication parameters
pub struct BasicAuthParams {
    pub username: String,
    pub password: String,
}

impl From<Basic> for BasicAuthParams {
    fn from(auth: Basic) -> Self {
        Self {
            username: auth.user_id().to_string(),
            password: auth.password().map(|p| p.to_string()).unwrap_or_default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// `password` field of `RequiredAuth`
pub enum RequiredAuthPassword {
    Plain(String),
    Sha256(Vec<u8>),
    Sha512(Vec<u8>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// The single identity clients must present
pub struct RequiredAuth {
    pub username: String,
    pub password: RequiredAuthPassword,
}

/// Verdict of the authenticator for one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Credentials matched the configured identity
    Authenticated(String),
    /// Anonymous access is enabled, headers were not inspected
    AnonymousAllowed,
    /// Missing, malformed or wrong credentials
    Rejected,
}

/// Decode the `Authorization` header value into username and password.
///
/// Anything but `Basic <base64 of user:password>` yields `None`.
pub fn parse_basic_auth(header: &HeaderValue) -> Option<BasicAuthParams> {
    Basic::parse(header).ok().map(BasicAuthParams::from)
}

/// Decide whether a request may proceed, given its `Authorization` header.
pub fn authenticate(
    header: Option<&HeaderValue>,
    required_auth: Option<&RequiredAuth>,
    allow_anonymous: bool,
) -> AuthOutcome {
    if allow_anonymous {
        return AuthOutcome::AnonymousAllowed;
    }

    let (Some(required_auth), Some(params)) = (required_auth, header.and_then(parse_basic_auth))
    else {
        return AuthOutcome::Rejected;
    };

    if match_auth(&params, required_auth) {
        AuthOutcome::Authenticated(params.username)
    } else {
        AuthOutcome::Rejected
    }
}

/// Return `true` if `basic_auth` matches the required identity
pub fn match_auth(basic_auth: &BasicAuthParams, required_auth: &RequiredAuth) -> bool {
    if basic_auth.username != required_auth.username {
        return false;
    }

    match &required_auth.password {
        RequiredAuthPassword::Plain(required_password) => *required_password == basic_auth.password,
        RequiredAuthPassword::Sha256(password_hash) => {
            compare_hash::<Sha256>(&basic_auth.password, password_hash)
        }
        RequiredAuthPassword::Sha512(password_hash) => {
            compare_hash::<Sha512>(&basic_auth.password, password_hash)
        }
    }
}

/// Return `true` if hashing of `password` by `T` algorithm equals to `hash`
pub fn compare_hash<T: Digest>(password: &str, hash: &[u8]) -> bool {
    get_hash::<T>(password) == hash
}

/// Get hash of a `text`
pub fn get_hash<T: Digest>(text: &str) -> Vec<u8> {
    let mut hasher = T::new();
    hasher.update(text);
    hasher.finalize().to_vec()
}
