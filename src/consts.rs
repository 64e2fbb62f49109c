/// Realm announced in `WWW-Authenticate` challenges.
pub const AUTH_REALM: &str = "WebDAV";

/// WebDAV compliance classes advertised in the `DAV` header (class 2 = locking).
pub const DAV_COMPLIANCE: &str = "1,2";

/// Every verb the dispatcher routes, in the order advertised by OPTIONS and CORS.
pub const ALLOWED_METHODS: &str =
    "GET, PUT, DELETE, OPTIONS, PROPFIND, PROPPATCH, MKCOL, COPY, MOVE, LOCK, UNLOCK";

/// Request headers browsers may send cross-origin.
pub const CORS_ALLOWED_HEADERS: &str =
    "Authorization, Content-Type, Depth, Destination, Lock-Token, Owner, Overwrite, method";

/// Header carrying the real verb for transports that can't send arbitrary methods.
pub const METHOD_OVERRIDE_HEADER: &str = "method";

/// Advertised lock lifetime. Purely declarative, locks never expire on their own.
pub const LOCK_TIMEOUT_SECS: u64 = 3600;

/// XML namespace of every element in DAV bodies, bound to the `D` prefix.
pub const DAV_NAMESPACE: &str = "DAV:";

/// Content type of DAV XML bodies.
pub const DAV_XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";
