/// "percent-encode sets" as defined by the WHATWG URL standard:
/// https://url.spec.whatwg.org/#percent-encoded-bytes
pub mod percent_encode_sets {
    use percent_encoding::{AsciiSet, CONTROLS};
    pub const QUERY: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'#').add(b'<').add(b'>');
    pub const PATH: &AsciiSet = &QUERY.add(b'?').add(b'`').add(b'{').add(b'}');
    pub const USERINFO: &AsciiSet = &PATH
        .add(b'/')
        .add(b':')
        .add(b';')
        .add(b'=')
        .add(b'@')
        .add(b'[')
        .add(b'\\')
        .add(b']')
        .add(b'^')
        .add(b'|');
    pub const COMPONENT: &AsciiSet = &USERINFO.add(b'$').add(b'%').add(b'&').add(b'+').add(b',');
}

/// Percent-encode a decoded href segment by segment, keeping the separators.
/// Collections get a trailing slash.
pub fn encode_href(href: &str, is_collection: bool) -> String {
    use percent_encoding::utf8_percent_encode;

    let mut encoded = href
        .split('/')
        .map(|segment| utf8_percent_encode(segment, percent_encode_sets::COMPONENT).to_string())
        .collect::<Vec<_>>()
        .join("/");

    if is_collection && !encoded.ends_with('/') {
        encoded.push('/');
    }
    encoded
}
