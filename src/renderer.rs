use bytesize::ByteSize;
use maud::{DOCTYPE, Markup, html};

use crate::listing::Entry;
use crate::path_utils::encode_href;

/// Renders the HTML listing of the collection at `href`
pub fn page(href: &str, parent_href: Option<&str>, entries: &[Entry]) -> Markup {
    let title = format!("Index of {href}");

    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (title) }
            }
            body {
                h1 { (title) }
                ul {
                    @if let Some(parent) = parent_href {
                        li { a.parent href=(encode_href(parent, true)) { ".." } }
                    }
                    @for entry in entries {
                        (entry_row(entry))
                    }
                }
            }
        }
    }
}

fn entry_row(entry: &Entry) -> Markup {
    html! {
        li {
            @if entry.is_dir {
                a.directory href=(encode_href(&entry.href, true)) { "[" (entry.name) "]" }
            } @else {
                a.file href=(encode_href(&entry.href, false)) { (entry.name) }
                @if let Some(size) = entry.size {
                    " " span.size { (ByteSize::b(size)) }
                }
            }
        }
    }
}
