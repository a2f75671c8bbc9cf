//! Responses of the catch-all handler and the raw text dumps recorded for
//! every request it answers.

use warp::http::{HeaderMap, Method};

use crate::network::reflect;

pub const HTML: &str = "text/html; charset=utf-8";
pub const PLAIN: &str = "text/plain; charset=utf-8";
pub const JSON: &str = "application/json";
pub const XML: &str = "application/xml";

/// Body and content type chosen for a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultPage {
    pub content_type: &'static str,
    pub body: String,
}

/// Picks the response for `path` on `host`.
///
/// The reflected identifier echoes the caller's identifier back in reverse
/// so clients can confirm the server saw their probe.
pub fn render(domain: &str, host: &str, path: &str) -> DefaultPage {
    let reflection = escape(&reflect(host));
    let lowered = path.to_ascii_lowercase();

    if path == "/" && reflection.is_empty() {
        return DefaultPage {
            content_type: HTML,
            body: banner(domain),
        };
    }
    if lowered == "/robots.txt" {
        return DefaultPage {
            content_type: PLAIN,
            body: format!("User-agent: *\nDisallow: / # {}", reflection),
        };
    }
    if lowered.ends_with(".json") {
        return DefaultPage {
            content_type: JSON,
            body: serde_json::json!({ "data": reflection }).to_string(),
        };
    }
    if lowered.ends_with(".xml") {
        return DefaultPage {
            content_type: XML,
            body: format!("<data>{}</data>", reflection),
        };
    }
    DefaultPage {
        content_type: HTML,
        body: format!("<html><head></head><body>{}</body></html>", reflection),
    }
}

fn banner(domain: &str) -> String {
    let domain = escape(domain);
    format!(
        "<html><head><title>{0}</title></head>\n\
         <body><h1>{0}</h1>\n\
         <p>This host records out-of-band interactions (HTTP, DNS, SMTP, ...) \
         addressed to subdomains of <b>{0}</b>.</p>\n\
         <p>If you notice unexpected requests originating from it, they were \
         most likely triggered by a security test.</p></body></html>",
        domain
    )
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Request as it would appear on the wire.
pub fn dump_request(method: &Method, target: &str, headers: &HeaderMap, body: &[u8]) -> String {
    let mut dump = format!("{} {} HTTP/1.1\r\n", method, target);
    push_headers(&mut dump, headers.iter().map(|(k, v)| (k.as_str(), v.as_bytes())));
    dump.push_str("\r\n");
    dump.push_str(&String::from_utf8_lossy(body));
    dump
}

/// Response as sent by the default handler.
pub fn dump_response(page: &DefaultPage, server: &str) -> String {
    let length = page.body.len().to_string();
    let mut dump = String::from("HTTP/1.1 200 OK\r\n");
    push_headers(
        &mut dump,
        [
            ("content-type", page.content_type.as_bytes()),
            ("server", server.as_bytes()),
            ("content-length", length.as_bytes()),
        ]
        .into_iter(),
    );
    dump.push_str("\r\n");
    dump.push_str(&page.body);
    dump
}

fn push_headers<'a>(dump: &mut String, headers: impl Iterator<Item = (&'a str, &'a [u8])>) {
    for (name, value) in headers {
        dump.push_str(&canonical(name));
        dump.push_str(": ");
        dump.push_str(&String::from_utf8_lossy(value));
        dump.push_str("\r\n");
    }
}

// `content-type` -> `Content-Type`
fn canonical(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}
