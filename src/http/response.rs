//! Synthesized responses and bounded inspection of origin responses.
//!
//! Origin responses are relayed byte-for-byte; the helpers here only peek at
//! the status line and headers, returning a sentinel instead of failing.

/// Content type recorded when none can be extracted.
pub const UNKNOWN_CONTENT_TYPE: &str = "unknown";

/// Status code of a raw HTTP response, or 0 if the status line is unusable.
pub fn extract_status_code(response: &[u8]) -> u16 {
    let text = String::from_utf8_lossy(response);
    text.split("\r\n")
        .next()
        .and_then(|line| line.split(' ').nth(1))
        .and_then(|code| code.parse().ok())
        .unwrap_or(0)
}

/// `Content-Type` value from the header block of a raw HTTP response.
///
/// The header block must be terminated by a blank line; anything else yields
/// [`UNKNOWN_CONTENT_TYPE`].
pub fn extract_content_type(response: &[u8]) -> String {
    let text = String::from_utf8_lossy(response);
    let Some(end) = text.find("\r\n\r\n") else {
        return UNKNOWN_CONTENT_TYPE.to_string();
    };

    text[..end]
        .split("\r\n")
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-type")
                .then(|| value.trim().to_string())
        })
        .unwrap_or_else(|| UNKNOWN_CONTENT_TYPE.to_string())
}

/// Response sent when the destination host is on the blocklist.
pub fn blocked(domain: &str) -> Vec<u8> {
    let body = format!(
        "<html>\n<head><title>Access Denied</title></head>\n<body>\n\
         <h1>403 Forbidden</h1>\n\
         <p>Access to {} has been blocked by the proxy server.</p>\n\
         </body>\n</html>",
        escape_html(domain)
    );
    html_response(403, "Forbidden", &body)
}

/// Response sent in place of an origin response that could not be obtained.
pub fn gateway_error(status: u16, reason: &str, message: &str) -> Vec<u8> {
    let body = format!(
        "<html>\n<head><title>Error {status}</title></head>\n<body>\n\
         <h1>{status} {message}</h1>\n\
         <p>The proxy server encountered an error while processing your request.</p>\n\
         </body>\n</html>"
    );
    html_response(status, reason, &body)
}

fn html_response(status: u16, reason: &str, body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 {status} {reason}\r\n\
         Content-Type: text/html\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {body}",
        body.len()
    )
    .into_bytes()
}

// Host names come from the client; keep them inert in the page.
fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
