//! Tracking pixel payload and message decoration.

use url::Url;

/// Query parameter carrying the recipient address.
pub const EMAIL_PARAM: &str = "email";

/// A 1x1 transparent GIF.
pub const TRACKING_PIXEL: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x4C, 0x01, 0x00, 0x3B,
];

pub const PIXEL_CONTENT_TYPE: &str = "image/gif";

/// Pixel URL for `address`, with the address URL-escaped into the query.
pub fn tracking_url(base: &Url, address: &str) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut().append_pair(EMAIL_PARAM, address);
    url
}

/// Append an invisible pixel image pointing at `pixel_url` to an HTML body.
pub fn append_tracking_pixel(body: &str, pixel_url: &Url) -> String {
    format!(
        "{}<img src=\"{}\" width=\"1\" height=\"1\" alt=\"\" style=\"opacity:0; visibility:hidden;\">",
        body,
        escape_attribute(pixel_url.as_str())
    )
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
