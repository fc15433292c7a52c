//! `multipart/x-mixed-replace` framing
//!
//! Each part replaces the previous one in the viewer:
//!
//! ```text
//! --frame\r\n
//! Content-Type: image/jpeg\r\n
//! Content-Length: 12345\r\n
//! \r\n
//! <jpeg bytes>\r\n
//! ```

use bytes::{BufMut, Bytes, BytesMut};

/// Boundary token separating parts
pub const BOUNDARY: &str = "frame";

/// Response content type for a multipart stream
pub const CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Body of the part sent while a camera has no frame yet
pub const PLACEHOLDER_TEXT: &str = "stream not yet available";

/// Format one part with the given content type
pub fn part(content_type: &str, body: &[u8]) -> Bytes {
    let header = format!(
        "--{BOUNDARY}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n\r\n",
        body.len()
    );

    let mut buf = BytesMut::with_capacity(header.len() + body.len() + 2);
    buf.put_slice(header.as_bytes());
    buf.put_slice(body);
    buf.put_slice(b"\r\n");
    buf.freeze()
}

/// Format a JPEG part
pub fn jpeg_part(jpeg: &[u8]) -> Bytes {
    part("image/jpeg", jpeg)
}

/// Format the "not yet available" part
pub fn placeholder_part() -> Bytes {
    part("text/plain", PLACEHOLDER_TEXT.as_bytes())
}
