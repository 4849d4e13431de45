//! The request header trickled over every probe connection.
//!
//! Servers see a plain browser-style `GET /`; only the pacing is unusual.
//! The bytes are fixed and must go out exactly as written here.

/// Literal HTTP/1.1 request header, terminated by an empty line.
pub const HEADER_PAYLOAD: &[u8] = b"GET / HTTP/1.1\r\n\
Host: localhost:3333\r\n\
Accept: text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8\r\n\
Accept-Language: en-US,en;q=0.5\r\n\
Accept-Encoding: gzip, deflate\r\n\
Connection: keep-alive\r\n\
Upgrade-Insecure-Requests: 1\r\n\
Priority: u=0, i\r\n\
\r\n";

/// Marker that ends the header block.
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
