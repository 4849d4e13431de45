use slowdrip_probe::engine::payload::{HEADER_PAYLOAD, HEADER_TERMINATOR};

#[test]
fn payload_matches_wire_format() {
    let expected = concat!(
        "GET / HTTP/1.1\r\n",
        "Host: localhost:3333\r\n",
        "Accept: text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8\r\n",
        "Accept-Language: en-US,en;q=0.5\r\n",
        "Accept-Encoding: gzip, deflate\r\n",
        "Connection: keep-alive\r\n",
        "Upgrade-Insecure-Requests: 1\r\n",
        "Priority: u=0, i\r\n",
        "\r\n",
    );
    assert_eq!(HEADER_PAYLOAD, expected.as_bytes());
}

#[test]
fn payload_ends_with_single_blank_line() {
    assert!(HEADER_PAYLOAD.ends_with(HEADER_TERMINATOR));
    let first = HEADER_PAYLOAD
        .windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR);
    assert_eq!(first, Some(HEADER_PAYLOAD.len() - HEADER_TERMINATOR.len()));
}

#[test]
fn every_header_line_is_crlf_terminated() {
    let text = std::str::from_utf8(HEADER_PAYLOAD).unwrap();
    assert_eq!(text.matches("\r\n").count(), 9);
    assert!(!text.replace("\r\n", "").contains('\n'));
}
