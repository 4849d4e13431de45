use std::io::{Read, Write};
use std::net::TcpListener;
use std::process::{Command, Output};
use std::thread;

use slowdrip_common::TARGET_PORT;

fn slowdrip(args: &[&str], target_ip: &str) -> Output {
    Command::new(env!("CARGO_BIN_EXE_slowdrip"))
        .args(args)
        .current_dir(std::env::temp_dir())
        .env("TARGET_IP", target_ip)
        .env("RUST_LOG", "warn")
        .output()
        .expect("binary runs")
}

#[test]
fn zero_workers_is_rejected() {
    let out = slowdrip(&["0"], "127.0.0.1");
    assert!(!out.status.success());
}

#[test]
fn missing_worker_count_is_rejected() {
    let out = slowdrip(&[], "127.0.0.1");
    assert!(!out.status.success());
}

#[test]
fn unresolvable_target_exits_non_zero() {
    let out = slowdrip(&["2"], "slowdrip-test.invalid");
    assert!(!out.status.success());
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn successful_run_exits_zero() {
    // The binary always dials the fixed port; skip when it is taken.
    let Ok(listener) = TcpListener::bind(("127.0.0.1", TARGET_PORT)) else {
        eprintln!("port {TARGET_PORT} busy, skipping");
        return;
    };

    let server = thread::spawn(move || {
        let mut handlers = Vec::new();
        for _ in 0..2 {
            let (mut socket, _) = listener.accept().unwrap();
            handlers.push(thread::spawn(move || {
                let mut received = Vec::new();
                let mut buf = [0u8; 64];
                while !received.ends_with(b"\r\n\r\n") {
                    match socket.read(&mut buf) {
                        Ok(0) | Err(_) => return,
                        Ok(n) => received.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = socket.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
                while matches!(socket.read(&mut buf), Ok(n) if n > 0) {}
            }));
        }
        for handler in handlers {
            handler.join().unwrap();
        }
    });

    let out = slowdrip(&["2"], "127.0.0.1");
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    server.join().unwrap();
}
