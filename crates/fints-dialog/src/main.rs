//! fints-inspect: decode a captured bank message and print its segments.
//!
//! Usage: `fints-inspect [--base64] <file>`. With `--base64` the file holds
//! an HTTP body as exchanged with the bank server. Set `RUST_LOG=debug` to
//! see reassembly and decoding details.

use tracing_subscriber::{fmt, EnvFilter};

use fints_core::protocol::message::Message;
use fints_dialog::catalog;
use fints_dialog::transport::codec;

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let mut base64 = false;
    let mut path = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--base64" => base64 = true,
            _ => path = Some(arg),
        }
    }
    let path = path.expect("usage: fints-inspect [--base64] <file>");

    let raw = tokio::fs::read(&path).await.expect("failed to read input");
    let raw = if base64 {
        let text = String::from_utf8_lossy(&raw);
        codec::decode_body(&text).expect("input is not valid base64").to_vec()
    } else {
        raw
    };

    let registry = catalog::registry().expect("dialog catalog is inconsistent");
    let message = Message::decode(&raw, &registry, None).expect("message could not be decoded");
    tracing::info!(%path, segments = message.segments.len(), "decoded message");

    println!("{}", message.render(&registry, true));
    for answer in message.answers() {
        println!("{:04} {}", answer.code, answer.text);
    }
}
