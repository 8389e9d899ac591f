//! Tracing Setup
//!
//! Structured logging via `tracing`, with an `EnvFilter` honoring
//! `RUST_LOG`. Called once at binary startup; library users are expected to
//! install their own subscriber.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize the global tracing subscriber.
///
/// Defaults the crate to `info` and quiets the TLS/transport internals
/// unless `RUST_LOG` overrides them.
#[allow(clippy::expect_used)]
pub fn init() {
    let env_filter = EnvFilter::from_default_env()
        .add_directive(
            "ticktape_streamer=info"
                .parse()
                .expect("static directive 'ticktape_streamer=info' is valid"),
        )
        .add_directive(
            "tungstenite=warn"
                .parse()
                .expect("static directive 'tungstenite=warn' is valid"),
        )
        .add_directive(
            "rustls=warn"
                .parse()
                .expect("static directive 'rustls=warn' is valid"),
        );

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
