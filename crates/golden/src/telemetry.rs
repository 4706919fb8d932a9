/// Install a `tracing` subscriber whose output goes through libtest's capture.
///
/// Honours `RUST_LOG` (default `info`). Safe to call from every test.
pub fn init_test_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_test_writer()
        .try_init();
}
