use tracing_subscriber::EnvFilter;

/// tracing の subscriber を初期化する
///
/// `RUST_LOG` があればそれに従い、なければ `info`（`verbose` なら自クレートのみ `debug`）。
/// `LOG_FORMAT=json` で JSON 行出力に切り替える。
pub fn init(verbose: bool) {
    let default_directive = if verbose {
        "info,aviv_chart=debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match std::env::var("LOG_FORMAT").unwrap_or_default().as_str() {
        "json" => builder.json().init(),
        _ => builder.init(),
    }
}
