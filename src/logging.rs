use tracing_subscriber::filter::Directive;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const VERBOSE_DIRECTIVE: &str = "rustab=debug";

/// Build the filter from `RUSTAB_LOG`/`RUST_LOG` (`env`) and the `-v` flag.
/// `verbose` always adds per-request events from this crate on top of
/// whatever the environment asked for.
fn build_filter(env: Option<String>, verbose: bool) -> EnvFilter {
    let filter = env.map_or_else(
        || EnvFilter::new("warn"),
        |value| EnvFilter::try_new(value).unwrap_or_else(|_| EnvFilter::new("warn")),
    );
    if !verbose {
        return filter;
    }
    match VERBOSE_DIRECTIVE.parse::<Directive>() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

/// Install the global subscriber, writing to stderr.
pub fn init_logging(verbose: bool) {
    let env = std::env::var("RUSTAB_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(build_filter(env, verbose))
        .with_writer(std::io::stderr)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set global default subscriber: {}", err);
    }
}
