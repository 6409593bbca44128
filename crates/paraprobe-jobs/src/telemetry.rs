//! Tracing initialisation for paraprobe binaries.
//!
//! Log lines go to stderr in both formats, leaving stdout to the results a
//! command prints. Later calls are ignored: the global subscriber can only
//! be set once per process.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` directives take precedence over `level`; invalid directives
/// are skipped rather than disabling logging.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let output = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let output = if json {
        output.json().boxed()
    } else {
        output.boxed()
    };

    if tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .try_init()
        .is_err()
    {
        tracing::debug!("Tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing(false, Level::INFO);
        init_tracing(true, Level::DEBUG);
        tracing::info!("still logging");
    }
}
