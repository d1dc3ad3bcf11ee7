use tracing_subscriber::{fmt, EnvFilter};

use crate::{errors::Error, Result};

/// Initialize tracing for the relay.
///
/// Default: info for our crates, warn for everything else.
/// Can be overridden with `RUST_LOG`.
pub fn init(service_name: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(service_name)));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .try_init()
        .map_err(|e| Error::Config(format!("failed to install log subscriber: {e}")))
}

fn default_directives(service_name: &str) -> String {
    let service = service_name.replace('-', "_");
    let mut directives = vec!["warn".to_string()];
    for target in ["relay_core", "relay_telegram", service.as_str()] {
        let directive = format!("{target}=info");
        if !directives.contains(&directive) {
            directives.push(directive);
        }
    }
    directives.join(",")
}
