use std::sync::OnceLock;

use tracing::error;
use tracing_subscriber::prelude::*;
use tracing_subscriber::reload::Handle;
use tracing_subscriber::{EnvFilter, Registry};

use crate::commands::Verbosity;

static LOGGER_HANDLE: OnceLock<Handle<EnvFilter, Registry>> = OnceLock::new();

/// Map a verbosity level to filter directives.
///
/// `RUST_LOG` takes precedence over these when set.
fn log_filter(verbosity: Verbosity) -> &'static str {
    match verbosity {
        // Show only errors
        Verbosity::Quiet => "off,panoramax=error,panoramax_client=error",
        // Only show warnings
        Verbosity::Verbose(0) => "off,panoramax=warn,panoramax_client=warn",
        // Show our own info logs
        Verbosity::Verbose(1) => "off,panoramax=info,panoramax_client=info",
        // Also show requests and pages as they are fetched
        Verbosity::Verbose(2) => "off,panoramax=debug,panoramax_client=debug",
        Verbosity::Verbose(3) => "off,panoramax=trace,panoramax_client=trace",
        // Also show the HTTP stack
        Verbosity::Verbose(4) => "debug,panoramax=trace,panoramax_client=trace",
        Verbosity::Verbose(_) => "trace",
    }
}

pub fn init_logger(verbosity: Option<Verbosity>) {
    let verbosity = verbosity.unwrap_or_default();

    let filter_handle = LOGGER_HANDLE.get_or_init(|| {
        let (filter, reload_handle) = tracing_subscriber::reload::Layer::new(EnvFilter::new("warn"));
        let log_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(filter);
        tracing_subscriber::registry().with(log_layer).init();
        reload_handle
    });

    update_filters(filter_handle, log_filter(verbosity));
}

fn update_filters(filter_handle: &Handle<EnvFilter, Registry>, log_filter: &str) {
    let result = filter_handle.modify(|layer| {
        match EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_filter)) {
            Ok(new_filter) => *layer = new_filter,
            Err(err) => {
                error!("Updating logger filter failed: {}", err);
            },
        };
    });
    if let Err(err) = result {
        error!("Updating logger filter failed: {}", err);
    }
}
