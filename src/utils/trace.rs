//! Sets up tracing for the quota controller on stdout/stderr

use tracing::{event, Level};
use tracing_subscriber::prelude::*;

use crate::conf::Tracing;

/// Setup our local tracer
///
/// # Arguments
///
/// * `name` - The name of the service to trace
/// * `conf` - The tracing settings to use
pub fn setup(name: &str, conf: &Tracing) {
    // build our local tracing layer
    let local = tracing_subscriber::fmt::layer().with_filter(conf.local.level.to_filter());
    // init our tracing registry
    tracing_subscriber::registry()
        .with(local)
        .try_init()
        .expect("Failed to register stdout registry");
    // log what level we are tracing at
    event!(Level::INFO, service = name, level = ?conf.local.level);
}
