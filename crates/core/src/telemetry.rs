//! Process-wide Sentry and tracing setup shared by the binaries.

use crate::config::Settings;
use std::borrow::Cow;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// `release` comes from the calling binary's `sentry::release_name!()`.
pub fn init_sentry(
    settings: &Settings,
    release: Option<Cow<'static, str>>,
) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release,
            ..Default::default()
        },
    )))
}

/// Installs Sentry first so the tracing layer reports into it. Keep the
/// returned guard alive for the life of the process.
pub fn init(settings: &Settings, release: Option<Cow<'static, str>>) -> Option<sentry::ClientInitGuard> {
    let guard = init_sentry(settings, release);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    guard
}
