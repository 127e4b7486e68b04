//! Connection pool limits
//!
//! Applies the open cap, the idle bound and the connection max lifetime to sqlx's
//! `PgPoolOptions`. Purely local: no I/O happens here.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

use crate::config::PoolSettings;

/// How long an idle connection may sit in the pool before it is closed.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Idle lifetime when `max_idle_conns` is 0: idle connections are closed on the
/// next reaper pass.
pub const NO_IDLE_TIMEOUT: Duration = Duration::from_secs(1);

/// Apply pool limits to `options`.
///
/// - `max_open_conns` caps live connections; callers beyond it wait up to
///   `acquire_timeout`
/// - the pool never opens connections on its own (`min_connections` is 0)
/// - sqlx cannot cap idle connections by count, so `max_idle_conns` only decides
///   whether idle connections are kept ([`IDLE_TIMEOUT`]) or closed almost at
///   once ([`NO_IDLE_TIMEOUT`])
/// - a zero `conn_max_lifetime` disables age-based recycling
pub fn configure(options: PgPoolOptions, settings: &PoolSettings) -> PgPoolOptions {
    let max_lifetime =
        (!settings.conn_max_lifetime.is_zero()).then_some(settings.conn_max_lifetime);
    let idle_timeout = if settings.max_idle_conns == 0 {
        NO_IDLE_TIMEOUT
    } else {
        IDLE_TIMEOUT
    };

    options
        .max_connections(settings.max_open_conns.max(1))
        .min_connections(0)
        .idle_timeout(Some(idle_timeout))
        .max_lifetime(max_lifetime)
        .acquire_timeout(settings.acquire_timeout)
}
