use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::Settings;

/// `RUST_LOG` wins when set; otherwise `LOG_LEVEL` applies globally with sqlx
/// pinned to warn so statement logging stays out of request traces.
pub(crate) fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let level = &settings.telemetry().log_level;
            EnvFilter::new(format!("{level},sqlx=warn"))
        }
    };

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_span_events(fmt::format::FmtSpan::CLOSE);

    let initialized = if settings.telemetry().json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    initialized.map_err(|err| anyhow::anyhow!(err.to_string()))
}
