use std::sync::OnceLock;
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, Layer, fmt, fmt::format::FmtSpan, layer::SubscriberExt, registry::LookupSpan,
    util::SubscriberInitExt,
};

static TRACING_INIT: OnceLock<bool> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    fn from_env() -> Self {
        Self::parse(
            &std::env::var("REGISTRY_GATE_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
        )
    }

    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "compact" => Self::Compact,
            _ => Self::Pretty,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Compact => "compact",
            Self::Json => "json",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TracingSettings {
    pub filter: String,
    pub log_format: LogFormat,
    /// False when another global subscriber was already in place.
    pub installed: bool,
}

fn fmt_layer<S>(log_format: LogFormat) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = fmt::layer().with_span_events(FmtSpan::CLOSE);
    match log_format {
        LogFormat::Json => layer
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Compact => layer.compact().with_line_number(true).boxed(),
        LogFormat::Pretty => layer.pretty().with_line_number(true).boxed(),
    }
}

/// Installs the global subscriber once; later calls only report settings.
/// Never panics if the host already owns a subscriber; `installed` is false
/// in that case and the host's subscriber stays in charge.
pub fn init_from_env(default_level: &str) -> TracingSettings {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| format!("registry_gate={default_level}"));
    let log_format = LogFormat::from_env();

    let installed = *TRACING_INIT.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&filter))
            .unwrap_or_else(|_| EnvFilter::new("registry_gate=info"));
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_error::ErrorLayer::default())
            .with(fmt_layer(log_format))
            .try_init()
            .is_ok()
    });

    TracingSettings {
        filter,
        log_format,
        installed,
    }
}
