use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `RUST_LOG` wins; otherwise our own crate at info (debug when verbose).
fn default_filter(verbose: bool) -> EnvFilter {
    let directive = if verbose {
        "legal_mcp=debug,info"
    } else {
        "legal_mcp=info,warn"
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive))
}

pub fn init_cli_logger(verbose: bool) {
    tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(fmt::layer().with_target(false).compact())
        .init();
}

/// One JSON object per line, for Cloud Logging.
pub fn init_json_logger(verbose: bool) {
    tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(
            fmt::layer()
                .json()
                .with_target(false)
                .with_current_span(false)
                .flatten_event(true),
        )
        .init();
}

/// Shortens user-supplied text for log lines.
pub fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        assert_eq!(preview("hello world", 5), "hello");
        assert_eq!(preview("short", 50), "short");
        assert_eq!(preview("合約條款測試", 2), "合約");
    }
}
