use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Installs the global fmt subscriber.
///
/// `filter` overrides `RUST_LOG` when given. Fails (rather than panicking)
/// when a global subscriber is already installed.
pub fn init_logging(
    filter: Option<&str>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let env_filter = match filter {
        Some(directives) => EnvFilter::try_new(directives)?,
        None => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))?,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails_instead_of_panicking() {
        // The first call may lose to another test; the second always finds one installed.
        let _ = init_logging(Some("debug"));
        assert!(init_logging(Some("debug")).is_err());
    }

    #[test]
    fn test_invalid_directive_is_an_error() {
        assert!(init_logging(Some("package_promoter=notalevel")).is_err());
    }
}
