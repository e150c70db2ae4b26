use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = concat!(
  "parq_lab_core=info,parq_lab_arrow=info,parq_lab_eval=info,",
  "parq_cli=info,csv_to_parquet=info,warn"
);

/// Install the stderr subscriber used by the binaries. `RUST_LOG` overrides the default of info
/// for parq-lab crates and warn for everything else.
pub fn init_tracing() {
  tracing_subscriber::registry()
    .with(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    )
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .init();
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_filter_parses() {
    let filter = EnvFilter::try_new(DEFAULT_FILTER).unwrap();
    assert!(filter.to_string().contains("parq_cli=info"));
  }
}
