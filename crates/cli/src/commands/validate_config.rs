use anyhow::{Context, Result};
use flywheel_core::TokenConfig;

/// Validates a per-token config file before it is written to the store. This
/// is the same check the engine applies on update, so a file that passes here
/// will not be rejected by a scheduler later.
pub fn run_validate_config(path: &str) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {path}"))?;
    let config: TokenConfig =
        serde_json::from_str(&raw).with_context(|| format!("failed to parse {path}"))?;

    let warnings = config
        .validate()
        .with_context(|| format!("{path} is not a valid token config"))?;

    for warning in &warnings {
        println!("warning: {warning:?}");
    }
    println!(
        "ok: {} {}x{} cycle, interval {}s, timeout {}s, share {}/min",
        config.algorithm.as_str(),
        config.cycle_buys,
        config.cycle_sells,
        config.interval_secs,
        config.confirmation_timeout_secs,
        config.rate_limit_share,
    );
    Ok(())
}
