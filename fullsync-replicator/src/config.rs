use fullsync_config::load_config;
use fullsync_config::shared::ReplicatorConfig;

/// Loads and validates the replicator configuration of the current environment.
pub fn load_replicator_config() -> anyhow::Result<ReplicatorConfig> {
    let config = load_config::<ReplicatorConfig>()?;
    config.validate()?;

    Ok(config)
}
