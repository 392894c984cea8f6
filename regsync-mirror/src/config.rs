use regsync_config::load_config;
use regsync_config::shared::MirrorConfig;

/// Loads the [`MirrorConfig`] and validates it.
pub fn load_mirror_config() -> anyhow::Result<MirrorConfig> {
    let config = load_config::<MirrorConfig>()?;
    config.validate()?;

    Ok(config)
}
