use swarm_core::BidderConfig;

pub fn show(config: &BidderConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}
