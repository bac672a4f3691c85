use crate::config::PlaybackConfig;

pub fn setup_logging(config: &PlaybackConfig) {
    common::setup_logging(config.environment);
}
