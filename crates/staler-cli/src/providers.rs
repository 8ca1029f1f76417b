//! Building the provider set from configuration.

use crate::config::{Config, TwitterSettings};
use crate::error::Result;
use staler_domain::Provider;
use staler_providers::{DockerContainers, DockerImages, TransmissionTorrents, TwitterFollowing};
use std::sync::Arc;

/// Construct every enabled provider, in a fixed order.
///
/// Fails on the first provider that cannot be constructed; nothing is reaped
/// unless every enabled provider is usable.
pub fn build_providers(config: &Config) -> Result<Vec<Arc<dyn Provider>>> {
    let mut providers: Vec<Arc<dyn Provider>> = Vec::new();

    if config.docker.enabled {
        let host = config.docker.host.as_deref();
        providers.push(Arc::new(DockerContainers::new(host, config.docker.container_expiry)?));
        providers.push(Arc::new(DockerImages::new(host, config.docker.image_expiry)?));
    }

    if config.transmission.enabled {
        let settings = &config.transmission;
        providers.push(Arc::new(TransmissionTorrents::new(
            &settings.host,
            Some(settings.user.as_str()),
            Some(settings.password.as_str()),
            settings.torrent_expiry,
        )?));
    }

    if config.twitter.enabled {
        providers.push(Arc::new(twitter_following(&config.twitter)?));
    }

    for provider in &providers {
        tracing::debug!(
            "Registered {} (expiry {:?})",
            provider.identify(),
            provider.expiry()
        );
    }

    Ok(providers)
}

fn twitter_following(settings: &TwitterSettings) -> Result<TwitterFollowing> {
    Ok(TwitterFollowing::new(
        &settings.access_token,
        settings.following_expiry,
        settings.lookup_limit(),
    )?)
}
