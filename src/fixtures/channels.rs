//! Channel Fixtures

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::{
    channels::Channel,
    fixtures::{Fixture, FixtureError, parse_currency, parse_price},
};

/// Wrapper for channels in YAML
#[derive(Debug, Deserialize)]
pub struct ChannelsFixture {
    /// Map of channel key -> channel fixture
    pub channels: FxHashMap<String, ChannelFixture>,
}

/// Channel Fixture
#[derive(Debug, Deserialize)]
pub struct ChannelFixture {
    /// Currency code (e.g., "GBP")
    pub currency: String,

    /// Shipping method key -> price (e.g., "4.99 GBP")
    #[serde(default)]
    pub shipping_methods: FxHashMap<String, String>,
}

impl Fixture {
    /// Load channels and their shipping methods from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a
    /// shipping price is not in the channel's currency.
    pub fn load_channels(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let fixture: ChannelsFixture = self.read("channels", name)?;

        for (slug, channel_fixture) in fixture.channels {
            let currency = parse_currency(&channel_fixture.currency)?;
            let mut listings = Vec::with_capacity(channel_fixture.shipping_methods.len());

            for (method_name, price) in channel_fixture.shipping_methods {
                let price = parse_price(&price)?;

                if price.currency() != currency {
                    return Err(FixtureError::CurrencyMismatch(
                        currency.iso_alpha_code.to_string(),
                        price.currency().iso_alpha_code.to_string(),
                    ));
                }

                let method = match self.shipping_method_keys.get(&method_name) {
                    Some(method) => *method,
                    None => {
                        let method = self.scenario.shipping_methods.insert(method_name.clone());

                        self.shipping_method_keys.insert(method_name, method);

                        method
                    }
                };

                listings.push((method, price));
            }

            let channel_slug = slug.clone();
            let key = self.scenario.channels.insert_with_key(|key| {
                listings
                    .into_iter()
                    .fold(Channel::new(key, channel_slug, currency), |channel, (method, price)| {
                        channel.with_shipping_method(method, price)
                    })
            });

            self.channel_keys.insert(slug, key);
        }

        Ok(self)
    }
}
