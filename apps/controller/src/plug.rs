use boiler_protocol::relay::KasaPlug;
use smart_boiler::PowerSwitch;
use std::time::Duration;

use crate::config::PlugConfig;

/// The heater's Kasa plug as a [`PowerSwitch`].
pub struct PlugSwitch {
    plug: KasaPlug,
}

impl PlugSwitch {
    pub fn new(config: &PlugConfig) -> Self {
        PlugSwitch {
            plug: KasaPlug::with_port(&config.host, config.port)
                .timeout(Duration::from_secs(config.timeout_sec)),
        }
    }

    pub fn plug(&self) -> &KasaPlug {
        &self.plug
    }
}

impl PowerSwitch for PlugSwitch {
    fn turn_on(&self) -> anyhow::Result<()> {
        self.plug.set_relay(true)
    }

    fn turn_off(&self) -> anyhow::Result<()> {
        self.plug.set_relay(false)
    }
}
