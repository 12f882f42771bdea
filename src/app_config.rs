use config::Config;
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    discovery: Discovery,
    dispatch: Dispatch,
}

impl AppConfig {
    pub fn load() -> Self {
        Config::builder()
            .add_source(config::File::with_name("config").required(true))
            .add_source(config::File::with_name("config_local").required(false))
            .add_source(config::Environment::default())
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    pub fn discovery(&self) -> &Discovery {
        &self.discovery
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }
}

#[derive(Debug, Deserialize)]
pub struct Discovery {
    range_start: Ipv4Addr,
    range_end: Ipv4Addr,
    per_host_timeout_ms: u64,
    fingerprint_timeout_ms: u64,
    max_in_flight: usize,
}

impl Discovery {
    pub fn range_start(&self) -> Ipv4Addr {
        self.range_start
    }

    pub fn range_end(&self) -> Ipv4Addr {
        self.range_end
    }

    pub fn per_host_timeout(&self) -> Duration {
        Duration::from_millis(self.per_host_timeout_ms)
    }

    pub fn fingerprint_timeout(&self) -> Duration {
        Duration::from_millis(self.fingerprint_timeout_ms)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }
}

#[derive(Debug, Deserialize)]
pub struct Dispatch {
    send_timeout_ms: u64,
    connect_timeout_ms: u64,
    inter_command_delay_ms: u64,
}

impl Dispatch {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn inter_command_delay(&self) -> Duration {
        Duration::from_millis(self.inter_command_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn deserializes_a_full_configuration() {
        let toml = r#"
            [discovery]
            range_start = "192.168.1.1"
            range_end = "192.168.1.254"
            per_host_timeout_ms = 400
            fingerprint_timeout_ms = 1500
            max_in_flight = 16

            [dispatch]
            send_timeout_ms = 5000
            connect_timeout_ms = 3000
            inter_command_delay_ms = 300
        "#;

        let config: AppConfig = Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.discovery().range_start(), Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(config.discovery().range_end(), Ipv4Addr::new(192, 168, 1, 254));
        assert_eq!(config.discovery().per_host_timeout(), Duration::from_millis(400));
        assert_eq!(config.discovery().fingerprint_timeout(), Duration::from_millis(1500));
        assert_eq!(config.discovery().max_in_flight(), 16);
        assert_eq!(config.dispatch().send_timeout(), Duration::from_millis(5000));
        assert_eq!(config.dispatch().connect_timeout(), Duration::from_millis(3000));
        assert_eq!(config.dispatch().inter_command_delay(), Duration::from_millis(300));
    }
}
