use crate::domain::device::{Brand, Protocol};
use std::collections::HashMap;

/// How a translated command code is turned into bytes on the wire.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum PayloadShape {
    /// `POST <path>` with body `{"key": <code>}`.
    KeyField { path: &'static str },
    /// `POST <prefix><code>` with an empty body (ECP style).
    PathSegment { prefix: &'static str },
    /// JSON envelope with the brand's remote-key-click method name, written
    /// over the device's persistent connection.
    SocketEnvelope { method: &'static str },
}

/// Everything the core knows about one brand: transport, default ports, the
/// identification endpoint used while fingerprinting, the payload shape and
/// the logical-to-vendor command table. Adding a brand is a data change.
#[derive(Clone, Debug)]
pub struct BrandSpec {
    pub brand: Brand,
    pub protocol: Protocol,
    pub ports: Vec<u16>,
    pub fingerprint_path: String,
    pub payload: PayloadShape,
    commands: HashMap<&'static str, &'static str>,
}

impl BrandSpec {
    pub fn new(brand: Brand, protocol: Protocol, ports: Vec<u16>, fingerprint_path: &str, payload: PayloadShape, commands: &[(&'static str, &'static str)]) -> Self {
        BrandSpec {
            brand,
            protocol,
            ports,
            fingerprint_path: fingerprint_path.to_string(),
            payload,
            commands: commands.iter().copied().collect(),
        }
    }

    pub fn translate(&self, logical: &str) -> Option<&'static str> {
        self.commands.get(logical).copied()
    }
}

/// The brand/protocol registry. Brands are kept in fingerprint precedence
/// order; tests build isolated instances with their own ports instead of
/// sharing the default table.
#[derive(Debug)]
pub struct BrandRegistry {
    specs: Vec<BrandSpec>,
}

const PHILIPS_COMMANDS: &[(&str, &str)] = &[
    ("power", "Standby"),
    ("volume_up", "VolumeUp"),
    ("volume_down", "VolumeDown"),
    ("mute", "Mute"),
    ("home", "Home"),
    ("back", "Back"),
    ("up", "CursorUp"),
    ("down", "CursorDown"),
    ("left", "CursorLeft"),
    ("right", "CursorRight"),
    ("ok", "Confirm"),
    ("play", "Play"),
    ("pause", "Pause"),
    ("stop", "Stop"),
    ("rewind", "Rewind"),
    ("forward", "FastForward"),
    ("source", "Source"),
    ("info", "Info"),
];

const SAMSUNG_COMMANDS: &[(&str, &str)] = &[
    ("power", "KEY_POWER"),
    ("volume_up", "KEY_VOLUP"),
    ("volume_down", "KEY_VOLDOWN"),
    ("mute", "KEY_MUTE"),
    ("home", "KEY_HOME"),
    ("back", "KEY_RETURN"),
    ("up", "KEY_UP"),
    ("down", "KEY_DOWN"),
    ("left", "KEY_LEFT"),
    ("right", "KEY_RIGHT"),
    ("ok", "KEY_ENTER"),
    ("play", "KEY_PLAY"),
    ("pause", "KEY_PAUSE"),
    ("stop", "KEY_STOP"),
    ("rewind", "KEY_REWIND"),
    ("forward", "KEY_FF"),
    ("source", "KEY_SOURCE"),
    ("info", "KEY_INFO"),
];

const LG_COMMANDS: &[(&str, &str)] = &[
    ("power", "POWER"),
    ("volume_up", "VOLUMEUP"),
    ("volume_down", "VOLUMEDOWN"),
    ("mute", "MUTE"),
    ("home", "HOME"),
    ("back", "BACK"),
    ("up", "UP"),
    ("down", "DOWN"),
    ("left", "LEFT"),
    ("right", "RIGHT"),
    ("ok", "ENTER"),
    ("play", "PLAY"),
    ("pause", "PAUSE"),
    ("stop", "STOP"),
    ("rewind", "REWIND"),
    ("forward", "FASTFORWARD"),
    ("info", "INFO"),
];

// Roku has no dedicated stop key; playback commands map onto its ECP keypress names.
const ROKU_COMMANDS: &[(&str, &str)] = &[
    ("power", "Power"),
    ("volume_up", "VolumeUp"),
    ("volume_down", "VolumeDown"),
    ("mute", "VolumeMute"),
    ("home", "Home"),
    ("back", "Back"),
    ("up", "Up"),
    ("down", "Down"),
    ("left", "Left"),
    ("right", "Right"),
    ("ok", "Select"),
    ("play", "Play"),
    ("pause", "Play"),
    ("rewind", "Rev"),
    ("forward", "Fwd"),
    ("info", "Info"),
];

impl BrandRegistry {
    pub fn new(specs: Vec<BrandSpec>) -> Self {
        BrandRegistry { specs }
    }

    pub fn spec_for(&self, brand: Brand) -> Option<&BrandSpec> {
        self.specs.iter().find(|spec| spec.brand == brand)
    }

    pub fn translate(&self, brand: Brand, logical: &str) -> Option<&'static str> {
        self.spec_for(brand).and_then(|spec| spec.translate(logical))
    }

    /// Probe port order: every brand's primary port first, secondary ports
    /// after, duplicates removed. With the default table this yields
    /// 1925, 8001, 8060, 3000, 1926, 8002.
    pub fn probe_ports(&self) -> Vec<u16> {
        let mut ports = Vec::new();
        let longest = self.specs.iter().map(|spec| spec.ports.len()).max().unwrap_or(0);
        for rank in 0..longest {
            for spec in &self.specs {
                if let Some(&port) = spec.ports.get(rank) {
                    if !ports.contains(&port) {
                        ports.push(port);
                    }
                }
            }
        }
        ports
    }

    /// Brands claiming the given port, in fingerprint precedence order.
    pub fn candidates_for_port(&self, port: u16) -> impl Iterator<Item = &BrandSpec> {
        self.specs.iter().filter(move |spec| spec.ports.contains(&port))
    }
}

impl Default for BrandRegistry {
    fn default() -> Self {
        BrandRegistry::new(vec![
            BrandSpec::new(
                Brand::Philips,
                Protocol::Http,
                vec![1925, 1926],
                "/6/system",
                PayloadShape::KeyField { path: "/6/input/key" },
                PHILIPS_COMMANDS,
            ),
            BrandSpec::new(
                Brand::Samsung,
                Protocol::Socket,
                vec![8001, 8002],
                "/api/v2/",
                PayloadShape::SocketEnvelope { method: "ms.remote.control" },
                SAMSUNG_COMMANDS,
            ),
            BrandSpec::new(
                Brand::Roku,
                Protocol::Ecp,
                vec![8060],
                "/query/device-info",
                PayloadShape::PathSegment { prefix: "/keypress/" },
                ROKU_COMMANDS,
            ),
            BrandSpec::new(
                Brand::Lg,
                Protocol::Socket,
                vec![3000],
                "/udap/api/data",
                PayloadShape::SocketEnvelope { method: "com.webos.service.remotecontrol" },
                LG_COMMANDS,
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(Brand::Philips, "power", "Standby")]
    #[case(Brand::Philips, "ok", "Confirm")]
    #[case(Brand::Samsung, "volume_up", "KEY_VOLUP")]
    #[case(Brand::Samsung, "back", "KEY_RETURN")]
    #[case(Brand::Lg, "forward", "FASTFORWARD")]
    #[case(Brand::Roku, "mute", "VolumeMute")]
    #[case(Brand::Roku, "ok", "Select")]
    fn translates_logical_commands_to_vendor_codes(#[case] brand: Brand, #[case] logical: &str, #[case] code: &str) {
        let registry = BrandRegistry::default();

        assert_eq!(registry.translate(brand, logical), Some(code));
    }

    #[rstest]
    #[case(Brand::Roku, "stop")]
    #[case(Brand::Philips, "does_not_exist")]
    #[case(Brand::Unknown, "power")]
    fn unmapped_commands_translate_to_none(#[case] brand: Brand, #[case] logical: &str) {
        let registry = BrandRegistry::default();

        assert_eq!(registry.translate(brand, logical), None);
    }

    #[test]
    fn probe_ports_follow_the_fixed_precedence_order() {
        let registry = BrandRegistry::default();

        assert_eq!(registry.probe_ports(), vec![1925, 8001, 8060, 3000, 1926, 8002]);
    }

    #[test]
    fn candidates_for_a_port_keep_table_order() {
        let registry = BrandRegistry::default();

        let brands = registry.candidates_for_port(8001).map(|spec| spec.brand).collect::<Vec<_>>();
        assert_eq!(brands, vec![Brand::Samsung]);

        let brands = registry.candidates_for_port(9).map(|spec| spec.brand).collect::<Vec<_>>();
        assert_eq!(brands, Vec::<Brand>::new());
    }

    #[test]
    fn each_brand_has_exactly_one_default_protocol() {
        let registry = BrandRegistry::default();

        assert_eq!(registry.spec_for(Brand::Philips).map(|s| s.protocol), Some(Protocol::Http));
        assert_eq!(registry.spec_for(Brand::Samsung).map(|s| s.protocol), Some(Protocol::Socket));
        assert_eq!(registry.spec_for(Brand::Lg).map(|s| s.protocol), Some(Protocol::Socket));
        assert_eq!(registry.spec_for(Brand::Roku).map(|s| s.protocol), Some(Protocol::Ecp));
        assert!(registry.spec_for(Brand::Unknown).is_none());
    }
}
