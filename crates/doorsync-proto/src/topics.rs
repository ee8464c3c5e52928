//! MQTT topic scheme for gateway addressing.
//!
//! Topic structure: `{prefix}/{gateway_id}/{channel}`
//!
//! - `command`: server-originated instructions for one gateway
//! - `telemetry`: device-originated events from one gateway
//!
//! Every command topic is derivable solely from the target gateway's
//! identifier; there are no broadcast command topics. [`GatewayId`]
//! construction already forbids separator and wildcard characters, so
//! the mapping is injective per gateway.

use doorsync_core::GatewayId;

/// Default topic prefix.
pub const DEFAULT_PREFIX: &str = "gateway";

/// Which direction a topic carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Server to gateway
    Command,
    /// Gateway to server
    Telemetry,
}

impl Channel {
    fn as_str(self) -> &'static str {
        match self {
            Channel::Command => "command",
            Channel::Telemetry => "telemetry",
        }
    }

    fn parse(segment: &str) -> Option<Self> {
        match segment {
            "command" => Some(Channel::Command),
            "telemetry" => Some(Channel::Telemetry),
            _ => None,
        }
    }
}

/// Topic scheme configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicScheme {
    prefix: String,
}

impl Default for TopicScheme {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

impl TopicScheme {
    /// Create a topic scheme with a custom prefix.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Command topic for one gateway.
    #[must_use]
    pub fn command(&self, gateway: &GatewayId) -> String {
        format!("{}/{}/{}", self.prefix, gateway, Channel::Command.as_str())
    }

    /// Telemetry topic for one gateway.
    #[must_use]
    pub fn telemetry(&self, gateway: &GatewayId) -> String {
        format!(
            "{}/{}/{}",
            self.prefix,
            gateway,
            Channel::Telemetry.as_str()
        )
    }

    /// Wildcard subscription covering every gateway's telemetry topic.
    #[must_use]
    pub fn telemetry_wildcard(&self) -> String {
        format!("{}/+/{}", self.prefix, Channel::Telemetry.as_str())
    }

    /// Parse an inbound topic into its gateway and channel.
    ///
    /// Returns `None` for topics outside the scheme; callers reject those
    /// (logged, not fatal).
    #[must_use]
    pub fn parse(&self, topic: &str) -> Option<(GatewayId, Channel)> {
        let mut parts = topic.split('/');
        if parts.next()? != self.prefix {
            return None;
        }
        let gateway = GatewayId::new(parts.next()?).ok()?;
        let channel = Channel::parse(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }
        Some((gateway, channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gw(id: &str) -> GatewayId {
        GatewayId::new(id).unwrap()
    }

    #[test]
    fn topic_generation() {
        let scheme = TopicScheme::default();

        assert_eq!(scheme.command(&gw("gw-01")), "gateway/gw-01/command");
        assert_eq!(scheme.telemetry(&gw("gw-01")), "gateway/gw-01/telemetry");
        assert_eq!(scheme.telemetry_wildcard(), "gateway/+/telemetry");
    }

    #[test]
    fn custom_prefix() {
        let scheme = TopicScheme::new("campus-a");
        assert_eq!(scheme.command(&gw("gw-9")), "campus-a/gw-9/command");
        assert_eq!(scheme.telemetry_wildcard(), "campus-a/+/telemetry");
    }

    #[test]
    fn topic_parsing() {
        let scheme = TopicScheme::default();

        let (gateway, channel) = scheme.parse("gateway/gw-01/telemetry").unwrap();
        assert_eq!(gateway.as_str(), "gw-01");
        assert_eq!(channel, Channel::Telemetry);

        let (gateway, channel) = scheme.parse("gateway/gw-01/command").unwrap();
        assert_eq!(gateway.as_str(), "gw-01");
        assert_eq!(channel, Channel::Command);
    }

    #[test]
    fn parse_roundtrips_generation() {
        let scheme = TopicScheme::default();
        let gateway = gw("entrance-3");

        assert_eq!(
            scheme.parse(&scheme.telemetry(&gateway)),
            Some((gateway.clone(), Channel::Telemetry))
        );
        assert_eq!(
            scheme.parse(&scheme.command(&gateway)),
            Some((gateway, Channel::Command))
        );
    }

    #[test]
    fn unrecognized_topics_are_rejected() {
        let scheme = TopicScheme::default();

        assert!(scheme.parse("gateway/gw-01").is_none());
        assert!(scheme.parse("gateway/gw-01/status").is_none());
        assert!(scheme.parse("gateway/gw-01/telemetry/extra").is_none());
        assert!(scheme.parse("other/gw-01/telemetry").is_none());
        assert!(scheme.parse("gateway//telemetry").is_none());
        assert!(scheme.parse("").is_none());
    }

    #[test]
    fn distinct_gateways_never_share_a_command_topic() {
        let scheme = TopicScheme::default();
        // Ids that could collide under a naive scheme are unconstructible:
        // "a/b" would alias the topic of gateway "a".
        assert!(GatewayId::new("a/b").is_err());
        assert_ne!(scheme.command(&gw("a")), scheme.command(&gw("b")));
    }
}
