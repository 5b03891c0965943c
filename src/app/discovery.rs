//! Home Assistant MQTT discovery records.
//!
//! Two sensor entities are registered per device, both under the client
//! identity used as the discovery node id:
//!
//! ```text
//! homeassistant/sensor/<node_id>/distance/config     (retained, QoS1)
//! homeassistant/sensor/<node_id>/percentage/config   (retained, QoS1)
//! homeassistant/sensor/<node_id>/state               (QoS0, shared state topic)
//! ```
//!
//! The distance record carries the full device block; the percentage record
//! references the same device by identifier only.

use core::fmt::Write;

use heapless::String as HString;
use log::{debug, info};
use serde::Serialize;

use crate::error::PublishError;

use super::ports::{PublishPort, QoS};
use super::session::SessionManager;

pub const DISCOVERY_PREFIX: &str = "homeassistant";

pub const DEVICE_NAME: &str = "Water Softener Salt Level";
pub const DEVICE_MODEL: &str = "ESP32 HC-SR04";
pub const DEVICE_MANUFACTURER: &str = "DIY";

/// Fixed-capacity topic buffer.
pub type Topic = HString<128>;

/// The quantities registered with the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Distance,
    Percentage,
}

impl EntityKind {
    /// Publication order. The primary record goes first.
    pub const ALL: [EntityKind; 2] = [EntityKind::Distance, EntityKind::Percentage];

    /// Topic level and unique-id suffix; also the state payload key.
    pub fn slug(self) -> &'static str {
        match self {
            Self::Distance => "distance",
            Self::Percentage => "percentage",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Distance => "Salt Level Distance",
            Self::Percentage => "Salt Level Percentage",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Self::Distance => "cm",
            Self::Percentage => "%",
        }
    }

    pub fn value_template(self) -> &'static str {
        match self {
            Self::Distance => "{{ value_json.distance }}",
            Self::Percentage => "{{ value_json.percentage }}",
        }
    }

    fn is_primary(self) -> bool {
        self == Self::Distance
    }
}

#[derive(Serialize)]
struct DeviceDescriptor<'a> {
    identifiers: [&'a str; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    manufacturer: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sw_version: Option<&'a str>,
}

#[derive(Serialize)]
struct DiscoveryRecord<'a> {
    name: &'a str,
    state_topic: &'a str,
    unit_of_measurement: &'a str,
    value_template: &'a str,
    unique_id: &'a str,
    device: DeviceDescriptor<'a>,
}

/// `homeassistant/sensor/<node_id>/state`
pub fn state_topic(node_id: &str) -> Result<Topic, PublishError> {
    let mut t = Topic::new();
    write!(t, "{DISCOVERY_PREFIX}/sensor/{node_id}/state").map_err(|_| PublishError::TopicTooLong)?;
    Ok(t)
}

/// `homeassistant/sensor/<node_id>/<entity>/config`
pub fn config_topic(node_id: &str, kind: EntityKind) -> Result<Topic, PublishError> {
    let mut t = Topic::new();
    write!(t, "{DISCOVERY_PREFIX}/sensor/{node_id}/{}/config", kind.slug())
        .map_err(|_| PublishError::TopicTooLong)?;
    Ok(t)
}

/// Publishes the registration records for one device.
pub struct DiscoveryPublisher {
    node_id: String,
    sw_version: &'static str,
    state_topic: Topic,
    config_topics: [Topic; 2],
}

impl DiscoveryPublisher {
    /// Fails when a topic built from `node_id` does not fit [`Topic`].
    pub fn new(node_id: &str, sw_version: &'static str) -> Result<Self, PublishError> {
        Ok(Self {
            node_id: node_id.to_owned(),
            sw_version,
            state_topic: state_topic(node_id)?,
            config_topics: [
                config_topic(node_id, EntityKind::Distance)?,
                config_topic(node_id, EntityKind::Percentage)?,
            ],
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn state_topic(&self) -> &str {
        &self.state_topic
    }

    /// JSON body of the registration record for `kind`.
    pub fn record_payload(&self, kind: EntityKind) -> Result<Vec<u8>, PublishError> {
        let unique_id = format!("{}_{}", self.node_id, kind.slug());
        let device = if kind.is_primary() {
            DeviceDescriptor {
                identifiers: [self.node_id.as_str()],
                name: Some(DEVICE_NAME),
                model: Some(DEVICE_MODEL),
                manufacturer: Some(DEVICE_MANUFACTURER),
                sw_version: Some(self.sw_version),
            }
        } else {
            DeviceDescriptor {
                identifiers: [self.node_id.as_str()],
                name: None,
                model: None,
                manufacturer: None,
                sw_version: None,
            }
        };
        let record = DiscoveryRecord {
            name: kind.display_name(),
            state_topic: &self.state_topic,
            unit_of_measurement: kind.unit(),
            value_template: kind.value_template(),
            unique_id: &unique_id,
            device,
        };
        serde_json::to_vec(&record).map_err(|_| PublishError::Encode)
    }

    /// Publish both records, retained at QoS1.
    ///
    /// A no-op returning [`PublishError::NotConnected`] while the session is
    /// down; nothing reaches the client in that case. Stops at the first
    /// client rejection. Returns the number of records handed to the client.
    pub fn publish(
        &self,
        session: &SessionManager,
        port: &mut impl PublishPort,
    ) -> Result<usize, PublishError> {
        if !session.is_connected() {
            debug!("Discovery: session not connected, skipping");
            return Err(PublishError::NotConnected);
        }

        let mut sent = 0;
        for (kind, topic) in EntityKind::ALL.iter().zip(self.config_topics.iter()) {
            let payload = self.record_payload(*kind)?;
            let msg_id = port.publish(topic.as_str(), &payload, QoS::AtLeastOnce, true)?;
            info!("Discovery: {} sent (msg_id={})", kind.slug(), msg_id);
            sent += 1;
        }
        Ok(sent)
    }
}
