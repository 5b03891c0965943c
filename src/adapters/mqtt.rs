//! MQTT broker session adapter.
//!
//! Owns the client handle and implements [`PublishPort`]. Client callback
//! events are translated into [`SessionEvent`]s for the [`SessionManager`];
//! the client itself handles transport reconnection.
//!
//! - **`target_os = "espidf"`**: `EspMqttClient` with a callback for
//!   connect/disconnect. `MQTT_EVENT_ERROR` is taken from a raw handler
//!   registered on the client handle, since the safe callback drops the
//!   error codes. Publishes use `enqueue`, which copies into the client's
//!   outbox and returns the message id without waiting for the network.
//! - **other targets**: a simulated session that reports Connected shortly
//!   after start and logs every publish.

use std::sync::Arc;

use log::info;

use crate::app::events::SessionEvent;
use crate::app::ports::{MessageId, PublishPort, QoS};
use crate::app::session::{SessionConfig, SessionManager};
use crate::error::{PublishError, SessionError};

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration};

/// Error class carried by the client's error event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorKind {
    TcpTransport,
    ConnectionRefused,
    Other,
}

/// Map a client error report to a session error: transport failures carry
/// the socket errno, refusals the broker's CONNACK return code. Other
/// classes are not tracked by the session.
pub fn classify_client_error(
    kind: ClientErrorKind,
    sock_errno: i32,
    connect_return_code: u32,
) -> Option<SessionError> {
    match kind {
        ClientErrorKind::TcpTransport => Some(SessionError::Transport { code: sock_errno }),
        ClientErrorKind::ConnectionRefused => Some(SessionError::Refused {
            code: connect_return_code,
        }),
        ClientErrorKind::Other => None,
    }
}

#[cfg(target_os = "espidf")]
mod raw_errors {
    use core::ffi::c_void;

    use esp_idf_svc::sys;
    use log::warn;

    use super::{ClientErrorKind, classify_client_error};
    use crate::app::events::SessionEvent;
    use crate::app::session::SessionManager;

    /// `MQTT_EVENT_ERROR` handler. `arg` is the `SessionManager` owned by
    /// the `MqttSession` that registered it.
    pub(super) unsafe extern "C" fn on_client_error(
        arg: *mut c_void,
        _base: sys::esp_event_base_t,
        _id: i32,
        data: *mut c_void,
    ) {
        if arg.is_null() || data.is_null() {
            return;
        }
        // SAFETY: `arg` outlives the client (see `MqttSession` field order);
        // `data` is the client's event for the duration of this call.
        let (session, event) = unsafe {
            (
                &*arg.cast::<SessionManager>(),
                &*data.cast::<sys::esp_mqtt_event_t>(),
            )
        };
        if event.error_handle.is_null() {
            return;
        }
        // SAFETY: non-null and owned by the client for this call.
        let codes = unsafe { &*event.error_handle };

        let kind = if codes.error_type == sys::esp_mqtt_error_type_t_MQTT_ERROR_TYPE_TCP_TRANSPORT {
            ClientErrorKind::TcpTransport
        } else if codes.error_type == sys::esp_mqtt_error_type_t_MQTT_ERROR_TYPE_CONNECTION_REFUSED {
            ClientErrorKind::ConnectionRefused
        } else {
            ClientErrorKind::Other
        };
        match classify_client_error(
            kind,
            codes.esp_transport_sock_errno,
            codes.connect_return_code as u32,
        ) {
            Some(e) => session.handle_event(SessionEvent::Error(e)),
            None => warn!("MQTT: client error (type {})", codes.error_type),
        }
    }
}

pub struct MqttSession {
    // Declared before `session`: the client is destroyed first, so the raw
    // error handler never sees a dangling session pointer.
    #[cfg(target_os = "espidf")]
    client: EspMqttClient<'static>,
    session: Arc<SessionManager>,
    #[cfg(not(target_os = "espidf"))]
    next_id: MessageId,
}

impl MqttSession {
    /// Create the client and begin connecting.
    ///
    /// Only a malformed configuration fails here; an unreachable broker
    /// shows up later as `Error`/`Disconnected` events.
    #[cfg(target_os = "espidf")]
    pub fn start(config: &SessionConfig, session: Arc<SessionManager>) -> Result<Self, SessionError> {
        config.log_summary();

        let conf = MqttClientConfiguration {
            client_id: Some(config.client_id.as_str()),
            username: config.username.as_deref(),
            password: config.password.as_deref(),
            ..Default::default()
        };

        let events = session.clone();
        let client = EspMqttClient::new_cb(&config.broker_url, &conf, move |event| {
            let event = match event.payload() {
                EventPayload::Connected(_) => SessionEvent::Connected,
                EventPayload::Disconnected => SessionEvent::Disconnected,
                // Errors arrive through `raw_errors::on_client_error`.
                _ => return,
            };
            events.handle_event(event);
        })
        .map_err(|e| SessionError::Setup(e.code()))?;

        {
            use esp_idf_svc::handle::RawHandle;
            use esp_idf_svc::sys::{self, esp};

            // SAFETY: the session pointer stays valid while the client
            // exists, see the field order of `MqttSession`.
            esp!(unsafe {
                sys::esp_mqtt_client_register_event(
                    client.handle(),
                    sys::esp_mqtt_event_id_t_MQTT_EVENT_ERROR,
                    Some(raw_errors::on_client_error),
                    Arc::as_ptr(&session).cast_mut().cast(),
                )
            })
            .map_err(|e| SessionError::Setup(e.code()))?;
        }

        info!("MQTT: client started");
        Ok(Self { client, session })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn start(config: &SessionConfig, session: Arc<SessionManager>) -> Result<Self, SessionError> {
        config.log_summary();

        let events = session.clone();
        std::thread::Builder::new()
            .name("sim-mqtt".into())
            .spawn(move || {
                std::thread::sleep(std::time::Duration::from_millis(500));
                events.handle_event(SessionEvent::Connected);
            })
            .map_err(|_| SessionError::Setup(-1))?;

        info!("MQTT(sim): client started for {}", config.broker_url);
        Ok(Self { session, next_id: 0 })
    }
}

impl PublishPort for MqttSession {
    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<MessageId, PublishError> {
        if !self.session.is_connected() {
            return Err(PublishError::NotConnected);
        }

        #[cfg(target_os = "espidf")]
        {
            use esp_idf_svc::mqtt::client::QoS as ClientQoS;
            let qos = match qos {
                QoS::AtMostOnce => ClientQoS::AtMostOnce,
                QoS::AtLeastOnce => ClientQoS::AtLeastOnce,
            };
            self.client
                .enqueue(topic, qos, retain, payload)
                .map_err(|e| PublishError::Rejected(e.code()))
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.next_id = self.next_id.wrapping_add(1);
            info!(
                "MQTT(sim): {} {:?} retain={} {}",
                topic,
                qos,
                retain,
                String::from_utf8_lossy(payload)
            );
            Ok(self.next_id)
        }
    }
}
