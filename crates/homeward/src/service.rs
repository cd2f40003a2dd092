//! Thin per-domain service call wrappers
//!
//! Each handle formats a `call_service` envelope and hands it to the
//! shared connection; nothing here waits for the server's result frame.

use std::sync::Arc;

use homeward_api::WsConnection;
use serde_json::{json, Value};

use crate::error::AppError;

/// Entry point to the per-domain service handles
///
/// Cheap to clone; every handle shares the one WebSocket session.
#[derive(Clone, Debug)]
pub struct Services {
    conn: Arc<WsConnection>,
}

impl Services {
    pub(crate) fn new(conn: Arc<WsConnection>) -> Self {
        Self { conn }
    }

    pub fn light(&self) -> Light {
        Light {
            conn: Arc::clone(&self.conn),
        }
    }

    pub fn switch(&self) -> Switch {
        Switch {
            conn: Arc::clone(&self.conn),
        }
    }

    pub fn climate(&self) -> Climate {
        Climate {
            conn: Arc::clone(&self.conn),
        }
    }

    pub fn scene(&self) -> Scene {
        Scene {
            conn: Arc::clone(&self.conn),
        }
    }

    pub fn script(&self) -> Script {
        Script {
            conn: Arc::clone(&self.conn),
        }
    }

    pub fn notify(&self) -> Notify {
        Notify {
            conn: Arc::clone(&self.conn),
        }
    }

    pub fn input_boolean(&self) -> InputBoolean {
        InputBoolean {
            conn: Arc::clone(&self.conn),
        }
    }

    pub fn home_assistant(&self) -> HomeAssistant {
        HomeAssistant {
            conn: Arc::clone(&self.conn),
        }
    }

    pub fn event(&self) -> EventService {
        EventService {
            conn: Arc::clone(&self.conn),
        }
    }

    /// Escape hatch for domains without a dedicated handle
    pub async fn call(
        &self,
        domain: &str,
        service: &str,
        service_data: Option<Value>,
        entity_id: Option<&str>,
    ) -> Result<(), AppError> {
        self.conn
            .call_service(domain, service, service_data, entity_id)
            .await?;
        Ok(())
    }
}

pub struct Light {
    conn: Arc<WsConnection>,
}

impl Light {
    pub async fn turn_on(&self, entity_id: &str) -> Result<(), AppError> {
        self.conn
            .call_service("light", "turn_on", None, Some(entity_id))
            .await?;
        Ok(())
    }

    /// Turn on with extra service data, e.g. `{"brightness": 128}`
    pub async fn turn_on_with(&self, entity_id: &str, data: Value) -> Result<(), AppError> {
        self.conn
            .call_service("light", "turn_on", Some(data), Some(entity_id))
            .await?;
        Ok(())
    }

    pub async fn turn_off(&self, entity_id: &str) -> Result<(), AppError> {
        self.conn
            .call_service("light", "turn_off", None, Some(entity_id))
            .await?;
        Ok(())
    }

    pub async fn toggle(&self, entity_id: &str) -> Result<(), AppError> {
        self.conn
            .call_service("light", "toggle", None, Some(entity_id))
            .await?;
        Ok(())
    }
}

pub struct Switch {
    conn: Arc<WsConnection>,
}

impl Switch {
    pub async fn turn_on(&self, entity_id: &str) -> Result<(), AppError> {
        self.conn
            .call_service("switch", "turn_on", None, Some(entity_id))
            .await?;
        Ok(())
    }

    pub async fn turn_off(&self, entity_id: &str) -> Result<(), AppError> {
        self.conn
            .call_service("switch", "turn_off", None, Some(entity_id))
            .await?;
        Ok(())
    }

    pub async fn toggle(&self, entity_id: &str) -> Result<(), AppError> {
        self.conn
            .call_service("switch", "toggle", None, Some(entity_id))
            .await?;
        Ok(())
    }
}

pub struct Climate {
    conn: Arc<WsConnection>,
}

impl Climate {
    pub async fn set_temperature(&self, entity_id: &str, temperature: f64) -> Result<(), AppError> {
        self.conn
            .call_service(
                "climate",
                "set_temperature",
                Some(json!({ "temperature": temperature })),
                Some(entity_id),
            )
            .await?;
        Ok(())
    }

    pub async fn set_hvac_mode(&self, entity_id: &str, mode: &str) -> Result<(), AppError> {
        self.conn
            .call_service(
                "climate",
                "set_hvac_mode",
                Some(json!({ "hvac_mode": mode })),
                Some(entity_id),
            )
            .await?;
        Ok(())
    }
}

pub struct Scene {
    conn: Arc<WsConnection>,
}

impl Scene {
    pub async fn turn_on(&self, entity_id: &str) -> Result<(), AppError> {
        self.conn
            .call_service("scene", "turn_on", None, Some(entity_id))
            .await?;
        Ok(())
    }
}

pub struct Script {
    conn: Arc<WsConnection>,
}

impl Script {
    pub async fn turn_on(&self, entity_id: &str) -> Result<(), AppError> {
        self.conn
            .call_service("script", "turn_on", None, Some(entity_id))
            .await?;
        Ok(())
    }

    pub async fn turn_off(&self, entity_id: &str) -> Result<(), AppError> {
        self.conn
            .call_service("script", "turn_off", None, Some(entity_id))
            .await?;
        Ok(())
    }
}

pub struct Notify {
    conn: Arc<WsConnection>,
}

impl Notify {
    /// Send a notification through `notify.<service_name>`
    pub async fn send(
        &self,
        service_name: &str,
        message: &str,
        title: Option<&str>,
    ) -> Result<(), AppError> {
        let mut data = json!({ "message": message });
        if let Some(title) = title {
            data["title"] = json!(title);
        }
        self.conn
            .call_service("notify", service_name, Some(data), None)
            .await?;
        Ok(())
    }
}

pub struct InputBoolean {
    conn: Arc<WsConnection>,
}

impl InputBoolean {
    pub async fn turn_on(&self, entity_id: &str) -> Result<(), AppError> {
        self.conn
            .call_service("input_boolean", "turn_on", None, Some(entity_id))
            .await?;
        Ok(())
    }

    pub async fn turn_off(&self, entity_id: &str) -> Result<(), AppError> {
        self.conn
            .call_service("input_boolean", "turn_off", None, Some(entity_id))
            .await?;
        Ok(())
    }

    pub async fn toggle(&self, entity_id: &str) -> Result<(), AppError> {
        self.conn
            .call_service("input_boolean", "toggle", None, Some(entity_id))
            .await?;
        Ok(())
    }
}

/// Domain-agnostic services under `homeassistant.*`
pub struct HomeAssistant {
    conn: Arc<WsConnection>,
}

impl HomeAssistant {
    pub async fn turn_on(&self, entity_id: &str) -> Result<(), AppError> {
        self.conn
            .call_service("homeassistant", "turn_on", None, Some(entity_id))
            .await?;
        Ok(())
    }

    pub async fn turn_off(&self, entity_id: &str) -> Result<(), AppError> {
        self.conn
            .call_service("homeassistant", "turn_off", None, Some(entity_id))
            .await?;
        Ok(())
    }

    pub async fn toggle(&self, entity_id: &str) -> Result<(), AppError> {
        self.conn
            .call_service("homeassistant", "toggle", None, Some(entity_id))
            .await?;
        Ok(())
    }
}

pub struct EventService {
    conn: Arc<WsConnection>,
}

impl EventService {
    /// Fire a custom event with optional `event_data`
    pub async fn fire(&self, event_type: &str, event_data: Option<Value>) -> Result<(), AppError> {
        self.conn.fire_event(event_type, event_data).await?;
        Ok(())
    }
}
