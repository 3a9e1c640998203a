use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Ready,
    Error,
}

impl ConnectionStatus {
    /// Maps the status strings reported by `queryHeadsets`.
    pub fn from_service(status: &str) -> ConnectionStatus {
        match status {
            "discovered" | "disconnected" => ConnectionStatus::Disconnected,
            "connecting" => ConnectionStatus::Connecting,
            "connected" => ConnectionStatus::Ready,
            _ => ConnectionStatus::Error,
        }
    }
}

/// A headset as reported by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct Headset {
    pub id: String,
    pub status: ConnectionStatus,
    pub firmware: Option<String>,
    pub sensors: Vec<String>,
    /// "dongle", "bluetooth", "usb cable", ...
    pub connected_by: Option<String>,
}

impl Headset {
    pub fn from_value(v: &Value) -> Option<Headset> {
        let id = v.get("id")?.as_str()?.to_string();
        let text = |key: &str| {
            v.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let sensors = v
            .get("sensors")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Some(Headset {
            id,
            status: text("status")
                .map(|s| ConnectionStatus::from_service(&s))
                .unwrap_or(ConnectionStatus::Disconnected),
            firmware: text("firmware"),
            sensors,
            connected_by: text("connectedBy"),
        })
    }

    /// Parses a `queryHeadsets` result, skipping entries without an id.
    pub fn list_from_value(v: &Value) -> Vec<Headset> {
        v.as_array()
            .map(|a| a.iter().filter_map(Headset::from_value).collect())
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Headset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{:?}]", self.id, self.status)?;
        if let Some(fw) = &self.firmware {
            write!(f, " firmware {}", fw)?;
        }
        if let Some(by) = &self.connected_by {
            write!(f, " via {}", by)?;
        }
        if !self.sensors.is_empty() {
            write!(f, " ({} sensors)", self.sensors.len())?;
        }
        Ok(())
    }
}
