//! Wire events for the live viewing channel.
//!
//! Every frame is a JSON object `{"event": "<kebab-case name>", "data": {...}}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events accepted from a socket.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum Inbound {
    CustomerSessionStart(SessionStart),
    CustomerPageChange {
        page: String,
    },
    CustomerInteraction {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        element: Option<Value>,
        #[serde(default)]
        position: Option<Value>,
    },
    CustomerScreenShareResponse {
        request_id: String,
        admin_session_id: String,
        accepted: bool,
    },
    CustomerScreenData(Value),
    CustomerMouseData(Value),
    AdminJoinViewing {
        admin_name: String,
    },
    AdminRequestScreenShare {
        customer_session_id: String,
        request_id: String,
    },
}

impl Inbound {
    /// Events only admin connections may send.
    #[must_use]
    pub const fn is_admin_event(&self) -> bool {
        matches!(
            self,
            Self::AdminJoinViewing { .. } | Self::AdminRequestScreenShare { .. }
        )
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CustomerSessionStart(_) => "customer-session-start",
            Self::CustomerPageChange { .. } => "customer-page-change",
            Self::CustomerInteraction { .. } => "customer-interaction",
            Self::CustomerScreenShareResponse { .. } => "customer-screen-share-response",
            Self::CustomerScreenData(_) => "customer-screen-data",
            Self::CustomerMouseData(_) => "customer-mouse-data",
            Self::AdminJoinViewing { .. } => "admin-join-viewing",
            Self::AdminRequestScreenShare { .. } => "admin-request-screen-share",
        }
    }
}

/// Payload of `customer-session-start`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionStart {
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub customer_email: Option<String>,
    pub customer_name: String,
    pub current_page: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub screen_resolution: Option<String>,
}

/// One thing a customer did during a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl Activity {
    #[must_use]
    pub fn navigation(page: String) -> Self {
        Self {
            kind: "navigation".to_string(),
            page: Some(page),
            element: None,
            position: None,
            timestamp: Utc::now(),
        }
    }
}

/// Customer session as shown on the admin dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub customer_id: Option<i64>,
    pub customer_email: Option<String>,
    pub customer_name: String,
    pub current_page: String,
    pub user_agent: Option<String>,
    pub screen_resolution: Option<String>,
    pub started_at: DateTime<Utc>,
    pub is_online: bool,
    pub session_duration_ms: i64,
    pub activities: Vec<Activity>,
}

/// Events pushed to sockets.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum Outbound {
    CustomerOnline {
        session: SessionView,
    },
    CustomerOffline {
        session_id: String,
        customer_name: String,
    },
    CustomerActivity {
        session_id: String,
        current_page: String,
        activity: Activity,
    },
    SessionSnapshot {
        sessions: Vec<SessionView>,
    },
    ScreenShareRequest {
        admin_name: String,
        request_id: String,
    },
    ScreenShareAccepted {
        request_id: String,
        customer_session_id: String,
    },
    ScreenShareDenied {
        request_id: String,
        customer_session_id: String,
    },
    LiveScreenUpdate {
        session_id: String,
        screen_data: Value,
        timestamp: DateTime<Utc>,
    },
    AdminCustomerMouse {
        session_id: String,
        mouse_data: Value,
    },
    AdminMessage {
        message: String,
        timestamp: DateTime<Utc>,
    },
    LiveHelp(Value),
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inbound_parses_kebab_case_envelope() {
        let event: Inbound = serde_json::from_value(json!({
            "event": "customer-session-start",
            "data": {"customer_name": "Anna", "current_page": "/shop"}
        }))
        .expect("valid event");

        match event {
            Inbound::CustomerSessionStart(start) => {
                assert_eq!(start.customer_name, "Anna");
                assert_eq!(start.customer_id, None);
            }
            other => panic!("unexpected event {other:?}"),
        }

        let event: Inbound = serde_json::from_value(json!({
            "event": "customer-interaction",
            "data": {"type": "click", "element": {"id": "buy"}}
        }))
        .expect("valid event");
        assert_eq!(event.name(), "customer-interaction");
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        let result = serde_json::from_value::<Inbound>(json!({"event": "drop-tables", "data": {}}));
        assert!(result.is_err());
    }

    #[test]
    fn test_outbound_envelope() {
        let value = serde_json::to_value(Outbound::Error {
            message: "nope".to_string(),
        })
        .expect("serializable");
        assert_eq!(value, json!({"event": "error", "data": {"message": "nope"}}));
    }

    #[test]
    fn test_admin_events() {
        let join = Inbound::AdminJoinViewing {
            admin_name: "Eva".to_string(),
        };
        assert!(join.is_admin_event());
        assert!(!Inbound::CustomerMouseData(json!({})).is_admin_event());
    }
}
