//! Live viewing relay.
//!
//! Customers browsing the shop open a socket and report what they do; admin
//! dashboards open a socket with a staff token and receive those reports.
//! The hub only relays: nothing is persisted, and state lives as long as the
//! connections do.

pub mod events;
pub mod socket;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};
use uuid::Uuid;

pub use events::{Activity, Inbound, Outbound, SessionStart, SessionView};
pub use socket::{connection_role, ws_handler};

/// Activities kept per session.
pub const MAX_ACTIVITIES: usize = 50;

/// Activities included in a session view.
pub const VIEW_ACTIVITIES: usize = 10;

const DEFAULT_ADMIN_NAME: &str = "Admin";

/// Who is on the other end of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Customer,
}

struct Connection {
    role: Role,
    admin_name: Option<String>,
    tx: mpsc::UnboundedSender<Outbound>,
}

struct CustomerSession {
    start: SessionStart,
    current_page: String,
    started_at: DateTime<Utc>,
    activities: VecDeque<Activity>,
}

impl CustomerSession {
    fn new(start: SessionStart) -> Self {
        Self {
            current_page: start.current_page.clone(),
            start,
            started_at: Utc::now(),
            activities: VecDeque::with_capacity(MAX_ACTIVITIES),
        }
    }

    fn record(&mut self, activity: Activity) {
        if self.activities.len() == MAX_ACTIVITIES {
            self.activities.pop_front();
        }
        self.activities.push_back(activity);
    }

    fn view(&self, session_id: &str, now: DateTime<Utc>) -> SessionView {
        let skip = self.activities.len().saturating_sub(VIEW_ACTIVITIES);
        SessionView {
            session_id: session_id.to_string(),
            customer_id: self.start.customer_id,
            customer_email: self.start.customer_email.clone(),
            customer_name: self.start.customer_name.clone(),
            current_page: self.current_page.clone(),
            user_agent: self.start.user_agent.clone(),
            screen_resolution: self.start.screen_resolution.clone(),
            started_at: self.started_at,
            is_online: true,
            session_duration_ms: (now - self.started_at).num_milliseconds(),
            activities: self.activities.iter().skip(skip).cloned().collect(),
        }
    }
}

/// Accepted screen share between a customer and one admin.
struct ScreenShare {
    customer: String,
    admin: String,
}

#[derive(Default)]
struct Hub {
    connections: HashMap<String, Connection>,
    /// Keyed by the customer's connection id.
    sessions: HashMap<String, CustomerSession>,
    /// Keyed by request id.
    shares: HashMap<String, ScreenShare>,
}

impl Hub {
    fn send(&self, connection_id: &str, event: Outbound) -> bool {
        self.connections
            .get(connection_id)
            .is_some_and(|conn| conn.tx.send(event).is_ok())
    }

    fn broadcast_admins(&self, event: &Outbound) {
        for conn in self.connections.values() {
            if conn.role == Role::Admin {
                let _ = conn.tx.send(event.clone());
            }
        }
    }

    fn views(&self) -> Vec<SessionView> {
        let now = Utc::now();
        let mut views: Vec<_> = self
            .sessions
            .iter()
            .map(|(id, session)| session.view(id, now))
            .collect();
        views.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        views
    }

    fn record_activity(&mut self, connection_id: &str, activity: Activity) {
        let Some(session) = self.sessions.get_mut(connection_id) else {
            debug!(connection_id, "activity without session start");
            return;
        };
        if let Some(page) = &activity.page {
            session.current_page.clone_from(page);
        }
        session.record(activity.clone());
        let event = Outbound::CustomerActivity {
            session_id: connection_id.to_string(),
            current_page: session.current_page.clone(),
            activity,
        };
        self.broadcast_admins(&event);
    }

    fn handle(&mut self, connection_id: &str, event: Inbound) {
        let Some(role) = self.connections.get(connection_id).map(|c| c.role) else {
            return;
        };

        if event.is_admin_event() != (role == Role::Admin) {
            let message = if role == Role::Customer {
                format!("{} is only available to admins", event.name())
            } else {
                format!("{} is only available to customers", event.name())
            };
            self.send(connection_id, Outbound::Error { message });
            return;
        }

        match event {
            Inbound::CustomerSessionStart(start) => {
                info!(
                    session_id = connection_id,
                    customer = %start.customer_name,
                    "Customer session started"
                );
                let session = CustomerSession::new(start);
                let view = session.view(connection_id, Utc::now());
                self.sessions.insert(connection_id.to_string(), session);
                self.broadcast_admins(&Outbound::CustomerOnline { session: view });
            }
            Inbound::CustomerPageChange { page } => {
                self.record_activity(connection_id, Activity::navigation(page));
            }
            Inbound::CustomerInteraction {
                kind,
                element,
                position,
            } => {
                let activity = Activity {
                    kind,
                    page: None,
                    element,
                    position,
                    timestamp: Utc::now(),
                };
                self.record_activity(connection_id, activity);
            }
            Inbound::CustomerScreenShareResponse {
                request_id,
                admin_session_id,
                accepted,
            } => {
                let customer_session_id = connection_id.to_string();
                if accepted {
                    self.shares.insert(
                        request_id.clone(),
                        ScreenShare {
                            customer: customer_session_id.clone(),
                            admin: admin_session_id.clone(),
                        },
                    );
                    self.send(
                        &admin_session_id,
                        Outbound::ScreenShareAccepted {
                            request_id,
                            customer_session_id,
                        },
                    );
                } else {
                    self.send(
                        &admin_session_id,
                        Outbound::ScreenShareDenied {
                            request_id,
                            customer_session_id,
                        },
                    );
                }
            }
            Inbound::CustomerScreenData(screen_data) => {
                let admins: Vec<String> = self
                    .shares
                    .values()
                    .filter(|share| share.customer == connection_id)
                    .map(|share| share.admin.clone())
                    .collect();
                for admin in admins {
                    self.send(
                        &admin,
                        Outbound::LiveScreenUpdate {
                            session_id: connection_id.to_string(),
                            screen_data: screen_data.clone(),
                            timestamp: Utc::now(),
                        },
                    );
                }
            }
            Inbound::CustomerMouseData(mouse_data) => {
                self.broadcast_admins(&Outbound::AdminCustomerMouse {
                    session_id: connection_id.to_string(),
                    mouse_data,
                });
            }
            Inbound::AdminJoinViewing { admin_name } => {
                info!(connection_id, admin = %admin_name, "Admin joined live viewing");
                if let Some(conn) = self.connections.get_mut(connection_id) {
                    conn.admin_name = Some(admin_name);
                }
                let sessions = self.views();
                self.send(connection_id, Outbound::SessionSnapshot { sessions });
            }
            Inbound::AdminRequestScreenShare {
                customer_session_id,
                request_id,
            } => {
                let admin_name = self
                    .connections
                    .get(connection_id)
                    .and_then(|c| c.admin_name.clone())
                    .unwrap_or_else(|| DEFAULT_ADMIN_NAME.to_string());
                let delivered = self.sessions.contains_key(&customer_session_id)
                    && self.send(
                        &customer_session_id,
                        Outbound::ScreenShareRequest {
                            admin_name,
                            request_id,
                        },
                    );
                if !delivered {
                    self.send(
                        connection_id,
                        Outbound::Error {
                            message: "Customer session not found".to_string(),
                        },
                    );
                }
            }
        }
    }

    fn disconnect(&mut self, connection_id: &str) {
        self.connections.remove(connection_id);
        self.shares
            .retain(|_, share| share.customer != connection_id && share.admin != connection_id);

        if let Some(session) = self.sessions.remove(connection_id) {
            info!(session_id = connection_id, "Customer session ended");
            self.broadcast_admins(&Outbound::CustomerOffline {
                session_id: connection_id.to_string(),
                customer_name: session.start.customer_name,
            });
        }
    }
}

/// Shared relay between customer and admin sockets.
#[derive(Clone, Default)]
pub struct LiveHub {
    inner: Arc<Mutex<Hub>>,
}

impl LiveHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. Events for it arrive on the returned receiver.
    pub async fn connect(&self, role: Role) -> (String, mpsc::UnboundedReceiver<Outbound>) {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().await.connections.insert(
            id.clone(),
            Connection {
                role,
                admin_name: None,
                tx,
            },
        );
        debug!(connection_id = %id, ?role, "Live connection opened");
        (id, rx)
    }

    /// Apply one inbound event from `connection_id`.
    pub async fn handle(&self, connection_id: &str, event: Inbound) {
        self.inner.lock().await.handle(connection_id, event);
    }

    /// Drop a connection, its session and any screen shares it takes part in.
    pub async fn disconnect(&self, connection_id: &str) {
        self.inner.lock().await.disconnect(connection_id);
    }

    /// Send an event straight to one connection. Returns false when it is gone.
    pub async fn send(&self, connection_id: &str, event: Outbound) -> bool {
        self.inner.lock().await.send(connection_id, event)
    }

    /// Active customer sessions, oldest first.
    pub async fn sessions(&self) -> Vec<SessionView> {
        self.inner.lock().await.views()
    }

    pub async fn session(&self, session_id: &str) -> Option<SessionView> {
        self.inner
            .lock()
            .await
            .sessions
            .get(session_id)
            .map(|session| session.view(session_id, Utc::now()))
    }

    /// Push an `admin-message` to a customer session.
    pub async fn message_customer(&self, session_id: &str, message: String) -> bool {
        let hub = self.inner.lock().await;
        hub.sessions.contains_key(session_id)
            && hub.send(
                session_id,
                Outbound::AdminMessage {
                    message,
                    timestamp: Utc::now(),
                },
            )
    }

    /// Push a `live-help` payload to a customer session.
    pub async fn send_help(&self, session_id: &str, help: Value) -> bool {
        let hub = self.inner.lock().await;
        hub.sessions.contains_key(session_id) && hub.send(session_id, Outbound::LiveHelp(help))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn start(name: &str) -> Inbound {
        Inbound::CustomerSessionStart(SessionStart {
            customer_id: Some(1),
            customer_email: None,
            customer_name: name.to_string(),
            current_page: "/".to_string(),
            user_agent: None,
            screen_resolution: None,
        })
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Vec<Outbound> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_session_start_notifies_admins_only() {
        let hub = LiveHub::new();
        let (_admin, mut admin_rx) = hub.connect(Role::Admin).await;
        let (other, mut other_rx) = hub.connect(Role::Customer).await;
        let (customer, _customer_rx) = hub.connect(Role::Customer).await;

        hub.handle(&customer, start("Anna")).await;

        let admin_events = drain(&mut admin_rx);
        assert!(matches!(
            admin_events.as_slice(),
            [Outbound::CustomerOnline { session }] if session.customer_name == "Anna"
        ));
        assert!(drain(&mut other_rx).is_empty());
        assert_eq!(hub.sessions().await.len(), 1);
        assert!(hub.session(&other).await.is_none());
    }

    #[tokio::test]
    async fn test_customer_cannot_send_admin_events() {
        let hub = LiveHub::new();
        let (customer, mut rx) = hub.connect(Role::Customer).await;

        hub.handle(
            &customer,
            Inbound::AdminJoinViewing {
                admin_name: "Mallory".to_string(),
            },
        )
        .await;

        assert!(matches!(drain(&mut rx).as_slice(), [Outbound::Error { .. }]));
    }

    #[tokio::test]
    async fn test_activity_log_is_capped() {
        let hub = LiveHub::new();
        let (customer, _rx) = hub.connect(Role::Customer).await;
        hub.handle(&customer, start("Bram")).await;

        for i in 0..60 {
            hub.handle(
                &customer,
                Inbound::CustomerPageChange {
                    page: format!("/p/{i}"),
                },
            )
            .await;
        }

        let view = hub.session(&customer).await.expect("session exists");
        assert_eq!(view.current_page, "/p/59");
        assert_eq!(view.activities.len(), VIEW_ACTIVITIES);
        assert_eq!(view.activities[0].page.as_deref(), Some("/p/50"));
        assert_eq!(
            hub.inner.lock().await.sessions[&customer].activities.len(),
            MAX_ACTIVITIES
        );
    }

    #[tokio::test]
    async fn test_screen_share_flow() {
        let hub = LiveHub::new();
        let (admin, mut admin_rx) = hub.connect(Role::Admin).await;
        let (customer, mut customer_rx) = hub.connect(Role::Customer).await;
        hub.handle(&customer, start("Cor")).await;
        hub.handle(
            &admin,
            Inbound::AdminJoinViewing {
                admin_name: "Eva".to_string(),
            },
        )
        .await;
        drain(&mut admin_rx);

        hub.handle(
            &admin,
            Inbound::AdminRequestScreenShare {
                customer_session_id: customer.clone(),
                request_id: "r1".to_string(),
            },
        )
        .await;
        assert!(matches!(
            drain(&mut customer_rx).as_slice(),
            [Outbound::ScreenShareRequest { admin_name, .. }] if admin_name == "Eva"
        ));

        hub.handle(
            &customer,
            Inbound::CustomerScreenShareResponse {
                request_id: "r1".to_string(),
                admin_session_id: admin.clone(),
                accepted: true,
            },
        )
        .await;
        hub.handle(&customer, Inbound::CustomerScreenData(json!({"html": "<p>"})))
            .await;

        let events = drain(&mut admin_rx);
        assert!(matches!(events[0], Outbound::ScreenShareAccepted { .. }));
        assert!(matches!(events[1], Outbound::LiveScreenUpdate { .. }));

        hub.disconnect(&customer).await;
        assert!(hub.inner.lock().await.shares.is_empty());
        assert!(matches!(
            drain(&mut admin_rx).as_slice(),
            [Outbound::CustomerOffline { customer_name, .. }] if customer_name == "Cor"
        ));
    }

    #[tokio::test]
    async fn test_screen_share_request_for_unknown_session() {
        let hub = LiveHub::new();
        let (admin, mut rx) = hub.connect(Role::Admin).await;

        hub.handle(
            &admin,
            Inbound::AdminRequestScreenShare {
                customer_session_id: "missing".to_string(),
                request_id: "r2".to_string(),
            },
        )
        .await;

        assert!(matches!(drain(&mut rx).as_slice(), [Outbound::Error { .. }]));
    }

    #[tokio::test]
    async fn test_message_requires_session() {
        let hub = LiveHub::new();
        let (customer, mut rx) = hub.connect(Role::Customer).await;

        assert!(!hub.message_customer(&customer, "hoi".to_string()).await);

        hub.handle(&customer, start("Dirk")).await;
        assert!(hub.message_customer(&customer, "hoi".to_string()).await);
        assert!(hub.send_help(&customer, json!({"topic": "checkout"})).await);

        let events = drain(&mut rx);
        assert!(matches!(events[0], Outbound::AdminMessage { .. }));
        assert!(matches!(events[1], Outbound::LiveHelp(_)));
    }
}
