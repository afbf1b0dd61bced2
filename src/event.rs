use std::{net::SocketAddr, sync::Arc};

use futures::future::BoxFuture;
use log::debug;
use uuid::Uuid;

use crate::{component::Component, protocol::ProtocolVersion};

#[derive(Debug, Clone)]
pub enum ProxyEvent {
    ConnectionHandshake {
        remote_address: SocketAddr,
        protocol_version: ProtocolVersion,
        virtual_host: Option<String>,
    },
    PreLogin {
        remote_address: SocketAddr,
        username: String,
    },
    LoginSuccess {
        username: String,
        uuid: Uuid,
    },
    ServerConnected {
        username: String,
        server: String,
    },
    Disconnect {
        username: String,
        uuid: Uuid,
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum EventResult {
    #[default]
    Allowed,
    Denied(Component),
}

impl EventResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, EventResult::Allowed)
    }
}

type Listener = Box<dyn Fn(&ProxyEvent) -> BoxFuture<'static, EventResult> + Send + Sync>;

/// Async listeners run in registration order; the first denial wins.
#[derive(Default)]
pub struct EventManager {
    listeners: Vec<Listener>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: impl Fn(&ProxyEvent) -> BoxFuture<'static, EventResult> + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub async fn fire(&self, event: ProxyEvent) -> EventResult {
        for listener in &self.listeners {
            if let denied @ EventResult::Denied(_) = listener(&event).await {
                debug!("{:?} was denied", event);
                return denied;
            }
        }
        EventResult::Allowed
    }

    pub fn fire_and_forget(self: &Arc<Self>, event: ProxyEvent) {
        if self.listeners.is_empty() {
            return;
        }
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.fire(event).await;
        });
    }
}
