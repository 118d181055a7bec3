// Messaging service for Raft RPC verbs
// Maps each verb to the handler that processes inbound messages of that kind

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info, warn};

use regatta_api::{ClientInfo, RaftRpcEnvelope, RaftRpcReply, RaftVerb};
use regatta_common::{RegattaError, Result};

/// Trait for handling inbound Raft RPC messages of one verb
#[async_trait]
pub trait RpcHandler: Send + Sync {
    async fn handle(&self, client: ClientInfo, envelope: RaftRpcEnvelope) -> Result<RaftRpcReply>;
}

/// Transport-side registration surface used by the Raft group registry
#[async_trait]
pub trait MessagingService: Send + Sync {
    /// Register the handler for a verb; fails if one is already registered
    fn register_handler(&self, verb: RaftVerb, handler: Arc<dyn RpcHandler>) -> Result<()>;

    /// Unregister the handler for a verb, returns whether one was registered
    async fn unregister_handler(&self, verb: RaftVerb) -> bool;

    fn is_registered(&self, verb: RaftVerb) -> bool;
}

/// In-process messaging service
///
/// Inbound messages are handed to `deliver` together with the per-call
/// metadata a network transport would attach.
pub struct LocalMessagingService {
    handlers: DashMap<RaftVerb, Arc<dyn RpcHandler>>,
}

impl Default for LocalMessagingService {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalMessagingService {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// Route an inbound message to the handler registered for its verb
    pub async fn deliver(
        &self,
        client: ClientInfo,
        envelope: RaftRpcEnvelope,
    ) -> Result<RaftRpcReply> {
        let verb = envelope.verb();
        // Clone the handler out so the map guard is not held across the await
        let handler = self
            .handlers
            .get(&verb)
            .map(|entry| entry.value().clone());

        match handler {
            Some(handler) => handler.handle(client, envelope).await,
            None => {
                debug!(
                    verb = %verb,
                    source = %client.source,
                    "Dropping message, no handler registered"
                );
                Err(RegattaError::NoHandler(verb.to_string()))
            }
        }
    }

    /// Get a list of all registered verbs
    pub fn registered_verbs(&self) -> Vec<RaftVerb> {
        self.handlers.iter().map(|entry| *entry.key()).collect()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

#[async_trait]
impl MessagingService for LocalMessagingService {
    fn register_handler(&self, verb: RaftVerb, handler: Arc<dyn RpcHandler>) -> Result<()> {
        match self.handlers.entry(verb) {
            Entry::Occupied(_) => Err(RegattaError::HandlerExists(verb.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(handler);
                debug!(verb = %verb, "Registered handler");
                Ok(())
            }
        }
    }

    async fn unregister_handler(&self, verb: RaftVerb) -> bool {
        if self.handlers.remove(&verb).is_some() {
            info!(verb = %verb, "Unregistered handler");
            true
        } else {
            warn!(verb = %verb, "Attempted to unregister non-existent handler");
            false
        }
    }

    fn is_registered(&self, verb: RaftVerb) -> bool {
        self.handlers.contains_key(&verb)
    }
}
