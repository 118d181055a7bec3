// Raft RPC verb handlers
// Every verb is served by the same dispatcher, which hops to the shard owning
// the target group before handing the message to the registry there

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use regatta_api::{ClientInfo, RaftRpcEnvelope, RaftRpcReply, RaftVerb};
use regatta_common::Result;
use regatta_core::{MessagingService, RpcHandler};

use super::registry::{GroupRegistry, shard_for_group};
use crate::shard::ShardRouter;

pub struct RaftRpcDispatcher {
    router: ShardRouter<GroupRegistry>,
}

impl RaftRpcDispatcher {
    pub fn new(router: ShardRouter<GroupRegistry>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl RpcHandler for RaftRpcDispatcher {
    async fn handle(&self, client: ClientInfo, envelope: RaftRpcEnvelope) -> Result<RaftRpcReply> {
        let shard = shard_for_group(&envelope.group_id);
        let source: IpAddr = client.source.ip();
        self.router
            .invoke_on(shard, move |registry| async move {
                registry.handle_raft_rpc(source, envelope).await
            })
            .await?
    }
}

/// Register the dispatcher for every Raft verb
///
/// Stops at the first failure; verbs registered before it stay registered
/// until [`uninit_rpc_verbs`] runs.
pub fn init_rpc_verbs(
    messaging: &dyn MessagingService,
    router: ShardRouter<GroupRegistry>,
) -> Result<()> {
    let dispatcher: Arc<dyn RpcHandler> = Arc::new(RaftRpcDispatcher::new(router));
    for verb in RaftVerb::ALL {
        messaging.register_handler(verb, Arc::clone(&dispatcher))?;
        debug!(verb = %verb, "Registered raft verb");
    }
    info!(verbs = RaftVerb::ALL.len(), "Registered raft rpc verbs");
    Ok(())
}

/// Unregister every Raft verb, tolerating verbs that were never registered
pub async fn uninit_rpc_verbs(messaging: &dyn MessagingService) {
    let mut removed = 0;
    for verb in RaftVerb::ALL {
        if messaging.is_registered(verb) && messaging.unregister_handler(verb).await {
            removed += 1;
        }
    }
    info!(verbs = removed, "Unregistered raft rpc verbs");
}
