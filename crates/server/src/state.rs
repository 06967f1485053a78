//! State shared by every connection via `Arc<ServerState>`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use craftsync_engine::world::World;
use craftsync_engine::world::block::Color;
use craftsync_engine::world::position::Region;

use crate::accounts::AccountService;
use crate::config::ServerConfig;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::persistence::Persistence;
use crate::player_registry::{ConnectionId, PlayerRegistry};
use crate::protocol::{BlockRecord, InitPayload, ServerMessage, SessionRecord};
use crate::router::Router;

pub struct ServerState {
    pub world: World,
    pub players: PlayerRegistry,
    pub router: Router,
    pub persistence: Persistence,
    pub metrics: Metrics,
    accounts: Option<Arc<dyn AccountService>>,
    require_auth: bool,
    next_connection_id: AtomicU64,
}

impl ServerState {
    /// Build the shared state and seed the ground plane described by
    /// `config`. Does not touch the snapshot file.
    pub fn new(config: &ServerConfig) -> Self {
        let router = Router::new(config.bus_capacity);
        let world = World::with_observer(Arc::new(router.clone()));
        if config.ground_radius > 0 {
            let region = Region::plane(config.ground_y, config.ground_radius);
            let seeded = world.seed(region, Color::new(config.ground_color));
            tracing::info!("Seeded ground plane: {} blocks at y={}", seeded, config.ground_y);
        }

        Self {
            world,
            players: PlayerRegistry::new(router.clone()),
            router,
            persistence: Persistence::new(config.world_file.clone()),
            metrics: Metrics::new(),
            accounts: None,
            require_auth: false,
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// Plug in an account service. With `require_auth`, connections must
    /// log in or sign up before they may join.
    pub fn with_accounts(mut self, accounts: Arc<dyn AccountService>, require_auth: bool) -> Self {
        self.accounts = Some(accounts);
        self.require_auth = require_auth;
        self
    }

    pub fn accounts(&self) -> Option<&Arc<dyn AccountService>> {
        self.accounts.as_ref()
    }

    pub fn require_auth(&self) -> bool {
        self.require_auth
    }

    /// Hand out a fresh connection id. Ids are never reused.
    pub fn allocate_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_connection_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Full-state `init` message for connection `id`.
    pub fn init_for(&self, id: ConnectionId) -> ServerMessage {
        let blocks = self.world.snapshot().iter().map(BlockRecord::from).collect();
        let players: BTreeMap<ConnectionId, SessionRecord> = self
            .players
            .snapshot()
            .iter()
            .map(|(id, session)| (*id, SessionRecord::from(session)))
            .collect();
        ServerMessage::Init(InitPayload { id, blocks, players })
    }

    pub fn status(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.players.player_count(), self.world.len())
    }
}
