//! Turning a started match into in-game entities.

use std::collections::HashMap;
use std::fmt;

use matchroom_protocol::MatchId;
use matchroom_transport::ConnectionId;

use crate::MatchSnapshot;

/// Identifier of a spawned entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E-{}", self.0)
    }
}

/// What an entity stands for inside a running match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// One per match; drives the game session.
    MatchController,
    /// One per member, bound to that member's connection.
    Player,
}

/// A spawned entity, tagged with the match it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub match_id: MatchId,
}

/// The game server's entity facility.
///
/// Entity-to-connection bindings are what match-scoped systems (visibility,
/// interest management) key on.
pub trait Spawner: Send + 'static {
    /// Creates an entity of `kind` tagged with `match_id`.
    fn spawn(&mut self, kind: EntityKind, match_id: MatchId) -> EntityId;

    /// Makes `entity` the player object of `conn`.
    fn bind_player(&mut self, conn: ConnectionId, entity: EntityId);

    /// Undoes the binding of `conn`, returning the entity it had.
    fn release_player(&mut self, conn: ConnectionId) -> Option<EntityId>;

    /// Destroys `entity`. Returns `false` if it did not exist.
    fn despawn(&mut self, entity: EntityId) -> bool;
}

/// The entities created for one match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchedMatch {
    pub match_id: MatchId,
    pub controller: EntityId,
    /// In the order of the snapshot's members.
    pub players: Vec<(ConnectionId, EntityId)>,
}

/// Spawns the controller for `snapshot`, then one bound player entity per
/// member, in member order.
pub fn launch_match<S: Spawner + ?Sized>(snapshot: &MatchSnapshot, spawner: &mut S) -> LaunchedMatch {
    let match_id = snapshot.match_id;
    let controller = spawner.spawn(EntityKind::MatchController, match_id);

    let players = snapshot
        .members
        .iter()
        .map(|&conn| {
            let entity = spawner.spawn(EntityKind::Player, match_id);
            spawner.bind_player(conn, entity);
            (conn, entity)
        })
        .collect::<Vec<_>>();

    tracing::info!(
        %match_id,
        %controller,
        players = players.len(),
        "match launched"
    );

    LaunchedMatch {
        match_id,
        controller,
        players,
    }
}

/// In-memory [`Spawner`]: entities by id, bindings by connection.
#[derive(Debug, Default)]
pub struct EntityTable {
    next_id: u64,
    entities: HashMap<EntityId, Entity>,
    bindings: HashMap<ConnectionId, EntityId>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Entity currently bound to `conn`.
    pub fn binding(&self, conn: &ConnectionId) -> Option<EntityId> {
        self.bindings.get(conn).copied()
    }

    /// Every live entity tagged with `match_id`, oldest first.
    pub fn entities_in(&self, match_id: &MatchId) -> Vec<&Entity> {
        let mut found: Vec<&Entity> = self
            .entities
            .values()
            .filter(|e| e.match_id == *match_id)
            .collect();
        found.sort_by_key(|e| e.id);
        found
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl Spawner for EntityTable {
    fn spawn(&mut self, kind: EntityKind, match_id: MatchId) -> EntityId {
        self.next_id += 1;
        let id = EntityId(self.next_id);
        self.entities.insert(id, Entity { id, kind, match_id });
        id
    }

    fn bind_player(&mut self, conn: ConnectionId, entity: EntityId) {
        self.bindings.insert(conn, entity);
    }

    // A released player entity has no owner left, so it goes too.
    fn release_player(&mut self, conn: ConnectionId) -> Option<EntityId> {
        let entity = self.bindings.remove(&conn)?;
        self.entities.remove(&entity);
        Some(entity)
    }

    fn despawn(&mut self, entity: EntityId) -> bool {
        self.bindings.retain(|_, bound| *bound != entity);
        self.entities.remove(&entity).is_some()
    }
}

#[cfg(test)]
mod tests {
    use matchroom_protocol::RoomCode;

    use super::*;

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn snapshot(members: &[u64]) -> MatchSnapshot {
        MatchSnapshot {
            match_id: MatchId::new(),
            room_code: RoomCode::parse("AAAAA").unwrap(),
            owner: conn(members[0]),
            members: members.iter().map(|&m| conn(m)).collect(),
        }
    }

    #[test]
    fn test_launch_match_spawns_controller_then_players() {
        let snap = snapshot(&[1, 2]);
        let mut table = EntityTable::new();

        let launched = launch_match(&snap, &mut table);

        let kinds: Vec<EntityKind> = table
            .entities_in(&snap.match_id)
            .iter()
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![EntityKind::MatchController, EntityKind::Player, EntityKind::Player]
        );
        assert_eq!(launched.players.len(), 2);
        assert_eq!(table.binding(&conn(1)), Some(launched.players[0].1));
        assert_eq!(table.binding(&conn(2)), Some(launched.players[1].1));
    }

    #[test]
    fn test_launch_match_tags_every_entity_with_match() {
        let snap = snapshot(&[7]);
        let mut table = EntityTable::new();

        let launched = launch_match(&snap, &mut table);

        let controller = table.entity(&launched.controller).unwrap();
        assert_eq!(controller.match_id, snap.match_id);
        assert_eq!(table.entities_in(&MatchId::new()).len(), 0);
    }

    #[test]
    fn test_release_player_removes_binding_and_entity() {
        let snap = snapshot(&[1, 2]);
        let mut table = EntityTable::new();
        let launched = launch_match(&snap, &mut table);

        let released = table.release_player(conn(1));

        assert_eq!(released, Some(launched.players[0].1));
        assert_eq!(table.binding(&conn(1)), None);
        assert_eq!(table.len(), 2);
        assert_eq!(table.release_player(conn(1)), None);
    }

    #[test]
    fn test_despawn_removes_controller_once() {
        let snap = snapshot(&[1]);
        let mut table = EntityTable::new();
        let launched = launch_match(&snap, &mut table);
        table.release_player(conn(1));

        assert!(table.despawn(launched.controller));
        assert!(!table.despawn(launched.controller));
        assert!(table.entities_in(&snap.match_id).is_empty());
        assert!(table.is_empty());
    }
}
