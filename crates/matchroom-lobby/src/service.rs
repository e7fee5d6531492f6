//! Request handling: lobby requests in, addressed events out.
//!
//! [`LobbyService`] is synchronous and owns no channels. Every operation
//! returns the events it produced as `(recipient, event)` pairs, in the
//! order they must be sent. The [actor](crate::spawn_lobby) delivers them.

use std::collections::HashMap;

use matchroom_protocol::{MatchEvent, MatchId, MatchRequest, PlayerInfo, RoomCode};
use matchroom_session::ConnectionRegistry;
use matchroom_transport::ConnectionId;

use crate::code::{CodeSource, RandomCodes};
use crate::launch::{EntityTable, LaunchedMatch, Spawner, launch_match};
use crate::{Departure, LobbyConfig, LobbyError, MatchRegistry, MatchSnapshot, PlayerState};

/// One event addressed to one connection.
pub type Outbound = (ConnectionId, MatchEvent);

/// The lobby: connection records, open matches, and launched matches.
pub struct LobbyService<S: Spawner = EntityTable> {
    config: LobbyConfig,
    connections: ConnectionRegistry,
    matches: MatchRegistry,
    /// Connections whose match has been launched.
    in_play: HashMap<ConnectionId, MatchId>,
    launched: HashMap<MatchId, LaunchedMatch>,
    spawner: S,
}

impl LobbyService<EntityTable> {
    /// Creates a lobby with random room codes and an in-memory entity table.
    pub fn new(config: LobbyConfig) -> Result<Self, LobbyError> {
        Self::with_parts(config, RandomCodes, EntityTable::new())
    }

    /// Like [`new`](Self::new) with a custom room code source.
    pub fn with_code_source(
        config: LobbyConfig,
        codes: impl CodeSource,
    ) -> Result<Self, LobbyError> {
        Self::with_parts(config, codes, EntityTable::new())
    }
}

impl<S: Spawner> LobbyService<S> {
    pub fn with_parts(
        config: LobbyConfig,
        codes: impl CodeSource,
        spawner: S,
    ) -> Result<Self, LobbyError> {
        config.validate()?;
        let matches = MatchRegistry::with_code_source(codes, config.max_code_attempts);
        Ok(Self {
            config,
            connections: ConnectionRegistry::new(),
            matches,
            in_play: HashMap::new(),
            launched: HashMap::new(),
            spawner,
        })
    }

    // -----------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------

    /// Registers `conn` as ready. The newcomer gets the current match list.
    pub fn on_ready(
        &mut self,
        conn: ConnectionId,
    ) -> Result<(PlayerInfo, Vec<Outbound>), LobbyError> {
        let info = self.connections.register_ready(conn)?.clone();
        let list = MatchEvent::MatchList {
            matches: self.matches.open_matches(),
        };
        Ok((info, vec![(conn, list)]))
    }

    /// Applies one request. Failures are logged and, when
    /// `notify_rejections` is set, answered with `Rejected`.
    pub fn handle(&mut self, conn: ConnectionId, request: MatchRequest) -> Vec<Outbound> {
        let kind = request.kind();
        tracing::debug!(%conn, request = kind, "lobby request");

        match self.dispatch(conn, request) {
            Ok(out) => out,
            Err(err) => self.reject(conn, kind, err),
        }
    }

    /// Forgets `conn` everywhere. Safe to call more than once.
    pub fn on_disconnect(&mut self, conn: ConnectionId) -> Vec<Outbound> {
        let had_record = self.connections.remove(conn).is_some();
        let mut out = Vec::new();

        if let Some(match_id) = self.in_play.remove(&conn) {
            if let Some(entity) = self.spawner.release_player(conn) {
                tracing::debug!(%conn, %match_id, %entity, "player entity released");
            }
            if let Some(launched) = self.launched.get_mut(&match_id) {
                launched.players.retain(|(member, _)| *member != conn);
                if launched.players.is_empty() {
                    let controller = launched.controller;
                    self.launched.remove(&match_id);
                    self.spawner.despawn(controller);
                    tracing::info!(%match_id, %controller, "last player left launched match");
                }
            }
        }

        if let Some(departure) = self.matches.remove_connection(conn) {
            out.extend(self.announce_departure(conn, departure));
            self.push_match_list(&mut out);
        }

        if had_record {
            tracing::info!(%conn, "connection left the lobby");
        }
        out
    }

    /// Drops every record. Used when the server stops.
    pub fn reset(&mut self) {
        for (_, launched) in self.launched.drain() {
            for (conn, _) in &launched.players {
                self.spawner.release_player(*conn);
            }
            self.spawner.despawn(launched.controller);
        }
        self.connections.reset();
        self.matches.reset();
        self.in_play.clear();
        tracing::info!("lobby reset");
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    /// Where `conn` is in the lobby, or `None` if it is not ready.
    pub fn state_of(&self, conn: &ConnectionId) -> Option<PlayerState> {
        if !self.connections.is_ready(conn) {
            return None;
        }
        if self.in_play.contains_key(conn) {
            return Some(PlayerState::InMatch);
        }
        let state = match self.matches.match_of(conn).and_then(|id| self.matches.get(&id)) {
            Some(m) if m.owner() == *conn => PlayerState::Hosting,
            Some(_) => PlayerState::Joined,
            None => PlayerState::Unmatched,
        };
        Some(state)
    }

    pub fn config(&self) -> &LobbyConfig {
        &self.config
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    pub fn matches(&self) -> &MatchRegistry {
        &self.matches
    }

    pub fn spawner(&self) -> &S {
        &self.spawner
    }

    pub fn launched(&self, match_id: &MatchId) -> Option<&LaunchedMatch> {
        self.launched.get(match_id)
    }

    // -----------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------

    fn dispatch(
        &mut self,
        conn: ConnectionId,
        request: MatchRequest,
    ) -> Result<Vec<Outbound>, LobbyError> {
        if !self.connections.is_ready(&conn) {
            return Err(LobbyError::NotReady(conn));
        }

        match request {
            MatchRequest::Create => self.create(conn),
            MatchRequest::Join { room_code } => self.join(conn, &room_code),
            MatchRequest::Start => self.start(conn),
            MatchRequest::Cancel => self.cancel(conn),
            MatchRequest::Leave => self.leave(conn),
            MatchRequest::Ready { ready } => self.set_ready(conn, ready),
            MatchRequest::List => Ok(vec![(
                conn,
                MatchEvent::MatchList {
                    matches: self.matches.open_matches(),
                },
            )]),
        }
    }

    fn create(&mut self, conn: ConnectionId) -> Result<Vec<Outbound>, LobbyError> {
        self.ensure_not_in_play(conn)?;
        let created = self.matches.create_match(conn, self.config.max_players)?;
        let (match_id, room_code) = (created.id(), created.room_code().clone());
        self.connections.assign_match(conn, match_id, room_code.clone())?;

        let mut out = vec![(conn, MatchEvent::Created { match_id, room_code })];
        self.push_match_list(&mut out);
        Ok(out)
    }

    fn join(&mut self, conn: ConnectionId, room_code: &RoomCode) -> Result<Vec<Outbound>, LobbyError> {
        self.ensure_not_in_play(conn)?;
        let joined = self.matches.join_match(conn, room_code)?;
        let (match_id, room_code, members) =
            (joined.id(), joined.room_code().clone(), joined.members());
        self.connections.assign_match(conn, match_id, room_code.clone())?;

        let members = self.by_player_index(members);
        let roster = self.roster(&members);
        let mut out = vec![(
            conn,
            MatchEvent::Joined {
                match_id,
                room_code,
                members: roster.clone(),
            },
        )];
        out.extend(fan_out(&members, MatchEvent::RoomUpdated { members: roster }));
        self.push_match_list(&mut out);
        Ok(out)
    }

    fn start(&mut self, conn: ConnectionId) -> Result<Vec<Outbound>, LobbyError> {
        let mut snapshot = self.matches.start_match(conn)?;
        snapshot.members = self.by_player_index(snapshot.members);

        let mut out = fan_out(&snapshot.members, MatchEvent::Started);

        let launched = launch_match(&snapshot, &mut self.spawner);
        for member in &snapshot.members {
            self.in_play.insert(*member, snapshot.match_id);
            // The room code is free again once the match is launched.
            if let Err(err) = self.connections.enter_play(*member) {
                tracing::debug!(conn = %member, error = %err, "no record to mark in play");
            }
        }
        self.launched.insert(snapshot.match_id, launched);

        self.push_match_list(&mut out);
        Ok(out)
    }

    fn cancel(&mut self, conn: ConnectionId) -> Result<Vec<Outbound>, LobbyError> {
        let snapshot = self.matches.cancel_match(conn)?;
        let mut out = self.disband(snapshot, None);
        self.push_match_list(&mut out);
        Ok(out)
    }

    fn leave(&mut self, conn: ConnectionId) -> Result<Vec<Outbound>, LobbyError> {
        let departure = self.matches.leave_match(conn)?;
        self.return_to_waiting(conn);

        let mut out = vec![(conn, MatchEvent::Departed)];
        out.extend(self.announce_departure(conn, departure));
        self.push_match_list(&mut out);
        Ok(out)
    }

    fn set_ready(&mut self, conn: ConnectionId, ready: bool) -> Result<Vec<Outbound>, LobbyError> {
        let match_id = self
            .matches
            .match_of(&conn)
            .ok_or(LobbyError::NotInMatch(conn))?;
        self.connections.set_ready(conn, ready)?;

        let members = self
            .matches
            .get(&match_id)
            .map(|m| m.members())
            .unwrap_or_default();
        Ok(self.room_update(members))
    }

    // -----------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------

    fn reject(&self, conn: ConnectionId, kind: &'static str, err: LobbyError) -> Vec<Outbound> {
        let code = err.code();
        tracing::warn!(%conn, request = kind, code, error = %err, "request rejected");

        if self.config.notify_rejections {
            vec![(
                conn,
                MatchEvent::Rejected {
                    code,
                    reason: err.to_string(),
                },
            )]
        } else {
            Vec::new()
        }
    }

    fn ensure_not_in_play(&self, conn: ConnectionId) -> Result<(), LobbyError> {
        match self.in_play.get(&conn) {
            Some(&match_id) => Err(LobbyError::AlreadyInMatch(conn, match_id)),
            None => Ok(()),
        }
    }

    /// Events for the members left behind by `gone`.
    fn announce_departure(&mut self, gone: ConnectionId, departure: Departure) -> Vec<Outbound> {
        match departure {
            Departure::Left { remaining, .. } => self.room_update(remaining),
            Departure::Cancelled(snapshot) => self.disband(snapshot, Some(gone)),
        }
    }

    /// Sends every former member except `skip` back to the waiting pool
    /// and tells them the match is gone.
    fn disband(&mut self, snapshot: MatchSnapshot, skip: Option<ConnectionId>) -> Vec<Outbound> {
        let members: Vec<ConnectionId> = snapshot
            .members
            .into_iter()
            .filter(|m| Some(*m) != skip)
            .collect();
        let members = self.by_player_index(members);
        for member in &members {
            self.return_to_waiting(*member);
        }
        fan_out(&members, MatchEvent::Cancelled)
    }

    fn room_update(&self, members: Vec<ConnectionId>) -> Vec<Outbound> {
        let members = self.by_player_index(members);
        let roster = self.roster(&members);
        fan_out(&members, MatchEvent::RoomUpdated { members: roster })
    }

    fn return_to_waiting(&mut self, conn: ConnectionId) {
        if let Err(err) = self.connections.clear_match(conn) {
            tracing::debug!(%conn, error = %err, "no record to clear");
        }
    }

    /// Pushes the open-match list to every connection not in a match.
    fn push_match_list(&self, out: &mut Vec<Outbound>) {
        if !self.config.broadcast_match_list {
            return;
        }
        let matches = self.matches.open_matches();
        for conn in self.connections.waiting() {
            out.push((
                conn,
                MatchEvent::MatchList {
                    matches: matches.clone(),
                },
            ));
        }
    }

    fn by_player_index(&self, mut members: Vec<ConnectionId>) -> Vec<ConnectionId> {
        members.sort_by_key(|c| self.connections.get(c).map(|info| info.player_index));
        members
    }

    fn roster(&self, members: &[ConnectionId]) -> Vec<PlayerInfo> {
        members
            .iter()
            .filter_map(|c| self.connections.get(c))
            .cloned()
            .collect()
    }
}

fn fan_out(members: &[ConnectionId], event: MatchEvent) -> Vec<Outbound> {
    members.iter().map(|&m| (m, event.clone())).collect()
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn code(s: &str) -> RoomCode {
        RoomCode::parse(s).unwrap()
    }

    /// A lobby that always draws `AAAAA` first, then `BBBBB`, `CCCCC`, ...
    fn lobby(config: LobbyConfig) -> LobbyService {
        let mut next = 0u8;
        let codes = move || {
            let letter = char::from(b'A' + next % 26);
            next += 1;
            RoomCode::parse(&letter.to_string().repeat(5)).unwrap()
        };
        LobbyService::with_code_source(config, codes).unwrap()
    }

    fn ready_lobby(conns: &[u64]) -> LobbyService {
        let mut svc = lobby(LobbyConfig::default());
        for &c in conns {
            svc.on_ready(conn(c)).unwrap();
        }
        svc
    }

    fn events_for(out: &[Outbound], who: ConnectionId) -> Vec<&MatchEvent> {
        out.iter().filter(|(c, _)| *c == who).map(|(_, e)| e).collect()
    }

    // =====================================================================
    // on_ready()
    // =====================================================================

    #[test]
    fn test_on_ready_sends_match_list_to_newcomer() {
        let mut svc = ready_lobby(&[1]);
        svc.handle(conn(1), MatchRequest::Create);

        let (info, out) = svc.on_ready(conn(2)).unwrap();

        assert_eq!(info.player_index.0, 2);
        assert_eq!(out.len(), 1);
        assert!(matches!(
            &out[0],
            (c, MatchEvent::MatchList { matches }) if *c == conn(2) && matches.len() == 1
        ));
    }

    #[test]
    fn test_on_ready_twice_returns_error() {
        let mut svc = ready_lobby(&[1]);
        assert!(matches!(
            svc.on_ready(conn(1)),
            Err(LobbyError::Session(_))
        ));
    }

    // =====================================================================
    // handle(): Create / Join / Start
    // =====================================================================

    #[test]
    fn test_handle_create_replies_created() {
        let mut svc = ready_lobby(&[1]);

        let out = svc.handle(conn(1), MatchRequest::Create);

        let id = svc.matches().match_of(&conn(1)).unwrap();
        assert_eq!(
            out,
            vec![(
                conn(1),
                MatchEvent::Created {
                    match_id: id,
                    room_code: code("AAAAA"),
                }
            )]
        );
        assert_eq!(svc.state_of(&conn(1)), Some(PlayerState::Hosting));
        let info = svc.connections().get(&conn(1)).unwrap();
        assert_eq!(info.room_code, Some(code("AAAAA")));
    }

    #[test]
    fn test_handle_create_broadcasts_list_to_waiting() {
        let mut svc = ready_lobby(&[1, 2, 3]);

        let out = svc.handle(conn(1), MatchRequest::Create);

        assert_eq!(events_for(&out, conn(2)).len(), 1);
        assert_eq!(events_for(&out, conn(3)).len(), 1);
        assert!(matches!(
            events_for(&out, conn(3))[0],
            MatchEvent::MatchList { matches } if matches[0].players == 1
        ));
    }

    #[test]
    fn test_handle_join_replies_then_updates_members() {
        let mut svc = ready_lobby(&[1, 2]);
        svc.handle(conn(1), MatchRequest::Create);

        let out = svc.handle(
            conn(2),
            MatchRequest::Join {
                room_code: code("AAAAA"),
            },
        );

        let id = svc.matches().match_of(&conn(2)).unwrap();
        let roster: Vec<u32> = match &out[0] {
            (c, MatchEvent::Joined { match_id, room_code, members }) => {
                assert_eq!(*c, conn(2));
                assert_eq!(*match_id, id);
                assert_eq!(room_code, &code("AAAAA"));
                members.iter().map(|m| m.player_index.0).collect()
            }
            other => panic!("expected Joined first, got {other:?}"),
        };
        assert_eq!(roster, vec![1, 2]);
        assert!(matches!(out[1], (c, MatchEvent::RoomUpdated { .. }) if c == conn(1)));
        assert!(matches!(out[2], (c, MatchEvent::RoomUpdated { .. }) if c == conn(2)));
        assert_eq!(out.len(), 3);
        assert_eq!(svc.state_of(&conn(2)), Some(PlayerState::Joined));
    }

    #[test]
    fn test_handle_join_unknown_room_rejects_without_change() {
        let mut svc = ready_lobby(&[1, 3]);
        svc.handle(conn(1), MatchRequest::Create);

        let out = svc.handle(
            conn(3),
            MatchRequest::Join {
                room_code: code("ZZZZZ"),
            },
        );

        assert!(matches!(
            &out[..],
            [(c, MatchEvent::Rejected { code: 404, .. })] if *c == conn(3)
        ));
        assert_eq!(svc.state_of(&conn(3)), Some(PlayerState::Unmatched));
        assert_eq!(svc.matches().open_matches()[0].players, 1);
    }

    #[test]
    fn test_handle_rejection_silent_when_notifications_off() {
        let mut svc = lobby(LobbyConfig {
            notify_rejections: false,
            ..LobbyConfig::default()
        });
        svc.on_ready(conn(1)).unwrap();

        let out = svc.handle(conn(1), MatchRequest::Start);

        assert!(out.is_empty());
    }

    #[test]
    fn test_handle_before_ready_rejects_not_ready() {
        let mut svc = ready_lobby(&[]);

        let out = svc.handle(conn(9), MatchRequest::Create);

        assert!(matches!(
            &out[..],
            [(_, MatchEvent::Rejected { code: 401, .. })]
        ));
        assert!(svc.matches().is_empty());
    }

    #[test]
    fn test_handle_start_notifies_members_and_launches() {
        let mut svc = ready_lobby(&[1, 2]);
        svc.handle(conn(1), MatchRequest::Create);
        svc.handle(conn(2), MatchRequest::Join { room_code: code("AAAAA") });
        let id = svc.matches().match_of(&conn(1)).unwrap();

        let out = svc.handle(conn(1), MatchRequest::Start);

        assert_eq!(
            out,
            vec![(conn(1), MatchEvent::Started), (conn(2), MatchEvent::Started)]
        );
        assert!(svc.matches().is_empty());
        let launched = svc.launched(&id).unwrap();
        assert_eq!(launched.players.len(), 2);
        assert_eq!(svc.spawner().entities_in(&id).len(), 3);
        assert_eq!(svc.state_of(&conn(2)), Some(PlayerState::InMatch));
    }

    #[test]
    fn test_handle_start_by_member_rejects_no_owned_match() {
        let mut svc = ready_lobby(&[1, 2]);
        svc.handle(conn(1), MatchRequest::Create);
        svc.handle(conn(2), MatchRequest::Join { room_code: code("AAAAA") });

        let out = svc.handle(conn(2), MatchRequest::Start);

        assert!(matches!(&out[..], [(_, MatchEvent::Rejected { code: 403, .. })]));
        assert_eq!(svc.matches().len(), 1);
    }

    #[test]
    fn test_handle_create_while_in_play_rejects() {
        let mut svc = ready_lobby(&[1]);
        svc.handle(conn(1), MatchRequest::Create);
        svc.handle(conn(1), MatchRequest::Start);

        let out = svc.handle(conn(1), MatchRequest::Create);

        assert!(matches!(&out[..], [(_, MatchEvent::Rejected { code: 409, .. })]));
        assert!(svc.matches().is_empty());
    }

    // =====================================================================
    // handle(): Cancel / Leave / Ready / List
    // =====================================================================

    #[test]
    fn test_handle_cancel_returns_members_to_waiting() {
        let mut svc = ready_lobby(&[1, 2]);
        svc.handle(conn(1), MatchRequest::Create);
        svc.handle(conn(2), MatchRequest::Join { room_code: code("AAAAA") });

        let out = svc.handle(conn(1), MatchRequest::Cancel);

        assert!(matches!(out[0], (c, MatchEvent::Cancelled) if c == conn(1)));
        assert!(matches!(out[1], (c, MatchEvent::Cancelled) if c == conn(2)));
        assert_eq!(svc.state_of(&conn(1)), Some(PlayerState::Unmatched));
        assert_eq!(svc.state_of(&conn(2)), Some(PlayerState::Unmatched));
        assert!(svc.connections().get(&conn(2)).unwrap().match_id.is_none());
    }

    #[test]
    fn test_handle_leave_updates_remaining_members() {
        let mut svc = ready_lobby(&[1, 2]);
        svc.handle(conn(1), MatchRequest::Create);
        svc.handle(conn(2), MatchRequest::Join { room_code: code("AAAAA") });

        let out = svc.handle(conn(2), MatchRequest::Leave);

        assert_eq!(out[0], (conn(2), MatchEvent::Departed));
        assert!(matches!(
            &out[1],
            (c, MatchEvent::RoomUpdated { members }) if *c == conn(1) && members.len() == 1
        ));
        assert_eq!(svc.state_of(&conn(2)), Some(PlayerState::Unmatched));
    }

    #[test]
    fn test_handle_leave_by_owner_cancels_for_others() {
        let mut svc = ready_lobby(&[1, 2]);
        svc.handle(conn(1), MatchRequest::Create);
        svc.handle(conn(2), MatchRequest::Join { room_code: code("AAAAA") });

        let out = svc.handle(conn(1), MatchRequest::Leave);

        assert_eq!(out[0], (conn(1), MatchEvent::Departed));
        assert_eq!(out[1], (conn(2), MatchEvent::Cancelled));
        assert!(svc.matches().is_empty());
    }

    #[test]
    fn test_handle_ready_sets_flag_and_updates_room() {
        let mut svc = ready_lobby(&[1, 2]);
        svc.handle(conn(1), MatchRequest::Create);
        svc.handle(conn(2), MatchRequest::Join { room_code: code("AAAAA") });

        let out = svc.handle(conn(2), MatchRequest::Ready { ready: true });

        assert_eq!(out.len(), 2);
        match &out[0].1 {
            MatchEvent::RoomUpdated { members } => {
                assert!(!members[0].ready);
                assert!(members[1].ready);
            }
            other => panic!("expected RoomUpdated, got {other:?}"),
        }
    }

    #[test]
    fn test_handle_ready_outside_match_rejects() {
        let mut svc = ready_lobby(&[1]);
        let out = svc.handle(conn(1), MatchRequest::Ready { ready: true });
        assert!(matches!(&out[..], [(_, MatchEvent::Rejected { code: 409, .. })]));
    }

    #[test]
    fn test_handle_list_replies_to_requester_only() {
        let mut svc = ready_lobby(&[1, 2]);
        svc.handle(conn(1), MatchRequest::Create);

        let out = svc.handle(conn(2), MatchRequest::List);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, conn(2));
    }

    // =====================================================================
    // on_disconnect()
    // =====================================================================

    #[test]
    fn test_on_disconnect_member_updates_owner() {
        let mut svc = ready_lobby(&[1, 2]);
        svc.handle(conn(1), MatchRequest::Create);
        svc.handle(conn(2), MatchRequest::Join { room_code: code("AAAAA") });

        let out = svc.on_disconnect(conn(2));

        assert!(matches!(
            &out[0],
            (c, MatchEvent::RoomUpdated { members }) if *c == conn(1) && members.len() == 1
        ));
        assert_eq!(svc.matches().open_matches()[0].players, 1);
        assert_eq!(svc.state_of(&conn(2)), None);
    }

    #[test]
    fn test_on_disconnect_owner_cancels_match() {
        let mut svc = ready_lobby(&[1, 2]);
        svc.handle(conn(1), MatchRequest::Create);
        svc.handle(conn(2), MatchRequest::Join { room_code: code("AAAAA") });

        let out = svc.on_disconnect(conn(1));

        assert_eq!(out[0], (conn(2), MatchEvent::Cancelled));
        assert!(svc.matches().is_empty());
        assert_eq!(svc.state_of(&conn(2)), Some(PlayerState::Unmatched));
    }

    #[test]
    fn test_on_disconnect_in_play_releases_entity() {
        let mut svc = ready_lobby(&[1, 2]);
        svc.handle(conn(1), MatchRequest::Create);
        svc.handle(conn(2), MatchRequest::Join { room_code: code("AAAAA") });
        svc.handle(conn(1), MatchRequest::Start);

        let out = svc.on_disconnect(conn(2));

        assert!(out.is_empty());
        assert_eq!(svc.spawner().binding(&conn(2)), None);
        assert!(svc.spawner().binding(&conn(1)).is_some());
    }

    #[test]
    fn test_on_disconnect_last_player_despawns_controller() {
        let mut svc = ready_lobby(&[1, 2]);
        svc.handle(conn(1), MatchRequest::Create);
        svc.handle(conn(2), MatchRequest::Join { room_code: code("AAAAA") });
        let id = svc.matches().match_of(&conn(1)).unwrap();
        svc.handle(conn(1), MatchRequest::Start);

        svc.on_disconnect(conn(1));
        assert_eq!(svc.spawner().entities_in(&id).len(), 2);
        svc.on_disconnect(conn(2));

        assert!(svc.launched(&id).is_none());
        assert!(svc.spawner().entities_in(&id).is_empty());
    }

    #[test]
    fn test_on_disconnect_repeated_launches_leave_no_entities() {
        let mut svc = lobby(LobbyConfig::default());
        for round in 0..20 {
            let (a, b) = (conn(2 * round), conn(2 * round + 1));
            svc.on_ready(a).unwrap();
            svc.on_ready(b).unwrap();
            svc.handle(a, MatchRequest::Create);
            let room_code = svc.connections().get(&a).unwrap().room_code.clone().unwrap();
            svc.handle(b, MatchRequest::Join { room_code });
            svc.handle(a, MatchRequest::Start);
            svc.on_disconnect(a);
            svc.on_disconnect(b);
        }

        assert!(svc.spawner().is_empty());
        assert!(svc.connections().is_empty());
    }

    #[test]
    fn test_handle_start_clears_room_code_of_players() {
        let mut svc = ready_lobby(&[1, 2, 3]);
        svc.handle(conn(1), MatchRequest::Create);
        svc.handle(conn(2), MatchRequest::Join { room_code: code("AAAAA") });
        let id = svc.matches().match_of(&conn(1)).unwrap();
        svc.handle(conn(1), MatchRequest::Start);

        for c in [conn(1), conn(2)] {
            let info = svc.connections().get(&c).unwrap();
            assert_eq!(info.match_id, Some(id));
            assert!(info.room_code.is_none());
        }
        assert_eq!(svc.connections().waiting(), vec![conn(3)]);
    }

    #[test]
    fn test_on_disconnect_twice_is_harmless() {
        let mut svc = ready_lobby(&[1, 2]);
        svc.handle(conn(1), MatchRequest::Create);
        svc.handle(conn(2), MatchRequest::Join { room_code: code("AAAAA") });

        svc.on_disconnect(conn(2));
        let second = svc.on_disconnect(conn(2));

        assert!(second.is_empty());
        assert!(svc.matches().is_consistent());
    }

    #[test]
    fn test_reset_clears_lobby() {
        let mut svc = ready_lobby(&[1]);
        svc.handle(conn(1), MatchRequest::Create);

        svc.reset();

        assert!(svc.connections().is_empty());
        assert!(svc.matches().is_empty());
    }

    #[test]
    fn test_reset_despawns_launched_matches() {
        let mut svc = ready_lobby(&[1, 2]);
        svc.handle(conn(1), MatchRequest::Create);
        svc.handle(conn(2), MatchRequest::Join { room_code: code("AAAAA") });
        svc.handle(conn(1), MatchRequest::Start);

        svc.reset();

        assert!(svc.spawner().is_empty());
        assert_eq!(svc.spawner().binding(&conn(1)), None);
    }
}
