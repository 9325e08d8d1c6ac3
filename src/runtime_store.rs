//! RuntimeStore — the single in-process source of truth for tokens,
//! connections, the spatial grid, and CDNA.
//!
//! One reader-writer lock per component; writers take
//! exclusive access, readers share, and no lock is held across a
//! suspension point (every public method here is synchronous end to end).

use crate::cdna::{ProfileId, CDNA};
use crate::connection::{Connection, ConnectionId, ConnectionPrototype};
use crate::coordinates::{CoordinateSpace, NUM_SPACES};
use crate::error::{AxonError, Result};
use crate::grid::{GridConfig, NeighborHit, SpatialIndex};
use crate::guardian::Guardian;
use crate::token::{now_micros, Token, TokenId, TokenPrototype};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

struct TokenTable {
    tokens: HashMap<TokenId, Token>,
    next_id: AtomicU32,
}

struct ConnectionTable {
    connections: HashMap<ConnectionId, Connection>,
    /// token -> incident connection ids, maintained for O(degree) cascade delete.
    incident: HashMap<TokenId, Vec<ConnectionId>>,
    next_id: AtomicU64,
}

pub struct RuntimeStore {
    guardian: Arc<Guardian>,
    tokens: RwLock<TokenTable>,
    connections: RwLock<ConnectionTable>,
    grid: SpatialIndex,
    cdna: RwLock<CDNA>,
}

impl RuntimeStore {
    pub fn new(guardian: Arc<Guardian>, grid_config: GridConfig) -> Self {
        Self {
            guardian,
            tokens: RwLock::new(TokenTable {
                tokens: HashMap::new(),
                next_id: AtomicU32::new(1), // 0 reserved
            }),
            connections: RwLock::new(ConnectionTable {
                connections: HashMap::new(),
                incident: HashMap::new(),
                next_id: AtomicU64::new(1),
            }),
            grid: SpatialIndex::new(grid_config),
            cdna: RwLock::new(CDNA::default()),
        }
    }

    pub fn grid(&self) -> &SpatialIndex {
        &self.grid
    }

    // ---- Tokens ----------------------------------------------------

    pub fn create_token(&self, prototype: TokenPrototype) -> Result<TokenId> {
        prototype.validate().map_err(AxonError::Validation)?;
        if !self.guardian.can_create_token() {
            return Err(AxonError::QuotaExceeded("max_tokens reached".into()));
        }
        let mut table = self.tokens.write();
        let id = table.next_id.fetch_add(1, Ordering::Relaxed);
        let now = now_micros();
        let token = prototype.into_token(id, now);
        if token.is_active() {
            for space in CoordinateSpace::ALL {
                let point = token.coords[space.index()];
                if point.iter().all(|v| v.is_finite()) {
                    self.grid.insert(id, space, point);
                }
            }
        }
        table.tokens.insert(id, token);
        self.guardian.record_token_created();
        Ok(id)
    }

    pub fn get_token(&self, id: TokenId) -> Result<Token> {
        self.tokens
            .read()
            .tokens
            .get(&id)
            .cloned()
            .ok_or_else(|| AxonError::not_found(format!("token {id}")))
    }

    pub fn update_token(&self, id: TokenId, prototype: TokenPrototype) -> Result<()> {
        prototype.validate().map_err(AxonError::Validation)?;
        let mut table = self.tokens.write();
        let existing = table
            .tokens
            .get(&id)
            .ok_or_else(|| AxonError::not_found(format!("token {id}")))?;
        let created_at = existing.created_at;
        let coords_changed = existing.coords != prototype.coords;
        let was_active = existing.is_active();
        let mut updated = prototype.into_token(id, created_at);
        updated.last_seen_at = now_micros();

        // Re-index atomically: the grid's own per-space lock serializes the
        // remove-then-insert, and we hold the token table's write lock for
        // the whole operation, so no reader observes a torn state.
        if coords_changed || was_active != updated.is_active() {
            for space in CoordinateSpace::ALL {
                let point = updated.coords[space.index()];
                if updated.is_active() && point.iter().all(|v| v.is_finite()) {
                    self.grid.update(id, space, point);
                } else {
                    self.grid.remove(id, space);
                }
            }
        }
        table.tokens.insert(id, updated);
        Ok(())
    }

    pub fn delete_token(&self, id: TokenId) -> bool {
        let existed = {
            let mut table = self.tokens.write();
            table.tokens.remove(&id).is_some()
        };
        if !existed {
            return false;
        }
        self.grid.remove_all(id);
        self.cascade_delete_connections_for(id);
        self.guardian.record_token_deleted();
        true
    }

    pub fn list_tokens(&self, limit: usize, offset: usize) -> Vec<Token> {
        let table = self.tokens.read();
        let mut ids: Vec<&TokenId> = table.tokens.keys().collect();
        ids.sort();
        ids.into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|id| table.tokens.get(id).cloned())
            .collect()
    }

    pub fn count_tokens(&self) -> usize {
        self.tokens.read().tokens.len()
    }

    pub fn clear_tokens(&self) {
        let mut table = self.tokens.write();
        let ids: Vec<TokenId> = table.tokens.keys().copied().collect();
        table.tokens.clear();
        drop(table);
        for id in ids {
            self.grid.remove_all(id);
        }
        let mut conns = self.connections.write();
        conns.connections.clear();
        conns.incident.clear();
    }

    // ---- Connections -------------------------------------------------

    pub fn create_connection(&self, prototype: ConnectionPrototype) -> Result<ConnectionId> {
        if !self.guardian.can_create_connection() {
            return Err(AxonError::QuotaExceeded("max_connections reached".into()));
        }
        {
            let table = self.tokens.read();
            if !table.tokens.contains_key(&prototype.token_a) {
                return Err(AxonError::not_found(format!("token {}", prototype.token_a)));
            }
            if !table.tokens.contains_key(&prototype.token_b) {
                return Err(AxonError::not_found(format!("token {}", prototype.token_b)));
            }
        }
        let mut table = self.connections.write();
        let id = table.next_id.fetch_add(1, Ordering::Relaxed);
        let conn = prototype.into_connection(id, now_micros());
        table.incident.entry(conn.token_a).or_default().push(id);
        table.incident.entry(conn.token_b).or_default().push(id);
        table.connections.insert(id, conn);
        self.guardian.record_connection_created();
        Ok(id)
    }

    pub fn get_connection(&self, id: ConnectionId) -> Result<Connection> {
        self.connections
            .read()
            .connections
            .get(&id)
            .cloned()
            .ok_or_else(|| AxonError::not_found(format!("connection {id}")))
    }

    pub fn delete_connection(&self, id: ConnectionId) -> bool {
        let mut table = self.connections.write();
        if let Some(conn) = table.connections.remove(&id) {
            if let Some(v) = table.incident.get_mut(&conn.token_a) {
                v.retain(|c| *c != id);
            }
            if let Some(v) = table.incident.get_mut(&conn.token_b) {
                v.retain(|c| *c != id);
            }
            self.guardian.record_connection_deleted();
            true
        } else {
            false
        }
    }

    pub fn list_connections(&self, limit: usize, offset: usize) -> Vec<Connection> {
        let table = self.connections.read();
        let mut ids: Vec<&ConnectionId> = table.connections.keys().collect();
        ids.sort();
        ids.into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|id| table.connections.get(id).cloned())
            .collect()
    }

    pub fn count_connections(&self) -> usize {
        self.connections.read().connections.len()
    }

    fn cascade_delete_connections_for(&self, token_id: TokenId) {
        let ids: Vec<ConnectionId> = {
            let table = self.connections.read();
            table.incident.get(&token_id).cloned().unwrap_or_default()
        };
        for id in ids {
            self.delete_connection(id);
        }
    }

    // ---- Grid passthrough ---------------------------------------------

    pub fn grid_info(&self, space: CoordinateSpace) -> (usize, usize) {
        (self.grid.bucket_count(space), self.grid.indexed_count(space))
    }

    pub fn find_neighbors(
        &self,
        token_id: TokenId,
        space: CoordinateSpace,
        radius: f32,
        max_results: usize,
    ) -> Result<Vec<NeighborHit>> {
        let origin = self.get_token(token_id)?;
        Ok(self
            .grid
            .find_neighbors(token_id, space, origin.coords[space.index()], radius, max_results))
    }

    pub fn range_query(
        &self,
        space: CoordinateSpace,
        center: [f32; 3],
        radius: f32,
    ) -> Vec<NeighborHit> {
        self.grid.range_query(space, center, radius)
    }

    // ---- CDNA -----------------------------------------------------

    pub fn cdna_get(&self) -> CDNA {
        self.cdna.read().clone()
    }

    pub fn cdna_set_profile(&self, profile_id: ProfileId) {
        self.cdna.write().set_profile(profile_id);
    }

    pub fn cdna_set_flags(&self, flags: u32) {
        self.cdna.write().flags = flags;
    }

    pub fn cdna_update_scales(&self, scales: [f32; NUM_SPACES]) -> Result<()> {
        self.cdna.write().update_scales(scales)
    }

    pub fn cdna_validate(&self) -> Result<()> {
        self.cdna.read().validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guardian::GuardianConfig;
    use crate::token::{flags, EntityType};
    use crate::connection::ConnectionKind;

    fn store() -> RuntimeStore {
        RuntimeStore::new(Arc::new(Guardian::new(GuardianConfig::default())), GridConfig::default())
    }

    fn proto(x: f32) -> TokenPrototype {
        let mut coords = [[0.0, 0.0, 0.0]; NUM_SPACES];
        coords[0] = [x, 0.0, 0.0];
        TokenPrototype {
            coords,
            weight: 0.5,
            entity_type: EntityType::Concept,
            flags: flags::ACTIVE,
            field_radius: 1.0,
            field_strength: 1.0,
        }
    }

    #[test]
    fn invariant1_get_after_create_until_delete() {
        let s = store();
        let id = s.create_token(proto(0.0)).unwrap();
        assert!(s.get_token(id).is_ok());
        assert!(s.delete_token(id));
        assert!(s.get_token(id).is_err());
    }

    #[test]
    fn invariant2_update_reindexes_exactly() {
        let s = store();
        let id = s.create_token(proto(0.0)).unwrap();
        let hits_before = s.grid.range_query(CoordinateSpace::L1Physical, [0.0, 0.0, 0.0], 1.0);
        assert_eq!(hits_before.len(), 1);
        s.update_token(id, proto(50.0)).unwrap();
        let hits_old = s.grid.range_query(CoordinateSpace::L1Physical, [0.0, 0.0, 0.0], 1.0);
        assert!(hits_old.is_empty());
        let hits_new = s.grid.range_query(CoordinateSpace::L1Physical, [50.0, 0.0, 0.0], 1.0);
        assert_eq!(hits_new.len(), 1);
    }

    #[test]
    fn delete_cascades_connections() {
        let s = store();
        let a = s.create_token(proto(0.0)).unwrap();
        let b = s.create_token(proto(1.0)).unwrap();
        let c = s
            .create_connection(ConnectionPrototype {
                token_a: a,
                token_b: b,
                kind: ConnectionKind::Proximity,
                preferred_distance: 1.0,
                pull_strength: 0.5,
                rigidity: 0.1,
                active_levels: 1,
                bidirectional: true,
            })
            .unwrap();
        assert!(s.delete_token(a));
        assert!(s.get_connection(c).is_err());
    }

    #[test]
    fn create_connection_rejects_missing_endpoint() {
        let s = store();
        let a = s.create_token(proto(0.0)).unwrap();
        let result = s.create_connection(ConnectionPrototype {
            token_a: a,
            token_b: 9999,
            kind: ConnectionKind::Proximity,
            preferred_distance: 1.0,
            pull_strength: 0.5,
            rigidity: 0.1,
            active_levels: 1,
            bidirectional: true,
        });
        assert!(result.is_err());
    }

    #[test]
    fn s6_quota_exceeded() {
        let s = RuntimeStore::new(
            Arc::new(Guardian::new(GuardianConfig {
                max_tokens: 3,
                ..GuardianConfig::default()
            })),
            GridConfig::default(),
        );
        for i in 0..3 {
            s.create_token(proto(i as f32)).unwrap();
        }
        assert!(matches!(s.create_token(proto(3.0)), Err(AxonError::QuotaExceeded(_))));
        assert_eq!(s.count_tokens(), 3);
    }
}
