//! Per-anchor world-space mesh cache.
//!
//! The cache is owned by the session thread. Meshes are stored behind `Arc`
//! so a [`CacheSnapshot`] is a cheap, immutable copy that can be handed to
//! the exporter thread while scanning continues.

use std::sync::Arc;

use hashbrown::HashMap;
use meshscan_common::WorldMesh;
use meshscan_shared::AnchorId;

#[derive(Debug, Clone)]
struct CacheSlot {
    /// Position of the anchor's first insertion; fixes merge order.
    sequence: u64,
    mesh: Arc<WorldMesh>,
}

/// Latest world-space geometry of every live anchor.
#[derive(Debug, Default)]
pub struct MeshCache {
    entries: HashMap<AnchorId, CacheSlot>,
    next_sequence: u64,
}

impl MeshCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or wholesale-replace an anchor's mesh.
    ///
    /// A replaced anchor keeps its original position in snapshot order.
    /// Returns the stored mesh.
    pub fn upsert(&mut self, id: AnchorId, mesh: WorldMesh) -> Arc<WorldMesh> {
        let mesh = Arc::new(mesh);
        match self.entries.get_mut(&id) {
            Some(slot) => slot.mesh = Arc::clone(&mesh),
            None => {
                let sequence = self.next_sequence;
                self.next_sequence += 1;
                self.entries.insert(
                    id,
                    CacheSlot {
                        sequence,
                        mesh: Arc::clone(&mesh),
                    },
                );
            }
        }
        mesh
    }

    /// Drop an anchor. Returns whether it was present.
    pub fn remove(&mut self, id: AnchorId) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub fn get(&self, id: AnchorId) -> Option<&Arc<WorldMesh>> {
        self.entries.get(&id).map(|slot| &slot.mesh)
    }

    pub fn contains(&self, id: AnchorId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Point-in-time copy, ordered by first insertion.
    pub fn snapshot(&self) -> CacheSnapshot {
        let mut slots: Vec<(&AnchorId, &CacheSlot)> = self.entries.iter().collect();
        slots.sort_unstable_by_key(|(_, slot)| slot.sequence);
        CacheSnapshot {
            entries: slots
                .into_iter()
                .map(|(id, slot)| (*id, Arc::clone(&slot.mesh)))
                .collect(),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_sequence = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Immutable view of the cache at one instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheSnapshot {
    entries: Vec<(AnchorId, Arc<WorldMesh>)>,
}

impl CacheSnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in merge order.
    pub fn iter(&self) -> impl Iterator<Item = (AnchorId, &WorldMesh)> + '_ {
        self.entries.iter().map(|(id, mesh)| (*id, mesh.as_ref()))
    }

    pub fn ids(&self) -> impl Iterator<Item = AnchorId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    pub fn vertex_count(&self) -> usize {
        self.entries.iter().map(|(_, mesh)| mesh.vertex_count()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.entries.iter().map(|(_, mesh)| mesh.triangle_count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3};
    use meshscan_common::LocalMesh;

    use super::*;

    fn mesh(vertex_count: usize, x: f32) -> WorldMesh {
        let vertices = (0..vertex_count)
            .map(|i| Vec3::new(x, i as f32, 0.0))
            .collect();
        LocalMesh::new(vertices, vec![[0, 1, 2]])
            .unwrap()
            .to_world(&Mat4::IDENTITY)
    }

    fn id(n: u128) -> AnchorId {
        AnchorId::from_u128(n)
    }

    #[test]
    fn test_upsert_then_get() {
        let mut cache = MeshCache::new();
        cache.upsert(id(1), mesh(3, 0.0));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(id(1)).unwrap().vertex_count(), 3);
        assert!(cache.get(id(2)).is_none());
    }

    #[test]
    fn test_upsert_replaces_wholesale() {
        let mut cache = MeshCache::new();
        cache.upsert(id(1), mesh(3, 0.0));
        cache.upsert(id(1), mesh(5, 2.0));
        assert_eq!(cache.len(), 1);

        let stored = cache.get(id(1)).unwrap();
        assert_eq!(stored.vertex_count(), 5);
        assert!(stored.vertices().iter().all(|v| v.x == 2.0));
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut once = MeshCache::new();
        once.upsert(id(1), mesh(3, 0.0));
        once.upsert(id(2), mesh(4, 1.0));

        let mut twice = MeshCache::new();
        twice.upsert(id(1), mesh(3, 0.0));
        twice.upsert(id(2), mesh(4, 1.0));
        twice.upsert(id(1), mesh(3, 0.0));

        assert_eq!(once.snapshot(), twice.snapshot());
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut cache = MeshCache::new();
        assert!(!cache.remove(id(9)));
        cache.upsert(id(9), mesh(3, 0.0));
        assert!(cache.remove(id(9)));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_snapshot_keeps_first_insertion_order() {
        let mut cache = MeshCache::new();
        for n in [30, 10, 20] {
            cache.upsert(id(n), mesh(3, n as f32));
        }
        // Replacing does not move an anchor to the back
        cache.upsert(id(30), mesh(4, 0.0));

        let ids: Vec<_> = cache.snapshot().ids().collect();
        assert_eq!(ids, [id(30), id(10), id(20)]);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let mut cache = MeshCache::new();
        cache.upsert(id(1), mesh(3, 0.0));
        let snapshot = cache.snapshot();

        cache.upsert(id(1), mesh(6, 1.0));
        cache.upsert(id(2), mesh(3, 0.0));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.vertex_count(), 3);
    }

    #[test]
    fn test_snapshot_len_tracks_cache_len() {
        let mut cache = MeshCache::new();
        let ops: [(u128, bool); 9] = [
            (1, true),
            (2, true),
            (1, true),
            (3, true),
            (2, false),
            (4, false),
            (5, true),
            (1, false),
            (2, true),
        ];
        for (n, insert) in ops {
            if insert {
                cache.upsert(id(n), mesh(3, 0.0));
            } else {
                cache.remove(id(n));
            }
            assert_eq!(cache.snapshot().len(), cache.len());
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_clear() {
        let mut cache = MeshCache::new();
        cache.upsert(id(1), mesh(3, 0.0));
        cache.upsert(id(2), mesh(3, 0.0));
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.snapshot().is_empty());
    }

    #[test]
    fn test_snapshot_totals() {
        let mut cache = MeshCache::new();
        cache.upsert(id(1), mesh(4, 0.0));
        cache.upsert(id(2), mesh(6, 0.0));
        let snapshot = cache.snapshot();
        assert_eq!(snapshot.vertex_count(), 10);
        assert_eq!(snapshot.triangle_count(), 2);
    }
}
