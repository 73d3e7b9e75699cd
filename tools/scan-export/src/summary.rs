//! Capture statistics for `meshscan-export info`.

use std::fmt;
use std::time::Duration;

use hashbrown::HashSet;
use meshscan_common::AnchorUpdate;
use meshscan_common::formats::{CaptureEvent, CaptureRecord};
use meshscan_shared::AnchorId;

/// Totals over every record of a capture.
///
/// Vertex and triangle totals count every update, so an anchor updated ten
/// times contributes its geometry ten times.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureSummary {
    pub records: usize,
    pub added_records: usize,
    pub updated_records: usize,
    pub removed_records: usize,
    /// Anchor geometries across added and updated records
    pub anchor_updates: usize,
    pub anchor_removals: usize,
    /// Distinct anchors mentioned anywhere
    pub unique_anchors: usize,
    pub vertices: u64,
    pub triangles: u64,
    /// Timestamp of the last record
    pub duration: Duration,
}

impl CaptureSummary {
    pub fn from_records(records: &[CaptureRecord]) -> Self {
        let mut summary = Self {
            records: records.len(),
            ..Self::default()
        };
        let mut anchors: HashSet<AnchorId> = HashSet::new();

        for record in records {
            summary.duration = summary.duration.max(record.at);
            match &record.event {
                CaptureEvent::Added(updates) | CaptureEvent::Updated(updates) => {
                    if matches!(record.event, CaptureEvent::Added(_)) {
                        summary.added_records += 1;
                    } else {
                        summary.updated_records += 1;
                    }
                    summary.anchor_updates += updates.len();
                    for update in updates {
                        anchors.insert(update.id);
                        summary.vertices += update.vertices.count as u64;
                        summary.triangles += update.faces.primitive_count as u64;
                    }
                }
                CaptureEvent::Removed(ids) => {
                    summary.removed_records += 1;
                    summary.anchor_removals += ids.len();
                    anchors.extend(ids.iter().copied());
                }
            }
        }

        summary.unique_anchors = anchors.len();
        summary
    }
}

/// The records that mention `id`, each narrowed to that anchor alone.
pub fn anchor_history(records: &[CaptureRecord], id: AnchorId) -> Vec<CaptureRecord> {
    records
        .iter()
        .filter_map(|record| {
            let event = match &record.event {
                CaptureEvent::Added(updates) => CaptureEvent::Added(only(updates, id)),
                CaptureEvent::Updated(updates) => CaptureEvent::Updated(only(updates, id)),
                CaptureEvent::Removed(ids) => {
                    CaptureEvent::Removed(ids.iter().copied().filter(|&r| r == id).collect())
                }
            };
            (event.anchor_count() > 0).then(|| CaptureRecord::new(record.at, event))
        })
        .collect()
}

fn only(updates: &[AnchorUpdate], id: AnchorId) -> Vec<AnchorUpdate> {
    updates.iter().filter(|u| u.id == id).cloned().collect()
}

impl fmt::Display for CaptureSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "records:   {} ({} added, {} updated, {} removed)",
            self.records, self.added_records, self.updated_records, self.removed_records
        )?;
        writeln!(
            f,
            "anchors:   {} unique, {} updates, {} removals",
            self.unique_anchors, self.anchor_updates, self.anchor_removals
        )?;
        writeln!(f, "vertices:  {}", self.vertices)?;
        writeln!(f, "triangles: {}", self.triangles)?;
        write!(f, "duration:  {:.3}s", self.duration.as_secs_f64())
    }
}
