use log::{debug, info};
use std::collections::HashMap;
use std::time::Duration;

use crate::config::*;

/// A group of milestones displayed together.
///
/// Offsets are relative to the start of the round.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct MilestoneBatch {
    /// Stable across runs for the same round and content.
    pub id: String,
    pub round_index: usize,
    pub index: usize,
    pub events: Vec<MilestoneEvent>,
    pub reveal_at: Duration,
    /// When the exit animation starts. `None` for the last batch of the last
    /// round, which stays on screen.
    pub hide_at: Option<Duration>,
}

impl MilestoneBatch {
    pub fn item_id(&self, item_index: usize) -> String {
        format!("{}-{}", self.id, item_index)
    }
}

fn batch_id(round_name: &str, index: usize, events: &[MilestoneEvent]) -> String {
    let names: Vec<&str> = events.iter().map(|e| e.entity.as_str()).collect();
    let digest = sha256::digest(format!("{}\u{1f}{}\u{1f}{}", round_name, index, names.join("\u{1f}")));
    digest[..16].to_string()
}

/// The batches scheduled in a round, and the ones that did not fit.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct MilestonePlan {
    pub scheduled: Vec<MilestoneBatch>,
    /// Left for the next round, in order.
    pub deferred: Vec<MilestoneBatch>,
}

impl MilestonePlan {
    pub fn len(&self) -> usize {
        self.scheduled.len() + self.deferred.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Splits the milestones of a round into batches of at most
/// `max_visible_per_group` events. The input order is the priority order and
/// is kept. The batches are not scheduled yet.
pub fn group(
    round_name: &str,
    round_index: usize,
    events: &[MilestoneEvent],
    max_visible_per_group: usize,
) -> Vec<MilestoneBatch> {
    assert!(max_visible_per_group > 0, "group: empty groups requested");
    events
        .chunks(max_visible_per_group)
        .enumerate()
        .map(|(idx, chunk)| MilestoneBatch {
            id: batch_id(round_name, idx, chunk),
            round_index,
            index: idx,
            events: chunk.to_vec(),
            reveal_at: Duration::ZERO,
            hide_at: None,
        })
        .collect()
}

/// Schedules batches over the cycle of a round.
///
/// Batch `i` of `n` is revealed at `i * cycle / n`, and stays on screen until
/// `exit_duration` before the next reveal, so that it is gone when the next
/// one appears. Every batch stays on screen at least `min_dwell`.
///
/// In a round that is followed by another one, the last batch is gone when
/// the round ends. The batches that do not fit in the cycle with these
/// constraints are deferred to the next round. In the final round, nothing
/// is deferred: the slots are stretched past the end of the cycle when
/// needed, and the last batch stays on screen.
pub fn schedule(
    pending: Vec<MilestoneBatch>,
    cycle: Duration,
    timing: &MilestoneTiming,
    is_final_round: bool,
) -> MilestonePlan {
    if pending.is_empty() {
        return MilestonePlan::default();
    }
    let exit = timing.exit_duration;
    let step = exit + timing.min_dwell;

    let mut scheduled = pending;
    let mut deferred: Vec<MilestoneBatch> = Vec::new();
    let slot = if is_final_round {
        (cycle / scheduled.len() as u32).max(step)
    } else {
        let capacity = if step.is_zero() {
            scheduled.len()
        } else {
            (cycle.as_nanos() / step.as_nanos()) as usize
        };
        if capacity < scheduled.len() {
            deferred = scheduled.split_off(capacity);
            info!(
                "schedule: {} batches do not fit in a cycle of {:?}, {} deferred",
                scheduled.len() + deferred.len(),
                cycle,
                deferred.len()
            );
        }
        if scheduled.is_empty() {
            return MilestonePlan {
                scheduled,
                deferred,
            };
        }
        cycle / scheduled.len() as u32
    };

    let count = scheduled.len();
    for (idx, b) in scheduled.iter_mut().enumerate() {
        b.reveal_at = slot * idx as u32;
        b.hide_at = if idx + 1 < count {
            Some((slot * (idx + 1) as u32).saturating_sub(exit))
        } else if is_final_round {
            None
        } else {
            Some(cycle.saturating_sub(exit))
        };
        debug!(
            "schedule: batch {} at {:?}, hidden at {:?}",
            b.id, b.reveal_at, b.hide_at
        );
    }
    MilestonePlan {
        scheduled,
        deferred,
    }
}

/// Splits the milestones of a round into batches and schedules them over the
/// cycle of the round. See [`group`] and [`schedule`].
pub fn batch(
    round_name: &str,
    round_index: usize,
    events: &[MilestoneEvent],
    max_visible_per_group: usize,
    cycle: Duration,
    timing: &MilestoneTiming,
    is_final_round: bool,
) -> MilestonePlan {
    let batches = group(round_name, round_index, events, max_visible_per_group);
    schedule(batches, cycle, timing, is_final_round)
}

/// The batch currently on screen, with the measured heights of its items.
#[derive(Debug, Clone)]
struct BatchGroup {
    batch: MilestoneBatch,
    heights: HashMap<String, f32>,
}

/// State of the milestone overlay.
///
/// The height cache belongs to the batch on screen: switching batches starts
/// from an empty cache, since heights of removed items would misplace the
/// new ones.
#[derive(Debug, Clone)]
pub struct MilestoneOverlay {
    timing: MilestoneTiming,
    active: Option<BatchGroup>,
}

impl MilestoneOverlay {
    pub fn new(timing: MilestoneTiming) -> MilestoneOverlay {
        MilestoneOverlay {
            timing,
            active: None,
        }
    }

    pub fn active(&self) -> Option<&MilestoneBatch> {
        self.active.as_ref().map(|g| &g.batch)
    }

    pub fn show(&mut self, batch: MilestoneBatch) {
        debug!(
            "MilestoneOverlay::show: batch {} ({} events) of round {}",
            batch.id,
            batch.events.len(),
            batch.round_index
        );
        self.active = Some(BatchGroup {
            batch,
            heights: HashMap::new(),
        });
    }

    /// Hides the batch if it is the one on screen.
    pub fn hide(&mut self, batch_id: &str) -> Option<MilestoneBatch> {
        match &self.active {
            Some(g) if g.batch.id == batch_id => self.active.take().map(|g| g.batch),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.active = None;
    }

    /// Records the rendered height of an item of the batch on screen.
    pub fn record_height(&mut self, item_id: &str, height: f32) {
        if let Some(g) = self.active.as_mut() {
            if height > 0.0 && g.heights.get(item_id) != Some(&height) {
                g.heights.insert(item_id.to_string(), height);
            }
        }
    }

    /// Vertical position of an item: the heights of the items above it plus
    /// a margin for each. Items not measured yet count for the default
    /// spacing.
    pub fn offset_of(&self, item_index: usize) -> f32 {
        match &self.active {
            None => 0.0,
            Some(g) => (0..item_index)
                .map(|idx| {
                    g.heights
                        .get(&g.batch.item_id(idx))
                        .cloned()
                        .unwrap_or(self.timing.vertical_spacing)
                        + self.timing.margin
                })
                .sum(),
        }
    }

    /// Items of a batch enter one after the other.
    pub fn entrance_delay(&self, item_index: usize) -> Duration {
        self.timing.delay_between * item_index as u32
    }

    /// The last batch of the last round leaves without an exit animation.
    pub fn exit_duration(&self, batch: &MilestoneBatch) -> Duration {
        if batch.hide_at.is_none() {
            Duration::ZERO
        } else {
            self.timing.exit_duration
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(n: usize) -> Vec<MilestoneEvent> {
        (0..n)
            .map(|i| MilestoneEvent {
                entity: format!("E{}", i),
                text: format!("milestone {}", i),
            })
            .collect()
    }

    fn ms(x: u64) -> Duration {
        Duration::from_millis(x)
    }

    #[test]
    fn seven_events_in_groups_of_three() {
        let plan = batch(
            "R1",
            0,
            &events(7),
            3,
            ms(6000),
            &MilestoneTiming::DEFAULT,
            false,
        );
        assert!(plan.deferred.is_empty());
        let res = plan.scheduled;
        let sizes: Vec<usize> = res.iter().map(|b| b.events.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        let reveals: Vec<Duration> = res.iter().map(|b| b.reveal_at).collect();
        assert_eq!(reveals, vec![ms(0), ms(2000), ms(4000)]);
        let hides: Vec<Option<Duration>> = res.iter().map(|b| b.hide_at).collect();
        assert_eq!(hides, vec![Some(ms(1000)), Some(ms(3000)), Some(ms(5000))]);
        assert_eq!(res[2].events[0].entity, "E6");
    }

    #[test]
    fn final_round_keeps_last_batch() {
        let plan = batch("R9", 8, &events(4), 2, ms(6000), &MilestoneTiming::DEFAULT, true);
        let res = plan.scheduled;
        assert_eq!(res[0].hide_at, Some(ms(2000)));
        assert_eq!(res[1].hide_at, None);
    }

    #[test]
    fn crowded_round_defers_batches() {
        // Each batch needs 1000ms of exit and 500ms on screen: three fit in 5700ms.
        let timing = MilestoneTiming::DEFAULT;
        let plan = batch("R1", 0, &events(7), 1, ms(5700), &timing, false);
        assert_eq!(plan.scheduled.len(), 3);
        assert_eq!(plan.deferred.len(), 4);
        assert_eq!(plan.deferred[0].events[0].entity, "E3");
        let reveals: Vec<Duration> = plan.scheduled.iter().map(|b| b.reveal_at).collect();
        assert_eq!(reveals, vec![ms(0), ms(1900), ms(3800)]);
        for b in plan.scheduled.iter() {
            let hide = b.hide_at.unwrap();
            assert!(hide >= b.reveal_at + timing.min_dwell);
        }
        for pair in plan.scheduled.windows(2) {
            assert!(pair[1].reveal_at >= pair[0].hide_at.unwrap() + timing.exit_duration);
        }
        // Gone by the end of the round.
        assert_eq!(plan.scheduled[2].hide_at, Some(ms(4700)));

        // Too short for anything.
        let plan = batch("R1", 0, &events(2), 1, ms(1000), &timing, false);
        assert!(plan.scheduled.is_empty());
        assert_eq!(plan.deferred.len(), 2);
    }

    #[test]
    fn final_round_stretches_slots() {
        let timing = MilestoneTiming::DEFAULT;
        let plan = batch("R9", 8, &events(7), 1, ms(5700), &timing, true);
        assert!(plan.deferred.is_empty());
        let reveals: Vec<Duration> = plan.scheduled.iter().map(|b| b.reveal_at).collect();
        assert_eq!(reveals[1], ms(1500));
        assert_eq!(reveals[6], ms(9000));
        assert_eq!(plan.scheduled[0].hide_at, Some(ms(500)));
        assert_eq!(plan.scheduled[6].hide_at, None);
    }

    #[test]
    fn deferred_batches_keep_their_identity() {
        let timing = MilestoneTiming::DEFAULT;
        let first = batch("R1", 0, &events(4), 1, ms(3000), &timing, false);
        assert_eq!(first.scheduled.len(), 2);
        let mut pending = first.deferred.clone();
        pending.extend(group("R2", 1, &events(1), 1));
        let second = schedule(pending, ms(6000), &timing, false);
        let ids: Vec<&str> = second.scheduled.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids[0], first.deferred[0].id);
        assert_eq!(second.scheduled[0].round_index, 0);
        assert_eq!(second.scheduled[2].round_index, 1);
        assert_eq!(second.scheduled[1].reveal_at, ms(2000));
    }

    #[test]
    fn ids_are_stable_and_distinct() {
        let a = group("R1", 0, &events(4), 2);
        let b = batch("R1", 0, &events(4), 2, ms(9000), &MilestoneTiming::DEFAULT, false);
        assert_eq!(a[0].id, b.scheduled[0].id);
        assert_ne!(a[0].id, a[1].id);
        assert_eq!(a[0].id.len(), 16);
        assert!(batch("R1", 0, &[], 2, ms(6000), &MilestoneTiming::DEFAULT, false).is_empty());
    }

    #[test]
    fn overlay_heights_reset_on_switch() {
        let batches = group("R1", 0, &events(4), 2);
        let mut overlay = MilestoneOverlay::new(MilestoneTiming::DEFAULT);
        overlay.show(batches[0].clone());
        overlay.record_height(&batches[0].item_id(0), 50.0);
        assert_eq!(overlay.offset_of(0), 0.0);
        assert_eq!(overlay.offset_of(1), 70.0);

        assert!(overlay.hide(&batches[1].id).is_none());
        assert!(overlay.hide(&batches[0].id).is_some());
        overlay.show(batches[1].clone());
        // Nothing measured in the new batch: default spacing plus margin.
        assert_eq!(overlay.offset_of(1), 180.0);
        assert_eq!(overlay.entrance_delay(2), ms(400));
    }
}
