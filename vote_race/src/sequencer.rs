//! The round sequencer: plays a race one round after the other.
//!
//! The sequencer owns a [`Timeline`] of deferred cues. The host moves the
//! clock forward with [`Sequencer::advance`] and receives what happened as
//! a list of [`Notice`]s, in order.
//!
//! Each loaded data set is a new generation. Loading other data or
//! unmounting cancels the cues of the current generation, and a cue that
//! arrives with an older generation is ignored: it can never act on the
//! new data.

use log::{debug, info};
use std::time::Duration;

use crate::config::*;
use crate::milestones::{self, MilestoneBatch, MilestoneOverlay};
use crate::timeline::{Generation, Timeline, TimerId};

/// States of the sequencer. Armed always points at the first round.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SequencerState {
    Idle,
    Armed,
    Playing { round: usize },
    Done { round: usize },
}

/// Deferred work of the sequencer.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Cue {
    /// Moves on to the given round.
    Advance { to_round: usize },
    /// Ends the last round.
    Finish { round: usize },
    RevealBatch { round: usize, batch: usize },
    HideBatch { round: usize, batch: usize },
}

impl Cue {
    fn is_transition(&self) -> bool {
        matches!(self, Cue::Advance { .. } | Cue::Finish { .. })
    }
}

/// What the rendering layer should know about.
#[derive(PartialEq, Debug, Clone)]
pub enum Notice {
    /// A new round is being displayed. Comes before anything else of the round.
    RoundStarted {
        round: usize,
        at: Duration,
        cycle: Duration,
    },
    SnapshotReady(RoundSnapshot),
    /// All the milestone batches of the round, as scheduled.
    BatchesPlanned(Vec<MilestoneBatch>),
    BatchRevealed(MilestoneBatch),
    BatchHidden(MilestoneBatch),
    /// The last round has been fully played.
    Finished { round: usize },
    /// The previous data set was dropped.
    Reset,
}

#[derive(Debug, Clone)]
pub struct Sequencer {
    config: RaceConfig,
    data: Option<RaceData>,
    state: SequencerState,
    generation: Generation,
    timeline: Timeline<Cue>,
    // At most one pending Advance or Finish.
    transition: Option<TimerId>,
    batch_timers: Vec<TimerId>,
    snapshot: Option<RoundSnapshot>,
    batches: Vec<MilestoneBatch>,
    // Batches that did not fit in the previous round.
    carried: Vec<MilestoneBatch>,
    overlay: MilestoneOverlay,
    cycle: Duration,
    round_started_at: Duration,
}

impl Sequencer {
    pub fn new(config: RaceConfig) -> Result<Sequencer, RaceErrors> {
        config.validate()?;
        let overlay = MilestoneOverlay::new(config.milestone);
        Ok(Sequencer {
            config,
            data: None,
            state: SequencerState::Idle,
            generation: Generation::default(),
            timeline: Timeline::new(),
            transition: None,
            batch_timers: Vec::new(),
            snapshot: None,
            batches: Vec::new(),
            carried: Vec::new(),
            overlay,
            cycle: Duration::ZERO,
            round_started_at: Duration::ZERO,
        })
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn now(&self) -> Duration {
        self.timeline.now()
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn data(&self) -> Option<&RaceData> {
        self.data.as_ref()
    }

    /// The snapshot of the round on screen.
    pub fn snapshot(&self) -> Option<&RoundSnapshot> {
        self.snapshot.as_ref()
    }

    /// The milestone batches of the round on screen.
    pub fn batches(&self) -> &[MilestoneBatch] {
        &self.batches
    }

    pub fn overlay(&self) -> &MilestoneOverlay {
        &self.overlay
    }

    /// For the renderer to report measured heights.
    pub fn overlay_mut(&mut self) -> &mut MilestoneOverlay {
        &mut self.overlay
    }

    /// The cycle duration of the round on screen.
    pub fn cycle_duration(&self) -> Duration {
        self.cycle
    }

    pub fn round_started_at(&self) -> Duration {
        self.round_started_at
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.timeline.next_deadline()
    }

    /// Number of pending round transitions. Never more than one.
    pub fn pending_transitions(&self) -> usize {
        self.timeline
            .iter()
            .filter(|(_, g, cue)| *g == self.generation && cue.is_transition())
            .count()
    }

    // Drops everything that belongs to the current generation.
    fn teardown(&mut self) {
        let cancelled = self.timeline.cancel_generation(self.generation);
        if cancelled > 0 {
            debug!(
                "teardown: generation {:?}: {} pending cues cancelled",
                self.generation, cancelled
            );
        }
        self.generation = self.generation.next();
        self.transition = None;
        self.batch_timers.clear();
        self.snapshot = None;
        self.batches.clear();
        self.carried.clear();
        self.overlay.clear();
        self.cycle = Duration::ZERO;
    }

    /// Replaces the data set. Any playback in progress is stopped and the
    /// sequencer goes back to the first round, waiting for [`Sequencer::start`].
    ///
    /// An empty race leaves the sequencer idle.
    pub fn load(&mut self, data: RaceData, out: &mut Vec<Notice>) -> Result<(), RaceErrors> {
        if self.state != SequencerState::Idle {
            out.push(Notice::Reset);
        }
        self.teardown();
        if data.is_empty() {
            self.data = None;
            self.state = SequencerState::Idle;
            return Err(RaceErrors::EmptyRace);
        }
        info!(
            "load: {} entities over {} rounds (generation {:?})",
            data.entities.len(),
            data.round_count(),
            self.generation
        );
        self.data = Some(data);
        self.state = SequencerState::Armed;
        self.cycle = self.compute_cycle();
        Ok(())
    }

    /// Starts playing from the first round. Does nothing unless armed.
    pub fn start(&mut self, out: &mut Vec<Notice>) {
        if self.state != SequencerState::Armed {
            debug!("start: ignored in state {:?}", self.state);
            return;
        }
        self.enter_round(0, out);
    }

    /// Stops everything. The sequencer forgets its data.
    pub fn unmount(&mut self, out: &mut Vec<Notice>) {
        if self.state != SequencerState::Idle {
            out.push(Notice::Reset);
        }
        self.teardown();
        self.data = None;
        self.state = SequencerState::Idle;
    }

    /// Moves the clock to `until`, running every cue due on the way.
    pub fn advance(&mut self, until: Duration, out: &mut Vec<Notice>) {
        while let Some(fired) = self.timeline.pop_due(until) {
            self.deliver(fired.generation, fired.event, out);
        }
        self.timeline.set_now(until);
    }

    /// Moves the clock forward by `dt`.
    pub fn tick(&mut self, dt: Duration, out: &mut Vec<Notice>) {
        let until = self.timeline.now() + dt;
        self.advance(until, out);
    }

    /// Runs a cue. Cues of an older generation are ignored.
    pub fn deliver(&mut self, generation: Generation, cue: Cue, out: &mut Vec<Notice>) {
        if generation != self.generation {
            debug!(
                "deliver: stale cue {:?} of generation {:?} ignored (current: {:?})",
                cue, generation, self.generation
            );
            return;
        }
        match cue {
            Cue::Advance { to_round } => {
                self.transition = None;
                match self.state {
                    SequencerState::Playing { round } if round + 1 == to_round => {
                        self.enter_round(to_round, out)
                    }
                    state => debug!("deliver: advance to {} ignored in state {:?}", to_round, state),
                }
            }
            Cue::Finish { round } => {
                self.transition = None;
                if self.state == (SequencerState::Playing { round }) {
                    info!("deliver: race finished after round {}", round);
                    self.state = SequencerState::Done { round };
                    out.push(Notice::Finished { round });
                }
            }
            Cue::RevealBatch { round, batch } => {
                if self.current_round() != Some(round) {
                    return;
                }
                if let Some(b) = self.batches.get(batch).cloned() {
                    self.overlay.show(b.clone());
                    out.push(Notice::BatchRevealed(b));
                }
            }
            Cue::HideBatch { round, batch } => {
                if self.current_round() != Some(round) {
                    return;
                }
                if let Some(id) = self.batches.get(batch).map(|b| b.id.clone()) {
                    if let Some(b) = self.overlay.hide(&id) {
                        out.push(Notice::BatchHidden(b));
                    }
                }
            }
        }
    }

    fn current_round(&self) -> Option<usize> {
        match self.state {
            SequencerState::Playing { round } | SequencerState::Done { round } => Some(round),
            _ => None,
        }
    }

    // The number of bars drawn drives the stagger part of the cycle.
    fn compute_cycle(&self) -> Duration {
        let bars = self
            .data
            .as_ref()
            .map(|d| d.entities.len().min(self.config.max_display))
            .unwrap_or(0);
        self.config.animation.cycle_duration(bars)
    }

    fn enter_round(&mut self, round: usize, out: &mut Vec<Notice>) {
        let data = match self.data.as_ref() {
            Some(d) => d,
            None => return,
        };
        assert!(
            round < data.round_count(),
            "enter_round: round {} out of range",
            round
        );
        let now = self.timeline.now();
        let is_last = round + 1 == data.round_count();

        // Cues left over from the previous round must not leak in.
        for id in self.batch_timers.drain(..) {
            self.timeline.cancel(id);
        }

        let cycle = self.compute_cycle();
        if cycle != self.cycle {
            debug!("enter_round: cycle duration {:?} -> {:?}", self.cycle, cycle);
        }
        self.cycle = cycle;

        let mut pending = std::mem::take(&mut self.carried);
        pending.extend(milestones::group(
            &data.rounds[round].name,
            round,
            data.milestones_for(round),
            self.config.max_visible_per_group,
        ));
        let plan = milestones::schedule(pending, cycle, &self.config.milestone, is_last);
        if !plan.deferred.is_empty() {
            debug!(
                "enter_round: {} milestone batches carried over to round {}",
                plan.deferred.len(),
                round + 1
            );
        }
        self.carried = plan.deferred;
        let batches = plan.scheduled;
        let snapshot = crate::build_snapshot(data, round, self.snapshot.as_ref(), &self.config);
        info!(
            "enter_round: round {} ({:?}) at {:?}, cycle {:?}, {} milestone batches",
            round,
            snapshot.round_name,
            now,
            cycle,
            batches.len()
        );

        self.state = SequencerState::Playing { round };
        self.round_started_at = now;
        out.push(Notice::RoundStarted {
            round,
            at: now,
            cycle,
        });
        out.push(Notice::SnapshotReady(snapshot.clone()));
        self.snapshot = Some(snapshot);
        out.push(Notice::BatchesPlanned(batches.clone()));
        self.batches = batches;

        // The snapshot is out: the first batch can show up.
        for idx in 0..self.batches.len() {
            let (reveal_at, hide_at) = (self.batches[idx].reveal_at, self.batches[idx].hide_at);
            if reveal_at == Duration::ZERO {
                let b = self.batches[idx].clone();
                self.overlay.show(b.clone());
                out.push(Notice::BatchRevealed(b));
            } else {
                let id = self.timeline.schedule_at(
                    now + reveal_at,
                    self.generation,
                    Cue::RevealBatch { round, batch: idx },
                );
                self.batch_timers.push(id);
            }
            if let Some(hide_at) = hide_at {
                let id = self.timeline.schedule_at(
                    now + hide_at,
                    self.generation,
                    Cue::HideBatch { round, batch: idx },
                );
                self.batch_timers.push(id);
            }
        }

        if let Some(previous) = self.transition.take() {
            // Only reachable if a transition was pending while entering a round.
            self.timeline.cancel(previous);
        }
        let cue = if is_last {
            Cue::Finish { round }
        } else {
            Cue::Advance { to_round: round + 1 }
        };
        self.transition = Some(self.timeline.schedule_at(now + cycle, self.generation, cue));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RaceBuilder;

    fn ms(x: u64) -> Duration {
        Duration::from_millis(x)
    }

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn three_rounds() -> RaceData {
        RaceBuilder::new()
            .rounds(&names(&["R1", "R2", "R3"]))
            .add_votes("A", "a", &[Some(3.0), Some(1.0), Some(1.0)])
            .add_votes("B", "b", &[Some(2.0), Some(5.0), None])
            .build()
            .unwrap()
    }

    fn rounds_started(notices: &[Notice]) -> Vec<usize> {
        notices
            .iter()
            .filter_map(|n| match n {
                Notice::RoundStarted { round, .. } => Some(*round),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let config = RaceConfig {
            max_display: 0,
            ..RaceConfig::default()
        };
        assert!(matches!(
            Sequencer::new(config),
            Err(RaceErrors::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn empty_data_stays_idle() {
        let mut seq = Sequencer::new(RaceConfig::default()).unwrap();
        let mut out = Vec::new();
        assert_eq!(seq.load(RaceData::default(), &mut out), Err(RaceErrors::EmptyRace));
        assert_eq!(seq.state(), SequencerState::Idle);
        seq.start(&mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn plays_all_rounds_then_stops() {
        let mut seq = Sequencer::new(RaceConfig::default()).unwrap();
        let mut out = Vec::new();
        seq.load(three_rounds(), &mut out).unwrap();
        assert_eq!(seq.state(), SequencerState::Armed);
        // Two bars: 500 + 50 + 200 + 5000
        assert_eq!(seq.cycle_duration(), ms(5750));

        seq.start(&mut out);
        assert_eq!(seq.state(), SequencerState::Playing { round: 0 });
        assert_eq!(seq.pending_transitions(), 1);

        seq.advance(ms(5749), &mut out);
        assert_eq!(rounds_started(&out), vec![0]);
        seq.advance(ms(5750), &mut out);
        assert_eq!(rounds_started(&out), vec![0, 1]);
        assert_eq!(seq.round_started_at(), ms(5750));
        assert_eq!(seq.pending_transitions(), 1);

        seq.advance(ms(60_000), &mut out);
        assert_eq!(rounds_started(&out), vec![0, 1, 2]);
        assert_eq!(seq.state(), SequencerState::Done { round: 2 });
        assert_eq!(out.last(), Some(&Notice::Finished { round: 2 }));
        assert_eq!(seq.pending_transitions(), 0);
        assert_eq!(seq.snapshot().map(|s| s.round_index), Some(2));
    }

    #[test]
    fn snapshot_comes_before_first_batch() {
        let event = MilestoneEvent {
            entity: "A".to_string(),
            text: "leads".to_string(),
        };
        let data = RaceBuilder::new()
            .rounds(&names(&["R1"]))
            .add_votes("A", "a", &[Some(3.0)])
            .milestones("R1", &[event])
            .build()
            .unwrap();
        let mut seq = Sequencer::new(RaceConfig::default()).unwrap();
        let mut out = Vec::new();
        seq.load(data, &mut out).unwrap();
        seq.start(&mut out);
        let kinds: Vec<&str> = out
            .iter()
            .map(|n| match n {
                Notice::RoundStarted { .. } => "round",
                Notice::SnapshotReady(_) => "snapshot",
                Notice::BatchesPlanned(_) => "planned",
                Notice::BatchRevealed(_) => "revealed",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["round", "snapshot", "planned", "revealed"]);
        // Last batch of the last round stays.
        seq.advance(ms(100_000), &mut out);
        assert!(seq.overlay().active().is_some());
        assert!(!out.iter().any(|n| matches!(n, Notice::BatchHidden(_))));
    }

    #[test]
    fn reload_drops_carried_batches() {
        let events: Vec<MilestoneEvent> = (0..4)
            .map(|i| MilestoneEvent {
                entity: "A".to_string(),
                text: format!("event {}", i),
            })
            .collect();
        let data = RaceBuilder::new()
            .rounds(&names(&["R1", "R2"]))
            .add_votes("A", "a", &[Some(3.0), Some(1.0)])
            .milestones("R1", &events)
            .build()
            .unwrap();
        let config = RaceConfig {
            max_visible_per_group: 1,
            ..RaceConfig::default()
        };
        let mut seq = Sequencer::new(config).unwrap();
        let mut out = Vec::new();
        seq.load(data.clone(), &mut out).unwrap();
        seq.start(&mut out);
        assert_eq!(seq.batches().len(), 3);

        seq.load(data, &mut out).unwrap();
        seq.start(&mut out);
        assert_eq!(seq.batches()[0].events[0].text, "event 0");
        seq.advance(ms(5700), &mut out);
        assert_eq!(seq.state(), SequencerState::Playing { round: 1 });
        let texts: Vec<&str> = seq
            .batches()
            .iter()
            .map(|b| b.events[0].text.as_str())
            .collect();
        assert_eq!(texts, vec!["event 3"]);
        assert_eq!(seq.batches()[0].round_index, 0);
    }

    #[test]
    fn stale_cue_is_ignored() {
        let mut seq = Sequencer::new(RaceConfig::default()).unwrap();
        let mut out = Vec::new();
        seq.load(three_rounds(), &mut out).unwrap();
        seq.start(&mut out);
        let old = seq.generation();
        seq.load(three_rounds(), &mut out).unwrap();
        assert_ne!(seq.generation(), old);
        assert_eq!(seq.pending_transitions(), 0);
        out.clear();
        seq.deliver(old, Cue::Advance { to_round: 1 }, &mut out);
        assert!(out.is_empty());
        assert_eq!(seq.state(), SequencerState::Armed);
    }

    #[test]
    fn unmount_cancels_everything() {
        let mut seq = Sequencer::new(RaceConfig::default()).unwrap();
        let mut out = Vec::new();
        seq.load(three_rounds(), &mut out).unwrap();
        seq.start(&mut out);
        seq.unmount(&mut out);
        assert_eq!(out.last(), Some(&Notice::Reset));
        assert_eq!(seq.next_deadline(), None);
        out.clear();
        seq.advance(ms(60_000), &mut out);
        assert!(out.is_empty());
        assert_eq!(seq.state(), SequencerState::Idle);
    }
}
