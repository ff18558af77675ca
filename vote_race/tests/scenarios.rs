//! End-to-end playback of small races on simulated time.

use std::time::Duration;

use vote_race::builder::RaceBuilder;
use vote_race::sequencer::{Cue, Notice, Sequencer, SequencerState};
use vote_race::*;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn ms(x: u64) -> Duration {
    Duration::from_millis(x)
}

fn names(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

fn snapshots(notices: &[Notice]) -> Vec<&RoundSnapshot> {
    notices
        .iter()
        .filter_map(|n| match n {
            Notice::SnapshotReady(s) => Some(s),
            _ => None,
        })
        .collect()
}

fn started_rounds(notices: &[Notice]) -> Vec<usize> {
    notices
        .iter()
        .filter_map(|n| match n {
            Notice::RoundStarted { round, .. } => Some(*round),
            _ => None,
        })
        .collect()
}

fn play_all(data: RaceData, config: RaceConfig) -> Vec<Notice> {
    let mut seq = Sequencer::new(config).unwrap();
    let mut out = Vec::new();
    seq.load(data, &mut out).unwrap();
    seq.start(&mut out);
    while let Some(deadline) = seq.next_deadline() {
        seq.advance(deadline, &mut out);
    }
    assert!(matches!(seq.state(), SequencerState::Done { .. }));
    out
}

#[test]
fn elimination_and_tie_break() {
    init();
    let data = RaceBuilder::new()
        .rounds(&names(&["R1", "R2"]))
        .add_votes("X", "SX", &[Some(10.0), None])
        .add_votes("Y", "SY", &[Some(10.0), Some(5.0)])
        .build()
        .unwrap();
    let out = play_all(data, RaceConfig::default());
    let snaps = snapshots(&out);
    assert_eq!(snaps.len(), 2);

    let r0: Vec<(u32, &str, u64)> = snaps[0]
        .entries
        .iter()
        .map(|e| (e.rank, e.entity.as_str(), e.cumulative_vote))
        .collect();
    assert_eq!(r0, vec![(1, "X", 10), (2, "Y", 10)]);

    let r1: Vec<(u32, &str, u64, bool)> = snaps[1]
        .entries
        .iter()
        .map(|e| (e.rank, e.entity.as_str(), e.cumulative_vote, e.eliminated))
        .collect();
    assert_eq!(r1, vec![(1, "Y", 15, false), (2, "X", 10, true)]);
    assert_eq!(snaps[1].statistics.total_actual_votes, 5);
}

#[test]
fn zero_votes_statistics() {
    init();
    let data = RaceBuilder::new()
        .rounds(&names(&["R1"]))
        .add_votes("X", "S", &[Some(0.0)])
        .add_votes("Y", "S", &[Some(0.0)])
        .build()
        .unwrap();
    let config = RaceConfig {
        stats: vec![StatTemplate {
            id: "avg".to_string(),
            kind: StatTemplateKind::Text,
            template: "{averageVotes} / {medianVotes} / {percentage}%".to_string(),
        }],
        ..RaceConfig::default()
    };
    let out = play_all(data, config);
    let stats = &snapshots(&out)[0].statistics;
    assert!(stats.tied_top_group.is_empty());
    assert_eq!(stats.total_actual_votes, 0);
    assert_eq!(stats.median_votes, 0.0);
    assert_eq!(stats.average_votes, 0.0);
    assert_eq!(stats.lines[1].text, "0 / 0 / 0.00%");
}

#[test]
fn milestones_in_three_groups() {
    init();
    let events: Vec<MilestoneEvent> = (0..7)
        .map(|i| MilestoneEvent {
            entity: "X".to_string(),
            text: format!("event {}", i),
        })
        .collect();
    let data = RaceBuilder::new()
        .rounds(&names(&["R1", "R2"]))
        .add_votes("X", "S", &[Some(1.0), Some(1.0)])
        .milestones("R1", &events)
        .build()
        .unwrap();
    let mut seq = Sequencer::new(RaceConfig::default()).unwrap();
    let mut out = Vec::new();
    seq.load(data, &mut out).unwrap();
    seq.start(&mut out);

    // One bar: 500 + 200 + 5000
    assert_eq!(seq.cycle_duration(), ms(5700));
    let batches = seq.batches().to_vec();
    let sizes: Vec<usize> = batches.iter().map(|b| b.events.len()).collect();
    assert_eq!(sizes, vec![3, 3, 1]);
    let reveals: Vec<Duration> = batches.iter().map(|b| b.reveal_at).collect();
    assert_eq!(reveals, vec![ms(0), ms(1900), ms(3800)]);

    // Reveals and hides alternate: never two batches on screen.
    out.clear();
    seq.advance(ms(5699), &mut out);
    let sequence: Vec<(bool, usize)> = out
        .iter()
        .filter_map(|n| match n {
            Notice::BatchRevealed(b) => Some((true, b.index)),
            Notice::BatchHidden(b) => Some((false, b.index)),
            _ => None,
        })
        .collect();
    assert_eq!(
        sequence,
        vec![(false, 0), (true, 1), (false, 1), (true, 2), (false, 2)]
    );
    assert!(seq.overlay().active().is_none());
}

// (time, revealed, batch id)
fn batch_moves(at: Duration, notices: &[Notice], moves: &mut Vec<(Duration, bool, String)>) {
    for n in notices.iter() {
        match n {
            Notice::BatchRevealed(b) => moves.push((at, true, b.id.clone())),
            Notice::BatchHidden(b) => moves.push((at, false, b.id.clone())),
            _ => {}
        }
    }
}

#[test]
fn crowded_milestones_carry_over() {
    init();
    let events: Vec<MilestoneEvent> = (0..7)
        .map(|i| MilestoneEvent {
            entity: "X".to_string(),
            text: format!("event {}", i),
        })
        .collect();
    let data = RaceBuilder::new()
        .rounds(&names(&["R1", "R2", "R3"]))
        .add_votes("X", "S", &[Some(1.0), Some(1.0), Some(1.0)])
        .milestones("R1", &events)
        .build()
        .unwrap();
    let config = RaceConfig {
        max_visible_per_group: 1,
        ..RaceConfig::default()
    };
    let timing = config.milestone;
    let mut seq = Sequencer::new(config).unwrap();
    let mut out = Vec::new();
    let mut moves = Vec::new();
    seq.load(data, &mut out).unwrap();
    out.clear();
    seq.start(&mut out);
    batch_moves(seq.now(), &out, &mut moves);

    // Three batches fit in 5700ms, the rest go to the next rounds.
    assert_eq!(seq.cycle_duration(), ms(5700));
    let reveals: Vec<Duration> = seq.batches().iter().map(|b| b.reveal_at).collect();
    assert_eq!(reveals, vec![ms(0), ms(1900), ms(3800)]);
    let hides: Vec<Option<Duration>> = seq.batches().iter().map(|b| b.hide_at).collect();
    assert_eq!(hides, vec![Some(ms(900)), Some(ms(2800)), Some(ms(4700))]);

    let mut planned = Vec::new();
    while let Some(deadline) = seq.next_deadline() {
        out.clear();
        seq.advance(deadline, &mut out);
        batch_moves(deadline, &out, &mut moves);
        if out.iter().any(|n| matches!(n, Notice::RoundStarted { .. })) {
            planned.push(seq.batches().len());
        }
    }
    assert_eq!(planned, vec![3, 1]);

    // Every milestone shows up once, and only the very last one stays.
    let revealed: Vec<&String> = moves.iter().filter(|m| m.1).map(|m| &m.2).collect();
    assert_eq!(revealed.len(), 7);
    let mut distinct = revealed.clone();
    distinct.sort();
    distinct.dedup();
    assert_eq!(distinct.len(), 7);
    assert_eq!(moves.iter().filter(|m| !m.1).count(), 6);

    // Alternating, with time on screen and a complete exit before the next one.
    for pair in moves.windows(2) {
        let ((t0, shown0, id0), (t1, shown1, id1)) = (&pair[0], &pair[1]);
        assert_ne!(shown0, shown1);
        if *shown0 {
            assert_eq!(id0, id1);
            assert!(*t1 >= *t0 + timing.min_dwell);
        } else {
            assert!(*t1 >= *t0 + timing.exit_duration);
        }
    }
}

#[test]
fn replacing_data_cancels_pending_round() {
    init();
    let rounds = names(&["R1", "R2", "R3", "R4", "R5"]);
    let old = RaceBuilder::new()
        .rounds(&rounds)
        .add_votes("Old A", "S", &[Some(1.0); 5])
        .add_votes("Old B", "S", &[Some(2.0); 5])
        .build()
        .unwrap();
    let new = RaceBuilder::new()
        .rounds(&rounds)
        .add_votes("New A", "S", &[Some(3.0); 5])
        .build()
        .unwrap();

    let mut seq = Sequencer::new(RaceConfig::default()).unwrap();
    let mut out = Vec::new();
    seq.load(old, &mut out).unwrap();
    seq.start(&mut out);
    // Two bars: 5750 per round.
    seq.advance(ms(2 * 5750), &mut out);
    assert_eq!(seq.state(), SequencerState::Playing { round: 2 });
    assert_eq!(started_rounds(&out), vec![0, 1, 2]);
    let old_generation = seq.generation();

    out.clear();
    seq.load(new, &mut out).unwrap();
    assert_eq!(out, vec![Notice::Reset]);
    assert_eq!(seq.state(), SequencerState::Armed);

    // The round 3 of the old data was due at 17250.
    out.clear();
    seq.advance(ms(20_000), &mut out);
    assert!(out.is_empty());

    // Even a callback that escaped cancellation does nothing.
    seq.deliver(old_generation, Cue::Advance { to_round: 3 }, &mut out);
    assert!(out.is_empty());
    assert_eq!(seq.state(), SequencerState::Armed);

    seq.start(&mut out);
    assert_eq!(started_rounds(&out), vec![0]);
    let snaps = snapshots(&out);
    assert_eq!(snaps[0].entries[0].entity, "New A");
    assert_eq!(seq.round_started_at(), ms(20_000));
    // One bar now: the cycle is recomputed.
    assert_eq!(seq.cycle_duration(), ms(5700));
}
