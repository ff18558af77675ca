use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

use vote_race::countdown::Countdown;
use vote_race::sequencer::{Notice, SequencerState};

use crate::race::*;

/// What was displayed for one round.
#[derive(PartialEq, Debug, Clone)]
pub struct RoundReport {
    pub snapshot: RoundSnapshot,
    pub batches: Vec<MilestoneBatch>,
    pub cycle: Duration,
}

const BAR_WIDTH: usize = 40;

fn draw_countdown(remaining: f64) {
    let filled = ((remaining / 100.0) * BAR_WIDTH as f64).round() as usize;
    let bar: String = (0..BAR_WIDTH)
        .map(|idx| if idx < filled { '#' } else { ' ' })
        .collect();
    eprint!("\r[{}] {:5.1}%", bar, remaining);
    let _ = std::io::stderr().flush();
}

fn print_snapshot(snapshot: &RoundSnapshot) {
    eprintln!();
    println!("== {} ==", snapshot.round_name);
    for e in snapshot.entries.iter() {
        let marker = if e.eliminated { " (out)" } else { "" };
        println!(
            "{:>3}. {} +{}{}",
            e.rank,
            decor::bar_label(&e.entity, None, e.cumulative_vote),
            e.actual_round_vote,
            marker
        );
    }
    for line in snapshot.statistics.lines.iter() {
        if !line.text.is_empty() {
            println!("   {}", line.text);
        }
    }
}

// Collects the reports and keeps the countdown in phase with the rounds.
fn handle_notices(
    notices: &mut Vec<Notice>,
    reports: &mut Vec<RoundReport>,
    countdown: &mut Countdown,
    instant: bool,
) {
    let mut round_cycle = Duration::ZERO;
    for notice in notices.drain(..) {
        match notice {
            Notice::RoundStarted { round, at, cycle } => {
                debug!("handle_notices: round {} started at {:?}", round, at);
                countdown.resync(at, cycle);
                round_cycle = cycle;
            }
            Notice::SnapshotReady(snapshot) => {
                if !instant {
                    print_snapshot(&snapshot);
                }
                reports.push(RoundReport {
                    snapshot,
                    batches: Vec::new(),
                    cycle: round_cycle,
                });
            }
            Notice::BatchesPlanned(batches) => {
                if let Some(last) = reports.last_mut() {
                    last.batches = batches;
                }
            }
            Notice::BatchRevealed(batch) => {
                if !instant {
                    eprintln!();
                    for e in batch.events.iter() {
                        println!("   * {}: {}", e.entity, e.text);
                    }
                }
            }
            Notice::BatchHidden(batch) => {
                debug!("handle_notices: batch {} hidden", batch.id);
            }
            Notice::Finished { round } => {
                info!("handle_notices: finished after round {}", round);
                countdown.stop();
            }
            Notice::Reset => {
                reports.clear();
                countdown.stop();
            }
        }
    }
}

/// Plays the race until its last round is done.
///
/// In instant mode, the clock jumps from one deadline to the next. Otherwise
/// the player sleeps between frames and draws the countdown.
pub fn play(sequencer: &mut Sequencer, data: RaceData, instant: bool) -> RaceResult<Vec<RoundReport>> {
    let mut notices: Vec<Notice> = Vec::new();
    let mut reports: Vec<RoundReport> = Vec::new();
    sequencer.load(data, &mut notices).context(RaceSnafu {})?;
    let fps = sequencer.config().countdown_fps;
    let frame = Duration::from_secs(1) / fps.max(1);
    let mut countdown = Countdown::new(sequencer.cycle_duration(), fps);

    let clock = Instant::now();
    let origin = sequencer.now();
    sequencer.start(&mut notices);
    loop {
        handle_notices(&mut notices, &mut reports, &mut countdown, instant);

        let next = sequencer.next_deadline();
        match (sequencer.state(), next) {
            (SequencerState::Done { .. }, None) | (SequencerState::Idle, _) => break,
            (_, None) => whatever!("play: no pending work in state {:?}", sequencer.state()),
            (_, Some(deadline)) if instant => sequencer.advance(deadline, &mut notices),
            (_, Some(deadline)) => {
                let now = origin + clock.elapsed();
                let target = deadline.min(now + frame);
                if target > now {
                    thread::sleep(target - now);
                }
                sequencer.advance(origin + clock.elapsed(), &mut notices);
                if let Some(remaining) = countdown.frame(sequencer.now()) {
                    draw_countdown(remaining);
                }
            }
        }
    }
    if !instant {
        eprintln!();
    }
    info!("play: {} rounds played", reports.len());
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instant_replay() {
        let data = RaceBuilder::new()
            .rounds(&["R1".to_string(), "R2".to_string(), "R3".to_string()])
            .add_votes("A", "a", &[Some(1.0), Some(2.0), Some(3.0)])
            .milestones(
                "R2",
                &[MilestoneEvent {
                    entity: "A".to_string(),
                    text: "three in a row".to_string(),
                }],
            )
            .build()
            .unwrap();
        let mut sequencer = Sequencer::new(RaceConfig::default()).unwrap();
        let reports = play(&mut sequencer, data, true).unwrap();
        let rounds: Vec<usize> = reports.iter().map(|r| r.snapshot.round_index).collect();
        assert_eq!(rounds, vec![0, 1, 2]);
        assert_eq!(reports[1].batches.len(), 1);
        // One bar: 500 + 200 + 5000
        assert_eq!(reports[0].cycle, Duration::from_millis(5700));
        assert_eq!(sequencer.state(), SequencerState::Done { round: 2 });
        assert_eq!(sequencer.now(), Duration::from_millis(3 * 5700));
    }

    #[test]
    fn countdown_restarts_with_each_round() {
        let data = RaceBuilder::new()
            .rounds(&["R1".to_string(), "R2".to_string()])
            .add_votes("A", "a", &[Some(1.0), Some(2.0)])
            .build()
            .unwrap();
        let mut sequencer = Sequencer::new(RaceConfig::default()).unwrap();
        let mut notices = Vec::new();
        let mut reports = Vec::new();
        sequencer.load(data, &mut notices).unwrap();
        let mut countdown = Countdown::new(sequencer.cycle_duration(), 60);
        sequencer.start(&mut notices);
        handle_notices(&mut notices, &mut reports, &mut countdown, true);
        assert_eq!(countdown.frame(Duration::ZERO), Some(100.0));
        let late = countdown.frame(Duration::from_millis(5000)).unwrap();
        assert!(late < 15.0);

        let next = Duration::from_millis(5700);
        sequencer.advance(next, &mut notices);
        handle_notices(&mut notices, &mut reports, &mut countdown, true);
        assert_eq!(reports.len(), 2);
        assert_eq!(countdown.frame(next), Some(100.0));
        let half = countdown.frame(next + Duration::from_millis(2850)).unwrap();
        assert!((half - 50.0).abs() < 1e-6);
    }

    #[test]
    fn empty_race_is_an_error() {
        let mut sequencer = Sequencer::new(RaceConfig::default()).unwrap();
        assert!(play(&mut sequencer, RaceData::default(), true).is_err());
    }
}
