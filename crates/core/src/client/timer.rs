//! A cancellable, at-most-one-armed timer (§4.6, invariant I5).
//!
//! Arming bumps a generation counter and spawns a sleeper thread tagged with
//! the new generation; when it wakes it only fires if the generation is
//! still current, so arming again (or cancelling) silently supersedes any
//! previously pending timer without needing to kill its thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::Event;

pub struct Timer {
    generation: Arc<AtomicU64>,
}

impl Timer {
    pub fn new() -> Self {
        Timer {
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Arm (or re-arm) the timer for `duration`, superseding any previously
    /// armed timer. `tx` is used to deliver the eventual `TimerFired`.
    pub fn arm(&self, duration: Duration, tx: Sender<Event>) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let current = self.generation.clone();
        thread::spawn(move || {
            thread::sleep(duration);
            if current.load(Ordering::SeqCst) == generation {
                let _ = tx.send(Event::TimerFired(generation));
            }
        });
    }

    /// Cancel any armed timer; its sleeper thread will wake up and no-op.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Whether `generation` is still the current one, i.e. this
    /// `TimerFired` wasn't superseded before it arrived.
    pub fn fired_matches(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn arm_fires_after_duration() {
        let timer = Timer::new();
        let (tx, rx) = mpsc::channel();
        timer.arm(Duration::from_millis(20), tx);
        let event = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        match event {
            Event::TimerFired(generation) => assert!(timer.fired_matches(generation)),
            _ => panic!("expected TimerFired"),
        }
    }

    #[test]
    fn rearming_supersedes_the_prior_timer() {
        let timer = Timer::new();
        let (tx, rx) = mpsc::channel();
        timer.arm(Duration::from_millis(20), tx.clone());
        timer.arm(Duration::from_millis(20), tx);

        let mut fired = Vec::new();
        while let Ok(event) = rx.recv_timeout(Duration::from_millis(200)) {
            fired.push(event);
        }
        let live = fired
            .iter()
            .filter(|e| matches!(e, Event::TimerFired(g) if timer.fired_matches(*g)))
            .count();
        assert_eq!(live, 1);
    }

    #[test]
    fn cancel_suppresses_the_pending_fire() {
        let timer = Timer::new();
        let (tx, rx) = mpsc::channel();
        timer.arm(Duration::from_millis(20), tx);
        timer.cancel();
        match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(Event::TimerFired(generation)) => {
                assert!(!timer.fired_matches(generation));
            }
            Err(_) => {}
        }
    }
}
