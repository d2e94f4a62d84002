#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;

use schedule_engine::models::{Channel, Instruction};
use schedule_engine::Schedule;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// Restores the variables on unwind and serializes access to the process
/// environment, since tests run in parallel.
///
/// `changes` is a list of `(key, value)` pairs:
/// - `Some(v)` sets the variable to `v`
/// - `None` removes the variable
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let _guard = ScopedEnv::new(changes);
    f()
}

struct ScopedEnv {
    snapshot: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn new(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let snapshot = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect::<Vec<_>>();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { snapshot }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (k, v) in self.snapshot.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

pub fn d(index: u32) -> Channel {
    Channel::drive(index)
}

pub fn u(index: u32) -> Channel {
    Channel::control(index)
}

pub fn play(duration: i64, channel: Channel) -> Instruction {
    Instruction::play(duration, channel)
}

pub fn delay(duration: i64, channel: Channel) -> Instruction {
    Instruction::delay(duration, channel)
}

/// A two-qubit style program: pulses on d0 and d1, a cross-resonance tone on
/// u0 spanning both, then a measurement.
pub fn sample_schedule() -> Schedule {
    let mut sched = Schedule::with_name("sample");
    sched.insert_in_place(0, play(40, d(0))).unwrap();
    sched.insert_in_place(0, play(40, d(1))).unwrap();
    sched
        .append_in_place(Instruction::new(
            schedule_engine::models::InstructionKind::Play,
            200,
            [d(0), u(0)],
        ))
        .unwrap();
    sched.append_in_place(play(40, d(1))).unwrap();
    sched
        .insert_in_place(240, Instruction::acquire(
            1000,
            Channel::acquire(0),
            Channel::memory(0),
        ))
        .unwrap();
    sched
}
