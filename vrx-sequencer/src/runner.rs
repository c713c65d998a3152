//! Step interpreter for running sequences.
//!
//! Each running sequence keeps a stack of step iterators: the outer sequence
//! at the bottom and one entry per `select` branch entered. When a branch
//! runs out the stack pops and the enclosing sequence continues where it
//! left off.

use slotmap::{SlotMap, new_key_type};
use tracing::{debug, info, warn};
use vrx_core::{CancellationToken, Resume};

use crate::sequence::{Sequence, Step};

new_key_type! {
    /// Handle to a started sequence.
    pub struct SequenceHandle;
}

pub type Completion = Box<dyn FnOnce()>;

/// What a running sequence is blocked on.
#[derive(Debug)]
enum Wait {
    Ready,
    Sleeping { remaining_ms: f32 },
    Signal(Resume),
}

struct RunningSequence {
    frames: Vec<std::vec::IntoIter<Step>>,
    wait: Wait,
    token: CancellationToken,
    on_complete: Option<Completion>,
}

impl RunningSequence {
    fn next_step(&mut self) -> Option<Step> {
        while let Some(frame) = self.frames.last_mut() {
            if let Some(step) = frame.next() {
                return Some(step);
            }
            self.frames.pop();
        }
        None
    }

    fn is_blocked(&self) -> bool {
        match &self.wait {
            Wait::Ready => false,
            Wait::Sleeping { remaining_ms } => *remaining_ms > 0.0,
            Wait::Signal(resume) => !resume.is_fired(),
        }
    }

    /// Run steps until one suspends. Returns `true` once every step ran.
    ///
    /// Time a sleep overran by this tick is taken off the next sleep.
    fn drive(&mut self) -> bool {
        let mut carry_ms = 0.0;
        loop {
            if self.token.is_cancelled() || self.is_blocked() {
                return false;
            }
            if let Wait::Sleeping { remaining_ms } = self.wait {
                carry_ms = -remaining_ms;
            }
            self.wait = Wait::Ready;

            let Some(step) = self.next_step() else {
                return true;
            };
            match step {
                Step::Call(f) => f(),
                Step::WaitFor(f) => {
                    let resume = Resume::with_token(self.token.clone());
                    self.wait = Wait::Signal(resume.clone());
                    f(resume);
                }
                Step::Sleep(ms) => {
                    self.wait = Wait::Sleeping {
                        remaining_ms: ms - carry_ms,
                    };
                    carry_ms = 0.0;
                }
                Step::PlayAudio(mut clip) => match clip.create() {
                    Ok(()) => {
                        let resume = Resume::with_token(self.token.clone());
                        self.wait = Wait::Signal(resume.clone());
                        debug!(clip = clip.name(), "playing clip");
                        clip.play(resume);
                    }
                    Err(err) => warn!(clip = clip.name(), %err, "skipping audio step"),
                },
                Step::Select(decide) => {
                    let branch = decide();
                    debug!(steps = branch.len(), "entering branch");
                    self.frames.push(branch.into_steps());
                }
            }
        }
    }
}

/// Runs any number of sequences on the frame clock.
#[derive(Default)]
pub struct Sequencer {
    running: SlotMap<SequenceHandle, RunningSequence>,
    paused: bool,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `sequence`. Steps run synchronously up to the first suspension;
    /// while paused nothing runs until the next unpaused tick.
    ///
    /// `on_complete` fires after the last step, never after [`stop`].
    ///
    /// [`stop`]: Sequencer::stop
    pub fn start(&mut self, sequence: Sequence, on_complete: Option<Completion>) -> SequenceHandle {
        let handle = self.running.insert(RunningSequence {
            frames: vec![sequence.into_steps()],
            wait: Wait::Ready,
            token: CancellationToken::new(),
            on_complete,
        });
        debug!(?handle, "sequence started");
        if !self.paused {
            self.drive(handle);
        }
        handle
    }

    /// Interrupt a running sequence. Returns `false` if it already finished.
    pub fn stop(&mut self, handle: SequenceHandle) -> bool {
        match self.running.remove(handle) {
            Some(run) => {
                run.token.cancel();
                info!(?handle, "sequence stopped");
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&mut self) {
        let count = self.running.len();
        for (_, run) in self.running.drain() {
            run.token.cancel();
        }
        if count > 0 {
            info!(count, "stopped all sequences");
        }
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_running(&self, handle: SequenceHandle) -> bool {
        self.running.contains_key(handle)
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// Advance sleeps by `dt_ms` and resume every sequence whose wait is
    /// over.
    pub fn tick(&mut self, dt_ms: f32) {
        if self.paused {
            return;
        }
        let handles: Vec<SequenceHandle> = self.running.keys().collect();
        for handle in handles {
            if let Some(run) = self.running.get_mut(handle) {
                if let Wait::Sleeping { remaining_ms } = &mut run.wait {
                    *remaining_ms -= dt_ms;
                }
            }
            self.drive(handle);
        }
    }

    fn drive(&mut self, handle: SequenceHandle) {
        let finished = self.running.get_mut(handle).is_some_and(RunningSequence::drive);
        if !finished {
            return;
        }
        if let Some(run) = self.running.remove(handle) {
            debug!(?handle, "sequence complete");
            if let Some(callback) = run.on_complete {
                callback();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioClip, AudioError};
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    fn log() -> Log {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn record(log: &Log, event: &str) -> impl FnOnce() + 'static {
        let log = log.clone();
        let event = event.to_string();
        move || log.borrow_mut().push(event)
    }

    fn completion(log: &Log) -> Option<Completion> {
        Some(Box::new(record(log, "done")))
    }

    fn events(log: &Log) -> Vec<String> {
        log.borrow().clone()
    }

    #[test]
    fn test_call_sleep_call_runs_in_order() {
        let log = log();
        let mut sequencer = Sequencer::new();
        let seq = Sequence::new()
            .call(record(&log, "f1"))
            .sleep(100.0)
            .call(record(&log, "f2"));
        let handle = sequencer.start(seq, completion(&log));

        assert_eq!(events(&log), vec!["f1"]);
        sequencer.tick(60.0);
        assert_eq!(events(&log), vec!["f1"]);
        sequencer.tick(60.0);
        assert_eq!(events(&log), vec!["f1", "f2", "done"]);
        assert!(!sequencer.is_running(handle));
    }

    #[test]
    fn test_consecutive_sleeps_share_one_tick() {
        let log = log();
        let mut sequencer = Sequencer::new();
        let seq = Sequence::new()
            .sleep(50.0)
            .sleep(50.0)
            .call(record(&log, "f"));
        sequencer.start(seq, completion(&log));

        sequencer.tick(100.0);
        assert_eq!(events(&log), vec!["f", "done"]);
    }

    #[test]
    fn test_sleep_overrun_shortens_next_sleep() {
        let log = log();
        let mut sequencer = Sequencer::new();
        let seq = Sequence::new()
            .sleep(30.0)
            .call(record(&log, "a"))
            .sleep(30.0)
            .call(record(&log, "b"));
        sequencer.start(seq, completion(&log));

        sequencer.tick(50.0);
        assert_eq!(events(&log), vec!["a"]);
        sequencer.tick(9.0);
        assert_eq!(events(&log), vec!["a"]);
        sequencer.tick(1.0);
        assert_eq!(events(&log), vec!["a", "b", "done"]);
    }

    #[test]
    fn test_stop_during_sleep_prevents_rest() {
        let log = log();
        let mut sequencer = Sequencer::new();
        let seq = Sequence::new()
            .call(record(&log, "f1"))
            .sleep(100.0)
            .call(record(&log, "f2"));
        let handle = sequencer.start(seq, completion(&log));

        sequencer.tick(50.0);
        assert!(sequencer.stop(handle));
        sequencer.tick(500.0);
        sequencer.tick(500.0);
        assert_eq!(events(&log), vec!["f1"]);
        assert!(!sequencer.stop(handle));
    }

    #[test]
    fn test_select_branch_rejoins_outer_sequence() {
        let log = log();
        let mut sequencer = Sequencer::new();
        let branch_log = log.clone();
        let seq = Sequence::new()
            .call(record(&log, "before"))
            .select(move || {
                Sequence::new()
                    .call(record(&branch_log, "branch-1"))
                    .sleep(10.0)
                    .call(record(&branch_log, "branch-3"))
            })
            .call(record(&log, "tail-1"))
            .sleep(10.0)
            .call(record(&log, "tail-2"));
        sequencer.start(seq, completion(&log));

        assert_eq!(events(&log), vec!["before", "branch-1"]);
        sequencer.tick(10.0);
        assert_eq!(events(&log), vec!["before", "branch-1", "branch-3", "tail-1"]);
        sequencer.tick(10.0);
        assert_eq!(
            events(&log),
            vec!["before", "branch-1", "branch-3", "tail-1", "tail-2", "done"]
        );
    }

    #[test]
    fn test_nested_select_unwinds_each_level() {
        let log = log();
        let mut sequencer = Sequencer::new();
        let outer = log.clone();
        let seq = Sequence::new()
            .select(move || {
                let inner = outer.clone();
                Sequence::new()
                    .select(move || Sequence::new().call(record(&inner, "inner")))
                    .call(record(&outer, "outer-branch"))
            })
            .call(record(&log, "tail"));
        sequencer.start(seq, completion(&log));
        assert_eq!(events(&log), vec!["inner", "outer-branch", "tail", "done"]);
        assert_eq!(sequencer.running_count(), 0);
    }

    #[test]
    fn test_select_decides_when_reached() {
        let log = log();
        let flag = Rc::new(RefCell::new(false));
        let mut sequencer = Sequencer::new();
        let setter = flag.clone();
        let (yes, no) = (log.clone(), log.clone());
        let seq = Sequence::new()
            .call(move || *setter.borrow_mut() = true)
            .select(move || {
                if *flag.borrow() {
                    Sequence::new().call(record(&yes, "yes"))
                } else {
                    Sequence::new().call(record(&no, "no"))
                }
            });
        sequencer.start(seq, None);
        assert_eq!(events(&log), vec!["yes"]);
    }

    #[test]
    fn test_wait_for_resumes_once() {
        let log = log();
        let slot: Rc<RefCell<Option<Resume>>> = Rc::new(RefCell::new(None));
        let mut sequencer = Sequencer::new();
        let holder = slot.clone();
        let seq = Sequence::new()
            .wait_for(move |resume| *holder.borrow_mut() = Some(resume))
            .call(record(&log, "after"));
        let handle = sequencer.start(seq, completion(&log));

        sequencer.tick(16.0);
        assert!(events(&log).is_empty());

        let resume = slot.borrow_mut().take().unwrap();
        assert!(resume.resume());
        assert!(!resume.resume());
        sequencer.tick(16.0);
        assert_eq!(events(&log), vec!["after", "done"]);
        assert!(!sequencer.is_running(handle));
    }

    #[test]
    fn test_resume_after_stop_is_noop() {
        let log = log();
        let slot: Rc<RefCell<Option<Resume>>> = Rc::new(RefCell::new(None));
        let mut sequencer = Sequencer::new();
        let holder = slot.clone();
        let seq = Sequence::new()
            .wait_for(move |resume| *holder.borrow_mut() = Some(resume))
            .call(record(&log, "after"));
        let handle = sequencer.start(seq, completion(&log));

        sequencer.stop(handle);
        let resume = slot.borrow_mut().take().unwrap();
        assert!(!resume.resume());
        assert!(resume.is_cancelled());
        sequencer.tick(16.0);
        assert!(events(&log).is_empty());
    }

    #[test]
    fn test_synchronous_resume_continues_inline() {
        let log = log();
        let mut sequencer = Sequencer::new();
        let seq = Sequence::new()
            .wait_for(|resume| {
                resume.resume();
            })
            .call(record(&log, "after"));
        sequencer.start(seq, completion(&log));
        assert_eq!(events(&log), vec!["after", "done"]);
    }

    #[test]
    fn test_stop_all_cancels_everything() {
        let log = log();
        let mut sequencer = Sequencer::new();
        for name in ["a", "b", "c"] {
            let seq = Sequence::new().sleep(10.0).call(record(&log, name));
            sequencer.start(seq, completion(&log));
        }
        assert_eq!(sequencer.running_count(), 3);
        sequencer.stop_all();
        sequencer.tick(100.0);
        assert_eq!(sequencer.running_count(), 0);
        assert!(events(&log).is_empty());
    }

    #[test]
    fn test_pause_freezes_sleep() {
        let log = log();
        let mut sequencer = Sequencer::new();
        let seq = Sequence::new().sleep(100.0).call(record(&log, "woke"));
        sequencer.start(seq, None);

        sequencer.set_paused(true);
        sequencer.tick(1000.0);
        assert!(events(&log).is_empty());

        sequencer.set_paused(false);
        sequencer.tick(100.0);
        assert_eq!(events(&log), vec!["woke"]);
    }

    #[test]
    fn test_start_while_paused_defers() {
        let log = log();
        let mut sequencer = Sequencer::new();
        sequencer.set_paused(true);
        sequencer.start(Sequence::new().call(record(&log, "ran")), None);
        assert!(events(&log).is_empty());
        sequencer.set_paused(false);
        sequencer.tick(0.0);
        assert_eq!(events(&log), vec!["ran"]);
    }

    struct Clip {
        fail: bool,
        ended: Rc<RefCell<Option<Resume>>>,
    }

    impl AudioClip for Clip {
        fn name(&self) -> &str {
            "clip"
        }

        fn create(&mut self) -> Result<(), AudioError> {
            if self.fail {
                Err(AudioError::Unavailable)
            } else {
                Ok(())
            }
        }

        fn play(&mut self, on_ended: Resume) {
            *self.ended.borrow_mut() = Some(on_ended);
        }
    }

    #[test]
    fn test_audio_waits_for_clip_end() {
        let log = log();
        let ended = Rc::new(RefCell::new(None));
        let mut sequencer = Sequencer::new();
        let clip = Clip {
            fail: false,
            ended: ended.clone(),
        };
        let seq = Sequence::new()
            .play_audio(Box::new(clip))
            .call(record(&log, "after"));
        sequencer.start(seq, None);
        assert!(events(&log).is_empty());

        let resume: Resume = ended.borrow_mut().take().unwrap();
        resume.resume();
        sequencer.tick(16.0);
        assert_eq!(events(&log), vec!["after"]);
    }

    #[test]
    fn test_failed_audio_is_skipped() {
        let log = log();
        let mut sequencer = Sequencer::new();
        let clip = Clip {
            fail: true,
            ended: Rc::new(RefCell::new(None)),
        };
        let seq = Sequence::new()
            .play_audio(Box::new(clip))
            .call(record(&log, "after"));
        sequencer.start(seq, completion(&log));
        assert_eq!(events(&log), vec!["after", "done"]);
    }
}
