//! Audible alarm reacting to changes of the active alert set.

use std::{
    io::{self, IsTerminal, Write},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use tracing::{debug, warn};

use crate::error::PlaybackError;

/// A looping alarm clip. Implementations only need rewind/play/pause; playback
/// mechanics are theirs.
pub trait AlertSound: Send {
    fn rewind(&mut self);
    fn play(&mut self) -> Result<(), PlaybackError>;
    fn pause(&mut self);
}

/// No audio device; used by headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentAlertSound;

impl AlertSound for SilentAlertSound {
    fn rewind(&mut self) {}

    fn play(&mut self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn pause(&mut self) {}
}

impl<S: AlertSound + ?Sized> AlertSound for Box<S> {
    fn rewind(&mut self) {
        (**self).rewind();
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        (**self).play()
    }

    fn pause(&mut self) {
        (**self).pause();
    }
}

/// Rings the terminal bell on stderr in a loop until paused.
pub struct TerminalBell {
    period: Duration,
    generation: Arc<AtomicU64>,
    ringing: bool,
}

impl Default for TerminalBell {
    fn default() -> Self {
        Self::new(Duration::from_millis(800))
    }
}

impl TerminalBell {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            generation: Arc::new(AtomicU64::new(0)),
            ringing: false,
        }
    }
}

impl AlertSound for TerminalBell {
    // The bell has no playback position.
    fn rewind(&mut self) {}

    fn play(&mut self) -> Result<(), PlaybackError> {
        if !io::stderr().is_terminal() {
            return Err(PlaybackError::new("stderr is not a terminal"));
        }
        if self.ringing {
            return Ok(());
        }
        self.ringing = true;
        let generation = Arc::clone(&self.generation);
        let mine = generation.fetch_add(1, Ordering::SeqCst) + 1;
        let period = self.period;
        thread::Builder::new()
            .name("alert-bell".into())
            .spawn(move || {
                while generation.load(Ordering::SeqCst) == mine {
                    let mut stderr = io::stderr();
                    if stderr.write_all(b"\x07").and_then(|()| stderr.flush()).is_err() {
                        break;
                    }
                    thread::sleep(period);
                }
            })
            .map_err(|err| {
                self.ringing = false;
                PlaybackError::new(format!("failed to start bell thread: {err}"))
            })?;
        Ok(())
    }

    fn pause(&mut self) {
        // Invalidates the running loop, if any.
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.ringing = false;
    }
}

impl Drop for TerminalBell {
    fn drop(&mut self) {
        self.pause();
    }
}

pub struct AlarmDriver<S> {
    sound: S,
}

impl<S: AlertSound> AlarmDriver<S> {
    pub fn new(sound: S) -> Self {
        Self { sound }
    }

    /// Called after every change of the active alert set.
    pub fn on_alerts_changed(&mut self, active_alerts: usize) {
        if active_alerts > 0 {
            self.sound.rewind();
            if let Err(error) = self.sound.play() {
                warn!(%error, "alert sound playback blocked");
            } else {
                debug!(active_alerts, "alert sound playing");
            }
        } else {
            self.silence();
        }
    }

    pub fn silence(&mut self) {
        self.sound.pause();
        self.sound.rewind();
    }
}

#[cfg(test)]
#[path = "tests/alarm_tests.rs"]
mod tests;
