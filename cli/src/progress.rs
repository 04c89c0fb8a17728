//! A throttled single-line progress reporter for `push`/`pull`/`clone`
//! file transfers, grounded on the teacher's `snapshot_progress` — a
//! `Mutex`-guarded, `Clear`-then-rewrite terminal line — but without the
//! teacher's generic `ProgressData` abstraction: this crate only ever
//! reports a `done/total` file count.

use std::io::Write as _;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use crossterm::cursor::MoveToColumn;
use crossterm::execute;
use crossterm::terminal::Clear;
use crossterm::terminal::ClearType;

const MIN_REDRAW_INTERVAL: Duration = Duration::from_millis(100);

struct State {
    last_drawn: Option<Instant>,
    line_visible: bool,
}

/// A single-line "N/M files" counter. Cheap to construct; drop it (or
/// call [`Progress::finish`]) to clear the line. The total is supplied
/// per-update rather than at construction, since the wire protocol only
/// reports it once the transfer is already underway (`CLONE_DATA_START`).
pub struct Progress {
    label: &'static str,
    state: Mutex<State>,
}

impl Progress {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            state: Mutex::new(State {
                last_drawn: None,
                line_visible: false,
            }),
        }
    }

    /// Redraws the line, throttled to [`MIN_REDRAW_INTERVAL`] unless
    /// `done` reaches `total` (the final update always draws).
    pub fn retarget_and_update(&self, done: u64, total: u64) {
        let mut state = self.state.lock().expect("progress mutex poisoned");
        let now = Instant::now();
        let at_end = done >= total;
        if !at_end
            && state
                .last_drawn
                .is_some_and(|last| now.duration_since(last) < MIN_REDRAW_INTERVAL)
        {
            return;
        }
        let mut stderr = std::io::stderr();
        let _ = execute!(stderr, MoveToColumn(0), Clear(ClearType::CurrentLine));
        let _ = write!(stderr, "{}: {done}/{total} files", self.label);
        let _ = stderr.flush();
        state.last_drawn = Some(now);
        state.line_visible = true;
    }

    pub fn finish(&self) {
        let mut state = self.state.lock().expect("progress mutex poisoned");
        if state.line_visible {
            let mut stderr = std::io::stderr();
            let _ = execute!(stderr, MoveToColumn(0), Clear(ClearType::CurrentLine));
            let _ = stderr.flush();
            state.line_visible = false;
        }
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.finish();
    }
}
