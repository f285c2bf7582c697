use std::iter::FusedIterator;

use crate::model::{Ms, Span, MINUTE_MS};

/// Lazily cut `windows` into slots of `duration_minutes`, starting every
/// `step_minutes` within each window.
///
/// A slot is only produced if it ends within its window; a window shorter
/// than the duration yields nothing. Zero duration or step yields nothing.
/// The iterator holds no state beyond its inputs, so cloning it (or calling
/// this again) replays the same sequence.
pub fn generate_slots(windows: &[Span], duration_minutes: u32, step_minutes: u32) -> Slots {
    Slots {
        windows: windows.to_vec(),
        duration: duration_minutes as Ms * MINUTE_MS,
        step: step_minutes as Ms * MINUTE_MS,
        window: 0,
        next_start: None,
    }
}

#[derive(Debug, Clone)]
pub struct Slots {
    windows: Vec<Span>,
    duration: Ms,
    step: Ms,
    window: usize,
    next_start: Option<Ms>,
}

impl Iterator for Slots {
    type Item = Span;

    fn next(&mut self) -> Option<Span> {
        if self.duration <= 0 || self.step <= 0 {
            return None;
        }
        while let Some(w) = self.windows.get(self.window) {
            let start = self.next_start.unwrap_or(w.start);
            let end = start + self.duration;
            if end <= w.end {
                self.next_start = Some(start + self.step);
                return Some(Span::new(start, end));
            }
            self.window += 1;
            self.next_start = None;
        }
        None
    }
}

impl FusedIterator for Slots {}
