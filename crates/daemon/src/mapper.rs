//! Built-in mapper that logs controller input
//!
//! Useful to check a controller end to end without a real mapping profile.

use driver::{Controller, Mapper, MapperResult};
use protocol::ControllerInput;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// How often idle ticks are summarized at trace level
const TICK_SUMMARY_INTERVAL: Duration = Duration::from_secs(10);

/// Button bits set in `current` but not in `previous`
pub fn pressed(previous: &ControllerInput, current: &ControllerInput) -> u32 {
    current.buttons & !previous.buttons
}

/// Button bits set in `previous` but not in `current`
pub fn released(previous: &ControllerInput, current: &ControllerInput) -> u32 {
    previous.buttons & !current.buttons
}

pub struct LoggingMapper {
    id: String,
    samples: u64,
    ticks: u64,
    last_summary: Option<Instant>,
}

impl LoggingMapper {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            samples: 0,
            ticks: 0,
            last_summary: None,
        }
    }
}

impl Mapper for LoggingMapper {
    fn input(
        &mut self,
        _controller: &dyn Controller,
        previous: &ControllerInput,
        current: &ControllerInput,
    ) -> MapperResult {
        self.samples += 1;

        let down = pressed(previous, current);
        let up = released(previous, current);
        if down != 0 || up != 0 {
            debug!("{}: pressed {:#010x}, released {:#010x}", self.id, down, up);
        }

        if previous.ltrig != current.ltrig || previous.rtrig != current.rtrig {
            trace!("{}: triggers {}/{}", self.id, current.ltrig, current.rtrig);
        }

        trace!(
            "{}: seq {} lpad ({}, {}) rpad ({}, {})",
            self.id, current.seq, current.lpad_x, current.lpad_y, current.rpad_x, current.rpad_y
        );
        Ok(())
    }

    fn run_scheduled(&mut self, now: Instant) -> MapperResult {
        self.ticks += 1;
        let due = self
            .last_summary
            .is_none_or(|last| now.duration_since(last) >= TICK_SUMMARY_INTERVAL);
        if due {
            trace!(
                "{}: {} samples, {} idle ticks",
                self.id, self.samples, self.ticks
            );
            self.last_summary = Some(now);
        }
        Ok(())
    }

    fn generate_events(&mut self) -> MapperResult {
        Ok(())
    }

    fn generate_feedback(&mut self, _controller: &dyn Controller) -> MapperResult {
        Ok(())
    }
}
