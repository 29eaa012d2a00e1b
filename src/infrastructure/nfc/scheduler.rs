//! Scheduler core
//!
//! Runs exactly one protocol stack step per trigger and owns the single
//! pending wake-up. Steps cannot overlap: a step runs while the scheduler is
//! mutably borrowed, and interrupts that land during it are queued behind it
//! by the event queue.

use crate::domain::error::StackError;
use crate::domain::settings::SchedulerSettings;
use crate::infrastructure::nfc::driver::{
    SchedulerEvent, StackEvent, StackEvents, StepOutcome, Transceiver,
};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// What caused a pump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpTrigger {
    HwInterrupt,
    Timeout,
    /// Software kick: after initialization or a discovery start
    Scheduled,
}

impl PumpTrigger {
    fn scheduler_event(self) -> SchedulerEvent {
        match self {
            Self::HwInterrupt => SchedulerEvent::HwInterrupt,
            Self::Timeout | Self::Scheduled => SchedulerEvent::None,
        }
    }
}

/// At most one outstanding wake-up
#[derive(Debug, Default)]
pub struct PendingTimeout {
    deadline: Option<Instant>,
}

impl PendingTimeout {
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Replaces any earlier deadline
    fn arm(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}

/// Failure surfaced by a pump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PumpFault {
    /// The step returned an error
    Stack(StackError),
    /// The requested wake-up could not be armed
    Timer { delay: Duration },
}

impl PumpFault {
    pub(crate) fn stack_error(self) -> StackError {
        match self {
            Self::Stack(error) => error,
            Self::Timer { .. } => StackError::new(StackError::TIMER_FAULT),
        }
    }
}

#[derive(Debug)]
pub(crate) struct PumpReport {
    pub(crate) events: Vec<StackEvent>,
    pub(crate) fault: Option<PumpFault>,
}

pub struct Scheduler {
    timeout: PendingTimeout,
    clock: Instant,
    max_delay: Duration,
    steps: u64,
}

impl Scheduler {
    pub fn new(settings: &SchedulerSettings) -> Self {
        Self {
            timeout: PendingTimeout::default(),
            clock: Instant::now(),
            max_delay: settings.max_reschedule_delay(),
            steps: 0,
        }
    }

    /// Advance the stack by one step
    pub(crate) fn pump<T: Transceiver + ?Sized>(
        &mut self,
        transceiver: &mut T,
        trigger: PumpTrigger,
    ) -> PumpReport {
        self.timeout.cancel();

        self.steps += 1;
        let step = self.steps;
        let mut events = StackEvents::new();
        let outcome =
            transceiver.process(trigger.scheduler_event(), self.clock.elapsed(), &mut events);

        let fault = match outcome {
            StepOutcome::NeedsReschedule(delay) => self.arm(delay).err(),
            StepOutcome::Idle => None,
            StepOutcome::Error(error) => Some(PumpFault::Stack(error)),
        };

        debug!(
            "Scheduler step {} ({:?}) -> {:?}, {} event(s)",
            step,
            trigger,
            outcome,
            events.len()
        );

        PumpReport {
            events: events.into_vec(),
            fault,
        }
    }

    fn arm(&mut self, delay: Duration) -> Result<(), PumpFault> {
        if delay > self.max_delay {
            warn!(
                "Stack asked for a {:?} wake-up, longer than the {:?} limit",
                delay, self.max_delay
            );
            return Err(PumpFault::Timer { delay });
        }
        let deadline = Instant::now()
            .checked_add(delay)
            .ok_or(PumpFault::Timer { delay })?;
        self.timeout.arm(deadline);
        Ok(())
    }

    /// Drop the pending wake-up, if any
    pub fn disarm(&mut self) {
        if self.timeout.cancel() {
            trace!("Pending timeout disarmed");
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.timeout.deadline()
    }

    /// Consume the pending timeout if it has expired at `now`
    pub fn take_expired(&mut self, now: Instant) -> bool {
        match self.timeout.deadline() {
            Some(deadline) if deadline <= now => {
                self.timeout.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn pending_timeout(&self) -> &PendingTimeout {
        &self.timeout
    }

    /// Number of stack steps run so far
    pub fn steps(&self) -> u64 {
        self.steps
    }
}
