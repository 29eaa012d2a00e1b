//! Event-dispatch context
//!
//! A FIFO of deferred work owned by the controller. The interrupt side only
//! ever touches [`InterruptSink`]: an atomic "pump pending" flag plus a
//! non-blocking channel send, so nothing is shared with the dispatch side
//! behind a lock.

use crate::infrastructure::nfc::notifier::Notification;
use crate::infrastructure::nfc::scheduler::PumpTrigger;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A unit of deferred work
#[derive(Debug)]
pub(crate) enum Work {
    Pump(PumpTrigger),
    Notify(Notification),
}

/// Handle given to the driver so it can request a pump from interrupt context
#[derive(Debug, Clone)]
pub struct InterruptSink {
    pending: Arc<AtomicBool>,
    sender: mpsc::UnboundedSender<Work>,
}

impl InterruptSink {
    /// Flag that the stack needs to run. Never blocks; interrupts that arrive
    /// while a pump is already queued collapse into that pump.
    pub fn on_hw_interrupt(&self) {
        if !self.pending.swap(true, Ordering::AcqRel) {
            // The receiver lives as long as the controller
            let _ = self.sender.send(Work::Pump(PumpTrigger::HwInterrupt));
        }
    }
}

pub(crate) struct EventQueue {
    sender: mpsc::UnboundedSender<Work>,
    receiver: mpsc::UnboundedReceiver<Work>,
    irq_pending: Arc<AtomicBool>,
}

impl EventQueue {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver,
            irq_pending: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn interrupt_sink(&self) -> InterruptSink {
        InterruptSink {
            pending: self.irq_pending.clone(),
            sender: self.sender.clone(),
        }
    }

    pub(crate) fn post(&self, work: Work) {
        let _ = self.sender.send(work);
    }

    pub(crate) fn try_next(&mut self) -> Option<Work> {
        self.receiver.try_recv().ok().map(|work| self.accept(work))
    }

    pub(crate) async fn next(&mut self) -> Option<Work> {
        let work = self.receiver.recv().await?;
        Some(self.accept(work))
    }

    // Clear the pending flag before the pump runs, so an interrupt landing
    // during the step queues a follow-up pump instead of being lost.
    fn accept(&self, work: Work) -> Work {
        if matches!(work, Work::Pump(PumpTrigger::HwInterrupt)) {
            self.irq_pending.store(false, Ordering::Release);
        }
        work
    }
}
