//! Trigger endpoints: single-bit pulses in, latched bits out.

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use tracing::debug;

use crate::endpoint::{DEFAULT_POLL_INTERVAL_MS, EndpointAddress, EndpointKind, TRIGGER_WIDTH};
use crate::error::{FpgaError, Result};
use crate::poll::{self, PollReport, PollStatus};
use crate::transport::PanelTransport;

#[derive(Debug, Clone)]
pub struct TriggerChannel {
    poll_interval: Duration,
}

impl Default for TriggerChannel {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS))
    }
}

impl TriggerChannel {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn activate_trigger_in<T: PanelTransport>(
        &self,
        transport: &mut T,
        addr: u8,
        bit: u32,
    ) -> Result<()> {
        let addr = EndpointAddress::expect(addr, EndpointKind::TriggerIn)?;
        if bit >= TRIGGER_WIDTH {
            return Err(FpgaError::InvalidBit { bit });
        }
        debug!(addr = %addr, bit, "Trigger-in pulse");
        transport
            .activate_trigger_in(addr.value(), bit as u8)
            .map_err(|e| FpgaError::io("ActivateTriggerIn", e))
    }

    pub fn update_trigger_outs<T: PanelTransport>(&self, transport: &mut T) -> Result<()> {
        transport
            .update_trigger_outs()
            .map_err(|e| FpgaError::io("UpdateTriggerOuts", e))
    }

    /// Test latched bits under `mask`, refreshing first when `refresh` is true.
    pub fn is_triggered<T: PanelTransport>(
        &self,
        transport: &mut T,
        addr: u8,
        mask: u32,
        refresh: bool,
    ) -> Result<bool> {
        let addr = EndpointAddress::expect(addr, EndpointKind::TriggerOut)?;
        if refresh {
            self.update_trigger_outs(transport)?;
        }
        self.test(transport, addr, mask)
    }

    fn test<T: PanelTransport>(
        &self,
        transport: &mut T,
        addr: EndpointAddress,
        mask: u32,
    ) -> Result<bool> {
        transport
            .is_triggered(addr.value(), mask)
            .map_err(|e| FpgaError::io("IsTriggered", e))
    }

    /// Refresh and test until a masked bit is set.
    ///
    /// Checks at least once, even with a zero timeout. Running out of time is
    /// `Timeout`, never `Ok(false)`.
    pub fn check_triggered<T: PanelTransport>(
        &self,
        transport: &mut T,
        addr: u8,
        mask: u32,
        timeout: Duration,
    ) -> Result<PollReport> {
        self.wait(transport, addr, mask, timeout, None)
    }

    /// [`check_triggered`](Self::check_triggered) that gives up once `cancel`
    /// is raised.
    pub fn check_triggered_cancellable<T: PanelTransport>(
        &self,
        transport: &mut T,
        addr: u8,
        mask: u32,
        timeout: Duration,
        cancel: &AtomicBool,
    ) -> Result<PollReport> {
        self.wait(transport, addr, mask, timeout, Some(cancel))
    }

    fn wait<T: PanelTransport>(
        &self,
        transport: &mut T,
        addr: u8,
        mask: u32,
        timeout: Duration,
        cancel: Option<&AtomicBool>,
    ) -> Result<PollReport> {
        let addr = EndpointAddress::expect(addr, EndpointKind::TriggerOut)?;

        let check = || -> Result<bool> {
            self.update_trigger_outs(transport)?;
            self.test(transport, addr, mask)
        };
        let report = match cancel {
            Some(flag) => poll::poll_until_cancelled(timeout, self.poll_interval, flag, check)?,
            None => poll::poll_until(timeout, self.poll_interval, check)?,
        };

        debug!(
            addr = %addr,
            attempts = report.attempts,
            elapsed_ms = report.elapsed.as_millis() as u64,
            status = ?report.status,
            "Trigger wait"
        );
        match report.status {
            PollStatus::Satisfied => Ok(report),
            PollStatus::TimedOut => Err(FpgaError::Timeout {
                address: addr.value(),
                mask,
                timeout_ms: timeout.as_millis() as u64,
                attempts: report.attempts,
            }),
            PollStatus::Cancelled => Err(FpgaError::Cancelled {
                address: addr.value(),
                attempts: report.attempts,
            }),
        }
    }
}
