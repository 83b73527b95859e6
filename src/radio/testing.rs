//! Radio test doubles.
//!
//! `CountingRadio` records how often each operation runs and can fake
//! success, failure, or injected traffic; `FallibleLocalRadio` wraps a
//! [`LocalRadio`] and drops every Nth operation.

use std::time::Duration;

use parking_lot::Mutex;

use crate::error::RadioError;

use super::{LocalRadio, RadioPort};

type InjectorFn = Box<dyn Fn(&mut [u8]) -> Result<(), RadioError> + Send + Sync>;

/// A radio that does no I/O but counts the operations issued against it.
///
/// Receives succeed with a zeroed buffer unless an injector supplies frame
/// bytes. Each operation optionally takes `action_time` of wall time, to
/// mimic air time.
pub struct CountingRadio {
    can_transmit: bool,
    can_receive: bool,
    injector: Option<InjectorFn>,
    action_time: Duration,
    observed: Mutex<(u32, u32)>,
}

impl CountingRadio {
    pub fn new() -> Self {
        Self {
            can_transmit: true,
            can_receive: true,
            injector: None,
            action_time: Duration::ZERO,
            observed: Mutex::new((0, 0)),
        }
    }

    /// Make each transmit/receive take this long.
    pub fn action_time(mut self, d: Duration) -> Self {
        self.action_time = d;
        self
    }

    /// Select which operations succeed; the rest time out.
    pub fn capabilities(mut self, can_transmit: bool, can_receive: bool) -> Self {
        self.can_transmit = can_transmit;
        self.can_receive = can_receive;
        self
    }

    /// Supply received frame bytes from a closure.
    pub fn injector(
        mut self,
        f: impl Fn(&mut [u8]) -> Result<(), RadioError> + Send + Sync + 'static,
    ) -> Self {
        self.injector = Some(Box::new(f));
        self
    }

    /// `(transmits, receives)` observed since the last call; resets both.
    pub fn observed_actions(&self) -> (u32, u32) {
        std::mem::take(&mut *self.observed.lock())
    }
}

impl Default for CountingRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioPort for CountingRadio {
    fn transmit(&self, _frame: &[u8]) -> Result<(), RadioError> {
        std::thread::sleep(self.action_time);
        self.observed.lock().0 += 1;
        if !self.can_transmit {
            return Err(RadioError::Timeout);
        }
        Ok(())
    }

    fn receive(&self, buf: &mut [u8]) -> Result<(), RadioError> {
        std::thread::sleep(self.action_time);
        self.observed.lock().1 += 1;
        if !self.can_receive {
            return Err(RadioError::Timeout);
        }
        buf.fill(0);
        match &self.injector {
            Some(inject) => inject(buf),
            None => Ok(()),
        }
    }

    fn max_message_length(&self) -> usize {
        1 << 10
    }
}

/// A [`LocalRadio`] with deterministic periodic losses.
///
/// With a failure period of `n`, every `n`th call of that operation fails
/// with a timeout (and a dropped transmit never reaches the air). A period
/// of zero disables that failure mode.
pub struct FallibleLocalRadio {
    radio: LocalRadio,
    transmit_failure_period: u32,
    receive_failure_period: u32,
    counters: Mutex<(u32, u32)>,
}

impl FallibleLocalRadio {
    pub fn new(window: Duration, transmit_failure_period: u32, receive_failure_period: u32) -> Self {
        Self {
            radio: LocalRadio::new(window),
            transmit_failure_period,
            receive_failure_period,
            counters: Mutex::new((0, 0)),
        }
    }
}

impl RadioPort for FallibleLocalRadio {
    fn transmit(&self, frame: &[u8]) -> Result<(), RadioError> {
        if self.transmit_failure_period != 0 {
            let mut counters = self.counters.lock();
            counters.0 = (counters.0 + 1) % self.transmit_failure_period;
            if counters.0 == 0 {
                return Err(RadioError::Timeout);
            }
        }
        self.radio.transmit(frame)
    }

    fn receive(&self, buf: &mut [u8]) -> Result<(), RadioError> {
        if self.receive_failure_period != 0 {
            let mut counters = self.counters.lock();
            counters.1 = (counters.1 + 1) % self.receive_failure_period;
            if counters.1 == 0 {
                return Err(RadioError::Timeout);
            }
        }
        self.radio.receive(buf)
    }

    fn max_message_length(&self) -> usize {
        self.radio.max_message_length()
    }
}
