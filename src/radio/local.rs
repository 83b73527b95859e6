//! In-memory shared-medium radio.
//!
//! `LocalRadio` models a single radio channel inside one process: a transmit
//! call puts a frame "on the air" for a bounded window, and at most one
//! concurrent receive call picks it up. It backs the in-process simulator and
//! the integration tests.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::RadioError;

use super::{RadioPort, FRAGMENT_CAPACITY};

/// A blocking, single-frame, shared radio medium.
///
/// The `window` plays two roles, matching how long a narrow-band transmission
/// occupies the air: a transmitted frame stays receivable for one window, and
/// a receive call waits at most one window for a frame to appear.
pub struct LocalRadio {
    transmitting: Mutex<()>,
    on_air: Mutex<Option<Vec<u8>>>,
    frame_ready: Condvar,
    window: Duration,
}

impl LocalRadio {
    pub fn new(window: Duration) -> Self {
        Self {
            transmitting: Mutex::new(()),
            on_air: Mutex::new(None),
            frame_ready: Condvar::new(),
            window,
        }
    }
}

impl RadioPort for LocalRadio {
    fn transmit(&self, frame: &[u8]) -> Result<(), RadioError> {
        if frame.is_empty() || frame.len() > self.max_message_length() {
            return Err(RadioError::BadBufferSize {
                len: frame.len(),
                capacity: self.max_message_length(),
            });
        }

        // Only one transmitter occupies the channel at a time.
        let _air_time = self.transmitting.lock();
        {
            let mut on_air = self.on_air.lock();
            *on_air = Some(frame.to_vec());
        }
        self.frame_ready.notify_all();
        std::thread::sleep(self.window);
        // Retract the frame if no receiver claimed it during the window.
        self.on_air.lock().take();
        Ok(())
    }

    fn receive(&self, buf: &mut [u8]) -> Result<(), RadioError> {
        let deadline = Instant::now() + self.window;
        let mut on_air = self.on_air.lock();
        while on_air.is_none() {
            if self.frame_ready.wait_until(&mut on_air, deadline).timed_out() {
                break;
            }
        }
        match on_air.take() {
            Some(frame) => {
                if buf.len() < frame.len() {
                    return Err(RadioError::BadBufferSize {
                        len: buf.len(),
                        capacity: self.max_message_length(),
                    });
                }
                buf[..frame.len()].copy_from_slice(&frame);
                buf[frame.len()..].fill(0);
                Ok(())
            }
            None => Err(RadioError::Timeout),
        }
    }

    fn max_message_length(&self) -> usize {
        FRAGMENT_CAPACITY
    }
}
