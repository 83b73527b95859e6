//! Radio port abstraction.
//!
//! The link layer drives a half-duplex transceiver through [`RadioPort`]:
//! bounded blocking transmit and receive over fixed-size fragments. The
//! register-level LoRa driver implements this trait out of tree; in-process
//! implementations live in [`local`] and [`testing`].

pub mod local;
pub mod testing;

pub use local::LocalRadio;

use crate::error::RadioError;

/// Fragment capacity a conforming radio must offer, in bytes. Every frame
/// variant fits in one fragment (checked statically in the wire module).
pub const FRAGMENT_CAPACITY: usize = 66;

/// A half-duplex radio.
///
/// Implementations synchronise internally; the link layer performs at most
/// one radio operation at a time per agent.
pub trait RadioPort: Send + Sync {
    /// Transmit one frame, blocking until the transmission completes or
    /// fails. Empty or over-capacity frames are rejected with
    /// [`RadioError::BadBufferSize`].
    fn transmit(&self, frame: &[u8]) -> Result<(), RadioError>;

    /// Receive one frame into `buf`, blocking up to an
    /// implementation-defined window. On success the buffer holds the frame
    /// zero-padded to capacity.
    fn receive(&self, buf: &mut [u8]) -> Result<(), RadioError>;

    /// The fixed fragment capacity of this radio.
    fn max_message_length(&self) -> usize;
}
