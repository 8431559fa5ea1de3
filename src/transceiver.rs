//! RS485 direction control.
//!
//! The bus is half-duplex: the transceiver has to be switched to transmit mode before a request
//! goes out and back to receive mode once the exchange is over. A [`BusTransceiver`] is driven by
//! the [`TransactionExecutor`] around every transaction through a [`TransmitGuard`]. The
//! transport turns the line around as soon as the request has been flushed, the guard returns it
//! to receive mode once more when the transaction ends.
//!
//! [`TransactionExecutor`]: ../transaction/struct.TransactionExecutor.html

use transaction::ExchangeHooks;

/// Hooks invoked around each bus transaction. None of them can fail.
pub trait BusTransceiver {
    /// Puts the transceiver in transmit mode.
    fn before_transaction (&mut self);
    /// The request is out, switches to receive mode for the response.
    fn on_turnaround (&mut self) {}
    /// Returns the transceiver to receive mode. Runs on every exit path, also when the
    /// transaction failed before or after the turnaround.
    fn after_transaction (&mut self);
    /// Called while waiting for a response. Must not perform bus I/O.
    fn on_idle (&mut self) {}
}

/// For adapters which switch direction on their own (most USB dongles).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTransceiver;

impl BusTransceiver for NoopTransceiver {
    fn before_transaction (&mut self) {}
    fn after_transaction (&mut self) {}
}

/// Holds the bus for one transaction: transmit mode from creation until the turnaround.
///
/// `after_transaction` runs when the guard is dropped, so the bus is released on every exit
/// path, early returns and unwinding included.
pub struct TransmitGuard<'a, T: BusTransceiver + 'a> {
    transceiver: &'a mut T,
    receiving: bool,
}

impl<'a, T: BusTransceiver + 'a> TransmitGuard<'a, T> {
    pub fn new (transceiver: &'a mut T) -> TransmitGuard<'a, T> {
        transceiver.before_transaction();
        TransmitGuard { transceiver, receiving: false }
    }

    /// Switches to receive mode. Only the first call reaches the transceiver.
    pub fn turnaround (&mut self) {
        if !self.receiving {
            self.receiving = true;
            self.transceiver.on_turnaround();
        }
    }
}

impl<'a, T: BusTransceiver + 'a> ExchangeHooks for TransmitGuard<'a, T> {
    fn request_sent (&mut self) { self.turnaround() }
    fn idle (&mut self) { self.transceiver.on_idle() }
}

impl<'a, T: BusTransceiver + 'a> Drop for TransmitGuard<'a, T> {
    fn drop (&mut self) {
        self.transceiver.after_transaction()
    }
}

#[cfg(feature = "gpio")]
pub use self::gpio::GpioTransceiver;

#[cfg(feature = "gpio")]
mod gpio {
    use rppal::gpio::{Gpio, OutputPin};
    use errors::*;
    use super::BusTransceiver;

    /// Drives the DE and RE̅ pins of a MAX485-style transceiver.
    ///
    /// Both pins are high while transmitting and low while receiving. Boards which tie DE and
    /// RE̅ together pass the same pin twice.
    pub struct GpioTransceiver {
        driver_enable: OutputPin,
        receiver_enable_neg: Option<OutputPin>,
    }

    impl GpioTransceiver {
        /// Claims the BCM pins and puts the transceiver in receive mode.
        pub fn new (de_pin: u8, re_neg_pin: u8) -> Result<GpioTransceiver> {
            let gpio = Gpio::new()?;
            let driver_enable = gpio.get (de_pin)?.into_output_low();
            let receiver_enable_neg = if re_neg_pin == de_pin {
                None
            } else {
                Some(gpio.get (re_neg_pin)?.into_output_low())
            };
            debug!("RS485 direction on GPIO {} (DE) and {} (RE)", de_pin, re_neg_pin);
            Ok(GpioTransceiver { driver_enable, receiver_enable_neg })
        }
    }

    impl GpioTransceiver {
        fn receive (&mut self) {
            self.driver_enable.set_low();
            if let Some(ref mut pin) = self.receiver_enable_neg {
                pin.set_low();
            }
        }
    }

    impl BusTransceiver for GpioTransceiver {
        fn before_transaction (&mut self) {
            if let Some(ref mut pin) = self.receiver_enable_neg {
                pin.set_high();
            }
            self.driver_enable.set_high();
        }

        fn on_turnaround (&mut self) { self.receive() }

        fn after_transaction (&mut self) { self.receive() }
    }
}
