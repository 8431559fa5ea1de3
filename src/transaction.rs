//! Single Modbus operations against the controller.
//!
//! A [`Transport`] moves a request over the wire and hands back whatever came in. The
//! [`TransactionExecutor`] wraps it with the transceiver hooks, checks that the response answers
//! the request and collapses every failure into `None`/`false`: callers only learn *that* an
//! operation failed, the cause is logged.

use std::fmt;
use errors::*;
use transceiver::{BusTransceiver, TransmitGuard};

/// A request sent to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Start address, quantity.
    ReadInputRegisters(u16, u16),
    /// Start address, quantity.
    ReadCoils(u16, u16),
    WriteSingleCoil(u16, bool),
    WriteMultipleRegisters(u16, Vec<u16>),
}

/// The response of the controller, as decoded from the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    ReadInputRegisters(Vec<u16>),
    ReadCoils(Vec<bool>),
    /// Echoed address and value.
    WriteSingleCoil(u16, bool),
    /// Echoed start address and quantity.
    WriteMultipleRegisters(u16, u16),
}

impl fmt::Display for Request {
    fn fmt (&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Request::ReadInputRegisters(address, count) =>
                write!(f, "read {} input registers at 0x{:04X}", count, address),
            Request::ReadCoils(address, count) =>
                write!(f, "read {} coils at 0x{:04X}", count, address),
            Request::WriteSingleCoil(address, value) =>
                write!(f, "write coil 0x{:04X} = {}", address, value),
            Request::WriteMultipleRegisters(address, ref words) =>
                write!(f, "write {} registers at 0x{:04X}", words.len(), address),
        }
    }
}

/// Callbacks a [`Transport`] invokes during one exchange.
///
/// [`Transport`]: trait.Transport.html
pub trait ExchangeHooks {
    /// The request has been flushed to the wire, the transceiver may switch to receive mode.
    /// Called at most once per exchange, before waiting for the response.
    fn request_sent (&mut self);
    /// Called while waiting for the response. Must not access the bus.
    fn idle (&mut self);
}

/// Framed request/response exchange with the remote slave.
///
/// Implementations block for at most their response timeout, calling `hooks.request_sent()`
/// once the request is out and `hooks.idle()` any number of times while waiting.
pub trait Transport {
    fn call (&mut self, request: &Request, hooks: &mut dyn ExchangeHooks) -> Result<Response>;
}

/// Checks that `response` answers `request`, returning it trimmed to the requested quantity.
fn check_response (request: &Request, response: Response) -> Result<Response> {
    match (request, response) {
        (&Request::ReadInputRegisters(_, count), Response::ReadInputRegisters(words)) => {
            if words.len() != count as usize {
                bail!(ErrorKind::UnexpectedResponse(
                    format!("expected {} registers, got {}", count, words.len())));
            }
            Ok(Response::ReadInputRegisters(words))
        },
        (&Request::ReadCoils(_, count), Response::ReadCoils(mut bits)) => {
            // coils come in whole bytes
            if bits.len() < count as usize {
                bail!(ErrorKind::UnexpectedResponse(
                    format!("expected {} coils, got {}", count, bits.len())));
            }
            bits.truncate (count as usize);
            Ok(Response::ReadCoils(bits))
        },
        (&Request::WriteSingleCoil(address, value), Response::WriteSingleCoil(echo_address, echo_value)) => {
            if (address, value) != (echo_address, echo_value) {
                bail!(ErrorKind::UnexpectedResponse(
                    format!("coil write echoed 0x{:04X} = {}", echo_address, echo_value)));
            }
            Ok(Response::WriteSingleCoil(echo_address, echo_value))
        },
        (&Request::WriteMultipleRegisters(address, ref words),
            Response::WriteMultipleRegisters(echo_address, echo_count)) => {
            if (address, words.len()) != (echo_address, echo_count as usize) {
                bail!(ErrorKind::UnexpectedResponse(
                    format!("register write echoed {} at 0x{:04X}", echo_count, echo_address)));
            }
            Ok(Response::WriteMultipleRegisters(echo_address, echo_count))
        },
        (_, response) => bail!(ErrorKind::UnexpectedResponse(
            format!("function mismatch: {:?}", response))),
    }
}

/// Performs one operation at a time over a [`Transport`], driving a [`BusTransceiver`] around it.
///
/// [`Transport`]: trait.Transport.html
/// [`BusTransceiver`]: ../transceiver/trait.BusTransceiver.html
pub struct TransactionExecutor<T, X> {
    transport: T,
    transceiver: X,
    last_ok: bool,
}

impl<T: Transport, X: BusTransceiver> TransactionExecutor<T, X> {
    pub fn new (transport: T, transceiver: X) -> TransactionExecutor<T, X> {
        TransactionExecutor { transport, transceiver, last_ok: true }
    }

    /// Whether the most recent transaction succeeded. `true` before the first one.
    pub fn last_ok (&self) -> bool { self.last_ok }

    pub fn transport (&self) -> &T { &self.transport }
    pub fn transport_mut (&mut self) -> &mut T { &mut self.transport }
    pub fn transceiver (&self) -> &X { &self.transceiver }

    fn execute (&mut self, request: Request) -> Option<Response> {
        let result = {
            let mut guard = TransmitGuard::new (&mut self.transceiver);
            self.transport.call (&request, &mut guard)
        };
        match result.and_then (|response| check_response (&request, response)) {
            Ok(response) => {
                debug!("{}: ok", request);
                trace!("{:?}", response);
                self.last_ok = true;
                Some(response)
            },
            Err(error) => {
                warn!("{}: {}", request, error);
                self.last_ok = false;
                None
            }
        }
    }

    pub fn read_input_registers (&mut self, address: u16, count: u16) -> Option<Vec<u16>> {
        match self.execute (Request::ReadInputRegisters(address, count)) {
            Some(Response::ReadInputRegisters(words)) => Some(words),
            _ => None,
        }
    }

    pub fn read_coil (&mut self, address: u16) -> Option<bool> {
        match self.execute (Request::ReadCoils(address, 1)) {
            Some(Response::ReadCoils(bits)) => bits.first().cloned(),
            _ => None,
        }
    }

    pub fn write_coil (&mut self, address: u16, value: bool) -> bool {
        self.execute (Request::WriteSingleCoil(address, value)).is_some()
    }

    pub fn write_multiple_registers (&mut self, address: u16, words: &[u16]) -> bool {
        self.execute (Request::WriteMultipleRegisters(address, words.to_vec())).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use sim::{CountingTransceiver, EventLog, Fault, SimulatedBus};

    fn executor() -> (TransactionExecutor<SimulatedBus, CountingTransceiver>, EventLog) {
        let log: EventLog = Rc::new (RefCell::new (Vec::new()));
        let transceiver = CountingTransceiver::with_log (&log);
        let mut bus = SimulatedBus::with_log (&log);
        bus.watch (&transceiver);
        (TransactionExecutor::new (bus, transceiver), log)
    }

    #[test]
    fn reads_input_registers() {
        let (mut executor, _) = executor();
        executor.transport_mut().set_input_registers (0x3100, &[1, 2, 3]);
        assert_eq!(executor.read_input_registers (0x3100, 3), Some(vec![1, 2, 3]));
        assert_eq!(executor.read_input_registers (0x3101, 2), Some(vec![2, 3]));
        assert!(executor.last_ok());
    }

    #[test]
    fn hooks_wrap_every_exchange() {
        let (mut executor, log) = executor();
        executor.read_input_registers (0x3100, 2);
        executor.write_coil (0x0002, true);
        assert_eq!(*log.borrow(), vec![
            "before", "exchange", "turnaround", "idle", "after",
            "before", "exchange", "turnaround", "idle", "after",
        ]);
        let transceiver = executor.transceiver();
        assert_eq!((transceiver.before, transceiver.turnaround, transceiver.idle, transceiver.after),
            (2, 2, 2, 2));
        assert!(!transceiver.transmitting);
    }

    #[test]
    fn bus_is_released_after_timeout() {
        let (mut executor, log) = executor();
        executor.transport_mut().fail_next (&[Fault::Timeout]);
        assert_eq!(executor.read_input_registers (0x3100, 6), None);
        assert!(!executor.last_ok());
        assert_eq!(*log.borrow(), vec!["before", "exchange", "turnaround", "idle", "after"]);
        assert!(!executor.transceiver().transmitting);
    }

    #[test]
    fn transceiver_receives_while_waiting_for_the_response() {
        let (mut executor, _) = executor();
        executor.transport_mut().set_input_registers (0x3200, &[0, 0, 0]);
        assert!(executor.read_input_registers (0x3200, 3).is_some());
        let bus = executor.transport();
        assert_eq!(bus.transmitting_while_waiting, vec![false]);
    }

    #[test]
    fn every_fault_collapses_into_failure() {
        let (mut executor, _) = executor();
        executor.transport_mut().fail_next (&[Fault::Timeout, Fault::BadCrc, Fault::ShortResponse]);
        assert_eq!(executor.read_input_registers (0x3200, 3), None);
        assert_eq!(executor.read_input_registers (0x3200, 3), None);
        assert_eq!(executor.read_input_registers (0x3200, 3), None);
        assert_eq!(executor.read_input_registers (0x3200, 3), Some(vec![0, 0, 0]));
        let transceiver = executor.transceiver();
        assert_eq!((transceiver.before, transceiver.after), (4, 4));
    }

    #[test]
    fn failure_flag_clears_on_next_success() {
        let (mut executor, _) = executor();
        executor.transport_mut().fail_next (&[Fault::BadCrc]);
        assert!(!executor.write_coil (0x0006, true));
        assert!(!executor.last_ok());
        assert_eq!(executor.read_coil (0x0006), Some(false));
        assert!(executor.last_ok());
    }

    #[test]
    fn coil_round_trip() {
        let (mut executor, _) = executor();
        assert!(executor.write_coil (0x0002, true));
        assert_eq!(executor.read_coil (0x0002), Some(true));
        assert_eq!(executor.read_coil (0x0000), Some(false));
    }

    #[test]
    fn mismatched_echo_is_a_failure() {
        let (mut executor, _) = executor();
        executor.transport_mut().fail_next (&[Fault::WrongEcho, Fault::WrongEcho]);
        assert!(!executor.write_coil (0x0002, true));
        assert!(!executor.write_multiple_registers (0x9013, &[1, 2, 3]));
    }

    #[test]
    fn writes_multiple_registers() {
        let (mut executor, _) = executor();
        assert!(executor.write_multiple_registers (0x9013, &[0x0102, 0x0304, 0x0506]));
        let holding = &executor.transport().holding_registers;
        assert_eq!(holding.get (&0x9014), Some(&0x0304));
    }

    #[test]
    fn response_checks() {
        let request = Request::ReadInputRegisters(0x3100, 2);
        assert!(check_response (&request, Response::ReadInputRegisters(vec![1, 2])).is_ok());
        assert!(check_response (&request, Response::ReadInputRegisters(vec![1, 2, 3])).is_err());
        assert!(check_response (&request, Response::ReadCoils(vec![true])).is_err());
        // coil responses are padded to a whole byte
        let padded = check_response (
            &Request::ReadCoils(0x0002, 1), Response::ReadCoils(vec![true, false, false]));
        assert_eq!(padded.ok(), Some(Response::ReadCoils(vec![true])));
    }
}
