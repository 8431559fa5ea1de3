//! An in-memory controller used by the tests.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use errors::*;
use transaction::{ExchangeHooks, Request, Response, Transport};
use transceiver::BusTransceiver;

/// Shared log of what happened on the bus, in order.
pub type EventLog = Rc<RefCell<Vec<&'static str>>>;

/// What goes wrong with the next exchange.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fault {
    Timeout,
    BadCrc,
    /// Answers with one word less than requested.
    ShortResponse,
    /// Answers a write with another address.
    WrongEcho,
}

#[derive(Default)]
pub struct SimulatedBus {
    pub input_registers: HashMap<u16, u16>,
    pub coils: HashMap<u16, bool>,
    pub holding_registers: HashMap<u16, u16>,
    /// Every request received, failed ones included.
    pub requests: Vec<Request>,
    /// Acknowledge coil writes without storing them.
    pub ignore_writes: bool,
    /// Direction of the shared transceiver seen at each response wait.
    pub transmitting_while_waiting: Vec<bool>,
    direction: Option<Rc<Cell<bool>>>,
    faults: Vec<Fault>,
    persistent_fault: Option<Fault>,
    log: EventLog,
}

impl SimulatedBus {
    pub fn new() -> SimulatedBus { SimulatedBus::default() }

    pub fn with_log (log: &EventLog) -> SimulatedBus {
        SimulatedBus { log: log.clone(), ..SimulatedBus::default() }
    }

    /// Watches the direction of `transceiver` during each response wait.
    pub fn watch (&mut self, transceiver: &CountingTransceiver) {
        self.direction = Some(transceiver.direction.clone());
    }

    /// Stores `words` starting at `address`.
    pub fn set_input_registers (&mut self, address: u16, words: &[u16]) {
        for (offset, word) in words.iter().enumerate() {
            self.input_registers.insert (address + offset as u16, *word);
        }
    }

    /// Fails the next exchanges, one fault per exchange.
    pub fn fail_next (&mut self, faults: &[Fault]) {
        self.faults = faults.iter().rev().cloned().collect();
    }

    /// Fails every exchange until cleared with `None`.
    pub fn fail_always (&mut self, fault: Option<Fault>) {
        self.persistent_fault = fault;
    }

    /// Start addresses of the input register reads received so far.
    pub fn register_reads (&self) -> Vec<u16> {
        self.requests.iter().filter_map (|request| match *request {
            Request::ReadInputRegisters(address, _) => Some(address),
            _ => None,
        }).collect()
    }

    fn serve (&mut self, request: &Request) -> Response {
        match *request {
            Request::ReadInputRegisters(address, count) => Response::ReadInputRegisters(
                (address..address + count)
                    .map (|a| self.input_registers.get (&a).cloned().unwrap_or (0))
                    .collect()),
            Request::ReadCoils(address, count) => Response::ReadCoils(
                (address..address + count)
                    .map (|a| self.coils.get (&a).cloned().unwrap_or (false))
                    .collect()),
            Request::WriteSingleCoil(address, value) => {
                if !self.ignore_writes {
                    self.coils.insert (address, value);
                }
                Response::WriteSingleCoil(address, value)
            },
            Request::WriteMultipleRegisters(address, ref words) => {
                for (offset, word) in words.iter().enumerate() {
                    self.holding_registers.insert (address + offset as u16, *word);
                }
                Response::WriteMultipleRegisters(address, words.len() as u16)
            },
        }
    }
}

impl Transport for SimulatedBus {
    fn call (&mut self, request: &Request, hooks: &mut dyn ExchangeHooks) -> Result<Response> {
        self.log.borrow_mut().push ("exchange");
        self.requests.push (request.clone());
        hooks.request_sent();
        hooks.idle();
        if let Some(ref direction) = self.direction {
            self.transmitting_while_waiting.push (direction.get());
        }
        let fault = self.faults.pop().or (self.persistent_fault);
        match fault {
            Some(Fault::Timeout) => bail!(ErrorKind::BusTimeout),
            Some(Fault::BadCrc) => bail!(ErrorKind::FramingError("CRC mismatch".to_owned())),
            Some(Fault::ShortResponse) => match self.serve (request) {
                Response::ReadInputRegisters(mut words) => {
                    words.pop();
                    Ok(Response::ReadInputRegisters(words))
                },
                Response::ReadCoils(_) => Ok(Response::ReadCoils(Vec::new())),
                other => Ok(other),
            },
            Some(Fault::WrongEcho) => match *request {
                Request::WriteSingleCoil(address, value) =>
                    Ok(Response::WriteSingleCoil(address.wrapping_add (1), value)),
                Request::WriteMultipleRegisters(address, ref words) =>
                    Ok(Response::WriteMultipleRegisters(address.wrapping_add (1), words.len() as u16)),
                _ => Ok(self.serve (request)),
            },
            None => Ok(self.serve (request)),
        }
    }
}

/// Counts hook invocations and logs them next to the bus exchanges.
#[derive(Default)]
pub struct CountingTransceiver {
    pub before: usize,
    pub turnaround: usize,
    pub after: usize,
    pub idle: usize,
    pub transmitting: bool,
    direction: Rc<Cell<bool>>,
    log: EventLog,
}

impl CountingTransceiver {
    pub fn with_log (log: &EventLog) -> CountingTransceiver {
        CountingTransceiver { log: log.clone(), ..CountingTransceiver::default() }
    }

    fn set_transmitting (&mut self, transmitting: bool) {
        self.transmitting = transmitting;
        self.direction.set (transmitting);
    }
}

impl BusTransceiver for CountingTransceiver {
    fn before_transaction (&mut self) {
        self.before += 1;
        self.set_transmitting (true);
        self.log.borrow_mut().push ("before");
    }

    fn on_turnaround (&mut self) {
        self.turnaround += 1;
        self.set_transmitting (false);
        self.log.borrow_mut().push ("turnaround");
    }

    fn after_transaction (&mut self) {
        self.after += 1;
        self.set_transmitting (false);
        self.log.borrow_mut().push ("after");
    }

    fn on_idle (&mut self) {
        self.idle += 1;
        self.log.borrow_mut().push ("idle");
    }
}
