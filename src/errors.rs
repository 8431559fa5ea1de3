//! Error types, built with `error_chain`.
//!
//! The bus-level kinds (`BusTimeout`, `FramingError`, `UnexpectedResponse`) never escape the
//! [`TransactionExecutor`]: they are logged and collapsed into a plain failure there. Everything
//! else is a setup error and propagates up to `main`.
//!
//! [`TransactionExecutor`]: ../transaction/struct.TransactionExecutor.html

error_chain! {
    foreign_links {
        Io(::std::io::Error);
        Gpio(::rppal::gpio::Error) #[cfg(feature = "gpio")];
    }

    errors {
        BusTimeout {
            description("no response from the controller")
            display("no response from the controller within the timeout")
        }
        FramingError(detail: String) {
            description("malformed or exception response")
            display("malformed or exception response: {}", detail)
        }
        UnexpectedResponse(detail: String) {
            description("response does not match the request")
            display("response does not match the request: {}", detail)
        }
        UnknownVariable(name: String) {
            description("unknown variable")
            display("unknown variable '{}'", name)
        }
        InvalidDatetime(year: i32) {
            description("date cannot be stored in the controller clock")
            display("year {} cannot be stored in the controller clock (2000..=2255)", year)
        }
    }
}
