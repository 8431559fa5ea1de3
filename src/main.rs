#[macro_use]
extern crate clap;
#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate log;
extern crate chrono;
extern crate env_logger;
extern crate epever485;
extern crate tokio_serial;

use std::{fs, process, thread};
use std::io::{self, Write};
use std::str::FromStr;
use std::time::Duration;
use chrono::Local;
use error_chain::ChainedError;
use tokio_serial::StopBits;
use epever485::constants::DEFAULT_POLL_INTERVAL_MS;
use epever485::controller::{EpeverController, PolledController};
use epever485::data::{parse_switch, OutputFormat};
use epever485::errors::*;
use epever485::rtu::{LinkSettings, RtuTransport};
use epever485::scheduler::PollPhase;
use epever485::transaction::Transport;
use epever485::transceiver::{BusTransceiver, NoopTransceiver};

const DOCUMENTATION: &'static str = r#"VARIABLES:
    --get and --set accept the coil-backed variables of the controller:
        load_force_onoff        forces the load output on/off
        load_manual_onoff       load output on/off in manual mode
        charging_device_onoff   enables/disables charging
    Values are written as `on`/`off`, e.g.
        epever485 --set load_manual_onoff=off /dev/ttyUSB0

POLLING:
    Without an action, one group of registers is read per interval and the
    readings are printed after every complete cycle (six intervals). Daily
    statistics are refreshed every 360 cycles. Use `RUST_LOG=debug` to trace
    every bus transaction.
"#;

/// Ensures that the argument parses as a `T`.
fn numeric<T: FromStr> (s: String) -> ::std::result::Result<(), String> {
    s.parse::<T>()
        .map (|_| ())
        .map_err (|_| "must be numeric and in range".to_string())
}

/// Returns the parsed value of `name`, or `default` when it was not given.
fn value_or<T: FromStr> (args: &clap::ArgMatches, name: &str, default: T) -> T {
    // the validators already rejected unparsable values
    args.value_of (name).and_then (|value| value.parse().ok()).unwrap_or (default)
}

fn link_settings (args: &clap::ArgMatches) -> LinkSettings {
    let defaults = LinkSettings::new (args.value_of ("serial_port").unwrap_or_default());
    LinkSettings {
        slave: value_or (args, "address", defaults.slave),
        baud_rate: value_or (args, "baud", defaults.baud_rate),
        stop_bits: match args.value_of ("stop_bits") {
            Some("2") => StopBits::Two,
            _ => defaults.stop_bits,
        },
        timeout: args.value_of ("timeout")
            .and_then (|value| value.parse().ok())
            .map_or (defaults.timeout, Duration::from_millis),
        ..defaults
    }
}

/// Splits `name=value` into the variable name and its boolean value.
fn parse_assignment (assignment: &str) -> Result<(&str, bool)> {
    let mut parts = assignment.splitn (2, '=');
    match (parts.next(), parts.next().and_then (parse_switch)) {
        (Some(name), Some(value)) if !name.is_empty() => Ok((name, value)),
        _ => bail!("expected <variable>=<on|off>, got '{}'", assignment),
    }
}

fn cli<'a, 'b> () -> clap::App<'a, 'b> {
    clap_app!(epever485 =>
        (@setting DeriveDisplayOrder)
        (version: crate_version!())
        (about: "Poll EPEVER solar charge controllers through RS485 (Modbus-RTU)")
        (author: "Roberto Frenna [https://roberto.frenna.pro]")
        (after_help: DOCUMENTATION)
        (@arg address: -a --address +takes_value {numeric::<u8>}
            "Slave address of the controller (default 1)")
        (@arg baud: -b --baud +takes_value {numeric::<u32>}
            "Baud rate of the serial link (default 115200)")
        (@arg stop_bits: --("stop-bits") +takes_value possible_value("1") possible_value("2")
            "Number of stop bits (default 1)")
        (@arg timeout: -t --timeout +takes_value {numeric::<u64>}
            "Response timeout of a single transaction, in milliseconds (default 500)")
        (@arg interval: -i --interval +takes_value {numeric::<u64>}
            "Pause between two polling ticks, in milliseconds (default 1000)")
        (@arg cycles: -n --cycles +takes_value {numeric::<u64>}
            "Stop polling after this many complete cycles")
        (@arg de_pin: --("de-pin") +takes_value {numeric::<u8>}
            "GPIO (BCM) driving the transceiver DE line (requires the `gpio` feature)")
        (@arg re_pin: --("re-pin") +takes_value requires("de_pin") {numeric::<u8>}
            "GPIO (BCM) driving the transceiver RE line, defaults to the DE pin")
        (@arg serial_port: * {
            // Ensures that the argument is a valid serial device.
            |s: String| {
                #[cfg(windows)]
                let is_win32_port = s.starts_with ("COM");
                #[cfg(not(windows))]
                let is_win32_port = false;
                if is_win32_port {
                    Ok(())
                } else {
                    fs::metadata (s)
                        .map (|_| ())
                        .map_err (|_| "must be a serial device".to_string())
                }
            }
        } "Serial port/device")

        (@group format =>
            (@arg compact: -c --compact
                "Outputs readings in the compact format (space-delimited values)")
            (@arg json: -j --json
                "Outputs the whole snapshot as JSON, one line per cycle")
        )

        (@group action =>
            (@arg once: --once "Reads every register once, prints the readings and exits")
            (@arg get: --get +takes_value value_name("VARIABLE") "Reads a variable")
            (@arg set: --set +takes_value value_name("VARIABLE=on|off") "Writes a variable")
            (@arg sync_clock: --("sync-clock")
                "Sets the controller clock to the local time of this machine")
        )
    )
}

fn main() {
    env_logger::init_from_env (
        env_logger::Env::default().filter_or (env_logger::DEFAULT_FILTER_ENV, "info"));

    let args = cli().get_matches();
    if let Err(error) = dispatch (&args) {
        eprintln!("{}", error.display_chain());
        process::exit (1);
    }
}

fn dispatch (args: &clap::ArgMatches) -> Result<()> {
    if args.is_present ("de_pin") {
        run_with_gpio (args)
    } else {
        let transport = RtuTransport::open (&link_settings (args))?;
        run (args, EpeverController::new (transport, NoopTransceiver))
    }
}

#[cfg(feature = "gpio")]
fn run_with_gpio (args: &clap::ArgMatches) -> Result<()> {
    use epever485::transceiver::GpioTransceiver;
    let de_pin = value_or (args, "de_pin", 0);
    let re_pin = value_or (args, "re_pin", de_pin);
    let transceiver = GpioTransceiver::new (de_pin, re_pin)
        .chain_err (|| "unable to claim the RS485 direction pins")?;
    let transport = RtuTransport::open (&link_settings (args))?;
    run (args, EpeverController::new (transport, transceiver))
}

#[cfg(not(feature = "gpio"))]
fn run_with_gpio (_args: &clap::ArgMatches) -> Result<()> {
    bail!("--de-pin requires epever485 to be built with the `gpio` feature")
}

fn run<T: Transport, X: BusTransceiver> (
    args: &clap::ArgMatches,
    mut controller: EpeverController<T, X>
) -> Result<()> {
    let output_format = OutputFormat::from_args (args);
    if let Some(name) = args.value_of ("get") {
        let value = controller.read_named (name)
            .ok_or_else (|| format!("unable to read {}", name))?;
        println!("{} = {}", name, if value { "on" } else { "off" });
    } else if let Some(assignment) = args.value_of ("set") {
        let (name, value) = parse_assignment (assignment)?;
        if !controller.write_named (name, value) {
            bail!("unable to write {}", name);
        }
        info!("{} set to {}", name, if value { "on" } else { "off" });
    } else if args.is_present ("sync_clock") {
        if !controller.sync_realtime_clock (&Local::now().naive_local()) {
            bail!("unable to set the controller clock");
        }
    } else if args.is_present ("once") {
        let ok = controller.fetch_all();
        println!("{}", output_format.render (controller.snapshot()));
        if !ok {
            bail!("some registers could not be read, their values are stale");
        }
    } else {
        let interval = Duration::from_millis (
            value_or (args, "interval", DEFAULT_POLL_INTERVAL_MS));
        let cycles = args.value_of ("cycles").and_then (|value| value.parse().ok());
        poll (&mut controller, &output_format, interval, cycles)?;
    }
    Ok(())
}

/// Ticks the scheduler forever (or for `cycles` cycles), printing after each complete cycle.
fn poll<T: Transport, X: BusTransceiver> (
    controller: &mut EpeverController<T, X>,
    output_format: &OutputFormat,
    interval: Duration,
    cycles: Option<u64>
) -> Result<()> {
    let mut completed = 0;
    let mut was_degraded = false;
    loop {
        controller.poll_tick();
        let degraded = controller.is_degraded();
        if degraded != was_degraded {
            if degraded {
                warn!("communication with the controller degraded, keeping last known values");
            } else {
                info!("communication with the controller restored");
            }
            was_degraded = degraded;
        }
        // the cycle ends when the scheduler is back to its first phase
        if controller.poll_state().phase() == PollPhase::PvInput {
            completed += 1;
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", output_format.render (controller.snapshot()))?;
            handle.flush()?;
            if cycles.map_or (false, |limit| completed >= limit) {
                return Ok(());
            }
        }
        thread::sleep (interval);
    }
}

#[test]
fn test_assignment_parsing() {
    assert_eq!(parse_assignment ("load_manual_onoff=on").ok(), Some(("load_manual_onoff", true)));
    assert_eq!(parse_assignment ("charging_device_onoff=0").ok(),
        Some(("charging_device_onoff", false)));
    assert!(parse_assignment ("load_manual_onoff").is_err());
    assert!(parse_assignment ("=on").is_err());
    assert!(parse_assignment ("load_manual_onoff=maybe").is_err());
}

#[test]
#[cfg(unix)]
fn test_re_pin_requires_de_pin() {
    assert!(cli().get_matches_from_safe (vec!["epever485", "--re-pin", "17", "/dev/null"]).is_err());
    let args = cli()
        .get_matches_from_safe (vec!["epever485", "--de-pin", "4", "--re-pin", "17", "/dev/null"]);
    assert_eq!(args.ok().and_then (|a| a.value_of ("re_pin").map (str::to_owned)), Some("17".to_owned()));
}
