use std::io;
use std::process;
use std::thread;

use signal_hook::consts::signal::SIGINT;
use signal_hook::iterator::Signals;
use tracing::error;

/// Installs a handler that terminates the process with exit status 1 when it receives an
/// interrupt signal (SIGINT), after logging the signal.
///
/// This is a hard stop: in-flight operations are not completed and no results are reported.
///
/// # Errors
///
/// Returns an error if the signal handler or its listener thread cannot be set up.
#[cfg_attr(test, mutants::skip)] // Would terminate the test process.
pub fn install_interrupt_handler() -> io::Result<()> {
    let mut signals = Signals::new([SIGINT])?;

    thread::Builder::new()
        .name("op_bench-interrupt".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                error!(signal, "received interrupt signal, exiting");

                #[expect(
                    clippy::exit,
                    reason = "an interrupted benchmark is abandoned without reporting"
                )]
                process::exit(1);
            }
        })?;

    Ok(())
}
