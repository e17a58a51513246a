//! COM1 serial `log` backend.
//!
//! Minimal, no-allocation serial output to COM1 (0x3F8). Each record is
//! formatted into a bounded line buffer and written out with a bounded
//! transmit-ready wait, so a dead UART can never stall a PXE call.

use core::fmt::{self, Write};
use core::sync::atomic::{AtomicBool, Ordering};

use heapless::String;
use log::{LevelFilter, Log, Metadata, Record};

/// Serial port base address (COM1).
const SERIAL_PORT: u16 = 0x3F8;

/// Longest line we emit; longer records are cut.
const MAX_LINE: usize = 160;

/// Write a single byte to COM1 serial port.
#[cfg(target_arch = "x86_64")]
#[inline]
pub fn write_byte(byte: u8) {
    unsafe {
        // Wait for transmit buffer empty (bounded)
        let mut retries = 0u32;
        loop {
            let status: u8;
            core::arch::asm!(
                "in al, dx",
                in("dx") SERIAL_PORT + 5,
                out("al") status,
                options(nomem, nostack, preserves_flags)
            );
            if status & 0x20 != 0 {
                break;
            }
            retries += 1;
            if retries > 100 {
                return; // Port not responding
            }
            core::hint::spin_loop();
        }
        core::arch::asm!(
            "out dx, al",
            in("dx") SERIAL_PORT,
            in("al") byte,
            options(nomem, nostack, preserves_flags)
        );
    }
}

#[cfg(not(target_arch = "x86_64"))]
#[inline]
pub fn write_byte(_byte: u8) {}

/// Write raw bytes, translating `\n` to `\r\n`.
pub fn write_bytes(bytes: &[u8]) {
    for &b in bytes {
        if b == b'\n' {
            write_byte(b'\r');
        }
        write_byte(b);
    }
}

/// `log` backend writing to COM1.
pub struct SerialLogger {
    /// Serialises whole lines so interleaved callers do not mix bytes.
    line_lock: spin::Mutex<()>,
}

impl SerialLogger {
    const fn new() -> Self {
        Self {
            line_lock: spin::Mutex::new(()),
        }
    }
}

/// Line buffer that keeps whatever fits.
struct Line(String<MAX_LINE>);

impl Write for Line {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            self.0.push(c).map_err(|_| fmt::Error)?;
        }
        Ok(())
    }
}

/// Format one record as `[LEVEL target] message`, cut to `MAX_LINE`.
fn format_line(record: &Record<'_>) -> String<MAX_LINE> {
    let mut line = Line(String::new());
    // A full buffer only truncates the line.
    let _ = write!(line, "[{} {}] {}", record.level(), record.target(), record.args());
    line.0
}

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(record);
        let _guard = self.line_lock.lock();
        write_bytes(line.as_bytes());
        write_bytes(b"\n");
    }

    fn flush(&self) {}
}

static LOGGER: SerialLogger = SerialLogger::new();
static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Install the serial logger.
///
/// Returns `false` if another logger already owns the `log` facade.
/// The `serial_debug` feature raises the ceiling to `Trace`.
pub fn init(level: LevelFilter) -> bool {
    if INSTALLED.swap(true, Ordering::AcqRel) {
        return true;
    }
    if log::set_logger(&LOGGER).is_err() {
        INSTALLED.store(false, Ordering::Release);
        return false;
    }
    let level = if cfg!(feature = "serial_debug") { LevelFilter::Trace } else { level };
    log::set_max_level(level);
    true
}
