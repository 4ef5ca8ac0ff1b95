//! Console used by foreground jobs.
//!
//! Output is plain text with `\r` redraws followed by [`ERASE_EOL`]; input
//! is polled one key at a time and never blocks.

use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// ANSI erase from the cursor to the end of the line.
pub const ERASE_EOL: &str = "\x1b[K";

/// Text output plus non-blocking key input.
pub trait Console: fmt::Write {
    /// Next pending key, if any.
    fn read_key(&mut self) -> Option<u8>;
}

/// In-memory console with scripted input.
#[derive(Debug, Default)]
pub struct BufferConsole {
    output: String,
    keys: VecDeque<u8>,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a key for `read_key`.
    pub fn press(&mut self, key: u8) {
        self.keys.push_back(key);
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    /// Output as it would look on a terminal.
    ///
    /// `\r` moves back to column 0 and later text overwrites in place,
    /// [`ERASE_EOL`] cuts the line at the cursor.
    pub fn screen(&self) -> String {
        let mut screen = String::new();
        let mut line: Vec<char> = Vec::new();
        let mut col = 0;
        let mut rest = self.output.as_str();

        while let Some(c) = rest.chars().next() {
            if let Some(tail) = rest.strip_prefix(ERASE_EOL) {
                line.truncate(col);
                rest = tail;
                continue;
            }
            rest = &rest[c.len_utf8()..];
            match c {
                '\r' => col = 0,
                '\n' => {
                    screen.extend(line.drain(..));
                    screen.push('\n');
                    col = 0;
                }
                c if col < line.len() => {
                    line[col] = c;
                    col += 1;
                }
                c => {
                    line.push(c);
                    col += 1;
                }
            }
        }
        screen.extend(line);
        screen
    }
}

impl fmt::Write for BufferConsole {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.output.push_str(s);
        Ok(())
    }
}

impl Console for BufferConsole {
    fn read_key(&mut self) -> Option<u8> {
        self.keys.pop_front()
    }
}

#[cfg(all(feature = "serial", target_arch = "x86_64"))]
pub use serial::SerialConsole;

#[cfg(all(feature = "serial", target_arch = "x86_64"))]
mod serial {
    //! COM1 @ 0x3F8, polled. No interrupts, no buffering.

    use core::fmt;

    const COM1: u16 = 0x3F8;
    const COM1_LSR: u16 = COM1 + 5;
    const LSR_DATA_READY: u8 = 0x01;
    const LSR_TX_EMPTY: u8 = 0x20;

    #[derive(Debug, Default)]
    pub struct SerialConsole;

    impl SerialConsole {
        pub const fn new() -> Self {
            Self
        }
    }

    #[inline]
    fn inb(port: u16) -> u8 {
        let value: u8;
        unsafe {
            core::arch::asm!(
                "in al, dx",
                in("dx") port,
                out("al") value,
                options(nostack, preserves_flags)
            );
        }
        value
    }

    #[inline]
    fn outb(port: u16, value: u8) {
        unsafe {
            core::arch::asm!(
                "out dx, al",
                in("dx") port,
                in("al") value,
                options(nostack, preserves_flags)
            );
        }
    }

    /// Bounded wait, gives up after ~100 spins.
    fn putc(b: u8) {
        for _ in 0..100 {
            if inb(COM1_LSR) & LSR_TX_EMPTY != 0 {
                outb(COM1, b);
                return;
            }
            core::hint::spin_loop();
        }
    }

    impl fmt::Write for SerialConsole {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            for b in s.bytes() {
                if b == b'\n' {
                    putc(b'\r');
                }
                putc(b);
            }
            Ok(())
        }
    }

    impl super::Console for SerialConsole {
        fn read_key(&mut self) -> Option<u8> {
            if inb(COM1_LSR) & LSR_DATA_READY != 0 {
                Some(inb(COM1))
            } else {
                None
            }
        }
    }
}
