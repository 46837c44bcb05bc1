use crate::memory::Byte;
use std::io::Write;

const COLUMNS: usize = 80;
const LINES: usize = 25;

/// Receives every byte acknowledged by the console consumer, in order.
pub trait ConsoleSink {
    fn push_byte(&mut self, byte: Byte);
}

impl ConsoleSink for Vec<Byte> {
    fn push_byte(&mut self, byte: Byte) {
        self.push(byte);
    }
}

/// Passes bytes straight through to the process' standard output.
pub struct StdoutSink;

impl ConsoleSink for StdoutSink {
    fn push_byte(&mut self, byte: Byte) {
        let mut stdout = std::io::stdout();
        if let Err(err) = stdout.write_all(&[byte]).and_then(|_| stdout.flush()) {
            log::error!("failed to write console byte to stdout: {}", err);
        }
    }
}

struct Cursor {
    line: usize,
    column: usize,
}

/// Fixed-size text screen that interprets the console stream: CR and LF start a new line,
/// long lines wrap, and the screen scrolls up once the last line is full.
pub struct Screen {
    chars: [[char; COLUMNS]; LINES],
    cursor: Cursor,
}

impl Screen {
    pub fn new() -> Self {
        Self {
            chars: [[' '; COLUMNS]; LINES],
            cursor: Cursor { line: 0, column: 0 },
        }
    }

    fn shift_line(&mut self) {
        self.chars.rotate_left(1);
        self.chars[LINES - 1].iter_mut().for_each(|c| *c = ' ');
    }

    fn new_line(&mut self) {
        self.cursor.line += 1;
        self.cursor.column = 0;
        if self.cursor.line >= LINES {
            self.cursor.line = LINES - 1;
            self.shift_line();
        }
    }

    fn move_cursor(&mut self) {
        self.cursor.column += 1;
        if self.cursor.column >= COLUMNS {
            self.new_line();
        }
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor.line, self.cursor.column)
    }

    pub fn line(&self, line: usize) -> String {
        self.chars[line].iter().collect::<String>().trim_end().to_string()
    }

    /// Contents of the screen with trailing blanks removed.
    pub fn render(&self) -> String {
        let lines: Vec<String> = (0..LINES).map(|line| self.line(line)).collect();
        let used = lines
            .iter()
            .rposition(|line| !line.is_empty())
            .map(|idx| idx + 1)
            .unwrap_or(0);
        lines[..used].join("\n")
    }
}

impl Default for Screen {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleSink for Screen {
    fn push_byte(&mut self, byte: Byte) {
        match byte {
            b'\r' | b'\n' => self.new_line(),
            byte => {
                self.chars[self.cursor.line][self.cursor.column] = byte as char;
                self.move_cursor();
            }
        }
    }
}
