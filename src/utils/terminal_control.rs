use std::io::{self, IsTerminal, Write};

/// xterm window op asking for a text area of `cols × rows` cells.
pub fn resize_sequence(cols: u16, rows: u16) -> String {
    format!("\x1b[8;{};{}t", rows, cols)
}

pub fn request_resize(cols: u16, rows: u16) {
    let mut stdout = io::stdout();
    if !stdout.is_terminal() {
        return;
    }

    // Unsupported terminals ignore this sequence
    let _ = write!(stdout, "{}", resize_sequence(cols, rows));
    let _ = stdout.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_sequence_puts_rows_first() {
        assert_eq!(resize_sequence(320, 124), "\x1b[8;124;320t");
    }
}
