use crate::error::InvalidInputError;
use anyhow::Result;
use csv::{Reader, Writer};
use std::fs::File;
use std::io;
use std::io::{BufRead, Write};
use std::path::Path;

/// Reads one line without its line ending. `None` once input is exhausted.
pub fn read_line<R: BufRead>(mut stdin: R) -> Result<Option<String>> {
    let mut line = String::new();
    if stdin.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let len = line.trim_end_matches(['\n', '\r']).len();
    line.truncate(len);
    Ok(Some(line))
}

pub fn clear<W: Write>(stdout: &mut W) -> io::Result<()> {
    write!(stdout, "{esc}[2J{esc}[1;1H", esc = 27 as char)
}

pub fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

pub fn check_length(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), InvalidInputError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(InvalidInputError::FieldLength {
            field,
            min,
            max,
            len,
        });
    }
    Ok(())
}

pub fn create_reader(path: &Path) -> csv::Result<Reader<File>> {
    csv::ReaderBuilder::new()
        .delimiter(b'|')
        .quote(b'#')
        .has_headers(true)
        .from_path(path)
}

pub fn create_writer<W: Write>(out: W) -> Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(b'|')
        .quote(b'#')
        .has_headers(false)
        .from_writer(out)
}

#[test]
fn test_read_line_strips_line_ending() {
    use std::io::Cursor;

    let mut stdin = Cursor::new(b"first\r\nsecond\n\nlast");
    assert_eq!(read_line(&mut stdin).unwrap().as_deref(), Some("first"));
    assert_eq!(read_line(&mut stdin).unwrap().as_deref(), Some("second"));
    assert_eq!(read_line(&mut stdin).unwrap().as_deref(), Some(""));
    assert_eq!(read_line(&mut stdin).unwrap().as_deref(), Some("last"));
    assert_eq!(read_line(&mut stdin).unwrap(), None);
}

#[test]
fn test_check_length_counts_chars() {
    assert!(check_length("answer", "ñ", 1, 1).is_ok());
    assert_eq!(
        check_length("question", "Why", 5, 500),
        Err(InvalidInputError::FieldLength {
            field: "question",
            min: 5,
            max: 500,
            len: 3
        })
    );
}
