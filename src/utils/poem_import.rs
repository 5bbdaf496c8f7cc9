#![forbid(unsafe_code)]

use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use log::info;

use crate::utils::errors::Errors;
use crate::utils::poem_types::{poem_file_name, PoemRecord};
use crate::utils::render::preview;

// Prompt defaults.
const DEFAULT_CATEGORY : &str = "Poetry";
const DEFAULT_LOCATION : &str = "Brooklyn, NY";
pub const DATE_FORMAT  : &str = "%Y-%m-%d";

// Two consecutive empty lines end a pasted poem.
const BODY_TERMINATOR_LINES : usize = 2;

// ---------------------------------------------------------------------------
// run_import:
// ---------------------------------------------------------------------------
/** Prompt for poems on the output, read answers from the input and write
 * each poem as pretty printed JSON into the poems directory.  Returns the
 * paths written.  `today` fills in the date when none is entered.
 */
pub fn run_import<R: BufRead, W: Write>(input: &mut R, output: &mut W,
                                        poems_dir: &Path, today: &str)
-> Result<Vec<PathBuf>> {
    writeln!(output, "=== Poetry Archive - Poem to JSON Converter ===\n")?;

    let mut written = vec![];
    loop {
        let poem = prompt_poem(input, output, today)?;
        let path = write_poem(poems_dir, &poem)?;
        info!("Imported poem {} '{}' into {:?}", poem.id, poem.title, path);
        print_summary(output, &path, &poem)?;
        written.push(path);

        // End of input here means no.
        let another = prompt_answer(input, output, "\nCreate another poem? (y/n): ")?
            .unwrap_or_default();
        if !matches!(another.to_lowercase().as_str(), "y" | "yes") {
            break;
        }
        writeln!(output, "\n{}\n", "=".repeat(60))?;
    }

    Ok(written)
}

// ---------------------------------------------------------------------------
// parse_poem_id:
// ---------------------------------------------------------------------------
pub fn parse_poem_id(s: &str) -> Result<u32, Errors> {
    match s.trim().parse::<u32>() {
        Ok(0) | Err(_) => Err(Errors::ImportInput(format!("poem id must be a positive integer: '{}'", s.trim()))),
        Ok(id) => Ok(id),
    }
}

// ---------------------------------------------------------------------------
// read_poem_body:
// ---------------------------------------------------------------------------
/** Read poem lines until two consecutive empty lines or end of input.
 * Single empty lines inside the poem are kept as stanza breaks; the
 * terminating blank lines are not part of the poem.
 */
pub fn read_poem_body<R: BufRead>(input: &mut R) -> Result<String> {
    let mut lines: Vec<String> = vec![];
    let mut empty_lines = 0;
    let mut buf = String::new();

    loop {
        buf.clear();
        if input.read_line(&mut buf)? == 0 {
            break;
        }
        let line = buf.trim_end_matches(['\n', '\r']);
        if line.is_empty() {
            empty_lines += 1;
            if empty_lines >= BODY_TERMINATOR_LINES {
                break;
            }
        } else {
            empty_lines = 0;
        }
        lines.push(line.to_string());
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    Ok(lines.join("\n"))
}

// ---------------------------------------------------------------------------
// write_poem:
// ---------------------------------------------------------------------------
/** Write the record to <poems_dir>/poem-<id>.json, replacing any existing
 * file for the same id.
 */
pub fn write_poem(poems_dir: &Path, poem: &PoemRecord) -> Result<PathBuf> {
    fs::create_dir_all(poems_dir)?;
    let path = poems_dir.join(poem_file_name(poem.id));
    let mut json = serde_json::to_string_pretty(poem)?;
    json.push('\n');
    fs::write(&path, json)?;
    Ok(path)
}

// ***************************************************************************
//                             Private Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// prompt_poem:
// ---------------------------------------------------------------------------
fn prompt_poem<R: BufRead, W: Write>(input: &mut R, output: &mut W, today: &str)
-> Result<PoemRecord> {
    let id = parse_poem_id(&prompt_line(input, output, "Enter poem ID number: ")?)?;
    let title = prompt_line(input, output, "Enter poem title: ")?;
    let date = prompt_line(input, output, "Enter date (YYYY-MM-DD) or press Enter for today: ")?;
    let category = prompt_line(input, output, "Enter category (default: Poetry): ")?;
    let location = prompt_line(input, output, "Enter location (default: Brooklyn, NY): ")?;

    writeln!(output, "\nNow paste your poem content (press Enter twice when finished):")?;
    writeln!(output, "{}", "=".repeat(50))?;
    output.flush()?;
    let content = read_poem_body(input)?;

    Ok(PoemRecord::new(
        id,
        title,
        or_default(date, today),
        or_default(category, DEFAULT_CATEGORY),
        or_default(location, DEFAULT_LOCATION),
        content,
    ))
}

// ---------------------------------------------------------------------------
// prompt_line:
// ---------------------------------------------------------------------------
/** Print the prompt and return the trimmed answer.  Running out of input
 * in the middle of a poem is an error.
 */
fn prompt_line<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str)
-> Result<String> {
    match prompt_answer(input, output, prompt)? {
        Some(answer) => Ok(answer),
        None => Err(Errors::ImportInput("unexpected end of input".to_string()).into()),
    }
}

/** Print the prompt and return the trimmed answer, or None at end of input. */
fn prompt_answer<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str)
-> Result<Option<String>> {
    write!(output, "{}", prompt)?;
    output.flush()?;

    let mut buf = String::new();
    if input.read_line(&mut buf)? == 0 {
        return Ok(None);
    }
    Ok(Some(buf.trim().to_string()))
}

fn or_default(value: String, default: &str) -> String {
    if value.is_empty() {default.to_string()} else {value}
}

// ---------------------------------------------------------------------------
// print_summary:
// ---------------------------------------------------------------------------
fn print_summary<W: Write>(output: &mut W, path: &Path, poem: &PoemRecord) -> Result<()> {
    writeln!(output, "\nPoem saved as: {}", path.display())?;
    writeln!(output, "Title: {}", poem.title)?;
    writeln!(output, "Date: {}", poem.date)?;
    writeln!(output, "Location: {}", poem.location)?;
    writeln!(output, "Category: {}", poem.category)?;
    writeln!(output, "Content preview:")?;
    writeln!(output, "{}", "-".repeat(30))?;
    writeln!(output, "{}", preview(&poem.content))?;
    writeln!(output, "{}", "-".repeat(30))?;
    Ok(())
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::poem_store::decode_record;
    use std::io::Cursor;

    #[test]
    fn body_keeps_single_blank_lines() {
        let mut input = Cursor::new("salt\nwash\n\nlight\n\n\nignored\n");
        let body = read_poem_body(&mut input).unwrap();
        assert_eq!(body, "salt\nwash\n\nlight");

        // The rest of the input is left for the next prompt.
        let mut rest = String::new();
        input.read_line(&mut rest).unwrap();
        assert_eq!(rest, "ignored\n");
    }

    #[test]
    fn body_ends_at_end_of_input() {
        let mut input = Cursor::new("one\r\ntwo\r\n");
        assert_eq!(read_poem_body(&mut input).unwrap(), "one\ntwo");
        let mut empty = Cursor::new("");
        assert_eq!(read_poem_body(&mut empty).unwrap(), "");
    }

    #[test]
    fn ids_must_be_positive_integers() {
        assert_eq!(parse_poem_id(" 12 ").unwrap(), 12);
        assert!(matches!(parse_poem_id("0"), Err(Errors::ImportInput(_))));
        assert!(matches!(parse_poem_id("-3"), Err(Errors::ImportInput(_))));
        assert!(matches!(parse_poem_id("seven"), Err(Errors::ImportInput(_))));
    }

    #[test]
    fn import_writes_decodable_records() {
        let dir = tempfile::tempdir().unwrap();
        let poems_dir = dir.path().join("poems");
        let script = "4\nStatic\n\n\n\nnoise and hum\nstatic\n\n\ny\n\
                      5\nEcho\n2023-10-01\nProse\nDetroit, MI\nsilence\n\n\nn\n";
        let mut input = Cursor::new(script);
        let mut output: Vec<u8> = vec![];

        let written = run_import(&mut input, &mut output, &poems_dir, "2026-10-16").unwrap();
        assert_eq!(written, vec![poems_dir.join("poem-4.json"), poems_dir.join("poem-5.json")]);

        let first = decode_record(4, &fs::read(&written[0]).unwrap()).unwrap();
        assert_eq!(first.title, "Static");
        assert_eq!(first.date, "2026-10-16");
        assert_eq!(first.category, "Poetry");
        assert_eq!(first.location, "Brooklyn, NY");
        assert_eq!(first.content, "noise and hum\nstatic");

        let second = decode_record(5, &fs::read(&written[1]).unwrap()).unwrap();
        assert_eq!(second.date, "2023-10-01");
        assert_eq!(second.category, "Prose");
        assert_eq!(second.location, "Detroit, MI");
        assert_eq!(second.content, "silence");

        let transcript = String::from_utf8(output).unwrap();
        assert!(transcript.contains("Enter poem ID number: "));
        assert!(transcript.contains("Title: Echo"));
    }

    #[test]
    fn import_rejects_bad_id_and_truncated_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut output: Vec<u8> = vec![];

        let mut input = Cursor::new("abc\n");
        assert!(run_import(&mut input, &mut output, dir.path(), "2026-10-16").is_err());

        let mut input = Cursor::new("3\nHalf a poem\n");
        assert!(run_import(&mut input, &mut output, dir.path(), "2026-10-16").is_err());
        assert!(!dir.path().join("poem-3.json").exists());
    }

    #[test]
    fn input_ending_at_another_prompt_finishes_import() {
        let dir = tempfile::tempdir().unwrap();
        let mut output: Vec<u8> = vec![];
        let mut input = Cursor::new("6\nTidal\n2024-01-09\n\n\nsalt\nwash\n\n\n");

        let written = run_import(&mut input, &mut output, dir.path(), "2026-10-16").unwrap();
        assert_eq!(written, vec![dir.path().join("poem-6.json")]);
        let poem = decode_record(6, &fs::read(&written[0]).unwrap()).unwrap();
        assert_eq!(poem.content, "salt\nwash");
    }

    #[test]
    fn summary_preview_is_truncated() {
        let poem = PoemRecord::new(9, "Long".into(), "d".into(), "c".into(), "l".into(),
                                   "x".repeat(300));
        let mut output: Vec<u8> = vec![];
        print_summary(&mut output, Path::new("/tmp/poem-9.json"), &poem).unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains(&format!("{}...", "x".repeat(200))));
    }
}
