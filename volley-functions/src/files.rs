//! `__StringFromFile` and `__CSVRead`

use crate::{arg, store};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use volley_core::expr::next_function_id;
use volley_core::{CompoundVariable, Function, FunctionDescriptor, FunctionError, ThreadContext};

/// Returned by `__StringFromFile` when no line can be read
pub const ERR_MARKER: &str = "**ERR**";

/// Fills the first `{}` or `{:0N}` in `template` with `n`; a template
/// without a placeholder names the same file every time.
pub fn sequence_name(template: &str, n: i64) -> String {
    let Some(open) = template.find('{') else {
        return template.to_string();
    };
    let Some(close) = template[open..].find('}').map(|c| open + c) else {
        return template.to_string();
    };
    let inner = &template[open + 1..close];
    let number = match inner.strip_prefix(":0").map(str::parse::<usize>) {
        None if inner.is_empty() => n.to_string(),
        Some(Ok(width)) => format!("{:0width$}", n, width = width),
        _ => return template.to_string(),
    };
    format!("{}{}{}", &template[..open], number, &template[close + 1..])
}

#[derive(Debug, Default)]
struct LineReader {
    lines: Option<Lines<BufReader<File>>>,
    /// Next file number when reading a sequence
    next_file: Option<i64>,
    exhausted: bool,
}

/// `${__StringFromFile(path[, var[, start[, end]]])}`: next line of a file
/// shared by all threads.
///
/// Without `start` the file is reread from the top after its last line.
/// With `start` the path names a sequence of files (`data{}.txt`) read one
/// after another from `start` up to `end`; once the last one is used up the
/// test is stopped and the function returns [`ERR_MARKER`].
#[derive(Debug)]
pub struct StringFromFile {
    args: Vec<CompoundVariable>,
    reader: Mutex<LineReader>,
}

impl StringFromFile {
    pub const KEY: &'static str = "__StringFromFile";

    pub fn descriptor() -> FunctionDescriptor {
        FunctionDescriptor::new(Self::KEY, "Next line of a file, shared by all threads", |args| {
            Ok(Box::new(StringFromFile {
                args,
                reader: Mutex::new(LineReader::default()),
            }))
        })
        .params(1, Some(4))
    }

    fn next_line(&self, ctx: &mut ThreadContext) -> Option<String> {
        let template = arg(&self.args, 0, ctx);
        let start = arg(&self.args, 2, ctx).trim().parse::<i64>().ok();
        let end = arg(&self.args, 3, ctx).trim().parse::<i64>().ok();

        let mut reader = self.reader.lock();
        if reader.exhausted {
            return None;
        }
        // Each pass opens at most one file; a file with no lines at all ends the attempt
        let mut opened_empty = false;
        loop {
            if reader.lines.is_none() {
                let path = match start {
                    Some(start) => {
                        let n = *reader.next_file.get_or_insert(start);
                        if end.is_some_and(|end| n > end) {
                            info!(function = Self::KEY, "Read the last file of '{}', stopping the test", template);
                            reader.exhausted = true;
                            ctx.signal().stop();
                            return None;
                        }
                        reader.next_file = Some(n + 1);
                        sequence_name(&template, n)
                    }
                    None => template.clone(),
                };
                match File::open(&path) {
                    Ok(file) => {
                        debug!(function = Self::KEY, path = %path, "Opened file");
                        reader.lines = Some(BufReader::new(file).lines());
                    }
                    Err(e) => {
                        error!(function = Self::KEY, path = %path, "Cannot open file: {}", e);
                        return None;
                    }
                }
            }

            match reader.lines.as_mut().and_then(Iterator::next) {
                Some(Ok(line)) => return Some(line),
                Some(Err(e)) => {
                    error!(function = Self::KEY, path = %template, "Cannot read file: {}", e);
                    reader.lines = None;
                    return None;
                }
                None => {
                    reader.lines = None;
                    if start.is_none() {
                        if opened_empty {
                            warn!(function = Self::KEY, path = %template, "File has no lines");
                            return None;
                        }
                        opened_empty = true;
                    }
                }
            }
        }
    }
}

impl Function for StringFromFile {
    fn execute(&self, ctx: &mut ThreadContext) -> Result<String, FunctionError> {
        let line = self.next_line(ctx).unwrap_or_else(|| ERR_MARKER.to_string());
        store(&self.args, 1, &line, ctx);
        Ok(line)
    }
}

#[derive(Debug)]
struct CsvFile {
    /// Key of each thread's current row in its context
    id: u64,
    rows: Vec<Vec<String>>,
    cursor: AtomicUsize,
}

impl CsvFile {
    fn load(path: &str) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;
        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<Result<Vec<Vec<String>>, _>>()?;
        Ok(Self {
            id: next_function_id(),
            rows,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Row the calling thread is on, handing out the next shared row if it has none
    fn row(&self, ctx: &mut ThreadContext) -> Option<&[String]> {
        if self.rows.is_empty() {
            return None;
        }
        let slot = ctx.function_state(self.id);
        if *slot == 0 {
            let row = self.cursor.fetch_add(1, Ordering::SeqCst) % self.rows.len();
            *slot = row as i64 + 1;
        }
        self.rows.get((*slot - 1) as usize).map(Vec::as_slice)
    }
}

static CSV_FILES: Lazy<Mutex<HashMap<String, Arc<CsvFile>>>> = Lazy::new(|| Mutex::new(HashMap::new()));

fn csv_file(path: &str) -> Result<Arc<CsvFile>, FunctionError> {
    let mut files = CSV_FILES.lock();
    if let Some(file) = files.get(path) {
        return Ok(Arc::clone(file));
    }
    let file = CsvFile::load(path)
        .map(Arc::new)
        .map_err(|e| FunctionError::failed(CsvRead::KEY, format!("cannot read '{path}': {e}")))?;
    debug!(function = CsvRead::KEY, path = %path, rows = file.rows.len(), "Loaded CSV file");
    files.insert(path.to_string(), Arc::clone(&file));
    Ok(file)
}

/// `${__CSVRead(path, column)}`: one column of the calling thread's row.
///
/// The file is loaded once per path for the whole process. Threads take rows
/// in turn, wrapping after the last; a thread keeps its row until it calls
/// `${__CSVRead(path, next)}`, which returns an empty string.
#[derive(Debug)]
pub struct CsvRead {
    args: Vec<CompoundVariable>,
}

impl CsvRead {
    pub const KEY: &'static str = "__CSVRead";

    pub fn descriptor() -> FunctionDescriptor {
        FunctionDescriptor::new(Self::KEY, "Column of the current row of a CSV file", |args| {
            Ok(Box::new(CsvRead { args }))
        })
        .params(2, Some(2))
    }
}

impl Function for CsvRead {
    fn execute(&self, ctx: &mut ThreadContext) -> Result<String, FunctionError> {
        let path = arg(&self.args, 0, ctx);
        let column = arg(&self.args, 1, ctx);
        let file = csv_file(&path)?;

        let column = column.trim();
        if column.eq_ignore_ascii_case("next") || column.eq_ignore_ascii_case("next()") {
            *ctx.function_state(file.id) = 0;
            return Ok(String::new());
        }
        let index = column.parse::<usize>().map_err(|_| {
            FunctionError::failed(Self::KEY, format!("'{column}' is not a column number"))
        })?;
        Ok(file
            .row(ctx)
            .and_then(|row| row.get(index))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::eval;
    use std::io::Write;
    use std::path::Path;
    use tempfile::TempDir;
    use volley_core::ExpressionCompiler;

    fn write(dir: &TempDir, name: &str, contents: &str) -> String {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn compile(source: &str) -> volley_core::CompoundVariable {
        ExpressionCompiler::new(Arc::new(crate::default_registry()))
            .compile(source)
            .unwrap()
    }

    #[test]
    fn test_sequence_name() {
        assert_eq!(sequence_name("data{}.txt", 3), "data3.txt");
        assert_eq!(sequence_name("data{:03}.txt", 7), "data007.txt");
        assert_eq!(sequence_name("data.txt", 7), "data.txt");
        assert_eq!(sequence_name("data{x}.txt", 7), "data{x}.txt");
    }

    #[test]
    fn test_string_from_file_wraps_around() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "users.txt", "alice\nbob\n");
        let line = compile(&format!("${{__StringFromFile({path},user)}}"));

        let mut first = ThreadContext::default();
        let mut second = ThreadContext::default();
        assert_eq!(line.execute(&mut first), "alice");
        assert_eq!(line.execute(&mut second), "bob");
        assert_eq!(line.execute(&mut first), "alice");
        assert_eq!(first.variables.get("user"), Some("alice"));
        assert_eq!(second.variables.get("user"), Some("bob"));
    }

    #[test]
    fn test_string_from_file_sequence_stops_the_test() {
        let dir = TempDir::new().unwrap();
        write(&dir, "part1.txt", "a\nb\n");
        write(&dir, "part2.txt", "c\n");
        let template = Path::new(dir.path()).join("part{}.txt");
        let line = compile(&format!(
            "${{__StringFromFile({},,1,2)}}",
            template.to_string_lossy()
        ));

        let mut ctx = ThreadContext::default();
        let read: Vec<String> = (0..3).map(|_| line.execute(&mut ctx)).collect();
        assert_eq!(read, ["a", "b", "c"]);
        assert!(ctx.is_running());
        assert_eq!(line.execute(&mut ctx), ERR_MARKER);
        assert!(!ctx.is_running());
    }

    #[test]
    fn test_string_from_file_missing_or_empty() {
        let dir = TempDir::new().unwrap();
        let empty = write(&dir, "empty.txt", "");
        let mut ctx = ThreadContext::default();
        assert_eq!(eval(&format!("${{__StringFromFile({empty})}}"), &mut ctx), ERR_MARKER);

        let missing = dir.path().join("missing.txt");
        let source = format!("${{__StringFromFile({},v)}}", missing.to_string_lossy());
        assert_eq!(eval(&source, &mut ctx), ERR_MARKER);
        assert_eq!(ctx.variables.get("v"), Some(ERR_MARKER));
        assert!(ctx.is_running());
    }

    #[test]
    fn test_csv_read_rows_per_thread() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "logins.csv", "alice,secret1\nbob,secret2\n\"carol, jr\",secret3\n");
        let user = compile(&format!("${{__CSVRead({path},0)}}/${{__CSVRead({path},1)}}"));
        let next = compile(&format!("${{__CSVRead({path},next)}}"));

        let mut first = ThreadContext::default();
        let mut second = ThreadContext::default();
        assert_eq!(user.execute(&mut first), "alice/secret1");
        assert_eq!(user.execute(&mut second), "bob/secret2");
        assert_eq!(user.execute(&mut first), "alice/secret1");

        assert_eq!(next.execute(&mut first), "");
        assert_eq!(user.execute(&mut first), "carol, jr/secret3");
        assert_eq!(next.execute(&mut first), "");
        assert_eq!(user.execute(&mut first), "alice/secret1");
    }

    #[test]
    fn test_csv_read_bad_columns() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "short.csv", "one,two\n");
        let mut ctx = ThreadContext::default();
        assert_eq!(eval(&format!("[${{__CSVRead({path},5)}}]"), &mut ctx), "[]");
        assert_eq!(eval(&format!("[${{__CSVRead({path},first)}}]"), &mut ctx), "[]");
        let missing = dir.path().join("missing.csv");
        let source = format!("[${{__CSVRead({},0)}}]", missing.to_string_lossy());
        assert_eq!(eval(&source, &mut ctx), "[]");
    }
}
