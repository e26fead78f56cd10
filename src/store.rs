use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};

use crate::error::Result;
use crate::record::{ProfileRecord, FIELDS};

/// Append-only destination for records; duplicates across runs are accepted.
pub trait RecordSink {
    fn append(&mut self, record: &ProfileRecord) -> Result<()>;
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Write one CSV row, quoting only the fields that need it.
pub fn write_row<W: Write>(mut w: W, row: &[String]) -> std::io::Result<()> {
    let mut first = true;
    for cell in row {
        if !first {
            write!(w, ",")?;
        } else {
            first = false;
        }
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}

pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvSink { path: path.into() }
    }
}

impl RecordSink for CsvSink {
    fn append(&mut self, record: &ProfileRecord) -> Result<()> {
        ensure_parent(&self.path)?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let is_new = file.metadata()?.len() == 0;
        let mut w = BufWriter::new(file);
        if is_new {
            let header: Vec<String> = FIELDS.iter().map(|f| f.to_string()).collect();
            write_row(&mut w, &header)?;
        }
        write_row(&mut w, &record.to_row())?;
        w.flush()?;
        Ok(())
    }
}

/// Pretty-printed JSON array, rewritten on every append.
pub struct JsonSink {
    path: PathBuf,
}

impl JsonSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonSink { path: path.into() }
    }

    fn load(&self) -> Vec<Value> {
        let Ok(text) = fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        if text.trim().is_empty() {
            return Vec::new();
        }
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Array(items)) => items,
            Ok(other) => vec![other],
            Err(e) => {
                warn!("{} is not valid JSON ({}), starting a new array", self.path.display(), e);
                Vec::new()
            }
        }
    }
}

impl RecordSink for JsonSink {
    fn append(&mut self, record: &ProfileRecord) -> Result<()> {
        let mut items = self.load();
        items.push(serde_json::to_value(record)?);
        ensure_parent(&self.path)?;
        fs::write(&self.path, serde_json::to_string_pretty(&items)?)?;
        Ok(())
    }
}

/// Both output files, written in step.
pub struct RecordStore {
    csv: CsvSink,
    json: JsonSink,
}

impl RecordStore {
    pub fn new(csv: impl Into<PathBuf>, json: impl Into<PathBuf>) -> Self {
        RecordStore {
            csv: CsvSink::new(csv),
            json: JsonSink::new(json),
        }
    }
}

impl RecordSink for RecordStore {
    fn append(&mut self, record: &ProfileRecord) -> Result<()> {
        self.csv.append(record)?;
        self.json.append(record)
    }
}

#[derive(Debug)]
pub struct ConvertSummary {
    pub output: PathBuf,
    pub rows: usize,
    pub fields: Vec<String>,
}

/// `records.json` → `records_converted.csv` next to it.
pub fn default_csv_path(json: &Path) -> PathBuf {
    let stem = json.file_stem().and_then(|s| s.to_str()).unwrap_or("records");
    json.with_file_name(format!("{}_converted.csv", stem))
}

/// Convert a JSON array (or single object) file to CSV. `None` when the file holds no records.
pub fn json_to_csv(
    json: &Path,
    csv: Option<&Path>,
    fields: Option<&[String]>,
) -> Result<Option<ConvertSummary>> {
    let text = fs::read_to_string(json)?;
    let items = match serde_json::from_str::<Value>(&text)? {
        Value::Array(items) => items,
        other => vec![other],
    };
    let Some(first) = items.first() else {
        info!("No records in {}", json.display());
        return Ok(None);
    };

    let fields = match fields {
        Some(f) if !f.is_empty() => f.to_vec(),
        _ => default_fields(first),
    };
    let output = csv.map(Path::to_path_buf).unwrap_or_else(|| default_csv_path(json));

    ensure_parent(&output)?;
    let mut w = BufWriter::new(fs::File::create(&output)?);
    write_row(&mut w, &fields)?;
    for item in &items {
        let row: Vec<String> = fields.iter().map(|f| cell(item.get(f))).collect();
        write_row(&mut w, &row)?;
    }
    w.flush()?;

    info!("Converted {} records from {} to {}", items.len(), json.display(), output.display());
    Ok(Some(ConvertSummary {
        output,
        rows: items.len(),
        fields,
    }))
}

/// Record columns first in their usual order, then any other keys of `first`.
fn default_fields(first: &Value) -> Vec<String> {
    let Some(obj) = first.as_object() else {
        return FIELDS.iter().map(|f| f.to_string()).collect();
    };
    let mut fields: Vec<String> = FIELDS
        .iter()
        .filter(|f| obj.contains_key(**f))
        .map(|f| f.to_string())
        .collect();
    fields.extend(obj.keys().filter(|k| !FIELDS.contains(&k.as_str())).cloned());
    fields
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
