use crate::error::IngestError;
use crate::models::ChunkRecord;
use calamine::{Data, Reader, Xlsx};
use serde_json::{Map, Value};
use std::io::Cursor;

/// Column order used when rendering preview rows back to delimited text.
pub const PREVIEW_HEADERS: [&str; 10] = [
    "document_id",
    "doc_name",
    "uploaded_by",
    "chunk_index",
    "date",
    "label",
    "source_name",
    "source_link",
    "influence_text",
    "content",
];

/// Pick `;` over `,` when the header line carries more of them.
pub fn detect_delimiter(sample: &str) -> u8 {
    let first_line = sample.lines().next().unwrap_or("");
    let semicolons = first_line.matches(';').count();
    let commas = first_line.matches(',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

/// Parse an uploaded file into loose JSON object rows, dispatching on the
/// file extension. Only `.csv` and `.xlsx` are accepted.
pub fn parse_rows(file_name: &str, bytes: &[u8]) -> Result<Vec<Value>, IngestError> {
    let extension = file_name
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    match extension.as_str() {
        "csv" => read_delimited(bytes),
        "xlsx" => read_xlsx(bytes),
        other => Err(IngestError::InvalidInput(format!(
            "unsupported file type: .{other} (use .csv or .xlsx)"
        ))),
    }
}

pub fn read_delimited(bytes: &[u8]) -> Result<Vec<Value>, IngestError> {
    let owned = String::from_utf8_lossy(bytes).into_owned();
    let text = owned.strip_prefix('\u{feff}').unwrap_or(&owned);
    let delimiter = detect_delimiter(text);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        let mut row = Map::new();
        for (header, cell) in headers.iter().zip(record.iter()) {
            row.insert(header.to_string(), Value::String(cell.to_string()));
        }
        rows.push(Value::Object(row));
    }

    Ok(rows)
}

pub fn read_xlsx(bytes: &[u8]) -> Result<Vec<Value>, IngestError> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook: Xlsx<_> =
        Xlsx::new(cursor).map_err(|error| IngestError::SheetParse(error.to_string()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| IngestError::SheetParse("workbook has no sheets".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|error| IngestError::SheetParse(error.to_string()))?;

    let mut row_iter = range.rows();
    let headers: Vec<String> = match row_iter.next() {
        Some(header_row) => header_row.iter().map(cell_to_string).collect(),
        None => return Ok(Vec::new()),
    };

    let mut rows = Vec::new();
    for sheet_row in row_iter {
        let cells: Vec<String> = sheet_row.iter().map(cell_to_string).collect();
        if cells.iter().all(String::is_empty) {
            continue;
        }

        let mut row = Map::new();
        for (header, cell) in headers.iter().zip(cells) {
            if header.is_empty() {
                continue;
            }
            row.insert(header.clone(), Value::String(cell));
        }
        rows.push(Value::Object(row));
    }

    Ok(rows)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(text) => text.clone(),
        Data::Float(value) => {
            if value.fract() == 0.0 {
                format!("{value:.0}")
            } else {
                format!("{value}")
            }
        }
        Data::Int(value) => format!("{value}"),
        Data::Bool(flag) => {
            if *flag {
                "TRUE".to_string()
            } else {
                "FALSE".to_string()
            }
        }
        Data::Error(error) => format!("#ERROR: {error:?}"),
        Data::DateTime(datetime) => format!("{datetime}"),
        Data::DateTimeIso(text) => text.clone(),
        Data::DurationIso(text) => text.clone(),
    }
}

/// Render finalized preview rows as comma-delimited text.
pub fn render_delimited(records: &[ChunkRecord]) -> Result<String, IngestError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(PREVIEW_HEADERS)?;

    for record in records {
        let chunk_index = record.chunk_index.to_string();
        writer.write_record([
            record.document_id.as_str(),
            record.doc_name.as_str(),
            record.uploaded_by.as_str(),
            chunk_index.as_str(),
            record.date.as_str(),
            record.label.as_str(),
            record.source_name.as_str(),
            record.source_link.as_str(),
            record.influence_text.as_str(),
            record.content.as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|error| IngestError::SheetParse(error.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkDraft;

    #[test]
    fn delimiter_detection_prefers_the_more_frequent_candidate() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), b';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), b',');
        assert_eq!(detect_delimiter("a,b;c,d\n"), b',');
        assert_eq!(detect_delimiter(""), b',');
    }

    #[test]
    fn delimited_rows_become_objects_keyed_by_header() {
        let bytes = b"content;label\nfirst row;alpha\nsecond row;beta\n";
        let rows = read_delimited(bytes).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["content"], "first row");
        assert_eq!(rows[1]["label"], "beta");
    }

    #[test]
    fn blank_delimited_rows_are_dropped() {
        let bytes = b"content,label\n,\nkept,here\n";
        let rows = read_delimited(bytes).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["content"], "kept");
    }

    #[test]
    fn bom_does_not_leak_into_the_first_header() {
        let bytes = "\u{feff}content,label\nx,y\n".as_bytes();
        let rows = read_delimited(bytes).unwrap();
        assert_eq!(rows[0]["content"], "x");
    }

    #[test]
    fn unsupported_extensions_are_rejected() {
        let result = parse_rows("upload.pdf", b"%PDF");
        assert!(matches!(result, Err(IngestError::InvalidInput(_))));
    }

    #[test]
    fn rendering_quotes_cells_containing_the_delimiter() {
        let draft = ChunkDraft {
            chunk_index: Some(0),
            date: String::new(),
            label: String::new(),
            source_name: String::new(),
            source_link: String::new(),
            influence_text: String::new(),
            content: "with, comma and \"quote\"".to_string(),
        };
        let record = draft.into_record("id-1", "doc", "tester");

        let rendered = render_delimited(&[record]).unwrap();
        let mut lines = rendered.lines();
        assert_eq!(lines.next().unwrap().split(',').count(), PREVIEW_HEADERS.len());
        assert!(rendered.contains("\"with, comma and \"\"quote\"\"\""));
    }
}
