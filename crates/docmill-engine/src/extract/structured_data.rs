//! Structured-data extraction — CSV, TSV, JSON, XML, and DBF parsed into
//! tabular elements rather than prose.

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use docmill_core::{
    DocumentKind, Element, Error, ExtractOptions, Extractor, ExtractorFamily, RawDocument,
    Result,
};

/// Extractor for structured/tabular formats. Output is a single page whose
/// content is table elements (plus a paragraph for scalar JSON).
pub struct StructuredDataExtractor;

/// Detected structured format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Csv,
    Tsv,
    Json,
    Xml,
    Dbf,
}

impl StructuredDataExtractor {
    fn detect_format(filename: &str, data: &[u8]) -> Format {
        let ext = filename
            .rsplit_once('.')
            .map(|(_, e)| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Format::Csv,
            "tsv" => Format::Tsv,
            "json" | "ndjson" => Format::Json,
            "xml" => Format::Xml,
            "dbf" => Format::Dbf,
            _ => {
                // No recognized extension: sniff the leading byte.
                match data.first() {
                    Some(b'{') | Some(b'[') => Format::Json,
                    Some(b'<') => Format::Xml,
                    _ => Format::Csv,
                }
            }
        }
    }

    /// Split one delimited line into fields, honoring double-quoted fields
    /// with embedded delimiters and doubled quotes.
    fn split_delimited(line: &str, delim: char) -> Vec<String> {
        let mut fields = Vec::new();
        let mut field = String::new();
        let mut in_quotes = false;
        let mut chars = line.chars().peekable();

        while let Some(c) = chars.next() {
            if in_quotes {
                if c == '"' {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                } else {
                    field.push(c);
                }
            } else if c == '"' && field.is_empty() {
                in_quotes = true;
            } else if c == delim {
                fields.push(std::mem::take(&mut field));
            } else {
                field.push(c);
            }
        }
        fields.push(field);
        fields
    }

    /// Parse CSV text into rows. Shared with the legacy converter, which
    /// renders spreadsheets to CSV as its intermediate format.
    pub(crate) fn parse_csv_rows(text: &str) -> (Vec<Vec<String>>, JsonValue) {
        Self::parse_delimited(text, ',')
    }

    fn parse_delimited(text: &str, delim: char) -> (Vec<Vec<String>>, JsonValue) {
        let rows: Vec<Vec<String>> = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| Self::split_delimited(line, delim))
            .collect();

        let metadata = json!({
            "row_count": rows.len(),
            "column_count": rows.first().map(|r| r.len()).unwrap_or(0),
        });
        (rows, metadata)
    }

    fn parse_json(text: &str) -> Result<(Vec<Element>, JsonValue)> {
        let value: JsonValue = serde_json::from_str(text)
            .map_err(|e| Error::ExtractionFailed(format!("invalid JSON: {}", e)))?;

        match &value {
            JsonValue::Array(items) => {
                // Array of objects becomes a table: union of keys as the
                // header row, one row per object.
                let mut keys: Vec<String> = Vec::new();
                for item in items {
                    if let JsonValue::Object(map) = item {
                        for key in map.keys() {
                            if !keys.contains(key) {
                                keys.push(key.clone());
                            }
                        }
                    }
                }

                if keys.is_empty() {
                    // Array of scalars: one single-column table.
                    let mut rows = vec![vec!["value".to_string()]];
                    rows.extend(items.iter().map(|v| vec![scalar_to_string(v)]));
                    let meta = json!({ "type": "array", "element_count": items.len() });
                    return Ok((vec![Element::table(rows)], meta));
                }

                let mut rows = vec![keys.clone()];
                for item in items {
                    let row = keys
                        .iter()
                        .map(|k| item.get(k).map(scalar_to_string).unwrap_or_default())
                        .collect();
                    rows.push(row);
                }
                let meta = json!({ "type": "array", "element_count": items.len() });
                Ok((vec![Element::table(rows)], meta))
            }
            JsonValue::Object(map) => {
                let mut rows = vec![vec!["key".to_string(), "value".to_string()]];
                for (k, v) in map {
                    rows.push(vec![k.clone(), scalar_to_string(v)]);
                }
                let meta = json!({ "type": "object", "key_count": map.len() });
                Ok((vec![Element::table(rows)], meta))
            }
            scalar => {
                let meta = json!({ "type": "primitive" });
                Ok((vec![Element::paragraph(scalar_to_string(scalar))], meta))
            }
        }
    }

    /// Strip tags from an XML document and expose text content as one
    /// paragraph per element chain. Structure-preserving XML parsing is a
    /// non-goal; the text content is what downstream chunking consumes.
    fn parse_xml(text: &str) -> (Vec<Element>, JsonValue) {
        let mut out = String::new();
        let mut in_tag = false;
        for c in text.chars() {
            match c {
                '<' => in_tag = true,
                '>' => {
                    in_tag = false;
                    out.push(' ');
                }
                _ if !in_tag => out.push(c),
                _ => {}
            }
        }

        let lines: Vec<String> = out
            .split_whitespace()
            .map(|s| s.to_string())
            .collect();
        let content = lines.join(" ");
        let meta = json!({ "char_count": content.len() });
        if content.is_empty() {
            (Vec::new(), meta)
        } else {
            (vec![Element::paragraph(content)], meta)
        }
    }

    /// Minimal dBASE III reader: header + field descriptors + fixed-width
    /// character records. Enough for the DBF files that show up in
    /// tabular-data uploads; anything malformed is `ExtractionFailed`.
    fn parse_dbf(data: &[u8]) -> Result<(Vec<Vec<String>>, JsonValue)> {
        if data.len() < 32 {
            return Err(Error::ExtractionFailed("DBF header truncated".to_string()));
        }

        let record_count = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
        let header_len = u16::from_le_bytes([data[8], data[9]]) as usize;
        let record_len = u16::from_le_bytes([data[10], data[11]]) as usize;

        if header_len > data.len() || record_len == 0 {
            return Err(Error::ExtractionFailed(
                "DBF header is inconsistent".to_string(),
            ));
        }

        // Field descriptors: 32 bytes each, terminated by 0x0D.
        let mut fields: Vec<(String, usize)> = Vec::new();
        let mut offset = 32;
        while offset + 32 <= header_len && data[offset] != 0x0D {
            let descriptor = &data[offset..offset + 32];
            let name_end = descriptor[..11]
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(11);
            let name = String::from_utf8_lossy(&descriptor[..name_end]).into_owned();
            let length = descriptor[16] as usize;
            fields.push((name, length));
            offset += 32;
        }

        if fields.is_empty() {
            return Err(Error::ExtractionFailed(
                "DBF file declares no fields".to_string(),
            ));
        }

        let mut rows: Vec<Vec<String>> =
            vec![fields.iter().map(|(name, _)| name.clone()).collect()];

        let mut pos = header_len;
        for _ in 0..record_count {
            if pos + record_len > data.len() {
                break;
            }
            let record = &data[pos..pos + record_len];
            // First byte is the deletion flag.
            let mut cell_pos = 1;
            let mut row = Vec::with_capacity(fields.len());
            for (_, length) in &fields {
                let end = (cell_pos + length).min(record.len());
                let cell = String::from_utf8_lossy(&record[cell_pos..end])
                    .trim()
                    .to_string();
                row.push(cell);
                cell_pos = end;
            }
            if record[0] != b'*' {
                rows.push(row);
            }
            pos += record_len;
        }

        let meta = json!({
            "record_count": record_count,
            "field_count": fields.len(),
        });
        Ok((rows, meta))
    }
}

fn scalar_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Extractor for StructuredDataExtractor {
    fn family(&self) -> ExtractorFamily {
        ExtractorFamily::StructuredData
    }

    async fn extract(
        &self,
        _kind: DocumentKind,
        data: &[u8],
        filename: &str,
        _options: &ExtractOptions,
    ) -> Result<RawDocument> {
        if data.is_empty() {
            return Err(Error::ExtractionFailed(
                "cannot parse empty structured data".to_string(),
            ));
        }

        let format = Self::detect_format(filename, data);

        let (elements, format_metadata) = match format {
            Format::Csv | Format::Tsv => {
                let text = String::from_utf8_lossy(data);
                let delim = if format == Format::Tsv { '\t' } else { ',' };
                let (rows, meta) = Self::parse_delimited(&text, delim);
                if rows.is_empty() {
                    return Err(Error::ExtractionFailed(
                        "delimited file contains no rows".to_string(),
                    ));
                }
                (vec![Element::table(rows)], meta)
            }
            Format::Json => {
                let text = String::from_utf8_lossy(data);
                Self::parse_json(&text)?
            }
            Format::Xml => {
                let text = String::from_utf8_lossy(data);
                Self::parse_xml(&text)
            }
            Format::Dbf => {
                let (rows, meta) = Self::parse_dbf(data)?;
                (vec![Element::table(rows)], meta)
            }
        };

        Ok(RawDocument {
            pages: vec![docmill_core::RawPage::from_elements(elements)],
            metadata: json!({
                "format": format_name(format),
                "format_metadata": format_metadata,
            }),
        })
    }

    fn supports_tables(&self) -> bool {
        true
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true) // No external dependencies
    }

    fn name(&self) -> &str {
        "structured_data"
    }
}

fn format_name(format: Format) -> &'static str {
    match format {
        Format::Csv => "csv",
        Format::Tsv => "tsv",
        Format::Json => "json",
        Format::Xml => "xml",
        Format::Dbf => "dbf",
    }
}
