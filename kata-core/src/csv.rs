//! Minimal CSV encoding for spreadsheet exports.
//!
//! Fields containing a delimiter, quote, or line break are quoted and embedded
//! quotes are doubled. Rows end with CRLF.

/// Quote a single field if needed.
pub fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Accumulates rows into a CSV document.
#[derive(Debug, Default)]
pub struct CsvWriter {
    out: String,
}

impl CsvWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(header: &[&str]) -> Self {
        let mut writer = Self::new();
        writer.write_row(header.iter().copied());
        writer
    }

    pub fn write_row<'a, I>(&mut self, fields: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let line = fields
            .into_iter()
            .map(escape_field)
            .collect::<Vec<_>>()
            .join(",");
        self.out.push_str(&line);
        self.out.push_str("\r\n");
    }

    pub fn finish(self) -> String {
        self.out
    }
}
