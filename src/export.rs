use comfy_table::{Cell, ContentArrangement, Row, Table, presets::UTF8_BORDERS_ONLY};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::{Error, Result};
use crate::rollup::ViewRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// CSV, one line per record plus the trailing total row.
    Tabular,
    /// Plain-text invoice: title block followed by the bordered table.
    Document,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" | "tabular" => Ok(ExportFormat::Tabular),
            "invoice" | "document" => Ok(ExportFormat::Document),
            other => Err(format!("unknown export format '{other}' (expected csv or invoice)")),
        }
    }
}

const COLUMNS: [&str; 7] = [
    "No",
    "Name",
    "Client",
    "Employee",
    "Project",
    "Status",
    "Amount",
];

/// Turns a selection of view rows into an export blob. Selection and party
/// details are borrowed; building never mutates them.
pub struct ExportBuilder<'a> {
    rows: &'a [ViewRow],
    business_id: &'a str,
    business_name: Option<&'a str>,
    issued_at: OffsetDateTime,
}

impl<'a> ExportBuilder<'a> {
    pub fn new(rows: &'a [ViewRow], business_id: &'a str, issued_at: OffsetDateTime) -> Self {
        ExportBuilder {
            rows,
            business_id,
            business_name: None,
            issued_at,
        }
    }

    pub fn business_name(mut self, name: &'a str) -> Self {
        self.business_name = Some(name);
        self
    }

    /// Scoped to the issuing business: a fragment of the tenant id plus the
    /// issue timestamp.
    pub fn invoice_number(&self) -> String {
        let fragment: String = self
            .business_id
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .take(6)
            .collect::<String>()
            .to_uppercase();
        format!("INV-{fragment}-{}", self.issued_at.unix_timestamp())
    }

    pub fn total(&self) -> f64 {
        self.rows.iter().map(|row| row.amount).sum()
    }

    pub fn build(&self, format: ExportFormat) -> Result<Vec<u8>> {
        if self.rows.is_empty() {
            return Err(Error::EmptySelection);
        }
        match format {
            ExportFormat::Tabular => Ok(self.build_csv()),
            ExportFormat::Document => Ok(self.build_document()),
        }
    }

    fn build_csv(&self) -> Vec<u8> {
        let mut out = String::new();
        out.push_str(&COLUMNS.join(","));
        out.push('\n');
        for (index, row) in self.rows.iter().enumerate() {
            let fields = [
                (index + 1).to_string(),
                csv_escape(&row.name),
                csv_escape(&row.client_name),
                csv_escape(&row.employee_name),
                csv_escape(&row.project_name),
                row.status.to_string(),
                format!("{:.2}", row.amount),
            ];
            out.push_str(&fields.join(","));
            out.push('\n');
        }
        out.push_str(&format!(",Total,,,,,{:.2}\n", self.total()));
        out.into_bytes()
    }

    fn build_document(&self) -> Vec<u8> {
        let mut out = String::new();
        out.push_str(&format!("INVOICE {}\n", self.invoice_number()));
        let issued = self
            .issued_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.issued_at.to_string());
        out.push_str(&format!("Issued: {issued}\n"));
        out.push_str(&format!(
            "Billed by: {}\n",
            self.business_name.unwrap_or(self.business_id)
        ));
        out.push_str(&format!("Records: {}\n\n", self.rows.len()));

        let mut table = Table::new();
        table
            .load_preset(UTF8_BORDERS_ONLY)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(Row::from(COLUMNS.iter().map(Cell::new).collect::<Vec<_>>()));
        for (index, row) in self.rows.iter().enumerate() {
            table.add_row(Row::from(vec![
                Cell::new(index + 1),
                Cell::new(&row.name),
                Cell::new(&row.client_name),
                Cell::new(&row.employee_name),
                Cell::new(&row.project_name),
                Cell::new(row.status),
                Cell::new(format!("{:.2}", row.amount)),
            ]));
        }
        table.add_row(Row::from(vec![
            Cell::new(""),
            Cell::new("Total"),
            Cell::new(""),
            Cell::new(""),
            Cell::new(""),
            Cell::new(""),
            Cell::new(format!("{:.2}", self.total())),
        ]));

        out.push_str(&table.to_string());
        out.push('\n');
        out.into_bytes()
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_escape_quotes_only_when_needed() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn export_format_parses_aliases() {
        assert_eq!("csv".parse::<ExportFormat>(), Ok(ExportFormat::Tabular));
        assert_eq!("tabular".parse::<ExportFormat>(), Ok(ExportFormat::Tabular));
        assert_eq!("invoice".parse::<ExportFormat>(), Ok(ExportFormat::Document));
        assert_eq!(
            "document".parse::<ExportFormat>(),
            Ok(ExportFormat::Document)
        );
        assert!("pdf".parse::<ExportFormat>().is_err());
    }
}
