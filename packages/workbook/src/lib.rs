#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Workbook codec for lote editor sheets.
//!
//! A [`Workbook`] is an ordered list of named [`Sheet`]s, each a header row
//! plus string cells. Two on-disk forms are supported:
//!
//! * [`WorkbookFormat::Xlsx`], the spreadsheet produced by the clustering
//!   pipeline and expected by spreadsheet tools. Read with `calamine`,
//!   written with `rust_xlsxwriter`.
//! * [`WorkbookFormat::CsvArchive`], a zip archive holding one CSV entry
//!   per sheet, named `<sheet>.csv`, in workbook order. Entries that are
//!   not CSV files are ignored when reading.
//!
//! Reading detects the form from the archive contents.

use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use calamine::{Data, Reader, Xlsx};

/// A sheet row keyed by column header.
pub type Row = BTreeMap<String, String>;

const SHEET_EXTENSION: &str = ".csv";

/// Archive entry present in every xlsx file.
const XLSX_WORKBOOK_ENTRY: &str = "xl/workbook.xml";

/// Errors that can occur while reading or writing a workbook.
#[derive(Debug, thiserror::Error)]
pub enum WorkbookError {
    /// The container is not a readable zip archive.
    #[error("Invalid workbook archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A sheet body is not valid CSV.
    #[error("Invalid sheet {sheet}: {source}")]
    Csv {
        /// Name of the offending sheet.
        sheet: String,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// The archive looks like a spreadsheet but cannot be read as one.
    #[error("Invalid spreadsheet: {0}")]
    XlsxRead(#[from] calamine::XlsxError),

    /// The spreadsheet could not be encoded.
    #[error("Failed to encode spreadsheet: {0}")]
    XlsxWrite(#[from] rust_xlsxwriter::XlsxError),

    /// A sheet has more rows or columns than a spreadsheet can hold.
    #[error("Sheet {sheet} exceeds the spreadsheet size limits")]
    TooLarge {
        /// Name of the offending sheet.
        sheet: String,
    },

    /// I/O error while reading or writing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// On-disk form of a workbook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WorkbookFormat {
    /// Office Open XML spreadsheet.
    #[default]
    Xlsx,
    /// Zip archive with one CSV entry per sheet.
    CsvArchive,
}

impl WorkbookFormat {
    /// File extension, without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::CsvArchive => "zip",
        }
    }

    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::CsvArchive => "application/zip",
        }
    }

    /// `.zip` files are CSV archives; anything else is written as xlsx.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("zip") => Self::CsvArchive,
            _ => Self::Xlsx,
        }
    }
}

/// A named table of string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Sheet {
    /// Creates an empty sheet with the given column headers.
    #[must_use]
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Creates a sheet from headers given as string slices.
    #[must_use]
    pub fn with_headers(name: impl Into<String>, headers: &[&str]) -> Self {
        Self::new(name, headers.iter().map(ToString::to_string).collect())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Whether a column with this exact header exists.
    #[must_use]
    pub fn has_column(&self, header: &str) -> bool {
        self.headers.iter().any(|h| h == header)
    }

    /// Appends a row of cells in header order.
    pub fn push_row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    /// Number of data rows (the header row excluded).
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Data rows keyed by header. Short rows simply lack the trailing
    /// columns; for duplicated headers the leftmost column wins.
    #[must_use]
    pub fn records(&self) -> Vec<Row> {
        self.rows
            .iter()
            .map(|cells| {
                let mut row = Row::new();
                for (header, cell) in self.headers.iter().zip(cells) {
                    row.entry(header.clone()).or_insert_with(|| cell.clone());
                }
                row
            })
            .collect()
    }

    fn to_csv(&self) -> Result<Vec<u8>, WorkbookError> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        let csv_error = |source| WorkbookError::Csv {
            sheet: self.name.clone(),
            source,
        };

        writer.write_record(&self.headers).map_err(csv_error)?;
        for row in &self.rows {
            writer.write_record(row).map_err(csv_error)?;
        }
        writer.flush()?;

        writer
            .into_inner()
            .map_err(|e| WorkbookError::Io(e.into_error()))
    }

    fn from_csv(name: String, reader: impl Read) -> Result<Self, WorkbookError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = match csv_reader.headers() {
            Ok(headers) => headers.iter().map(|h| h.trim().to_string()).collect(),
            Err(source) => return Err(WorkbookError::Csv { sheet: name, source }),
        };

        let mut rows: Vec<Vec<String>> = Vec::new();
        for record in csv_reader.records() {
            match record {
                Ok(record) => rows.push(record.iter().map(ToString::to_string).collect()),
                Err(source) => return Err(WorkbookError::Csv { sheet: name, source }),
            }
        }

        Ok(Self {
            name,
            headers,
            rows,
        })
    }

    fn write_xlsx(&self, worksheet: &mut rust_xlsxwriter::Worksheet) -> Result<(), WorkbookError> {
        worksheet.set_name(&self.name)?;

        for (col, header) in self.headers.iter().enumerate() {
            let (row, col) = self.cell_position(0, col)?;
            worksheet.write_string(row, col, header)?;
        }

        for (index, cells) in self.rows.iter().enumerate() {
            for (col, cell) in cells.iter().enumerate() {
                if cell.is_empty() {
                    continue;
                }
                let (row, col) = self.cell_position(index + 1, col)?;
                match numeric_cell(cell) {
                    Some(number) => worksheet.write_number(row, col, number)?,
                    None => worksheet.write_string(row, col, cell)?,
                };
            }
        }

        Ok(())
    }

    fn cell_position(&self, row: usize, col: usize) -> Result<(u32, u16), WorkbookError> {
        match (u32::try_from(row), u16::try_from(col)) {
            (Ok(row), Ok(col)) => Ok((row, col)),
            _ => Err(WorkbookError::TooLarge {
                sheet: self.name.clone(),
            }),
        }
    }

    fn from_range(name: String, range: &calamine::Range<Data>) -> Self {
        let mut rows = range.rows();
        let headers = rows
            .next()
            .map(|cells| cells.iter().map(|c| cell_text(c).trim().to_string()).collect())
            .unwrap_or_default();
        let rows = rows
            .map(|cells| cells.iter().map(cell_text).collect::<Vec<_>>())
            .filter(|cells| cells.iter().any(|c| !c.is_empty()))
            .collect();

        Self {
            name,
            headers,
            rows,
        }
    }
}

/// Text whose shortest decimal form is itself, such as `12` or `-3.5`.
/// Everything else (`007`, `1e3`, ids) stays text so it reads back as
/// written.
fn numeric_cell(cell: &str) -> Option<f64> {
    cell.parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && n.to_string() == cell)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(text) => text.clone(),
        Data::Float(number) => number.to_string(),
        Data::Int(number) => number.to_string(),
        other => other.to_string(),
    }
}

/// An ordered collection of sheets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    #[must_use]
    pub const fn new() -> Self {
        Self { sheets: Vec::new() }
    }

    /// Adds a sheet, replacing any existing sheet with the same name.
    pub fn add_sheet(&mut self, sheet: Sheet) {
        if let Some(existing) = self.sheets.iter_mut().find(|s| s.name == sheet.name) {
            *existing = sheet;
        } else {
            self.sheets.push(sheet);
        }
    }

    /// Looks up a sheet by exact name.
    #[must_use]
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    #[must_use]
    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    /// Reads a workbook in either format.
    ///
    /// # Errors
    ///
    /// Returns [`WorkbookError`] if the input is not a zip-based container
    /// or any sheet cannot be parsed.
    pub fn read_from<R: Read + Seek>(reader: R) -> Result<Self, WorkbookError> {
        let archive = zip::ZipArchive::new(reader)?;
        if archive.file_names().any(|name| name == XLSX_WORKBOOK_ENTRY) {
            let mut reader = archive.into_inner();
            reader.seek(SeekFrom::Start(0))?;
            Self::read_xlsx(reader)
        } else {
            Self::read_csv_archive(archive)
        }
    }

    fn read_xlsx<R: Read + Seek>(reader: R) -> Result<Self, WorkbookError> {
        let mut spreadsheet: Xlsx<R> = Xlsx::new(reader)?;
        let mut workbook = Self::new();

        for name in spreadsheet.sheet_names() {
            let range = spreadsheet.worksheet_range(&name)?;
            let sheet = Sheet::from_range(name, &range);
            log::debug!("Read worksheet {:?} ({} rows)", sheet.name, sheet.len());
            workbook.add_sheet(sheet);
        }

        Ok(workbook)
    }

    fn read_csv_archive<R: Read + Seek>(
        mut archive: zip::ZipArchive<R>,
    ) -> Result<Self, WorkbookError> {
        let mut workbook = Self::new();

        for i in 0..archive.len() {
            let entry = archive.by_index(i)?;
            let entry_name = entry.name().to_string();

            let Some(sheet_name) = entry_name.strip_suffix(SHEET_EXTENSION) else {
                log::debug!("Skipping non-sheet workbook entry {entry_name}");
                continue;
            };

            let sheet = Sheet::from_csv(sheet_name.to_string(), entry)?;
            log::debug!("Read sheet {:?} ({} rows)", sheet.name, sheet.len());
            workbook.add_sheet(sheet);
        }

        Ok(workbook)
    }

    /// Reads a workbook from memory.
    ///
    /// # Errors
    ///
    /// See [`Workbook::read_from`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WorkbookError> {
        Self::read_from(std::io::Cursor::new(bytes))
    }

    /// Reads a workbook file.
    ///
    /// # Errors
    ///
    /// Returns [`WorkbookError`] if the file cannot be opened or parsed.
    pub fn read_path(path: &Path) -> Result<Self, WorkbookError> {
        let file = std::fs::File::open(path)?;
        Self::read_from(std::io::BufReader::new(file))
    }

    /// Encodes the workbook in the given format.
    ///
    /// # Errors
    ///
    /// Returns [`WorkbookError`] if any sheet cannot be encoded.
    pub fn to_bytes(&self, format: WorkbookFormat) -> Result<Vec<u8>, WorkbookError> {
        match format {
            WorkbookFormat::Xlsx => self.to_xlsx(),
            WorkbookFormat::CsvArchive => Ok(self
                .write_csv_archive(std::io::Cursor::new(Vec::new()))?
                .into_inner()),
        }
    }

    fn to_xlsx(&self) -> Result<Vec<u8>, WorkbookError> {
        let mut spreadsheet = rust_xlsxwriter::Workbook::new();
        for sheet in &self.sheets {
            sheet.write_xlsx(spreadsheet.add_worksheet())?;
        }
        Ok(spreadsheet.save_to_buffer()?)
    }

    fn write_csv_archive<W: Write + Seek>(&self, writer: W) -> Result<W, WorkbookError> {
        let mut zip_writer = zip::ZipWriter::new(writer);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        for sheet in &self.sheets {
            let body = sheet.to_csv()?;
            zip_writer.start_file(format!("{}{SHEET_EXTENSION}", sheet.name), options)?;
            zip_writer.write_all(&body)?;
        }

        Ok(zip_writer.finish()?)
    }

    /// Writes the workbook to a file in the format implied by its
    /// extension (see [`WorkbookFormat::from_path`]), going through a
    /// temporary file so an interrupted write never leaves a truncated
    /// workbook behind. The temporary file is removed when the write fails.
    ///
    /// # Errors
    ///
    /// Returns [`WorkbookError`] if the workbook cannot be encoded or the
    /// file cannot be written.
    pub fn write_path(&self, path: &Path) -> Result<(), WorkbookError> {
        let format = WorkbookFormat::from_path(path);
        let bytes = self.to_bytes(format)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension(format!("{}.tmp", format.extension()));
        let written = std::fs::write(&tmp_path, &bytes).and_then(|()| std::fs::rename(&tmp_path, path));
        if let Err(e) = written {
            if let Err(cleanup) = std::fs::remove_file(&tmp_path) {
                log::debug!("No temporary file to remove at {}: {cleanup}", tmp_path.display());
            }
            return Err(e.into());
        }

        log::info!("Wrote workbook {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points_sheet() -> Sheet {
        let mut sheet = Sheet::with_headers("All Points", &["Point ID", "Cluster ID", "Município"]);
        sheet.push_row(vec!["1".to_string(), "0".to_string(), "São Paulo".to_string()]);
        sheet.push_row(vec!["2".to_string(), "1".to_string(), "Campinas, SP".to_string()]);
        sheet
    }

    fn two_sheet_workbook() -> Workbook {
        let mut workbook = Workbook::new();
        workbook.add_sheet(points_sheet());
        let mut summary = Sheet::with_headers("Cluster Summary", &["Cluster ID", "Avg Cost (R$)"]);
        summary.push_row(vec!["0".to_string(), "1250.5".to_string()]);
        workbook.add_sheet(summary);
        workbook
    }

    #[test]
    fn records_are_keyed_by_header() {
        let records = points_sheet().records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["Município"], "Campinas, SP");
        assert_eq!(records[0]["Cluster ID"], "0");
    }

    #[test]
    fn short_rows_lack_trailing_columns() {
        let mut sheet = Sheet::with_headers("All Points", &["Point ID", "Cluster ID"]);
        sheet.push_row(vec!["9".to_string()]);
        let records = sheet.records();
        assert_eq!(records[0].get("Point ID").map(String::as_str), Some("9"));
        assert!(!records[0].contains_key("Cluster ID"));
    }

    #[test]
    fn xlsx_keeps_sheet_order_and_cells() {
        let workbook = two_sheet_workbook();
        let bytes = workbook.to_bytes(WorkbookFormat::Xlsx).unwrap();
        let decoded = Workbook::from_bytes(&bytes).unwrap();

        let names: Vec<&str> = decoded.sheets().iter().map(Sheet::name).collect();
        assert_eq!(names, ["All Points", "Cluster Summary"]);
        assert_eq!(decoded, workbook);
    }

    #[test]
    fn xlsx_keeps_text_that_only_looks_numeric() {
        let mut sheet = Sheet::with_headers("All Points", &["Point ID", "km", "Cluster ID"]);
        sheet.push_row(vec!["007".to_string(), "1e3".to_string(), "-1".to_string()]);
        sheet.push_row(vec![
            "sobreposicao_1_7".to_string(),
            "12345678901234567890".to_string(),
            "1001".to_string(),
        ]);
        let mut workbook = Workbook::new();
        workbook.add_sheet(sheet);

        let bytes = workbook.to_bytes(WorkbookFormat::Xlsx).unwrap();
        assert_eq!(Workbook::from_bytes(&bytes).unwrap(), workbook);
    }

    #[test]
    fn xlsx_skips_blank_rows_and_reads_empty_cells_as_empty() {
        let mut sheet = Sheet::with_headers("All Points", &["Point ID", "Rodovia", "Cluster ID"]);
        sheet.push_row(vec!["1".to_string(), String::new(), "0".to_string()]);
        sheet.push_row(vec![String::new(), String::new(), String::new()]);
        sheet.push_row(vec!["2".to_string(), "SP-310".to_string(), "0".to_string()]);
        let mut workbook = Workbook::new();
        workbook.add_sheet(sheet);

        let bytes = workbook.to_bytes(WorkbookFormat::Xlsx).unwrap();
        let decoded = Workbook::from_bytes(&bytes).unwrap();
        let records = decoded.sheet("All Points").unwrap().records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["Rodovia"], "");
        assert_eq!(records[1]["Rodovia"], "SP-310");
    }

    #[test]
    fn csv_archive_keeps_sheet_order_and_cells() {
        let workbook = two_sheet_workbook();
        let bytes = workbook.to_bytes(WorkbookFormat::CsvArchive).unwrap();
        let decoded = Workbook::from_bytes(&bytes).unwrap();

        let names: Vec<&str> = decoded.sheets().iter().map(Sheet::name).collect();
        assert_eq!(names, ["All Points", "Cluster Summary"]);
        assert_eq!(decoded.sheet("All Points"), Some(&points_sheet()));
    }

    #[test]
    fn add_sheet_replaces_same_name() {
        let mut workbook = Workbook::new();
        workbook.add_sheet(points_sheet());
        workbook.add_sheet(Sheet::with_headers("All Points", &["Point ID"]));
        assert_eq!(workbook.sheets().len(), 1);
        assert!(workbook.sheet("All Points").unwrap().is_empty());
    }

    #[test]
    fn ignores_non_csv_entries() {
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut zip_writer = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();
            zip_writer.start_file("readme.txt", options).unwrap();
            zip_writer.write_all(b"not a sheet").unwrap();
            zip_writer.start_file("All Points.csv", options).unwrap();
            zip_writer.write_all(b"Point ID,Cluster ID\n1,0\n").unwrap();
            zip_writer.finish().unwrap();
        }

        let workbook = Workbook::from_bytes(cursor.get_ref()).unwrap();
        assert_eq!(workbook.sheets().len(), 1);
        assert_eq!(workbook.sheet("All Points").unwrap().len(), 1);
    }

    #[test]
    fn rejects_non_zip_input() {
        assert!(matches!(
            Workbook::from_bytes(b"Point ID,Cluster ID\n"),
            Err(WorkbookError::Zip(_))
        ));
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(WorkbookFormat::from_path(Path::new("a/b.zip")), WorkbookFormat::CsvArchive);
        assert_eq!(WorkbookFormat::from_path(Path::new("b.ZIP")), WorkbookFormat::CsvArchive);
        assert_eq!(WorkbookFormat::from_path(Path::new("b.xlsx")), WorkbookFormat::Xlsx);
        assert_eq!(WorkbookFormat::from_path(Path::new("b")), WorkbookFormat::Xlsx);
    }

    #[test]
    fn write_and_read_path_in_both_formats() {
        let tmp = std::env::temp_dir().join("lotes_workbook_path_test");
        let _ = std::fs::remove_dir_all(&tmp);
        let workbook = two_sheet_workbook();

        for name in ["out.xlsx", "out.zip"] {
            let path = tmp.join(name);
            workbook.write_path(&path).unwrap();

            let format = WorkbookFormat::from_path(&path);
            assert!(path.exists());
            assert!(!path.with_extension(format!("{}.tmp", format.extension())).exists());
            assert_eq!(Workbook::read_path(&path).unwrap(), workbook);
        }

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn failed_write_removes_temporary_file() {
        let tmp = std::env::temp_dir().join("lotes_workbook_failed_write_test");
        let _ = std::fs::remove_dir_all(&tmp);

        // A directory in the way makes the final rename fail.
        let path = tmp.join("out.xlsx");
        std::fs::create_dir_all(path.join("occupied")).unwrap();

        assert!(matches!(
            two_sheet_workbook().write_path(&path),
            Err(WorkbookError::Io(_))
        ));
        assert!(!tmp.join("out.xlsx.tmp").exists());
        assert!(path.is_dir());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
