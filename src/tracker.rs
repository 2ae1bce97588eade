//! Per-row outcome reporting for an import run.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// How the per-row report is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    None,
    #[default]
    Plain,
    Table,
}

impl OutputMode {
    pub fn reporter<'w, W: Write + 'w>(self, out: W) -> Box<dyn ImportReporter + 'w> {
        match self {
            OutputMode::None => Box::new(SilentReporter),
            OutputMode::Plain => Box::new(PlainReporter::new(out)),
            OutputMode::Table => Box::new(TableReporter::new(out)),
        }
    }
}

/// Final record for one processed row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowOutcome {
    pub line: usize,
    pub success: bool,
    /// Course id. Absent when nothing was written.
    pub id: Option<i64>,
    pub shortname: String,
    pub fullname: String,
    pub category_path: String,
    pub idnumber: String,
    pub status: Vec<String>,
}

impl RowOutcome {
    fn result_label(&self) -> &'static str {
        if self.success {
            "OK"
        } else {
            "NOK"
        }
    }

    fn id_label(&self) -> String {
        self.id.map(|id| id.to_string()).unwrap_or_default()
    }
}

/// Totals accumulated over a run. In preview mode the counts describe what
/// would happen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub preview: bool,
    pub total: usize,
    pub categories_created: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub errors: usize,
}

impl RunTotals {
    /// Labelled counts in report order.
    pub fn lines(&self) -> Vec<(&'static str, usize)> {
        if self.preview {
            vec![
                ("Rows processed", self.total),
                ("Categories to be created", self.categories_created),
                ("Courses to be created", self.created),
                ("Courses to be updated", self.updated),
                ("Courses to be deleted", self.deleted),
                ("Errors", self.errors),
            ]
        } else {
            vec![
                ("Rows processed", self.total),
                ("Categories created", self.categories_created),
                ("Courses created", self.created),
                ("Courses updated", self.updated),
                ("Courses deleted", self.deleted),
                ("Errors", self.errors),
            ]
        }
    }
}

impl fmt::Display for RunTotals {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parts: Vec<String> = self
            .lines()
            .iter()
            .map(|(label, count)| format!("{}: {}", label, count))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Consumes row outcomes and run totals.
///
/// All methods have default no-op implementations.
pub trait ImportReporter {
    fn start(&mut self) -> io::Result<()> {
        Ok(())
    }
    fn row(&mut self, _outcome: &RowOutcome) -> io::Result<()> {
        Ok(())
    }
    fn results(&mut self, _totals: &RunTotals) -> io::Result<()> {
        Ok(())
    }
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Reporter for suppressed output.
pub struct SilentReporter;

impl ImportReporter for SilentReporter {}

pub const PLAIN_HEADER: [&str; 7] = [
    "line",
    "result",
    "id",
    "shortname",
    "fullname",
    "category_path",
    "idnumber",
];

/// Tab-separated report, one line per row plus indented status lines.
pub struct PlainReporter<W: Write> {
    out: W,
}

impl<W: Write> PlainReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ImportReporter for PlainReporter<W> {
    fn start(&mut self) -> io::Result<()> {
        writeln!(self.out, "{}", PLAIN_HEADER.join("\t"))
    }

    fn row(&mut self, outcome: &RowOutcome) -> io::Result<()> {
        writeln!(
            self.out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            outcome.line,
            outcome.result_label(),
            outcome.id_label(),
            outcome.shortname,
            outcome.fullname,
            outcome.category_path,
            outcome.idnumber
        )?;
        for message in &outcome.status {
            writeln!(self.out, "    {}", message)?;
        }
        Ok(())
    }

    fn results(&mut self, totals: &RunTotals) -> io::Result<()> {
        writeln!(self.out)?;
        for (label, count) in totals.lines() {
            writeln!(self.out, "{}: {}", label, count)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

#[derive(Debug, Clone, Tabled)]
struct OutcomeTableRow {
    #[tabled(rename = "Line")]
    line: usize,
    #[tabled(rename = "Result")]
    result: &'static str,
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Shortname")]
    shortname: String,
    #[tabled(rename = "Fullname")]
    fullname: String,
    #[tabled(rename = "Category path")]
    category_path: String,
    #[tabled(rename = "ID number")]
    idnumber: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&RowOutcome> for OutcomeTableRow {
    fn from(outcome: &RowOutcome) -> Self {
        Self {
            line: outcome.line,
            result: outcome.result_label(),
            id: outcome.id_label(),
            shortname: outcome.shortname.clone(),
            fullname: outcome.fullname.clone(),
            category_path: outcome.category_path.clone(),
            idnumber: outcome.idnumber.clone(),
            status: outcome.status.join("\n"),
        }
    }
}

#[derive(Debug, Clone, Tabled)]
struct TotalsTableRow {
    #[tabled(rename = "Result")]
    label: &'static str,
    #[tabled(rename = "Count")]
    count: usize,
}

/// Buffers rows and renders them as `psql` style tables when the run ends.
pub struct TableReporter<W: Write> {
    out: W,
    rows: Vec<OutcomeTableRow>,
    totals: Option<RunTotals>,
}

impl<W: Write> TableReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            rows: Vec::new(),
            totals: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ImportReporter for TableReporter<W> {
    fn row(&mut self, outcome: &RowOutcome) -> io::Result<()> {
        self.rows.push(outcome.into());
        Ok(())
    }

    fn results(&mut self, totals: &RunTotals) -> io::Result<()> {
        self.totals = Some(*totals);
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        if !self.rows.is_empty() {
            let table = Table::new(&self.rows).with(Style::psql()).to_string();
            writeln!(self.out, "{}", table)?;
        }
        if let Some(totals) = self.totals.take() {
            let items: Vec<TotalsTableRow> = totals
                .lines()
                .into_iter()
                .map(|(label, count)| TotalsTableRow { label, count })
                .collect();
            writeln!(self.out)?;
            writeln!(self.out, "{}", Table::new(items).with(Style::psql()))?;
        }
        self.rows.clear();
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(success: bool) -> RowOutcome {
        RowOutcome {
            line: 2,
            success,
            id: success.then_some(7),
            shortname: "PHY101".into(),
            fullname: "Physics 101".into(),
            category_path: "Science / Physics".into(),
            idnumber: String::new(),
            status: vec!["Course created".into()],
        }
    }

    #[test]
    fn test_plain_report_layout() {
        let mut reporter = PlainReporter::new(Vec::new());
        reporter.start().unwrap();
        reporter.row(&outcome(true)).unwrap();
        reporter.row(&outcome(false)).unwrap();
        reporter
            .results(&RunTotals {
                total: 2,
                created: 1,
                errors: 1,
                ..Default::default()
            })
            .unwrap();
        reporter.finish().unwrap();

        let text = String::from_utf8(reporter.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "line\tresult\tid\tshortname\tfullname\tcategory_path\tidnumber");
        assert_eq!(lines[1], "2\tOK\t7\tPHY101\tPhysics 101\tScience / Physics\t");
        assert_eq!(lines[2], "    Course created");
        assert!(lines[3].starts_with("2\tNOK\t\t"));
        assert!(text.contains("Courses created: 1"));
        assert!(text.contains("Errors: 1"));
    }

    #[test]
    fn test_table_report_renders_on_finish() {
        let mut reporter = TableReporter::new(Vec::new());
        reporter.start().unwrap();
        reporter.row(&outcome(true)).unwrap();
        assert!(reporter.out.is_empty());

        reporter
            .results(&RunTotals {
                preview: true,
                total: 1,
                created: 1,
                ..Default::default()
            })
            .unwrap();
        reporter.finish().unwrap();

        let text = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(text.contains("Shortname"));
        assert!(text.contains("PHY101"));
        assert!(text.contains("Courses to be created"));
    }

    #[test]
    fn test_totals_display() {
        let totals = RunTotals {
            total: 3,
            deleted: 1,
            ..Default::default()
        };
        let line = totals.to_string();
        assert!(line.starts_with("Rows processed: 3"));
        assert!(line.contains("Courses deleted: 1"));
    }
}
