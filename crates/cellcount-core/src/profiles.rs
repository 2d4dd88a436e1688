//! Tabular per-group feature profiles
//!
//! A profile table has one row per group key followed by one value per
//! variable. The header's first cell names the grouping, the remaining key
//! columns have empty headers, and the variable names follow:
//!
//! ```text
//! Well\t\tarea\tintensity
//! 0\tA01\t12.5\t0.3
//! ```

use std::collections::HashMap;
use std::io::{BufRead, Read, Write};

use cellcount_types::GroupKey;
use thiserror::Error;
use tracing::debug;

/// Errors from loading, saving or assembling profiles
#[derive(Error, Debug)]
pub enum ProfileError {
    /// Malformed input; `line` is 1-based when known
    #[error("{message}")]
    Input { source_name: String, message: String, line: Option<usize> },

    /// Keys, rows and variables do not line up
    #[error("invalid profile shape: {0}")]
    Shape(String),

    /// A profile vector contains NaN
    #[error("profile {key} has a NaN value")]
    NotANumber { key: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ProfileError {
    fn input(source_name: &str, line: usize, message: impl Into<String>) -> Self {
        Self::Input { source_name: source_name.to_string(), message: message.into(), line: Some(line) }
    }
}

/// Compiler-style message for an error, e.g. `wells.txt:3: Error: ...`
pub fn describe_error(error: &ProfileError) -> String {
    match error {
        ProfileError::Input { source_name, message, line: Some(line) } => {
            format!("{source_name}:{line}: Error: {message}")
        }
        ProfileError::Input { source_name, message, line: None } => {
            format!("{source_name}: Error: {message}")
        }
        other => format!("Error: {other}"),
    }
}

/// One input row with its 1-based line number
type Row = (usize, Vec<String>);

/// Feature vectors keyed by group key
#[derive(Debug, Clone, PartialEq)]
pub struct Profiles {
    keys: Vec<Vec<String>>,
    data: Vec<Vec<f64>>,
    variables: Vec<String>,
    key_size: usize,
    group_name: Option<String>,
}

impl Profiles {
    /// Assemble profiles, checking that keys, rows and variables line up.
    /// `key_size` defaults to the width of the first key.
    pub fn new(
        keys: Vec<Vec<String>>,
        data: Vec<Vec<f64>>,
        variables: Vec<String>,
        key_size: Option<usize>,
        group_name: Option<String>,
    ) -> Result<Self, ProfileError> {
        if keys.len() != data.len() {
            return Err(ProfileError::Shape(format!(
                "{} keys but {} data rows",
                keys.len(),
                data.len()
            )));
        }
        let key_size = key_size.or_else(|| keys.first().map(Vec::len)).unwrap_or(1);
        if let Some(key) = keys.iter().find(|key| key.len() != key_size) {
            return Err(ProfileError::Shape(format!(
                "key ({}) has {} columns, expected {key_size}",
                key.join(", "),
                key.len()
            )));
        }
        if let Some(row) = data.iter().find(|row| row.len() != variables.len()) {
            return Err(ProfileError::Shape(format!(
                "row has {} values for {} variables",
                row.len(),
                variables.len()
            )));
        }
        Ok(Self { keys, data, variables, key_size, group_name })
    }

    /// Turn per-group sums (see [`crate::DataModel::sum_to_group`]) into
    /// profiles ordered by group key
    pub fn from_group_sums(
        group_name: &str,
        variables: Vec<String>,
        sums: &HashMap<GroupKey, Vec<f64>>,
    ) -> Result<Self, ProfileError> {
        let mut groups: Vec<(&GroupKey, &Vec<f64>)> = sums.iter().collect();
        groups.sort_by(|a, b| a.0.cmp(b.0));
        let key_size = groups.first().map_or(1, |(key, _)| key.len());
        let (keys, data) =
            groups.into_iter().map(|(key, values)| (key.to_strings(), values.clone())).unzip();
        Self::new(keys, data, variables, Some(key_size), Some(group_name.to_string()))
    }

    /// Read tab-separated profiles. Lines are split on tabs; there is no quoting.
    pub fn load_tsv<R: BufRead>(reader: R, source_name: &str) -> Result<Self, ProfileError> {
        let mut rows = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end_matches(['\r', '\n']);
            if index > 0 && line.is_empty() {
                continue;
            }
            rows.push((index + 1, line.split('\t').map(str::to_string).collect()));
        }
        Self::from_rows(rows, source_name)
    }

    /// Read comma-separated profiles. Fields may be double-quoted, with `""`
    /// standing for a literal quote.
    pub fn load_csv<R: Read>(reader: R, source_name: &str) -> Result<Self, ProfileError> {
        let mut reader = csv::ReaderBuilder::new().has_headers(false).flexible(true).from_reader(reader);
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| ProfileError::Input {
                source_name: source_name.to_string(),
                message: err.to_string(),
                line: err.position().map(|position| position.line() as usize),
            })?;
            let line = record.position().map_or(rows.len() + 1, |position| position.line() as usize);
            if !rows.is_empty() && record.len() == 1 && record[0].is_empty() {
                continue;
            }
            rows.push((line, record.iter().map(str::to_string).collect()));
        }
        Self::from_rows(rows, source_name)
    }

    fn from_rows(rows: Vec<Row>, source_name: &str) -> Result<Self, ProfileError> {
        let mut rows = rows.into_iter();
        let Some((header_line, headers)) = rows.next() else {
            return Err(ProfileError::Input {
                source_name: source_name.to_string(),
                message: "Missing header line".to_string(),
                line: None,
            });
        };

        let key_size = headers.iter().rposition(String::is_empty).map_or(1, |pos| pos + 1);
        if headers[1..key_size].iter().any(|cell| !cell.is_empty()) {
            return Err(ProfileError::input(
                source_name,
                header_line,
                "Header should be empty for the key columns, except for the first, which should contain the group name",
            ));
        }
        let variables = headers[key_size..].to_vec();
        let group_name = headers.first().filter(|name| !name.is_empty()).cloned();

        let mut keys = Vec::new();
        let mut data = Vec::new();
        for (line_number, mut row) in rows {
            if row.len() < key_size {
                return Err(ProfileError::input(
                    source_name,
                    line_number,
                    format!("Expected {key_size} key columns, found {}", row.len()),
                ));
            }
            let values = row.split_off(key_size);
            if values.len() != variables.len() {
                return Err(ProfileError::input(
                    source_name,
                    line_number,
                    format!("Expected {} feature values, found {}", variables.len(), values.len()),
                ));
            }
            let values = values
                .iter()
                .map(|value| {
                    value.trim().parse::<f64>().map_err(|_| {
                        ProfileError::input(
                            source_name,
                            line_number,
                            format!("Cannot parse feature value '{value}'"),
                        )
                    })
                })
                .collect::<Result<Vec<f64>, _>>()?;
            keys.push(row);
            data.push(values);
        }

        debug!(source = source_name, rows = keys.len(), key_size, "Loaded profiles");
        Self::new(keys, data, variables, Some(key_size), group_name)
    }

    /// Header cells: group name, empty key columns, then variable names
    pub fn header(&self) -> Vec<String> {
        let mut header = Vec::with_capacity(self.key_size + self.variables.len());
        header.push(self.group_name.clone().unwrap_or_default());
        header.extend(std::iter::repeat_n(String::new(), self.key_size.saturating_sub(1)));
        header.extend(self.variables.iter().cloned());
        header
    }

    /// Write tab-separated profiles
    pub fn save_tsv<W: Write>(&self, mut writer: W) -> Result<(), ProfileError> {
        writeln!(writer, "{}", self.header().join("\t"))?;
        for cells in self.rows() {
            writeln!(writer, "{}", cells.join("\t"))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write comma-separated profiles, quoting fields that need it
    pub fn save_csv<W: Write>(&self, writer: W) -> Result<(), ProfileError> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(writer);
        writer.write_record(self.header())?;
        for cells in self.rows() {
            writer.write_record(&cells)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn rows(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        self.items().map(|(key, vector)| {
            key.iter().cloned().chain(vector.iter().map(ToString::to_string)).collect()
        })
    }

    /// `(key, values)` rows in order
    pub fn items(&self) -> impl Iterator<Item = (&[String], &[f64])> + '_ {
        self.keys.iter().map(Vec::as_slice).zip(self.data.iter().map(Vec::as_slice))
    }

    pub fn keys(&self) -> &[Vec<String>] {
        &self.keys
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn key_size(&self) -> usize {
        self.key_size
    }

    pub fn group_name(&self) -> Option<&str> {
        self.group_name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn has_nan(&self) -> bool {
        self.data.iter().flatten().any(|value| value.is_nan())
    }

    /// Fail on the first profile containing NaN
    pub fn ensure_no_nan(&self) -> Result<(), ProfileError> {
        match self.items().find(|(_, vector)| vector.iter().any(|value| value.is_nan())) {
            Some((key, _)) => Err(ProfileError::NotANumber { key: format!("({})", key.join(", ")) }),
            None => Ok(()),
        }
    }
}
