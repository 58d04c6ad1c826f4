// This file defines the two table types used throughout MetModels: Frame, a table of text cells
// loaded from CSV/TSV, and Matrix, a labelled table of numbers (usually the result of a pivot).

// Copyright 2026 MetModels contributors

// This file is part of MetModels. MetModels is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. MetModels
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with MetModels. If not, see <http://www.gnu.org/licenses/>.

use csv::{ReaderBuilder, Writer, WriterBuilder};
use fxhash::FxHashMap;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::misc::{create_parent_dir, format_float, open_reader, quit_with_error};


#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Frame {
    pub fn new(header: Vec<String>) -> Self {
        Frame { header, rows: Vec::new() }
    }

    pub fn load_csv(filename: &Path) -> Self {
        Self::load(filename, b',', true)
    }

    pub fn load_tsv(filename: &Path, has_headers: bool) -> Self {
        Self::load(filename, b'\t', has_headers)
    }

    pub fn load(filename: &Path, delimiter: u8, has_headers: bool) -> Self {
        Self::from_reader(open_reader(filename), delimiter, has_headers).unwrap_or_else(|e| {
            quit_with_error(&format!("failed to parse {}\n{}", filename.display(), e));
        })
    }

    pub fn from_reader<R: Read>(reader: R, delimiter: u8, has_headers: bool)
            -> csv::Result<Self> {
        // Rows are read as bytes and decoded lossily, and short rows are padded with empty cells
        // so every row is as wide as the header.
        let mut rdr = ReaderBuilder::new().delimiter(delimiter).has_headers(has_headers)
                                          .flexible(true).from_reader(reader);
        let header: Vec<String> = if has_headers {
            rdr.byte_headers()?.iter().map(|h| String::from_utf8_lossy(h).trim().to_string())
                               .collect()
        } else {
            Vec::new()
        };
        let mut rows = Vec::new();
        for record in rdr.byte_records() {
            let record = record?;
            let mut row: Vec<String> = record.iter()
                .map(|c| String::from_utf8_lossy(c).into_owned()).collect();
            while row.len() < header.len() { row.push(String::new()); }
            rows.push(row);
        }
        Ok(Frame { header, rows })
    }

    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    pub fn column(&self, name: &str, filename: &Path) -> usize {
        self.find_column(name).unwrap_or_else(|| {
            quit_with_error(&format!("{} has no {} column", filename.display(), name));
        })
    }

    pub fn save_csv(&self, filename: &Path) {
        self.save(filename, b',');
    }

    pub fn save(&self, filename: &Path, delimiter: u8) {
        let mut wtr = table_writer(filename, delimiter);
        if let Err(e) = self.write_records(&mut wtr) {
            quit_with_error(&format!("failed to write {}\n{}", filename.display(), e));
        }
    }

    fn write_records(&self, wtr: &mut Writer<File>) -> csv::Result<()> {
        if !self.header.is_empty() {
            wtr.write_record(&self.header)?;
        }
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }
}


pub fn cell(row: &[String], col: usize) -> &str {
    row.get(col).map(|s| s.as_str()).unwrap_or("")
}


pub fn table_writer(filename: &Path, delimiter: u8) -> Writer<File> {
    create_parent_dir(filename);
    WriterBuilder::new().delimiter(delimiter).flexible(true).from_path(filename)
        .unwrap_or_else(|e| {
            quit_with_error(&format!("unable to create {}\n{}", filename.display(), e));
        })
}


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aggregate {
    Sum,    // repeated (row, column) pairs are added together
    Unique, // repeated (row, column) pairs are an error
}


#[derive(Clone, Debug, Default, PartialEq)]
pub struct Matrix {
    pub index_name: String,
    pub row_names: Vec<String>,
    pub col_names: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl Matrix {
    pub fn new(index_name: &str, row_names: Vec<String>, col_names: Vec<String>) -> Self {
        let values = vec![vec![0.0; col_names.len()]; row_names.len()];
        Matrix { index_name: index_name.to_string(), row_names, col_names, values }
    }

    pub fn pivot<I>(index_name: &str, triples: I, aggregate: Aggregate) -> Self
            where I: IntoIterator<Item = (String, String, f64)> {
        // Builds a matrix from (row, column, value) triples. Rows and columns are sorted and any
        // cell without a triple is zero.
        let triples: Vec<_> = triples.into_iter().collect();
        let row_names: Vec<String> = triples.iter().map(|(r, _, _)| r.clone())
            .collect::<BTreeSet<_>>().into_iter().collect();
        let col_names: Vec<String> = triples.iter().map(|(_, c, _)| c.clone())
            .collect::<BTreeSet<_>>().into_iter().collect();
        let row_index: FxHashMap<&str, usize> = row_names.iter().enumerate()
            .map(|(i, r)| (r.as_str(), i)).collect();
        let col_index: FxHashMap<&str, usize> = col_names.iter().enumerate()
            .map(|(i, c)| (c.as_str(), i)).collect();
        let mut values = vec![vec![0.0; col_names.len()]; row_names.len()];
        let mut seen = vec![vec![false; col_names.len()]; row_names.len()];
        for (r, c, v) in &triples {
            let i = row_index[r.as_str()];
            let j = col_index[c.as_str()];
            if seen[i][j] && aggregate == Aggregate::Unique {
                quit_with_error(&format!("duplicate entry for {} and {}", r, c));
            }
            seen[i][j] = true;
            values[i][j] += v;
        }
        Matrix { index_name: index_name.to_string(), row_names, col_names, values }
    }

    pub fn row_count(&self) -> usize { self.row_names.len() }

    pub fn col_count(&self) -> usize { self.col_names.len() }

    pub fn column_nonzero_counts(&self) -> Vec<usize> {
        (0..self.col_count()).map(|j| self.values.iter().filter(|row| row[j] != 0.0).count())
                             .collect()
    }

    pub fn select_columns(&self, cols: &[usize]) -> Matrix {
        Matrix {
            index_name: self.index_name.clone(),
            row_names: self.row_names.clone(),
            col_names: cols.iter().map(|&j| self.col_names[j].clone()).collect(),
            values: self.values.iter().map(|row| cols.iter().map(|&j| row[j]).collect())
                                      .collect(),
        }
    }

    pub fn row_sums(&self) -> Vec<f64> {
        self.values.iter().map(|row| row.iter().sum()).collect()
    }

    pub fn retain_rows<F>(&mut self, mut keep: F) where F: FnMut(&[f64]) -> bool {
        let mut row_names = Vec::new();
        let mut values = Vec::new();
        for (name, row) in self.row_names.drain(..).zip(self.values.drain(..)) {
            if keep(&row) {
                row_names.push(name);
                values.push(row);
            }
        }
        self.row_names = row_names;
        self.values = values;
    }

    pub fn push_column(&mut self, name: &str, column: &[f64]) {
        self.col_names.push(name.to_string());
        for (row, v) in self.values.iter_mut().zip(column) {
            row.push(*v);
        }
    }

    pub fn reorder_rows(&mut self, order: &[usize]) {
        // The order must be a permutation of the row indices.
        self.row_names = order.iter().map(|&i| self.row_names[i].clone()).collect();
        self.values = order.iter().map(|&i| self.values[i].clone()).collect();
    }

    pub fn get(&self, row: &str, col: &str) -> Option<f64> {
        let i = self.row_names.iter().position(|r| r == row)?;
        let j = self.col_names.iter().position(|c| c == col)?;
        Some(self.values[i][j])
    }

    pub fn save_csv(&self, filename: &Path) {
        self.save_with_extra_column(filename, None);
    }

    pub fn save_with_extra_column(&self, filename: &Path, extra: Option<(&str, &[String])>) {
        // Writes the matrix with row names in the first column. An optional text column (e.g.
        // an annotation) can be appended after the numeric columns.
        let mut frame = Frame::new(std::iter::once(self.index_name.clone())
                                       .chain(self.col_names.iter().cloned())
                                       .chain(extra.iter().map(|(name, _)| name.to_string()))
                                       .collect());
        for (i, (name, row)) in self.row_names.iter().zip(self.values.iter()).enumerate() {
            let mut out = Vec::with_capacity(row.len() + 2);
            out.push(name.clone());
            out.extend(row.iter().map(|v| format_float(*v)));
            if let Some((_, column)) = extra {
                out.push(column.get(i).cloned().unwrap_or_default());
            }
            frame.rows.push(out);
        }
        frame.save_csv(filename);
    }
}
