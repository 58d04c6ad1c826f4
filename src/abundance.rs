// This file defines the abundance table: one row per bin (or species) and one numeric column per
// sample, with an optional Taxonomy column.

// Copyright 2026 MetModels contributors

// This file is part of MetModels. MetModels is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. MetModels
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with MetModels. If not, see <http://www.gnu.org/licenses/>.

use std::path::Path;

use crate::frame::{cell, Frame};
use crate::misc::{format_float, parse_number, quit_with_error};


pub const TAXONOMY_COLUMN: &str = "Taxonomy";


#[derive(Clone, Debug, Default, PartialEq)]
pub struct AbundanceTable {
    pub index_name: String,
    pub row_ids: Vec<String>,
    pub samples: Vec<String>,
    pub values: Vec<Vec<f64>>,
    pub taxonomy: Option<Vec<String>>,
}

impl AbundanceTable {
    pub fn load(filename: &Path) -> Self {
        let frame = Frame::load_csv(filename);
        Self::from_frame(frame, filename)
    }

    fn from_frame(frame: Frame, filename: &Path) -> Self {
        if frame.header.is_empty() {
            quit_with_error(&format!("{} is empty", filename.display()));
        }
        let taxonomy_col = frame.find_column(TAXONOMY_COLUMN);
        let sample_cols: Vec<usize> = (1..frame.header.len())
            .filter(|&c| Some(c) != taxonomy_col).collect();
        let samples = sample_cols.iter().map(|&c| frame.header[c].clone()).collect();
        let mut row_ids = Vec::with_capacity(frame.rows.len());
        let mut values = Vec::with_capacity(frame.rows.len());
        for row in &frame.rows {
            row_ids.push(cell(row, 0).to_string());
            values.push(sample_cols.iter().map(|&c| {
                let text = cell(row, c);
                if text.trim().is_empty() { return 0.0; }
                parse_number(text).unwrap_or_else(|| {
                    quit_with_error(&format!("non-numeric abundance in {}: {}",
                                             filename.display(), text));
                })
            }).collect());
        }
        let taxonomy = taxonomy_col.map(|t| {
            frame.rows.iter().map(|row| cell(row, t).to_string()).collect()
        });
        AbundanceTable { index_name: frame.header[0].clone(), row_ids, samples, values, taxonomy }
    }

    pub fn sample_index(&self, sample: &str) -> Option<usize> {
        self.samples.iter().position(|s| s == sample)
    }

    pub fn row_index(&self, row_id: &str) -> Option<usize> {
        self.row_ids.iter().position(|r| r == row_id)
    }

    pub fn get(&self, row_id: &str, sample: &str) -> Option<f64> {
        Some(self.values[self.row_index(row_id)?][self.sample_index(sample)?])
    }

    pub fn taxonomy_of(&self, row: usize) -> Option<&str> {
        self.taxonomy.as_ref().map(|t| t[row].as_str())
    }

    pub fn save(&self, filename: &Path) {
        // Sample columns first, then Taxonomy last (if present).
        let mut header = vec![self.index_name.clone()];
        header.extend(self.samples.iter().cloned());
        if self.taxonomy.is_some() { header.push(TAXONOMY_COLUMN.to_string()); }
        let mut frame = Frame::new(header);
        for (i, row_id) in self.row_ids.iter().enumerate() {
            let mut row = vec![row_id.clone()];
            row.extend(self.values[i].iter().map(|v| format_float(*v)));
            if let Some(taxonomy) = self.taxonomy_of(i) { row.push(taxonomy.to_string()); }
            frame.rows.push(row);
        }
        frame.save_csv(filename);
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use crate::tests::make_test_file;

    #[test]
    fn test_load_with_taxonomy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abund.csv");
        make_test_file(&path, "BinID,S1,S2,Taxonomy\n\
                               b1,10.5,0,Bacteroides dorei\n\
                               b2,,3,Alistipes\n");
        let table = AbundanceTable::load(&path);
        assert_eq!(table.index_name, "BinID");
        assert_eq!(table.samples, vec!["S1", "S2"]);
        assert_eq!(table.values, vec![vec![10.5, 0.0], vec![0.0, 3.0]]);
        assert_eq!(table.taxonomy_of(1), Some("Alistipes"));
        assert_eq!(table.get("b2", "S2"), Some(3.0));
        assert_eq!(table.get("b3", "S2"), None);
    }

    #[test]
    fn test_load_without_taxonomy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abund.csv");
        make_test_file(&path, "species,ERR1,ERR2\nBacteroides_dorei,1,2\n");
        let table = AbundanceTable::load(&path);
        assert!(table.taxonomy.is_none());
        assert_eq!(table.samples, vec!["ERR1", "ERR2"]);
        assert_eq!(table.taxonomy_of(0), None);
    }

    #[test]
    fn test_non_numeric() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abund.csv");
        make_test_file(&path, "BinID,S1\nb1,abc\n");
        assert!(std::panic::catch_unwind(|| { AbundanceTable::load(&path); }).is_err());
    }

    #[test]
    fn test_save() {
        let dir = tempdir().unwrap();
        let in_path = dir.path().join("in.csv");
        let out_path = dir.path().join("out.csv");
        make_test_file(&in_path, "BinID,S1,Taxonomy\nb1,1.50,Bacteroides\n");
        AbundanceTable::load(&in_path).save(&out_path);
        assert_eq!(std::fs::read_to_string(&out_path).unwrap(),
                   "BinID,S1,Taxonomy\nb1,1.5,Bacteroides\n");
    }
}
