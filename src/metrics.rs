// This file contains the code for writing MetModels's YAML files of step statistics.

// Copyright 2026 MetModels contributors

// This file is part of MetModels. MetModels is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. MetModels
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with MetModels. If not, see <http://www.gnu.org/licenses/>.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::frame::Matrix;
use crate::misc::{create_parent_dir, quit_with_error};


#[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct CoreMetrics {
    pub sample_count: usize,
    pub feature_count: usize,
    pub core_percentage: f64,
    pub core_threshold: f64,
    pub core_count: usize,
    pub strict_core_count: usize,
}

impl CoreMetrics {
    pub fn new(matrix: &Matrix, core_percentage: f64) -> (Self, Vec<usize>) {
        // Returns the metrics along with the indices of the core columns. A feature is core when
        // it is non-zero in more than the threshold number of samples.
        let sample_count = matrix.row_count();
        let core_threshold = core_percentage * sample_count as f64 / 100.0;
        let counts = matrix.column_nonzero_counts();
        let core_columns: Vec<usize> = counts.iter().enumerate()
            .filter(|(_, &c)| c as f64 > core_threshold).map(|(j, _)| j).collect();
        let strict_core_count = counts.iter().filter(|&&c| c == sample_count).count();
        let metrics = CoreMetrics {
            sample_count,
            feature_count: matrix.col_count(),
            core_percentage,
            core_threshold,
            core_count: core_columns.len(),
            strict_core_count,
        };
        (metrics, core_columns)
    }

    pub fn save_to_yaml(&self, filename: &Path) { save_yaml_or_quit(filename, self); }
}


#[derive(Serialize, Deserialize, Debug, Default)]
pub struct CoreExchangeMetrics {
    pub exports: CoreMetrics,
    pub imports: CoreMetrics,
}

impl CoreExchangeMetrics {
    pub fn save_to_yaml(&self, filename: &Path) { save_yaml_or_quit(filename, self); }
}


#[derive(Serialize, Deserialize, Debug, Default)]
pub struct MetadataFilterMetrics {
    pub input_sample_count: usize,
    pub passing_run_count: usize,
    pub after_depth_filter_count: usize,
    pub after_status_filter_count: usize,
    pub study_count: usize,
    pub samples_per_status: BTreeMap<String, usize>,
    pub samples_per_study: BTreeMap<String, usize>,
}

impl MetadataFilterMetrics {
    pub fn new() -> Self { Self::default() }

    pub fn save_to_yaml(&self, filename: &Path) { save_yaml_or_quit(filename, self); }
}


pub fn yaml_path_for(table_filename: &Path) -> PathBuf {
    // edges_core.csv -> edges_core.yaml
    table_filename.with_extension("yaml")
}


fn save_yaml_or_quit<T: Serialize>(yaml_filename: &Path, data: &T) {
    if let Err(e) = save_yaml(yaml_filename, data) {
        quit_with_error(&format!("failed to write {}\n{}", yaml_filename.display(), e));
    }
}


fn save_yaml<T: Serialize>(yaml_filename: &Path, data: &T) -> io::Result<()> {
    let yaml_string = serde_yaml::to_string(data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    create_parent_dir(yaml_filename);
    let mut file = File::create(yaml_filename)?;
    file.write_all(yaml_string.as_bytes())?;
    Ok(())
}
