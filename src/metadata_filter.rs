// This file contains the code for the metmodels filter-metadata subcommand, which selects the
// samples to model: those with enough sequencing reads and without an excluded health status.

// Copyright 2026 MetModels contributors

// This file is part of MetModels. MetModels is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. MetModels
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with MetModels. If not, see <http://www.gnu.org/licenses/>.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::frame::{cell, Frame};
use crate::log::{section_header, explanation};
use crate::lookup::strip_cat;
use crate::metrics::{MetadataFilterMetrics, yaml_path_for};
use crate::misc::{check_if_file_exists, parse_number, quit_with_error};


// Each read takes four lines in a FASTQ file.
const LINES_PER_READ: f64 = 4.0;


pub fn filter_metadata(metadata_file: PathBuf, accessions_file: PathBuf, lines_file: PathBuf,
                       out_file: PathBuf, min_reads: u64, exclude_status: String) {
    check_if_file_exists(&metadata_file);
    check_if_file_exists(&accessions_file);
    check_if_file_exists(&lines_file);
    let excluded = parse_excluded_statuses(&exclude_status);
    section_header("Starting metmodels filter-metadata");
    explanation("This command keeps the BioSamples with at least one sequencing run above the \
                 minimum read count, then removes samples with an excluded health status.");
    eprintln!("Settings:");
    eprintln!("  --metadata {}", metadata_file.display());
    eprintln!("  --accessions {}", accessions_file.display());
    eprintln!("  --lines {}", lines_file.display());
    eprintln!("  --out_file {}", out_file.display());
    eprintln!("  --min_reads {}", min_reads);
    eprintln!("  --exclude_status {}", exclude_status);
    eprintln!();

    let passing_runs = load_passing_runs(&lines_file, min_reads);
    let run_for_biosample = passing_biosamples(&accessions_file, &passing_runs);
    let metadata = Frame::load_csv(&metadata_file);
    let (filtered, mut metrics) = filter_samples(&metadata, &metadata_file, &run_for_biosample,
                                                 &excluded);
    metrics.passing_run_count = passing_runs.len();
    print_metrics(&metrics);
    filtered.save_csv(&out_file);
    let yaml = yaml_path_for(&out_file);
    metrics.save_to_yaml(&yaml);

    section_header("Finished!");
    eprintln!("Filtered metadata: {}", out_file.display());
    eprintln!("Statistics:        {}", yaml.display());
    eprintln!();
}


fn parse_excluded_statuses(exclude_status: &str) -> HashSet<String> {
    exclude_status.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}


fn load_passing_runs(lines_file: &Path, min_reads: u64) -> HashSet<String> {
    // Runs whose line count exceeds four lines per read times the minimum read count.
    let lines = Frame::load_csv(lines_file);
    let sample_col = lines.column("Sample", lines_file);
    let lines_col = lines.column("Lines", lines_file);
    let min_lines = min_reads as f64 * LINES_PER_READ;
    lines.rows.iter().filter(|row| {
        match parse_number(cell(row, lines_col)) {
            Some(n) => n > min_lines,
            None => quit_with_error(&format!("bad line count in {}: {}", lines_file.display(),
                                             cell(row, lines_col))),
        }
    }).map(|row| strip_cat(cell(row, sample_col))).collect()
}


fn passing_biosamples(accessions_file: &Path, passing_runs: &HashSet<String>)
        -> HashMap<String, String> {
    // Maps each BioSample with a passing run to one of those runs (the last one listed).
    let accessions = Frame::load(accessions_file, b',', false);
    let mut run_for_biosample = HashMap::new();
    for row in &accessions.rows {
        let biosample = cell(row, 0).trim();
        if biosample.is_empty() { continue; }
        for run in row.iter().skip(1).map(|r| r.trim()) {
            if passing_runs.contains(run) {
                run_for_biosample.insert(biosample.to_string(), run.to_string());
            }
        }
    }
    run_for_biosample
}


fn filter_samples(metadata: &Frame, metadata_file: &Path,
                  run_for_biosample: &HashMap<String, String>, excluded: &HashSet<String>)
        -> (Frame, MetadataFilterMetrics) {
    let biosample_col = metadata.column("BioSample", metadata_file);
    let status_col = metadata.column("health_status", metadata_file);
    let study_col = metadata.column("Author_Year", metadata_file);
    let mut metrics = MetadataFilterMetrics::new();
    metrics.input_sample_count = metadata.rows.len();

    let deep_enough: Vec<&Vec<String>> = metadata.rows.iter()
        .filter(|row| run_for_biosample.contains_key(cell(row, biosample_col))).collect();
    metrics.after_depth_filter_count = deep_enough.len();

    let mut header = metadata.header.clone();
    header.push("file_prefix".to_string());
    let mut filtered = Frame::new(header);
    for row in deep_enough.into_iter()
            .filter(|row| !excluded.contains(cell(row, status_col))) {
        let mut new_row = row.clone();
        new_row.truncate(metadata.header.len());
        new_row.push(run_for_biosample[cell(row, biosample_col)].clone());
        *metrics.samples_per_status.entry(cell(row, status_col).to_string()).or_default() += 1;
        *metrics.samples_per_study.entry(cell(row, study_col).to_string()).or_default() += 1;
        filtered.rows.push(new_row);
    }
    metrics.after_status_filter_count = filtered.rows.len();
    metrics.study_count = metrics.samples_per_study.len();
    (filtered, metrics)
}


fn print_metrics(metrics: &MetadataFilterMetrics) {
    eprintln!("Samples in metadata:                    {}", metrics.input_sample_count);
    eprintln!("Runs above the minimum read count:      {}", metrics.passing_run_count);
    eprintln!("Samples after the read count filter:    {}", metrics.after_depth_filter_count);
    eprintln!("Samples after the health status filter: {}", metrics.after_status_filter_count);
    eprintln!("Studies:                                {}", metrics.study_count);
    eprintln!();
    eprintln!("Samples per health status:");
    for (status, count) in &metrics.samples_per_status {
        eprintln!("  {}: {}", status, count);
    }
    eprintln!("Samples per study:");
    for (study, count) in &metrics.samples_per_study {
        eprintln!("  {}: {}", study, count);
    }
    eprintln!();
}


#[cfg(test)]
mod tests {
    use super::*;
    use maplit::{btreemap, hashmap, hashset};
    use tempfile::tempdir;
    use crate::tests::make_test_file;

    #[test]
    fn test_parse_excluded_statuses() {
        assert_eq!(parse_excluded_statuses("overweight,underweight"),
                   hashset!{"overweight".to_string(), "underweight".to_string()});
        assert_eq!(parse_excluded_statuses(""), HashSet::new());
    }

    #[test]
    fn test_passing_biosamples() {
        let dir = tempdir().unwrap();
        let accessions = dir.path().join("accessions.csv");
        make_test_file(&accessions, "SAMD1,DRR1,DRR2\nSAMD2,DRR3\nSAMD3,DRR4,DRR5\n");
        let passing = hashset!{"DRR1".to_string(), "DRR2".to_string(), "DRR5".to_string()};
        assert_eq!(passing_biosamples(&accessions, &passing),
                   hashmap!{"SAMD1".to_string() => "DRR2".to_string(),
                            "SAMD3".to_string() => "DRR5".to_string()});
    }

    #[test]
    fn test_filter_metadata() {
        let dir = tempdir().unwrap();
        let metadata = dir.path().join("metadata.csv");
        make_test_file(&metadata, "BioSample,health_status,Author_Year\n\
                                   SAMD1,healthy,Smith_2019\n\
                                   SAMD2,healthy,Smith_2019\n\
                                   SAMD3,overweight,Jones_2020\n\
                                   SAMD4,CRC,Jones_2020\n");
        let accessions = dir.path().join("accessions.csv");
        make_test_file(&accessions, "SAMD1,DRR1\nSAMD2,DRR2\nSAMD3,DRR3\nSAMD4,DRR4,DRR5\n");
        let lines = dir.path().join("sample_lines.csv");
        make_test_file(&lines, "Sample,Lines\nDRR1_cat,80\nDRR2,40\nDRR3,100\nDRR4,90\n\
                                DRR5,41\n");
        let out_file = dir.path().join("filtered_metadata.csv");
        filter_metadata(metadata, accessions, lines, out_file.clone(), 10,
                        "overweight,underweight".to_string());
        assert_eq!(std::fs::read_to_string(&out_file).unwrap(),
                   "BioSample,health_status,Author_Year,file_prefix\n\
                    SAMD1,healthy,Smith_2019,DRR1\n\
                    SAMD4,CRC,Jones_2020,DRR5\n");
        let yaml = std::fs::read_to_string(dir.path().join("filtered_metadata.yaml")).unwrap();
        let metrics: MetadataFilterMetrics = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(metrics.input_sample_count, 4);
        assert_eq!(metrics.passing_run_count, 4);
        assert_eq!(metrics.after_depth_filter_count, 3);
        assert_eq!(metrics.after_status_filter_count, 2);
        assert_eq!(metrics.study_count, 2);
        assert_eq!(metrics.samples_per_status,
                   btreemap!{"CRC".to_string() => 1, "healthy".to_string() => 1});
    }
}
