// This file contains the code for the metmodels core-edges and core-exchanges subcommands, which
// find the metabolic exchanges shared by most samples.

// Copyright 2026 MetModels contributors

// This file is part of MetModels. MetModels is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. MetModels
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with MetModels. If not, see <http://www.gnu.org/licenses/>.

use std::path::{Path, PathBuf};

use crate::exchanges::{Direction, Exchange, find_exchange_files, load_exchange_files,
                       set_thread_count};
use crate::frame::{Aggregate, Matrix};
use crate::log::{section_header, explanation};
use crate::metrics::{CoreExchangeMetrics, CoreMetrics, yaml_path_for};
use crate::misc::{check_if_dir_exists, check_threads, format_float, quit_with_error};


pub fn core_edges(in_dir: PathBuf, core: f64, out_all: PathBuf, out_core: PathBuf,
                  threads: usize) {
    check_settings(&in_dir, core, threads);
    section_header("Starting metmodels core-edges");
    explanation("This command finds the taxon-metabolite exchanges (edges) present in most \
                 samples. An edge is core when it has a non-zero flux in more than the given \
                 percentage of samples.");
    eprintln!("Settings:");
    eprintln!("  --in_dir {}", in_dir.display());
    eprintln!("  --core {}", format_float(core));
    eprintln!("  --output_all {}", out_all.display());
    eprintln!("  --output_core {}", out_core.display());
    eprintln!("  --threads {}", threads);
    eprintln!();
    set_thread_count(threads);
    let exchanges = load_taxon_exchanges(&in_dir);
    let edges = edge_matrix(&exchanges);
    edges.save_csv(&out_all);

    section_header("Finding core edges");
    let metrics = save_core(&edges, core, &out_core, "edges");
    let yaml = yaml_path_for(&out_core);
    metrics.save_to_yaml(&yaml);

    section_header("Finished!");
    eprintln!("All edges:  {}", out_all.display());
    eprintln!("Core edges: {}", out_core.display());
    eprintln!("Metrics:    {}", yaml.display());
    eprintln!();
}


pub fn core_exchanges(in_dir: PathBuf, core: f64, out_all_exports: PathBuf,
                      out_all_imports: PathBuf, out_core: String, threads: usize) {
    check_settings(&in_dir, core, threads);
    section_header("Starting metmodels core-exchanges");
    explanation("This command sums exchange fluxes per sample and metabolite, separately for \
                 exports and imports, and finds the metabolites exchanged in most samples.");
    eprintln!("Settings:");
    eprintln!("  --in_dir {}", in_dir.display());
    eprintln!("  --core {}", format_float(core));
    eprintln!("  --output_all_exports {}", out_all_exports.display());
    eprintln!("  --output_all_imports {}", out_all_imports.display());
    eprintln!("  --output_core {}", out_core);
    eprintln!("  --threads {}", threads);
    eprintln!();
    set_thread_count(threads);
    let exchanges = load_taxon_exchanges(&in_dir);
    let exports = metabolite_matrix(&exchanges, Direction::Export);
    let imports = metabolite_matrix(&exchanges, Direction::Import);
    exports.save_csv(&out_all_exports);
    imports.save_csv(&out_all_imports);

    let out_core_exports = PathBuf::from(format!("{}_exports.csv", out_core));
    let out_core_imports = PathBuf::from(format!("{}_imports.csv", out_core));
    section_header("Core export reactions");
    let export_metrics = save_core(&exports, core, &out_core_exports, "metabolites");
    section_header("Core import reactions");
    let import_metrics = save_core(&imports, core, &out_core_imports, "metabolites");
    let yaml = PathBuf::from(format!("{}.yaml", out_core));
    CoreExchangeMetrics { exports: export_metrics, imports: import_metrics }.save_to_yaml(&yaml);

    section_header("Finished!");
    eprintln!("All exports:  {}", out_all_exports.display());
    eprintln!("All imports:  {}", out_all_imports.display());
    eprintln!("Core exports: {}", out_core_exports.display());
    eprintln!("Core imports: {}", out_core_imports.display());
    eprintln!("Metrics:      {}", yaml.display());
    eprintln!();
}


fn check_settings(in_dir: &Path, core: f64, threads: usize) {
    check_if_dir_exists(in_dir);
    if !(0.0..=100.0).contains(&core) {
        quit_with_error("--core must be between 0 and 100 (inclusive)");
    }
    check_threads(threads);
}


fn load_taxon_exchanges(in_dir: &Path) -> Vec<Exchange> {
    // All exchanges except those of the shared medium.
    let files = find_exchange_files(in_dir);
    load_exchange_files(&files).into_iter().filter(|e| !e.is_medium()).collect()
}


fn edge_matrix(exchanges: &[Exchange]) -> Matrix {
    // Samples by taxon_metabolite edges. Flux sign keeps the direction.
    Matrix::pivot("sample_id", exchanges.iter().map(|e| {
        (e.sample_id.clone(), format!("{}_{}", e.taxon, e.metabolite), e.flux)
    }), Aggregate::Unique)
}


fn metabolite_matrix(exchanges: &[Exchange], direction: Direction) -> Matrix {
    Matrix::pivot("sample_id", exchanges.iter().filter(|e| e.direction == direction)
                      .map(|e| (e.sample_id.clone(), e.metabolite.clone(), e.flux)),
                  Aggregate::Sum)
}


fn save_core(matrix: &Matrix, core: f64, out_file: &Path, feature_name: &str) -> CoreMetrics {
    let (metrics, core_cols) = CoreMetrics::new(matrix, core);
    matrix.select_columns(&core_cols).save_csv(out_file);
    eprintln!("Samples: {}", metrics.sample_count);
    eprintln!("Total {}: {}", feature_name, metrics.feature_count);
    eprintln!("{} in more than {}% of samples: {}", capitalise(feature_name), format_float(core),
              metrics.core_count);
    eprintln!("{} in 100% of samples: {}", capitalise(feature_name), metrics.strict_core_count);
    eprintln!();
    metrics
}


fn capitalise(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None        => String::new(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use crate::tests::{make_test_file, make_exchange_dir};

    #[test]
    fn test_core_edges() {
        let dir = tempdir().unwrap();
        let in_dir = make_exchange_dir(dir.path());
        let out_all = dir.path().join("edges_all.csv");
        let out_core = dir.path().join("edges_core.csv");
        core_edges(in_dir, 60.0, out_all.clone(), out_core.clone(), 2);
        assert_eq!(std::fs::read_to_string(&out_all).unwrap(),
                   "sample_id,b1_ac_e,b1_h2s_e,b2_ac_e,b3_but_e\n\
                    S1,2.5,0,-1,0\n\
                    S2,2,-0.5,-1.5,0\n\
                    S3,1,0,0,0.3\n");
        assert_eq!(std::fs::read_to_string(&out_core).unwrap(),
                   "sample_id,b1_ac_e,b2_ac_e\nS1,2.5,-1\nS2,2,-1.5\nS3,1,0\n");
        let yaml = std::fs::read_to_string(dir.path().join("edges_core.yaml")).unwrap();
        assert!(yaml.contains("core_count: 2"));
        assert!(yaml.contains("strict_core_count: 1"));
    }

    #[test]
    fn test_core_edges_small_flux() {
        // A tiny but non-zero flux makes an edge core, so it must not be written as zero.
        let dir = tempdir().unwrap();
        let in_dir = dir.path().join("exchanges");
        make_test_file(&in_dir.join("exchanges_grow_S1.csv"),
                       "taxon,sample_id,reaction,metabolite,direction,flux\n\
                        b1,S1,EX_ac_e,ac_e,export,5e-7\n");
        make_test_file(&in_dir.join("exchanges_grow_S2.csv"),
                       "taxon,sample_id,reaction,metabolite,direction,flux\n\
                        b1,S2,EX_ac_e,ac_e,export,1\n");
        let out_all = dir.path().join("edges_all.csv");
        let out_core = dir.path().join("edges_core.csv");
        core_edges(in_dir, 90.0, out_all, out_core.clone(), 1);
        assert_eq!(std::fs::read_to_string(&out_core).unwrap(),
                   "sample_id,b1_ac_e\nS1,0.0000005\nS2,1\n");
    }

    #[test]
    fn test_core_edges_duplicate() {
        let dir = tempdir().unwrap();
        let in_dir = dir.path().join("exchanges");
        make_test_file(&in_dir.join("exchanges_grow_S1.csv"),
                       "taxon,sample_id,reaction,metabolite,direction,flux\n\
                        b1,S1,EX_ac_e,ac_e,export,1\n\
                        b1,S1,EX_ac_e,ac_e,export,2\n");
        let out_all = dir.path().join("edges_all.csv");
        let out_core = dir.path().join("edges_core.csv");
        assert!(std::panic::catch_unwind(|| {
            core_edges(in_dir, 90.0, out_all, out_core, 1);
        }).is_err());
    }

    #[test]
    fn test_core_exchanges() {
        let dir = tempdir().unwrap();
        let in_dir = make_exchange_dir(dir.path());
        let out_exports = dir.path().join("all_exports.csv");
        let out_imports = dir.path().join("all_imports.csv");
        let out_core = dir.path().join("met_exchanges_core").display().to_string();
        core_exchanges(in_dir, 90.0, out_exports.clone(), out_imports.clone(), out_core, 2);
        assert_eq!(std::fs::read_to_string(&out_exports).unwrap(),
                   "sample_id,ac_e,but_e\nS1,2.5,0\nS2,2,0\nS3,1,0.3\n");
        assert_eq!(std::fs::read_to_string(&out_imports).unwrap(),
                   "sample_id,ac_e,h2s_e\nS1,-1,0\nS2,-1.5,-0.5\n");
        assert_eq!(std::fs::read_to_string(dir.path().join("met_exchanges_core_exports.csv"))
                       .unwrap(),
                   "sample_id,ac_e\nS1,2.5\nS2,2\nS3,1\n");
        assert_eq!(std::fs::read_to_string(dir.path().join("met_exchanges_core_imports.csv"))
                       .unwrap(),
                   "sample_id,ac_e\nS1,-1\nS2,-1.5\n");
        assert!(dir.path().join("met_exchanges_core.yaml").is_file());
    }

    #[test]
    fn test_bad_core() {
        let dir = tempdir().unwrap();
        assert!(std::panic::catch_unwind(|| { check_settings(dir.path(), 101.0, 1); }).is_err());
        assert!(std::panic::catch_unwind(|| { check_settings(dir.path(), 50.0, 0); }).is_err());
    }
}
