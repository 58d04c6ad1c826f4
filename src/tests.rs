// This file contains some high-level tests for MetModels and functions common to other tests.

// Copyright 2026 MetModels contributors

// This file is part of MetModels. MetModels is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. MetModels
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with MetModels. If not, see <http://www.gnu.org/licenses/>.

use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{File, create_dir_all, read_to_string};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

use crate::commtypes::commtypes;
use crate::donors::donors;
use crate::filter::filter_samples2domain;
use crate::merge_fluxes::{extract_exchanges, merge_fluxes};
use crate::micom_tables::micom_tables;
use crate::parse_kma::parse_kma;
use crate::production::net_production;
use crate::core_exchanges::core_exchanges;
use crate::select_mags::select_mags;


pub fn assert_almost_eq(a: f64, b: f64, epsilon: f64) {
    assert!((a - b).abs() < epsilon,
            "Numbers are not within {:?} of each other: {} vs {}", epsilon, a, b);
}


pub fn make_test_file(file_path: &Path, contents: &str) {
    if let Some(parent) = file_path.parent() {
        create_dir_all(parent).unwrap();
    }
    let mut file = File::create(file_path).unwrap();
    write!(file, "{}", contents).unwrap();
}


pub fn make_gzipped_test_file(file_path: &Path, contents: &str) {
    if let Some(parent) = file_path.parent() {
        create_dir_all(parent).unwrap();
    }
    let mut file = File::create(file_path).unwrap();
    let mut e = GzEncoder::new(Vec::new(), Compression::default());
    e.write_all(contents.as_bytes()).unwrap();
    let _ = file.write_all(&e.finish().unwrap());
}


const EXCHANGE_HEADER: &str = "taxon,sample_id,tolerance,reaction,flux,abundance,metabolite,\
                               direction\n";


pub fn make_exchange_dir(dir: &Path) -> PathBuf {
    // Three samples of growth simulation exchanges. Taxa b1 and b2 trade acetate, b1 takes up
    // hydrogen sulfide in S2 and b3 only appears in S3.
    let exchange_dir = dir.join("exchanges");
    make_test_file(&exchange_dir.join("exchanges_grow_S1.csv"),
                   &format!("{}b1,S1,1e-6,EX_ac_e,2.5,0.6,ac_e,export\n\
                              b2,S1,1e-6,EX_ac_e,-1,0.4,ac_e,import\n\
                              medium,S1,1e-6,EX_ac_m,1.5,,ac_m,export\n", EXCHANGE_HEADER));
    make_test_file(&exchange_dir.join("exchanges_grow_S2.csv"),
                   &format!("{}b1,S2,1e-6,EX_ac_e,2,0.5,ac_e,export\n\
                              b1,S2,1e-6,EX_h2s_e,-0.5,0.5,h2s_e,import\n\
                              b2,S2,1e-6,EX_ac_e,-1.5,0.5,ac_e,import\n\
                              medium,S2,1e-6,EX_ac_m,0.5,,ac_m,export\n", EXCHANGE_HEADER));
    make_test_file(&exchange_dir.join("exchanges_grow_S3.csv"),
                   &format!("{}b1,S3,1e-6,EX_ac_e,1,0.9,ac_e,export\n\
                              b3,S3,1e-6,EX_but_e,0.3,0.1,but_e,export\n\
                              medium,S3,1e-6,EX_but_m,-0.3,,but_m,import\n", EXCHANGE_HEADER));
    exchange_dir
}


#[test]
fn test_genome_selection() {
    // select-mags picks one bin per species, then filter-samples2domain keeps only those bins.
    let dir = tempdir().unwrap();
    let gtdb = dir.path().join("gtdb.tsv");
    make_test_file(&gtdb, "binID\tclassification\nb1\tBacteroides dorei\nb2\tBacteroides dorei\n\
                           b3\tAlistipes\n");
    let checkm = dir.path().join("checkm.tsv");
    make_test_file(&checkm, "b1 k__Bacteria (UID1) 100 50 30 0 1 2 3 4 5 90.0 1.2 0.0\n\
                             b2 k__Bacteria (UID1) 100 50 30 0 1 2 3 4 5 97.5 1.2 0.0\n\
                             b3 k__Bacteria (UID1) 100 50 30 0 1 2 3 4 5 80.0 1.2 0.0\n");
    let out_all = dir.path().join("all_bins_with_compl.csv");
    let out_best = dir.path().join("HQ_bins_with_compl.csv");
    select_mags(gtdb, checkm, out_all, out_best.clone());

    let samples2domain = dir.path().join("samples2domain.tsv");
    make_test_file(&samples2domain, "b1\tS1\tBacteria\nb2\tS1\tBacteria\nb3\tS2\tBacteria\n");
    let filtered = dir.path().join("samples2domain_filtered.tsv");
    filter_samples2domain(out_best, samples2domain, filtered.clone());
    assert_eq!(read_to_string(&filtered).unwrap(), "b2\tS1\tBacteria\nb3\tS2\tBacteria\n");
}


#[test]
fn test_abundance_to_simulation_inputs() {
    // parse-kma merges read mappings into an abundance table, which then feeds both micom-tables
    // and commtypes.
    let dir = tempdir().unwrap();
    let res_header = "#Template\tScore\tExpected\tTemplate_length\tTemplate_Identity\t\
                      Template_Coverage\tQuery_Identity\tQuery_Coverage\tDepth\tq_value\t\
                      p_value\n";
    let kma_dir = dir.path().join("kma");
    make_test_file(&kma_dir.join("S1_mags.res"),
                   &format!("{}b1|c1|Bacteroides dorei\t1\t1\t1\t1\t1\t1\t1\t2.5\t1\t1\n\
                              b1|c2|Bacteroides dorei\t1\t1\t1\t1\t1\t1\t1\t1.5\t1\t1\n\
                              b2|c3|Alistipes\t1\t1\t1\t1\t1\t1\t1\t1\t1\t1\n", res_header));
    make_test_file(&kma_dir.join("S2_mags.res"),
                   &format!("{}b2|c1|Alistipes\t1\t1\t1\t1\t1\t1\t1\t4.0\t1\t1\n", res_header));
    let abundance = dir.path().join("kma_merged.csv");
    parse_kma(kma_dir, abundance.clone());

    let gems = dir.path().join("gems");
    make_test_file(&gems.join("b1.xml"), "b1");
    make_test_file(&gems.join("b2.xml"), "b2");

    let tables = dir.path().join("micom_tables");
    micom_tables(abundance.clone(), gems.clone(), None, None, tables.clone());
    assert_eq!(read_to_string(tables.join("S1.csv")).unwrap(),
               format!("id,species,sample_id,file,abundance\n\
                        b1,Bacteroides dorei,S1,{},4\n\
                        b2,Alistipes,S1,{},1\n",
                       gems.join("b1.xml").display(), gems.join("b2.xml").display()));
    assert_eq!(read_to_string(tables.join("S2.csv")).unwrap(),
               format!("id,species,sample_id,file,abundance\nb2,Alistipes,S2,{},4\n",
                       gems.join("b2.xml").display()));

    let dmm = dir.path().join("dmm.csv");
    make_test_file(&dmm, "\"\",\"assignment\"\n\"S1\",1\n\"S2\",2\n");
    let out_table = dir.path().join("bins2biomes.csv");
    let out_dir = dir.path().join("dmm_gems");
    commtypes(abundance, dmm, gems, None, false, 30, out_table.clone(), out_dir.clone());
    assert_eq!(read_to_string(&out_table).unwrap(),
               "BinID,S1,S2,Taxonomy\nb1,1,0,Bacteroides dorei\nb2,1,2,Alistipes\n");
    assert!(out_dir.join("1").join("b1.xml").is_file());
    assert!(out_dir.join("1").join("b2.xml").is_file());
    assert!(out_dir.join("2").join("b2.xml").is_file());
    assert!(!out_dir.join("2").join("b1.xml").exists());
}


#[test]
fn test_minimal_fluxes_to_donors() {
    // extract-exchanges trims each all-fluxes table, merge-fluxes concatenates them and donors
    // scores the bins.
    let dir = tempdir().unwrap();
    let all_s1 = dir.path().join("minimal_fluxes_all_S1.csv");
    make_test_file(&all_s1, "compartment,ACALD,EX_ac_e,EX_but_e,EX_ac_m,sample\n\
                             b1,3,2,0,,S1.pickle\n\
                             b2,1,-1,0,,S1.pickle\n\
                             medium,,,,1,S1.pickle\n");
    let all_s2 = dir.path().join("minimal_fluxes_all_S2.csv");
    make_test_file(&all_s2, "compartment,EX_ac_e,EX_h2s_e,sample\n\
                             b1,1,-0.5,S2\n\
                             b3,-2,1,S2\n");
    let flux_dir = dir.path().join("minimal_fluxes");
    extract_exchanges(all_s1, flux_dir.join("minimal_fluxes_exchange_S1.csv"));
    extract_exchanges(all_s2, flux_dir.join("minimal_fluxes_exchange_S2.csv"));
    assert_eq!(read_to_string(flux_dir.join("minimal_fluxes_exchange_S1.csv")).unwrap(),
               "compartment,EX_ac_e,sample\nb1,2,S1.pickle\nb2,-1,S1.pickle\n");

    let merged = dir.path().join("minimal_fluxes_exchange_merged.csv");
    merge_fluxes(flux_dir, merged.clone());
    assert_eq!(read_to_string(&merged).unwrap(),
               "compartment,EX_ac_e,EX_h2s_e,sample\n\
                b1,2,0,S1\n\
                b2,-1,0,S1\n\
                b1,1,-0.5,S2\n\
                b3,-2,1,S2\n");

    let metadata = dir.path().join("metadata.csv");
    make_test_file(&metadata, "Sample,HD\nS1,healthy\nS2,diseased\n");
    let donor_links = dir.path().join("Donor_links.csv");
    donors(merged, metadata, donor_links.clone());
    assert_eq!(read_to_string(&donor_links).unwrap(),
               "sample,binID,n_donor_links,bin_centrality,weighted_bin_centrality,HD,n_bins,\
                donor_score,weighted_donor_score\n\
                S1,b1,1,1,2,healthy,2,1,2\n\
                S1,b2,0,0,0,healthy,2,0,0\n\
                S2,b1,1,1,1,diseased,2,1,1\n\
                S2,b3,1,1,1,diseased,2,1,1\n");
}


#[test]
fn test_exchange_summaries() {
    // Several summaries of the same exchange folder.
    let dir = tempdir().unwrap();
    let exchange_dir = make_exchange_dir(dir.path());

    let net = dir.path().join("net_produc_consump_merged.csv");
    net_production(exchange_dir.clone(), net.clone(), 2);
    assert_eq!(read_to_string(&net).unwrap(),
               "sample_id,ac_m,but_m\nS1,1.5,0\nS2,0.5,0\nS3,0,-0.3\n");

    let all_exports = dir.path().join("all_exports.csv");
    let all_imports = dir.path().join("all_imports.csv");
    let core = dir.path().join("core").display().to_string();
    core_exchanges(exchange_dir, 50.0, all_exports.clone(), all_imports, core.clone(), 2);
    assert_eq!(read_to_string(&all_exports).unwrap(),
               "sample_id,ac_e,but_e\nS1,2.5,0\nS2,2,0\nS3,1,0.3\n");
    // Acetate is exported in all three samples, butyrate in one.
    assert_eq!(read_to_string(format!("{}_exports.csv", core)).unwrap(),
               "sample_id,ac_e\nS1,2.5\nS2,2\nS3,1\n");
    assert!(Path::new(&format!("{}.yaml", core)).is_file());
}
