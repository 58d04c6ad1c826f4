// This file contains the code for the metmodels producers-consumers and
// producers-consumers-detailed subcommands. They count the taxa producing and consuming each
// metabolite, which gives an importance score for the metabolite in the community.

// Copyright 2026 MetModels contributors

// This file is part of MetModels. MetModels is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. MetModels
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with MetModels. If not, see <http://www.gnu.org/licenses/>.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::exchanges::{Exchange, find_exchange_files, load_exchange_files, set_thread_count};
use crate::frame::Frame;
use crate::log::{section_header, explanation};
use crate::lookup::{load_bin_lineages, load_health_status, strip_cat, translate};
use crate::misc::{check_if_dir_exists, check_if_file_exists, check_threads, format_float,
                  format_list, format_optional, mean, quit_with_error, sample_std};


/// Producer and consumer counts for one metabolite in one sample.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoleCounts {
    pub n_producers: usize,
    pub flux_producers: f64,
    pub n_consumers: usize,
    pub flux_consumers: f64,
    pub producer_mags: BTreeSet<String>,
    pub consumer_mags: BTreeSet<String>,
}

impl RoleCounts {
    fn add(&mut self, exchange: &Exchange) {
        // A taxon with a non-negative flux counts as a producer MAG, but only a positive flux
        // counts towards the number of producers.
        if exchange.flux < 0.0 {
            self.n_consumers += 1;
            self.flux_consumers += exchange.flux;
            self.consumer_mags.insert(exchange.taxon.clone());
        } else {
            if exchange.flux > 0.0 { self.n_producers += 1; }
            self.flux_producers += exchange.flux;
            self.producer_mags.insert(exchange.taxon.clone());
        }
    }

    pub fn importance_score(&self) -> Option<f64> {
        // Harmonic-mean style score: high only when a metabolite has both many producers and
        // many consumers. Undefined with neither.
        let (np, nc) = (self.n_producers as f64, self.n_consumers as f64);
        if np + nc == 0.0 { return None; }
        Some(2.0 * np * nc / (np + nc))
    }
}


type SampleMetabolite = (String, String);


pub fn producers_consumers(in_dir: PathBuf, out_file: PathBuf, threads: usize) {
    check_if_dir_exists(&in_dir);
    check_threads(threads);
    section_header("Starting metmodels producers-consumers");
    explanation("This command counts the taxa producing (positive flux) and consuming (negative \
                 flux) each metabolite in each sample. Metabolites without any consumer are left \
                 out.");
    eprintln!("Settings:");
    eprintln!("  --in_dir {}", in_dir.display());
    eprintln!("  --out_file {}", out_file.display());
    eprintln!("  --threads {}", threads);
    eprintln!();
    set_thread_count(threads);
    let exchanges: Vec<Exchange> = load_exchange_files(&find_exchange_files(&in_dir))
        .into_iter().filter(|e| !e.is_medium()).collect();
    let counts = count_roles(&exchanges);
    let mut frame = Frame::new(["sample_id", "metabolite", "n_producers", "flux_producers",
                                "n_consumers", "flux_consumers"]
                                   .iter().map(|h| h.to_string()).collect());
    for ((sample, metabolite), c) in counts.iter().filter(|(_, c)| c.n_consumers > 0) {
        frame.rows.push(vec![sample.clone(), metabolite.clone(), c.n_producers.to_string(),
                             format_float(c.flux_producers), c.n_consumers.to_string(),
                             format_float(c.flux_consumers)]);
    }
    frame.save_csv(&out_file);
    section_header("Finished!");
    eprintln!("{} sample-metabolite pairs with consumers: {}", frame.rows.len(),
              out_file.display());
    eprintln!();
}


pub fn producers_consumers_detailed(in_dir: PathBuf, metadata_file: PathBuf,
                                    classification_file: PathBuf, out_file: PathBuf,
                                    status: String, min_importance: f64, threads: usize) {
    check_if_dir_exists(&in_dir);
    check_if_file_exists(&metadata_file);
    check_if_file_exists(&classification_file);
    check_threads(threads);
    section_header("Starting metmodels producers-consumers-detailed");
    explanation("This command summarises the producers and consumers of each metabolite across \
                 the samples of one health status. Taxa that both produce and consume a \
                 metabolite (in any sample) are flexible, the rest are exclusive producers or \
                 consumers.");
    eprintln!("Settings:");
    eprintln!("  --in_dir {}", in_dir.display());
    eprintln!("  --metadata {}", metadata_file.display());
    eprintln!("  --spp_classification {}", classification_file.display());
    eprintln!("  --out_file {}", out_file.display());
    eprintln!("  --status {}", status);
    eprintln!("  --min_importance {}", format_float(min_importance));
    eprintln!("  --threads {}", threads);
    eprintln!();
    set_thread_count(threads);
    let wanted_samples: HashSet<String> = load_health_status(&metadata_file).into_iter()
        .filter(|(_, hd)| *hd == status).map(|(sample, _)| sample).collect();
    eprintln!("{} samples with status {}", wanted_samples.len(), status);
    let lineages = load_bin_lineages(&classification_file);
    let exchanges: Vec<Exchange> = load_exchange_files(&find_exchange_files(&in_dir))
        .into_iter().filter(|e| !e.is_medium())
        .map(|mut e| { e.sample_id = strip_cat(&e.sample_id); e })
        .filter(|e| wanted_samples.contains(&e.sample_id)).collect();
    if exchanges.is_empty() {
        quit_with_error(&format!("no exchanges found for samples with status {}", status));
    }
    let summaries = summarise_metabolites(&count_roles(&exchanges), &lineages);
    save_detailed(&summaries, &out_file);
    let out_simplified = simplified_path(&out_file);
    let kept = save_simplified(&summaries, min_importance, &out_simplified);
    section_header("Finished!");
    eprintln!("Detailed summary of {} metabolites: {}", summaries.len(), out_file.display());
    eprintln!("{} metabolites with mean importance above {}: {}", kept,
              format_float(min_importance), out_simplified.display());
    eprintln!();
}


fn count_roles(exchanges: &[Exchange]) -> BTreeMap<SampleMetabolite, RoleCounts> {
    let mut counts: BTreeMap<SampleMetabolite, RoleCounts> = BTreeMap::new();
    for e in exchanges {
        counts.entry((e.sample_id.clone(), e.metabolite.clone())).or_default().add(e);
    }
    counts
}


/// Per-metabolite statistics across samples.
#[derive(Clone, Debug, Default)]
struct MetaboliteSummary {
    metabolite: String,
    importance: Vec<f64>,
    flux_producers: Vec<f64>,
    flux_consumers: Vec<f64>,
    n_producers: Vec<f64>,
    n_consumers: Vec<f64>,
    producer_mags: BTreeSet<String>,
    consumer_mags: BTreeSet<String>,
    flexible_taxa: Vec<String>,
    exclusive_producer_taxa: Vec<String>,
    exclusive_consumer_taxa: Vec<String>,
}

impl MetaboliteSummary {
    fn flexible(&self) -> Vec<String> {
        self.producer_mags.intersection(&self.consumer_mags).cloned().collect()
    }

    fn exclusive_producers(&self) -> Vec<String> {
        self.producer_mags.difference(&self.consumer_mags).cloned().collect()
    }

    fn exclusive_consumers(&self) -> Vec<String> {
        self.consumer_mags.difference(&self.producer_mags).cloned().collect()
    }

    fn total_unique_mags(&self) -> usize {
        self.producer_mags.union(&self.consumer_mags).count()
    }

    fn percentage(&self, count: usize) -> Option<f64> {
        let total = self.total_unique_mags();
        if total == 0 { None } else { Some(count as f64 * 100.0 / total as f64) }
    }
}


fn summarise_metabolites(counts: &BTreeMap<SampleMetabolite, RoleCounts>,
                         lineages: &HashMap<String, String>) -> Vec<MetaboliteSummary> {
    let mut by_metabolite: BTreeMap<&str, MetaboliteSummary> = BTreeMap::new();
    for ((_, metabolite), c) in counts {
        let s = by_metabolite.entry(metabolite.as_str()).or_default();
        s.metabolite = metabolite.clone();
        if let Some(score) = c.importance_score() { s.importance.push(score); }
        s.flux_producers.push(c.flux_producers);
        s.flux_consumers.push(c.flux_consumers);
        s.n_producers.push(c.n_producers as f64);
        s.n_consumers.push(c.n_consumers as f64);
        s.producer_mags.extend(c.producer_mags.iter().cloned());
        s.consumer_mags.extend(c.consumer_mags.iter().cloned());
    }
    let to_taxa = |bins: Vec<String>| -> Vec<String> {
        bins.iter().map(|b| translate(b, lineages, "the classification file").to_string())
            .collect()
    };
    by_metabolite.into_values().map(|mut s| {
        s.flexible_taxa = to_taxa(s.flexible());
        s.exclusive_producer_taxa = to_taxa(s.exclusive_producers());
        s.exclusive_consumer_taxa = to_taxa(s.exclusive_consumers());
        s
    }).collect()
}


fn simplified_path(out_file: &Path) -> PathBuf {
    // producers_consumers.csv -> producers_consumers_simplified.csv
    let stem = out_file.file_stem().unwrap_or_default().to_string_lossy();
    out_file.with_file_name(format!("{}_simplified.csv", stem))
}


fn save_detailed(summaries: &[MetaboliteSummary], out_file: &Path) {
    let header = ["metabolite",
                  "importance_score_mean", "importance_score_std",
                  "flux_producers_mean", "flux_producers_std",
                  "flux_consumers_mean", "flux_consumers_std",
                  "n_producers_sum", "n_producers_mean", "n_producers_std",
                  "n_consumers_sum", "n_consumers_mean", "n_consumers_std",
                  "producer_MAGs_unique", "consumer_MAGs_unique",
                  "flexible_MAGs", "exclusive_producers", "exclusive_consumers",
                  "total_n_unique_MAGs", "perc_flexible", "perc_producers", "perc_consumers",
                  "flexible_MAGs_taxa", "exclusive_producers_taxa", "exclusive_consumers_taxa"];
    let mut frame = Frame::new(header.iter().map(|h| h.to_string()).collect());
    for s in summaries {
        let producers: Vec<String> = s.producer_mags.iter().cloned().collect();
        let consumers: Vec<String> = s.consumer_mags.iter().cloned().collect();
        frame.rows.push(vec![
            s.metabolite.clone(),
            format_optional(mean(&s.importance)), format_optional(sample_std(&s.importance)),
            format_optional(mean(&s.flux_producers)),
            format_optional(sample_std(&s.flux_producers)),
            format_optional(mean(&s.flux_consumers)),
            format_optional(sample_std(&s.flux_consumers)),
            format_float(s.n_producers.iter().sum()), format_optional(mean(&s.n_producers)),
            format_optional(sample_std(&s.n_producers)),
            format_float(s.n_consumers.iter().sum()), format_optional(mean(&s.n_consumers)),
            format_optional(sample_std(&s.n_consumers)),
            format_list(&producers), format_list(&consumers),
            format_list(&s.flexible()), format_list(&s.exclusive_producers()),
            format_list(&s.exclusive_consumers()),
            s.total_unique_mags().to_string(),
            format_optional(s.percentage(s.flexible().len())),
            format_optional(s.percentage(s.exclusive_producers().len())),
            format_optional(s.percentage(s.exclusive_consumers().len())),
            format_list(&s.flexible_taxa), format_list(&s.exclusive_producer_taxa),
            format_list(&s.exclusive_consumer_taxa),
        ]);
    }
    frame.save_csv(out_file);
}


fn save_simplified(summaries: &[MetaboliteSummary], min_importance: f64, out_file: &Path)
        -> usize {
    let header = ["metabolite", "importance_score_mean", "importance_score_std",
                  "flexible_MAGs_taxa", "exclusive_producers_taxa", "exclusive_consumers_taxa",
                  "perc_flexible", "perc_producers", "perc_consumers"];
    let mut frame = Frame::new(header.iter().map(|h| h.to_string()).collect());
    for s in summaries {
        match mean(&s.importance) {
            Some(m) if m > min_importance => {}
            _ => continue,
        }
        frame.rows.push(vec![
            s.metabolite.clone(),
            format_optional(mean(&s.importance)), format_optional(sample_std(&s.importance)),
            format_list(&s.flexible_taxa), format_list(&s.exclusive_producer_taxa),
            format_list(&s.exclusive_consumer_taxa),
            format_optional(s.percentage(s.flexible().len())),
            format_optional(s.percentage(s.exclusive_producers().len())),
            format_optional(s.percentage(s.exclusive_consumers().len())),
        ]);
    }
    frame.save_csv(out_file);
    frame.rows.len()
}
