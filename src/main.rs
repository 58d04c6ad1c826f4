// This is the main file of MetModels and where execution starts. It mainly handles the CLI and
// then calls into other files to run whichever subcommand the user chose.

// Copyright 2026 MetModels contributors

// This file is part of MetModels. MetModels is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. MetModels
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with MetModels. If not, see <http://www.gnu.org/licenses/>.

use std::path::PathBuf;
use clap::{ArgGroup, Parser, Subcommand, crate_version};

mod abundance;
mod chem_classes;
mod commtypes;
mod contribution;
mod core_exchanges;
mod donors;
mod elasticity;
mod exchanges;
mod filter;
mod frame;
mod log;
mod lookup;
mod merge_fluxes;
mod metadata_filter;
mod metrics;
mod micom_tables;
mod misc;
mod network;
mod parse_kma;
mod producers;
mod production;
mod rename_headers;
mod select_mags;

#[cfg(test)]
mod tests;

#[derive(Parser)]
#[clap(name = "MetModels",
       version = concat!("v", crate_version!()),
       about = "table processing for gut microbiome community metabolic models",
       before_help = concat!(r#" __  __      _   __  __           _      _     "#, "\n",
                             r#"|  \/  |    | | |  \/  |         | |    | |    "#, "\n",
                             r#"| \  / | ___| |_| \  / | ___   __| | ___| |___ "#, "\n",
                             r#"| |\/| |/ _ \ __| |\/| |/ _ \ / _` |/ _ \ / __|"#, "\n",
                             r#"| |  | |  __/ |_| |  | | (_) | (_| |  __/ \__ \"#, "\n",
                             r#"|_|  |_|\___|\__|_|  |_|\___/ \__,_|\___|_|___/"#))]
#[command(author, version, long_about = None, disable_help_subcommand = true,
          propagate_version = true)]
#[clap(subcommand_required = true)]
#[clap(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {

    /// assign bins to community types and stage their metabolic models
    Commtypes {
        /// Abundance table of bins or species by samples (required)
        #[clap(long = "kma", required = true)]
        kma: PathBuf,

        /// Community type assignment of each sample (required)
        #[clap(long = "dmm", required = true)]
        dmm: PathBuf,

        /// Directory of metabolic models named <bin>.xml (required)
        #[clap(long = "gems", required = true)]
        gems: PathBuf,

        /// Species-to-bin table, for species-level abundance tables
        #[clap(short = 'b', long = "sp2bin")]
        sp2bin: Option<PathBuf>,

        /// Stage models per sample instead of per community type
        #[clap(long = "per_sample")]
        per_sample: bool,

        /// Number of most abundant taxa kept per sample (with --per_sample)
        #[clap(long = "top", default_value = "30")]
        top: usize,

        /// Output table of community type per bin and sample (required)
        #[clap(short = 't', long = "out_table", required = true)]
        out_table: PathBuf,

        /// Output directory for the staged models (required)
        #[clap(short = 'o', long = "out_dir", required = true)]
        out_dir: PathBuf,
    },

    /// one taxon-by-sample table of the flux of one exchange reaction
    Contribution {
        /// Directory of minimal exchange flux tables (required)
        #[clap(short = 'i', long = "in_dir", required = true)]
        in_dir: PathBuf,

        /// Exchange reaction, e.g. EX_acald_e (required)
        #[clap(short = 'x', long = "metabolite", required = true)]
        metabolite: String,

        /// High-quality bin table with bin ID and classification (required)
        #[clap(short = 'l', long = "lineages", required = true)]
        lineages: PathBuf,

        /// Output CSV file (required)
        #[clap(short = 'o', long = "out_file", required = true)]
        out_file: PathBuf,

        /// Underscore-separated field of the file name holding the sample name
        #[clap(long = "name_field", default_value = "3")]
        name_field: usize,
    },

    /// core and accessory taxon-metabolite edges
    CoreEdges {
        /// Directory of exchanges_grow_*.csv files (required)
        #[clap(short = 'f', long = "in_dir", required = true)]
        in_dir: PathBuf,

        /// Percentage of samples a feature must be present in to be core
        #[clap(short = 'c', long = "core", default_value = "90")]
        core: f64,

        /// Output CSV of all edges (required)
        #[clap(long = "output_all", required = true)]
        output_all: PathBuf,

        /// Output CSV of core edges (required)
        #[clap(long = "output_core", required = true)]
        output_core: PathBuf,

        /// Number of CPU threads
        #[clap(short = 't', long = "threads", default_value = "8")]
        threads: usize,
    },

    /// core and accessory metabolite exports and imports
    CoreExchanges {
        /// Directory of exchanges_grow_*.csv files (required)
        #[clap(short = 'f', long = "in_dir", required = true)]
        in_dir: PathBuf,

        /// Percentage of samples a feature must be present in to be core
        #[clap(short = 'c', long = "core", default_value = "90")]
        core: f64,

        /// Output CSV of all exports
        #[clap(long = "output_all_exports", default_value = "all_exports.csv")]
        output_all_exports: PathBuf,

        /// Output CSV of all imports
        #[clap(long = "output_all_imports", default_value = "all_imports.csv")]
        output_all_imports: PathBuf,

        /// Prefix of the core output files
        #[clap(long = "output_core", default_value = "core")]
        output_core: String,

        /// Number of CPU threads
        #[clap(short = 't', long = "threads", default_value = "8")]
        threads: usize,
    },

    /// donor links and centrality scores per bin
    Donors {
        /// Merged minimal exchange flux table (required)
        #[clap(short = 'i', long = "in_file", required = true)]
        in_file: PathBuf,

        /// Metadata with Sample and HD columns (required)
        #[clap(short = 'm', long = "metadata", required = true)]
        metadata: PathBuf,

        /// Output CSV file
        #[clap(short = 'o', long = "out_file", default_value = "Donor_links.csv")]
        out_file: PathBuf,
    },

    /// summarise elasticities per reaction or per effector taxon
    #[clap(group(ArgGroup::new("annotation").required(true).args(["bigg", "lineages"])))]
    Elasticity {
        /// Directory of per-sample elasticity CSV files (required)
        #[clap(short = 'i', long = "in_dir", required = true)]
        in_dir: PathBuf,

        /// Output CSV file (required)
        #[clap(short = 'o', long = "out_file", required = true)]
        out_file: PathBuf,

        /// BiGG metabolite table, to sum per reaction (either --bigg or --lineages is required)
        #[clap(long = "bigg")]
        bigg: Option<PathBuf>,

        /// High-quality bin table, to sum per effector (either --bigg or --lineages is required)
        #[clap(long = "lineages")]
        lineages: Option<PathBuf>,

        /// Underscore-separated field of the file name holding the sample name
        #[clap(long = "name_field", default_value = "1")]
        name_field: usize,
    },

    /// keep exchange reactions from a table of all minimal fluxes
    ExtractExchanges {
        /// Table of all minimal fluxes (required)
        #[clap(short = 'i', long = "in_file", required = true)]
        in_file: PathBuf,

        /// Output CSV file (required)
        #[clap(short = 'o', long = "out_file", required = true)]
        out_file: PathBuf,
    },

    /// keep clusters whose bin is a high-quality bin
    FilterClusters {
        /// Directory with one subdirectory per high-quality bin (required)
        #[clap(short = 'b', long = "bins_dir", required = true)]
        bins_dir: PathBuf,

        /// Clusters TSV (required)
        #[clap(short = 'c', long = "clusters", required = true)]
        clusters: PathBuf,

        /// Output TSV file
        #[clap(short = 'o', long = "out_file", default_value = "clusters_filtered.tsv")]
        out_file: PathBuf,
    },

    /// select samples by sequencing depth and health status
    FilterMetadata {
        /// Metadata with BioSample, health_status and Author_Year columns (required)
        #[clap(short = 'm', long = "metadata", required = true)]
        metadata: PathBuf,

        /// Headerless CSV of BioSample then run accessions (required)
        #[clap(short = 'a', long = "accessions", required = true)]
        accessions: PathBuf,

        /// CSV of Sample and Lines (FASTQ line count per run) (required)
        #[clap(short = 'l', long = "lines", required = true)]
        lines: PathBuf,

        /// Output CSV file
        #[clap(short = 'o', long = "out_file", default_value = "filtered_metadata.csv")]
        out_file: PathBuf,

        /// Minimum number of reads in a run
        #[clap(long = "min_reads", default_value = "15000000")]
        min_reads: u64,

        /// Comma-delimited health statuses to exclude
        #[clap(long = "exclude_status", default_value = "overweight,underweight")]
        exclude_status: String,
    },

    /// keep sample-to-domain lines whose bin is a high-quality bin
    FilterSamples2domain {
        /// High-quality bin table (required)
        #[clap(short = 'q', long = "hq_bins", required = true)]
        hq_bins: PathBuf,

        /// Samples-to-domain TSV (required)
        #[clap(short = 's', long = "samples2domain", required = true)]
        samples2domain: PathBuf,

        /// Output TSV file (required)
        #[clap(short = 'o', long = "out_file", required = true)]
        out_file: PathBuf,
    },

    /// merge per-sample minimal exchange flux tables
    MergeFluxes {
        /// Directory of minimal_fluxes_exchange_*.csv files (required)
        #[clap(short = 'f', long = "in_dir", required = true)]
        in_dir: PathBuf,

        /// Output CSV file
        #[clap(short = 'o', long = "out_file",
               default_value = "minimal_fluxes_exchange_merged.csv")]
        out_file: PathBuf,
    },

    /// write community simulation input tables
    MicomTables {
        /// Abundance table of bins or species by samples (required)
        #[clap(long = "kma", required = true)]
        kma: PathBuf,

        /// Directory of metabolic models named <bin>.xml (required)
        #[clap(long = "gems", required = true)]
        gems: PathBuf,

        /// Species-to-bin table, for species-level abundance tables
        #[clap(short = 'b', long = "sp2bin")]
        sp2bin: Option<PathBuf>,

        /// Community type assignments, for one table per community type
        #[clap(long = "dmm")]
        dmm: Option<PathBuf>,

        /// Output directory (required)
        #[clap(short = 'o', long = "out_dir", required = true)]
        out_dir: PathBuf,
    },

    /// net production and consumption of the whole community
    NetProduction {
        /// Directory of exchanges_grow_*.csv files (required)
        #[clap(short = 'f', long = "in_dir", required = true)]
        in_dir: PathBuf,

        /// Output CSV file
        #[clap(short = 'o', long = "out_file", default_value = "net_produc_consump_merged.csv")]
        out_file: PathBuf,

        /// Number of CPU threads
        #[clap(short = 't', long = "threads", default_value = "8")]
        threads: usize,
    },

    /// node and edge tables of the exchanges in samples with one health status
    Network {
        /// Directory of exchanges_grow_*.csv files (required)
        #[clap(short = 'f', long = "in_dir", required = true)]
        in_dir: PathBuf,

        /// Metadata with Sample and HD columns (required)
        #[clap(short = 'm', long = "metadata", required = true)]
        metadata: PathBuf,

        /// Headerless TSV of bin ID and lineage (required)
        #[clap(short = 's', long = "spp_classification", required = true)]
        spp_classification: PathBuf,

        /// BiGG metabolite table with ID and name (required)
        #[clap(short = 'b', long = "bigg", required = true)]
        bigg: PathBuf,

        /// Prefix of the output files
        #[clap(short = 'o', long = "output", default_value = "healthy")]
        output: String,

        /// Health status of the samples to include
        #[clap(long = "status", default_value = "healthy")]
        status: String,

        /// Number of CPU threads
        #[clap(short = 't', long = "threads", default_value = "8")]
        threads: usize,
    },

    /// node and edge tables of the exchanges in a list of samples
    NetworkFromList {
        /// Directory of exchanges_grow_*.csv files (required)
        #[clap(short = 'i', long = "in_dir", required = true)]
        in_dir: PathBuf,

        /// File with one sample prefix per line (required)
        #[clap(short = 's', long = "samples", required = true)]
        samples: PathBuf,

        /// Headerless TSV of bin ID and lineage (required)
        #[clap(short = 'p', long = "spp_classification", required = true)]
        spp_classification: PathBuf,

        /// Only include this metabolite, e.g. h2s_e
        #[clap(short = 'm', long = "metabolite")]
        metabolite: Option<String>,

        /// Output nodes CSV (required)
        #[clap(long = "out_nodes", required = true)]
        out_nodes: PathBuf,

        /// Output edges CSV (required)
        #[clap(long = "out_edges", required = true)]
        out_edges: PathBuf,

        /// Number of CPU threads
        #[clap(short = 't', long = "threads", default_value = "8")]
        threads: usize,
    },

    /// simplify the BiGG metabolite table and find HMDB IDs
    ParseBigg {
        /// BiGG metabolites file (required)
        #[clap(short = 'i', long = "in_file", required = true)]
        in_file: PathBuf,

        /// Output TSV file
        #[clap(short = 'o', long = "out_file", default_value = "bigg_models_simplified.tsv")]
        out_file: PathBuf,
    },

    /// add HMDB chemical classes to the simplified BiGG table
    ParseHmdb {
        /// Simplified BiGG table (required)
        #[clap(short = 'b', long = "bigg", required = true)]
        bigg: PathBuf,

        /// HMDB metabolites XML (required)
        #[clap(short = 'x', long = "hmdb", required = true)]
        hmdb: PathBuf,

        /// Output TSV file
        #[clap(short = 'o', long = "out_file", default_value = "bigg_models_w_classes.tsv")]
        out_file: PathBuf,
    },

    /// merge read-mapping results into one abundance table
    ParseKma {
        /// Directory of *.res files (required)
        #[clap(short = 'i', long = "in_dir", required = true)]
        in_dir: PathBuf,

        /// Output CSV file (required)
        #[clap(short = 'o', long = "out_file", required = true)]
        out_file: PathBuf,
    },

    /// producers and consumers of each metabolite per sample
    ProducersConsumers {
        /// Directory of exchanges_grow_*.csv files (required)
        #[clap(short = 'f', long = "in_dir", required = true)]
        in_dir: PathBuf,

        /// Output CSV file
        #[clap(short = 'o', long = "out_file", default_value = "producers_consumers.csv")]
        out_file: PathBuf,

        /// Number of CPU threads
        #[clap(short = 't', long = "threads", default_value = "8")]
        threads: usize,
    },

    /// producer and consumer statistics per metabolite over samples with one health status
    ProducersConsumersDetailed {
        /// Directory of exchanges_grow_*.csv files (required)
        #[clap(short = 'f', long = "in_dir", required = true)]
        in_dir: PathBuf,

        /// Metadata with Sample and HD columns (required)
        #[clap(short = 'm', long = "metadata", required = true)]
        metadata: PathBuf,

        /// Headerless TSV of bin ID and lineage (required)
        #[clap(short = 's', long = "spp_classification", required = true)]
        spp_classification: PathBuf,

        /// Output CSV file (required)
        #[clap(short = 'o', long = "out_file", required = true)]
        out_file: PathBuf,

        /// Health status of the samples to include
        #[clap(long = "status", default_value = "healthy")]
        status: String,

        /// Minimum mean importance score for the simplified table
        #[clap(long = "min_importance", default_value = "5")]
        min_importance: f64,

        /// Number of CPU threads
        #[clap(short = 't', long = "threads", default_value = "8")]
        threads: usize,
    },

    /// label contigs with their bin and taxonomy
    RenameHeaders {
        /// Input FASTA of binned contigs (required)
        #[clap(short = 'i', long = "in_fasta", required = true)]
        in_fasta: PathBuf,

        /// Filtered clusters TSV (required)
        #[clap(short = 'c', long = "clusters", required = true)]
        clusters: PathBuf,

        /// GTDB classification TSV (required)
        #[clap(short = 'g', long = "gtdb", required = true)]
        gtdb: PathBuf,

        /// Output FASTA file (required)
        #[clap(short = 'o', long = "out_fasta", required = true)]
        out_fasta: PathBuf,
    },

    /// pick the most complete genome per species
    SelectMags {
        /// GTDB classification TSV (required)
        #[clap(short = 'g', long = "gtdb", required = true)]
        gtdb: PathBuf,

        /// CheckM results (required)
        #[clap(short = 'c', long = "checkm", required = true)]
        checkm: PathBuf,

        /// Output CSV of all bins with completeness
        #[clap(short = 'a', long = "out_all", default_value = "all_bins_with_compl.csv")]
        out_all: PathBuf,

        /// Output CSV of the most complete bin per species
        #[clap(short = 'o', long = "out_best", default_value = "HQ_bins_with_compl.csv")]
        out_best: PathBuf,
    },

    /// abundance-weighted production and consumption per sample
    TotalProduction {
        /// Directory of exchanges_grow_*.csv files (required)
        #[clap(short = 'f', long = "in_dir", required = true)]
        in_dir: PathBuf,

        /// Abundance table of bins or species by samples (required)
        #[clap(long = "kma", required = true)]
        kma: PathBuf,

        /// Species-to-bin table, for species-level abundance tables
        #[clap(short = 'b', long = "sp2bin")]
        sp2bin: Option<PathBuf>,

        /// Output CSV of total production
        #[clap(long = "output_production", default_value = "total_production.csv")]
        output_production: PathBuf,

        /// Output CSV of total consumption
        #[clap(long = "output_consumption", default_value = "total_consumption.csv")]
        output_consumption: PathBuf,

        /// Number of CPU threads
        #[clap(short = 't', long = "threads", default_value = "8")]
        threads: usize,
    },
}


fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Commtypes { kma, dmm, gems, sp2bin, per_sample, top, out_table,
                                   out_dir }) => {
            commtypes::commtypes(kma, dmm, gems, sp2bin, per_sample, top, out_table, out_dir);
        },
        Some(Commands::Contribution { in_dir, metabolite, lineages, out_file, name_field }) => {
            contribution::contribution(in_dir, metabolite, lineages, out_file, name_field);
        },
        Some(Commands::CoreEdges { in_dir, core, output_all, output_core, threads }) => {
            core_exchanges::core_edges(in_dir, core, output_all, output_core, threads);
        },
        Some(Commands::CoreExchanges { in_dir, core, output_all_exports, output_all_imports,
                                       output_core, threads }) => {
            core_exchanges::core_exchanges(in_dir, core, output_all_exports, output_all_imports,
                                           output_core, threads);
        },
        Some(Commands::Donors { in_file, metadata, out_file }) => {
            donors::donors(in_file, metadata, out_file);
        },
        Some(Commands::Elasticity { in_dir, out_file, bigg, lineages, name_field }) => {
            elasticity::elasticity(in_dir, out_file, bigg, lineages, name_field);
        },
        Some(Commands::ExtractExchanges { in_file, out_file }) => {
            merge_fluxes::extract_exchanges(in_file, out_file);
        },
        Some(Commands::FilterClusters { bins_dir, clusters, out_file }) => {
            filter::filter_clusters(bins_dir, clusters, out_file);
        },
        Some(Commands::FilterMetadata { metadata, accessions, lines, out_file, min_reads,
                                        exclude_status }) => {
            metadata_filter::filter_metadata(metadata, accessions, lines, out_file, min_reads,
                                             exclude_status);
        },
        Some(Commands::FilterSamples2domain { hq_bins, samples2domain, out_file }) => {
            filter::filter_samples2domain(hq_bins, samples2domain, out_file);
        },
        Some(Commands::MergeFluxes { in_dir, out_file }) => {
            merge_fluxes::merge_fluxes(in_dir, out_file);
        },
        Some(Commands::MicomTables { kma, gems, sp2bin, dmm, out_dir }) => {
            micom_tables::micom_tables(kma, gems, sp2bin, dmm, out_dir);
        },
        Some(Commands::NetProduction { in_dir, out_file, threads }) => {
            production::net_production(in_dir, out_file, threads);
        },
        Some(Commands::Network { in_dir, metadata, spp_classification, bigg, output, status,
                                 threads }) => {
            network::network(in_dir, metadata, spp_classification, bigg, output, status,
                             threads);
        },
        Some(Commands::NetworkFromList { in_dir, samples, spp_classification, metabolite,
                                         out_nodes, out_edges, threads }) => {
            network::network_from_list(in_dir, samples, spp_classification, metabolite,
                                       out_nodes, out_edges, threads);
        },
        Some(Commands::ParseBigg { in_file, out_file }) => {
            chem_classes::parse_bigg(in_file, out_file);
        },
        Some(Commands::ParseHmdb { bigg, hmdb, out_file }) => {
            chem_classes::parse_hmdb(bigg, hmdb, out_file);
        },
        Some(Commands::ParseKma { in_dir, out_file }) => {
            parse_kma::parse_kma(in_dir, out_file);
        },
        Some(Commands::ProducersConsumers { in_dir, out_file, threads }) => {
            producers::producers_consumers(in_dir, out_file, threads);
        },
        Some(Commands::ProducersConsumersDetailed { in_dir, metadata, spp_classification,
                                                    out_file, status, min_importance,
                                                    threads }) => {
            producers::producers_consumers_detailed(in_dir, metadata, spp_classification,
                                                    out_file, status, min_importance, threads);
        },
        Some(Commands::RenameHeaders { in_fasta, clusters, gtdb, out_fasta }) => {
            rename_headers::rename_headers(in_fasta, clusters, gtdb, out_fasta);
        },
        Some(Commands::SelectMags { gtdb, checkm, out_all, out_best }) => {
            select_mags::select_mags(gtdb, checkm, out_all, out_best);
        },
        Some(Commands::TotalProduction { in_dir, kma, sp2bin, output_production,
                                         output_consumption, threads }) => {
            production::total_production(in_dir, kma, sp2bin, output_production,
                                         output_consumption, threads);
        },
        None => {}
    }
}
