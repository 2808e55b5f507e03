mod file;

use std::{
    ffi::OsString,
    fs::File,
    path::{Path, PathBuf},
};

use clap::Parser;
use clap_verbosity_flag::Verbosity;
use eyre::{Context, Result};
use human_panic::setup_panic;
use libchipseqpeaks::{
    macs2::{CallpeakOptions, Mode},
    utils::wrap_cmd,
    ChipSeqPeaks,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
/// Pipeline for peak calling with MACS2.
///
/// Results are written to {output}_{extension}, for example
/// {output}_peaks.narrowPeak, next to the MACS2 logs {output}.macs2_callpeaks.log
/// and {output}.bdgcmp.log
struct Args {
    #[clap(flatten)]
    verbose: Verbosity,

    /// Path to treatment BAM file
    #[clap(value_parser = file::existing_file)]
    treatment: PathBuf,

    /// Prefix for output files
    #[clap(short, long)]
    output: PathBuf,

    /// Path to control BAM file
    #[clap(long, conflicts_with = "atac_seq", value_parser = file::existing_file)]
    control: Option<PathBuf>,

    /// Sample name, by default the treatment file name up to the first '.'
    #[clap(long)]
    name: Option<String>,

    /// Configure MACS2 for ATAC-seq (--nomodel --shift -100)
    #[clap(long)]
    atac_seq: bool,

    /// MACS2 callpeak qvalue cutoff
    #[clap(long, default_value_t = 0.01)]
    qvalue: f64,

    /// Broad peak option for MACS2 callpeak
    #[clap(long)]
    broad: bool,

    /// MACS2 callpeak qvalue cutoff for broad regions
    #[clap(long, default_value_t = 0.05)]
    broad_cutoff: f64,

    /// Use MACS2 with the --nomodel option
    #[clap(long)]
    nomodel: bool,

    /// MACS2 shift (use -100 for ATAC-seq)
    #[clap(long, default_value_t = 0, allow_hyphen_values = true)]
    shift: i32,

    /// Use MACS2 with the --nolambda option
    #[clap(long)]
    nolambda: bool,

    /// Use MACS2 with the --call-summits option
    #[clap(long)]
    call_summits: bool,

    /// BED file of blacklisted regions, e.g. the ENCODE blacklist. Peaks
    /// overlapping any region are removed.
    #[clap(long, value_parser = file::existing_file)]
    blacklist: Option<PathBuf>,

    /// Don't run macs2 bdgcmp to produce {output}_ppois.bdg
    #[clap(long)]
    skip_bdgcmp: bool,

    /// Path to macs2 binary, if not specified will use $MACS2_PATH or look in
    /// $PATH
    #[clap(long)]
    macs2_path: Option<PathBuf>,

    /// Directory for temporary files
    #[clap(long)]
    tmp_dir: Option<PathBuf>,

    /// Keep the temporary directory with intermediate files
    #[clap(long, default_value_t = false)]
    keep_temp_files: bool,
}

impl Args {
    fn callpeak_options(&self) -> CallpeakOptions {
        let mode = if self.atac_seq {
            Mode::AtacSeq
        } else {
            Mode::ChipSeq
        };
        CallpeakOptions::default()
            .mode(mode)
            .qvalue(self.qvalue)
            .broad(self.broad)
            .broad_cutoff(self.broad_cutoff)
            .nomodel(self.nomodel)
            .shift(self.shift)
            .nolambda(self.nolambda)
            .call_summits(self.call_summits)
    }
}

fn log_path(prefix: &Path, suffix: &str) -> PathBuf {
    let mut path = OsString::from(prefix.as_os_str());
    path.push(".");
    path.push(suffix);
    PathBuf::from(path)
}

fn run(args: Args) -> Result<()> {
    let mut builder = ChipSeqPeaks::builder(args.treatment.as_path())
        .options(args.callpeak_options())
        .cleans_up(!args.keep_temp_files);
    if let Some(control) = &args.control {
        builder = builder.control(control.as_path());
    }
    if let Some(name) = &args.name {
        builder = builder.name(name);
    }
    if let Some(macs2_path) = &args.macs2_path {
        builder = builder.macs2_path(macs2_path);
    }
    if let Some(tmp_dir) = &args.tmp_dir {
        builder = builder.temp_file_dir(tmp_dir);
    }
    let mut peaks = builder.build()?;

    let callpeak_log_path = log_path(&args.output, "macs2_callpeaks.log");
    let callpeak_log = File::create(&callpeak_log_path).wrap_err_with(|| {
        format!(
            "Failed to create {}, is the output prefix writable?",
            callpeak_log_path.display()
        )
    })?;
    peaks.set_log(callpeak_log);
    wrap_cmd("MACS2 callpeak", || peaks.call_peaks())?;

    if let Some(blacklist) = &args.blacklist {
        let stats = wrap_cmd("Removing blacklisted peaks", || {
            peaks.remove_blacklisted_peaks(blacklist)
        })?;
        log::info!(
            "Kept {} peaks, removed {} blacklisted peaks",
            stats.kept,
            stats.removed
        );
    }

    if !args.skip_bdgcmp {
        let bdgcmp_log = File::create(log_path(&args.output, "bdgcmp.log"))?;
        peaks.set_log(bdgcmp_log);
        wrap_cmd("MACS2 bdgcmp", || peaks.bdgcmp().map(|_| ()))?;
    }

    peaks
        .write(&args.output, &[])
        .wrap_err("Failed to write MACS2 output")?;
    peaks.close()?;
    Ok(())
}

fn main() -> Result<()> {
    setup_panic!();
    jane_eyre::install()?;

    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();
    log::info!("{args:?}");

    run(args)
}
