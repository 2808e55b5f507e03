//! MACS2 peak calling for a single sample.
//!
//! ```no_run
//! use libchipseqpeaks::{macs2::OutputKind, ChipSeqPeaks};
//!
//! # fn main() -> libchipseqpeaks::error::Result<()> {
//! let mut peaks = ChipSeqPeaks::builder("treatment.bam")
//!     .control("input.bam")
//!     .call()?;
//! peaks.remove_blacklisted_peaks("blacklist.bed")?;
//! peaks.write("results/sample", &[OutputKind::NarrowPeak])?;
//! peaks.close()?;
//! # Ok(())
//! # }
//! ```

use std::{
    collections::BTreeMap,
    ffi::OsString,
    fs::{self, File},
    io,
    path::{Path, PathBuf},
    process::Command,
};

use tempfile::TempDir;

use crate::{
    blacklist::{Blacklist, FilterStats},
    error::{PeaksError, Result},
    input::BamInput,
    macs2::{self, CallpeakOptions, Mode, OutputKind},
    utils,
};

/// Name used for MACS2 output when the treatment has no file name
const DEFAULT_SAMPLE_NAME: &str = "treatment";

#[derive(Debug)]
pub struct ChipSeqPeaksBuilder {
    treatment: BamInput,
    control: Option<BamInput>,
    options: CallpeakOptions,
    macs2_path: Option<PathBuf>,
    name: Option<String>,
    temp_file_dir: Option<PathBuf>,
    cleans_up: bool,
    log: Option<File>,
}

impl ChipSeqPeaksBuilder {
    fn new(treatment: BamInput) -> Self {
        Self {
            treatment,
            control: None,
            options: CallpeakOptions::default(),
            macs2_path: None,
            name: None,
            temp_file_dir: None,
            cleans_up: true,
            log: None,
        }
    }

    pub fn control<T: Into<BamInput>>(mut self, control: T) -> Self {
        self.control = Some(control.into());
        self
    }

    pub fn options(mut self, options: CallpeakOptions) -> Self {
        self.options = options;
        self
    }

    /// Path to the macs2 binary, otherwise `$MACS2_PATH` or `macs2` in `PATH`
    pub fn macs2_path<P: Into<PathBuf>>(mut self, macs2_path: P) -> Self {
        self.macs2_path = Some(macs2_path.into());
        self
    }

    /// Sample name given to MACS2, defaults to the treatment file name up to
    /// the first '.'
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Directory the temporary working directory is created in
    pub fn temp_file_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.temp_file_dir = Some(dir.into());
        self
    }

    pub fn cleans_up(mut self, cleans_up: bool) -> Self {
        self.cleans_up = cleans_up;
        self
    }

    /// MACS2 stderr is appended to this file
    pub fn log(mut self, log: File) -> Self {
        self.log = Some(log);
        self
    }

    /// Validate inputs and set up the working directory. Nothing external runs
    /// until [`ChipSeqPeaks::call_peaks`].
    pub fn build(self) -> Result<ChipSeqPeaks> {
        if self.options.get_mode() == Mode::AtacSeq && self.control.is_some() {
            return Err(PeaksError::InvalidOptions(
                "a control BAM cannot be used in ATAC-seq mode",
            ));
        }
        self.treatment.check()?;
        if let Some(control) = &self.control {
            control.check()?;
        }
        let macs2 = utils::find_macs2(self.macs2_path.as_deref())?;

        let name = self
            .name
            .or_else(|| self.treatment.sample_name())
            .unwrap_or_else(|| DEFAULT_SAMPLE_NAME.to_string());
        if name.is_empty() || name.contains('/') {
            return Err(PeaksError::InvalidOptions(
                "sample name must be non-empty and must not contain '/'",
            ));
        }

        let mut builder = tempfile::Builder::new();
        builder.prefix("chipseqpeaks.");
        let work_dir = match &self.temp_file_dir {
            Some(dir) => builder.tempdir_in(dir)?,
            None => builder.tempdir()?,
        };
        let work_path = work_dir.path().to_path_buf();
        log::debug!("Created working directory {}", work_path.display());

        let treatment = self.treatment.materialize(&work_path, "treatment.bam")?;
        let control = self
            .control
            .as_ref()
            .map(|control| control.materialize(&work_path, "control.bam"))
            .transpose()?;

        Ok(ChipSeqPeaks {
            macs2,
            options: self.options,
            name,
            treatment,
            control,
            work_dir: Some(work_dir),
            work_path,
            outputs: BTreeMap::new(),
            called: false,
            cleans_up: self.cleans_up,
            log: self.log,
        })
    }

    /// [`build`](Self::build) and [`ChipSeqPeaks::call_peaks`] in one step
    pub fn call(self) -> Result<ChipSeqPeaks> {
        let mut peaks = self.build()?;
        peaks.call_peaks()?;
        Ok(peaks)
    }
}

/// One peak calling run and the temporary directory holding its files.
///
/// The directory is removed by [`close`](Self::close), or when the value is
/// dropped, unless clean up has been turned off.
#[derive(Debug)]
pub struct ChipSeqPeaks {
    macs2: PathBuf,
    options: CallpeakOptions,
    name: String,
    treatment: PathBuf,
    control: Option<PathBuf>,
    work_dir: Option<TempDir>,
    work_path: PathBuf,
    outputs: BTreeMap<OutputKind, PathBuf>,
    called: bool,
    cleans_up: bool,
    log: Option<File>,
}

impl ChipSeqPeaks {
    pub fn builder<T: Into<BamInput>>(treatment: T) -> ChipSeqPeaksBuilder {
        ChipSeqPeaksBuilder::new(treatment.into())
    }

    /// Run `macs2 callpeak`. Can only be done once per instance.
    pub fn call_peaks(&mut self) -> Result<()> {
        if self.called {
            return Err(PeaksError::UsageOrder(
                "peaks have already been called, create a new ChipSeqPeaks for another run",
            ));
        }
        self.called = true;

        let mut cmd = self.options.callpeak_cmd(
            &self.macs2,
            &self.treatment,
            self.control.as_deref(),
            &self.name,
            &self.work_path,
        );
        run_macs2("macs2 callpeak", &mut cmd, self.log.as_mut())?;

        let mut outputs = BTreeMap::new();
        for kind in self.options.outputs() {
            let path = macs2::output_path(&self.work_path, &self.name, kind);
            if !path.is_file() {
                return Err(PeaksError::MissingOutput(kind));
            }
            outputs.insert(kind, path);
        }
        self.outputs = outputs;
        log::info!("Called peaks for {}", self.name);
        Ok(())
    }

    fn require_peaks(&self, msg: &'static str) -> Result<()> {
        if self.outputs.is_empty() {
            Err(PeaksError::UsageOrder(msg))
        } else {
            Ok(())
        }
    }

    /// Remove every peak that overlaps a region in the blacklist BED file
    pub fn remove_blacklisted_peaks<P: AsRef<Path>>(&mut self, blacklist: P) -> Result<FilterStats> {
        self.require_peaks("blacklisted peaks can only be removed after calling peaks")?;
        let blacklist = Blacklist::from_path(blacklist)?;
        self.remove_blacklisted_regions(&blacklist)
    }

    pub fn remove_blacklisted_regions(&mut self, blacklist: &Blacklist) -> Result<FilterStats> {
        self.require_peaks("blacklisted peaks can only be removed after calling peaks")?;
        let mut stats = FilterStats::default();
        for (kind, path) in self.outputs.iter() {
            if kind.is_peak_set() {
                stats += blacklist.filter_file(path)?;
            }
        }
        Ok(stats)
    }

    /// Run `macs2 bdgcmp` on the treatment pileup and control lambda, adding
    /// the `ppois.bdg` output
    pub fn bdgcmp(&mut self) -> Result<&Path> {
        self.require_peaks("bdgcmp can only be run after calling peaks")?;
        let treat_pileup = self.existing_output(OutputKind::TreatPileup)?;
        let control_lambda = self.existing_output(OutputKind::ControlLambda)?;
        let mut cmd = macs2::bdgcmp_cmd(
            &self.macs2,
            treat_pileup,
            control_lambda,
            &self.name,
            &self.work_path,
        );
        run_macs2("macs2 bdgcmp", &mut cmd, self.log.as_mut())?;

        let ppois = macs2::output_path(&self.work_path, &self.name, OutputKind::Ppois);
        if !ppois.is_file() {
            return Err(PeaksError::MissingOutput(OutputKind::Ppois));
        }
        let ppois: &Path = self.outputs.entry(OutputKind::Ppois).or_insert(ppois);
        Ok(ppois)
    }

    /// Copy outputs to `{prefix}_{extension}`, all outputs when `kinds` is
    /// empty. Returns the written paths.
    pub fn write<P: AsRef<Path>>(&self, prefix: P, kinds: &[OutputKind]) -> Result<Vec<PathBuf>> {
        self.require_peaks("outputs can only be written after calling peaks")?;
        let kinds: Vec<OutputKind> = if kinds.is_empty() {
            self.outputs.keys().copied().collect()
        } else {
            kinds.to_vec()
        };
        let sources = kinds
            .iter()
            .map(|&kind| self.existing_output(kind).map(|path| (kind, path)))
            .collect::<Result<Vec<_>>>()?;

        let mut written = Vec::with_capacity(sources.len());
        for (kind, source) in sources {
            let dest = prefixed_path(prefix.as_ref(), kind);
            fs::copy(source, &dest)?;
            log::info!("Wrote {}", dest.display());
            written.push(dest);
        }
        Ok(written)
    }

    fn existing_output(&self, kind: OutputKind) -> Result<&Path> {
        self.outputs
            .get(&kind)
            .map(PathBuf::as_path)
            .ok_or(PeaksError::MissingOutput(kind))
    }

    pub fn output(&self, kind: OutputKind) -> Option<&Path> {
        self.outputs.get(&kind).map(PathBuf::as_path)
    }

    pub fn outputs(&self) -> impl Iterator<Item = (OutputKind, &Path)> {
        self.outputs.iter().map(|(kind, path)| (*kind, path.as_path()))
    }

    pub fn read_output(&self, kind: OutputKind) -> Result<Vec<u8>> {
        let path = self.existing_output(kind)?;
        Ok(fs::read(path)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &CallpeakOptions {
        &self.options
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_path
    }

    pub fn cleans_up(&self) -> bool {
        self.cleans_up
    }

    pub fn set_cleans_up(&mut self, cleans_up: bool) {
        self.cleans_up = cleans_up;
    }

    /// Replace the file MACS2 stderr is appended to
    pub fn set_log(&mut self, log: File) {
        self.log = Some(log);
    }

    /// Release the working directory now, reporting a failure to remove it
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        let Some(work_dir) = self.work_dir.take() else {
            return Ok(());
        };
        if self.cleans_up {
            log::debug!("Removing working directory {}", self.work_path.display());
            work_dir.close()?;
        } else {
            let kept = work_dir.into_path();
            log::info!("Keeping temporary files in {}", kept.display());
        }
        Ok(())
    }
}

impl Drop for ChipSeqPeaks {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::warn!(
                "Failed to remove working directory {}: {e}",
                self.work_path.display()
            );
        }
    }
}

/// A macs2 that cannot be started is reported as missing
fn run_macs2(tool: &str, cmd: &mut Command, log: Option<&mut File>) -> Result<()> {
    match utils::run_cmd(tool, cmd, log) {
        Ok(_) => Ok(()),
        Err(PeaksError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
            Err(PeaksError::MissingMacs2)
        }
        Err(e) => Err(e),
    }
}

/// `{prefix}_{extension}`, the same naming MACS2 uses for its own outputs
pub fn prefixed_path(prefix: &Path, kind: OutputKind) -> PathBuf {
    let mut path = OsString::from(prefix.as_os_str());
    path.push("_");
    path.push(kind.extension());
    PathBuf::from(path)
}
