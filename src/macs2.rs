use std::{
    fmt,
    path::{Path, PathBuf},
    process::Command,
    str::FromStr,
};

/// Fragment size used to extend reads when building the pileup
pub const DEFAULT_EXTSIZE: u32 = 200;

/// Shift applied in ATAC-seq mode when no shift was given, centers the
/// extended fragment on the Tn5 cut site
pub const ATAC_SEQ_SHIFT: i32 = -100;

/// Pseudocount passed to `macs2 bdgcmp`
pub const BDGCMP_PSEUDOCOUNT: &str = "0.00001";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    ChipSeq,
    AtacSeq,
}

/// A MACS2 output file, named `{name}_{extension}` in the MACS2 output
/// directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OutputKind {
    PeaksXls,
    NarrowPeak,
    Summits,
    BroadPeak,
    GappedPeak,
    TreatPileup,
    ControlLambda,
    Ppois,
}

impl OutputKind {
    pub const ALL: [OutputKind; 8] = [
        OutputKind::PeaksXls,
        OutputKind::NarrowPeak,
        OutputKind::Summits,
        OutputKind::BroadPeak,
        OutputKind::GappedPeak,
        OutputKind::TreatPileup,
        OutputKind::ControlLambda,
        OutputKind::Ppois,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            OutputKind::PeaksXls => "peaks.xls",
            OutputKind::NarrowPeak => "peaks.narrowPeak",
            OutputKind::Summits => "summits.bed",
            OutputKind::BroadPeak => "peaks.broadPeak",
            OutputKind::GappedPeak => "peaks.gappedPeak",
            OutputKind::TreatPileup => "treat_pileup.bdg",
            OutputKind::ControlLambda => "control_lambda.bdg",
            OutputKind::Ppois => "ppois.bdg",
        }
    }

    /// BED-like outputs where each line is a called peak or summit, these are
    /// the files blacklist filtering applies to.
    pub fn is_peak_set(&self) -> bool {
        matches!(
            self,
            OutputKind::NarrowPeak
                | OutputKind::Summits
                | OutputKind::BroadPeak
                | OutputKind::GappedPeak
        )
    }

    pub fn file_name(&self, name: &str) -> String {
        format!("{name}_{}", self.extension())
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutputKind::ALL
            .into_iter()
            .find(|kind| kind.extension() == s)
            .ok_or_else(|| format!("Unknown MACS2 output extension: {s}"))
    }
}

/// Parameters for `macs2 callpeak`
#[derive(Debug, Clone)]
pub struct CallpeakOptions {
    mode: Mode,
    qvalue: f64,
    nomodel: bool,
    shift: i32,
    extsize: u32,
    broad: bool,
    broad_cutoff: f64,
    nolambda: bool,
    call_summits: bool,
}

impl Default for CallpeakOptions {
    fn default() -> Self {
        Self {
            mode: Mode::ChipSeq,
            qvalue: 0.05,
            nomodel: false,
            shift: 0,
            extsize: DEFAULT_EXTSIZE,
            broad: false,
            broad_cutoff: 0.1,
            nolambda: false,
            call_summits: false,
        }
    }
}

impl CallpeakOptions {
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn qvalue(mut self, qvalue: f64) -> Self {
        self.qvalue = qvalue;
        self
    }

    pub fn nomodel(mut self, nomodel: bool) -> Self {
        self.nomodel = nomodel;
        self
    }

    pub fn shift(mut self, shift: i32) -> Self {
        self.shift = shift;
        self
    }

    pub fn extsize(mut self, extsize: u32) -> Self {
        self.extsize = extsize;
        self
    }

    pub fn broad(mut self, broad: bool) -> Self {
        self.broad = broad;
        self
    }

    pub fn broad_cutoff(mut self, broad_cutoff: f64) -> Self {
        self.broad_cutoff = broad_cutoff;
        self
    }

    pub fn nolambda(mut self, nolambda: bool) -> Self {
        self.nolambda = nolambda;
        self
    }

    pub fn call_summits(mut self, call_summits: bool) -> Self {
        self.call_summits = call_summits;
        self
    }

    pub fn get_mode(&self) -> Mode {
        self.mode
    }

    pub fn is_broad(&self) -> bool {
        self.broad
    }

    /// ATAC-seq always runs without the shifting model
    pub fn effective_nomodel(&self) -> bool {
        self.nomodel || self.mode == Mode::AtacSeq
    }

    /// ATAC-seq replaces an unset shift with [`ATAC_SEQ_SHIFT`], an explicit
    /// shift is kept
    pub fn effective_shift(&self) -> i32 {
        if self.mode == Mode::AtacSeq && self.shift == 0 {
            ATAC_SEQ_SHIFT
        } else {
            self.shift
        }
    }

    /// Files `macs2 callpeak -B` writes with these options
    pub fn outputs(&self) -> Vec<OutputKind> {
        let mut outputs = vec![OutputKind::PeaksXls];
        if self.broad {
            outputs.extend([OutputKind::BroadPeak, OutputKind::GappedPeak]);
        } else {
            outputs.extend([OutputKind::NarrowPeak, OutputKind::Summits]);
        }
        outputs.extend([OutputKind::TreatPileup, OutputKind::ControlLambda]);
        outputs
    }

    pub fn callpeak_cmd(
        &self,
        macs2: &Path,
        treatment: &Path,
        control: Option<&Path>,
        name: &str,
        outdir: &Path,
    ) -> Command {
        let mut cmd = Command::new(macs2);
        cmd.arg("callpeak")
            .arg("-B")
            .args(["--extsize", &self.extsize.to_string()])
            .args(["--keep-dup", "all"])
            .arg("--treatment")
            .arg(treatment);
        if let Some(control) = control {
            cmd.arg("--control").arg(control);
        }
        cmd.args(["--name", name])
            .arg("--outdir")
            .arg(outdir)
            .args(["--qvalue", &self.qvalue.to_string()])
            .args(["--shift", &self.effective_shift().to_string()]);
        if self.effective_nomodel() {
            cmd.arg("--nomodel");
        }
        if self.broad {
            cmd.arg("--broad")
                .args(["--broad-cutoff", &self.broad_cutoff.to_string()]);
        }
        if self.nolambda {
            cmd.arg("--nolambda");
        }
        if self.call_summits {
            cmd.arg("--call-summits");
        }
        cmd
    }
}

/// `macs2 bdgcmp` producing `{outdir}/{name}_ppois.bdg` from the treatment
/// pileup and control lambda tracks.
pub fn bdgcmp_cmd(
    macs2: &Path,
    treat_pileup: &Path,
    control_lambda: &Path,
    name: &str,
    outdir: &Path,
) -> Command {
    let mut cmd = Command::new(macs2);
    cmd.arg("bdgcmp")
        .arg("-t")
        .arg(treat_pileup)
        .arg("-c")
        .arg(control_lambda)
        .args(["-m", "ppois"])
        .args(["-p", BDGCMP_PSEUDOCOUNT])
        .arg("--outdir")
        .arg(outdir)
        .args(["--o-prefix", name]);
    cmd
}

/// Where MACS2 writes `kind` for sample `name`
pub fn output_path(outdir: &Path, name: &str, kind: OutputKind) -> PathBuf {
    outdir.join(kind.file_name(name))
}
