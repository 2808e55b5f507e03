#![allow(dead_code)]

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

/// BGZF end-of-file block, accepted as a (read-less) BAM by the input checks
pub const BGZF_EOF: [u8; 28] = [
    0x1f, 0x8b, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x06, 0x00, 0x42, 0x43, 0x02, 0x00,
    0x1b, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

pub const NARROW_PEAKS: &str = "chr1\t100\t200\tpeak_1\t50\t.\t5.0\t10.0\t8.0\t50\n\
                                chr1\t500\t600\tpeak_2\t80\t.\t6.0\t12.0\t9.0\t40\n";

pub const SUMMITS: &str = "chr1\t150\t151\tpeak_1\t8.0\n\
                           chr1\t550\t551\tpeak_2\t9.0\n";

/// Stands in for macs2: records its arguments in `{outdir}/macs2.args` and
/// writes the files the real tool would produce.
const FAKE_MACS2: &str = r##"#!/bin/sh
subcommand="$1"
shift
all="$*"
outdir=.
name=NA
broad=0
while [ $# -gt 0 ]; do
    case "$1" in
        --outdir) outdir="$2"; shift ;;
        --name|--o-prefix) name="$2"; shift ;;
        --broad) broad=1 ;;
    esac
    shift
done
echo "$subcommand $all" >> "$outdir/macs2.args"
echo "INFO  @ fake macs2 $subcommand" >&2
case "$subcommand" in
    callpeak)
        printf '# fake MACS2 peaks\n' > "$outdir/${name}_peaks.xls"
        if [ "$broad" = 1 ]; then
            printf 'chr1\t100\t200\tb1\t50\t.\t5.0\t10.0\t8.0\nchr1\t500\t600\tb2\t80\t.\t6.0\t12.0\t9.0\n' > "$outdir/${name}_peaks.broadPeak"
            printf 'chr1\t100\t200\tg1\t50\t.\t100\t200\t0\t1\t100,\t0,\t5.0\t10.0\t8.0\n' > "$outdir/${name}_peaks.gappedPeak"
        else
            printf 'chr1\t100\t200\tpeak_1\t50\t.\t5.0\t10.0\t8.0\t50\nchr1\t500\t600\tpeak_2\t80\t.\t6.0\t12.0\t9.0\t40\n' > "$outdir/${name}_peaks.narrowPeak"
            printf 'chr1\t150\t151\tpeak_1\t8.0\nchr1\t550\t551\tpeak_2\t9.0\n' > "$outdir/${name}_summits.bed"
        fi
        printf 'chr1\t0\t1000\t1.0\n' > "$outdir/${name}_treat_pileup.bdg"
        printf 'chr1\t0\t1000\t0.5\n' > "$outdir/${name}_control_lambda.bdg"
        ;;
    bdgcmp)
        printf 'chr1\t0\t1000\t2.0\n' > "$outdir/${name}_ppois.bdg"
        ;;
    *)
        echo "unknown subcommand $subcommand" >&2
        exit 2
        ;;
esac
"##;

const FAILING_MACS2: &str = r##"#!/bin/sh
echo "ValueError: treatment file is not a valid BAM" >&2
exit 1
"##;

fn write_script(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub fn fake_macs2(dir: &Path) -> PathBuf {
    write_script(dir, "macs2", FAKE_MACS2)
}

pub fn failing_macs2(dir: &Path) -> PathBuf {
    write_script(dir, "failing-macs2", FAILING_MACS2)
}

pub fn write_bam(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, BGZF_EOF).unwrap();
    path
}

pub fn write_blacklist(dir: &Path) -> PathBuf {
    let path = dir.join("blacklist.bed");
    fs::write(&path, "chr1\t150\t250\tHigh Signal Region\n").unwrap();
    path
}

pub fn n_entries(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().count()
}
