//! Removing peaks that fall in blacklisted regions.
//!
//! Overlaps follow BED coordinates, 0-based and half-open, so a peak ending at
//! 250 does not touch a region starting at 250. Any overlap removes the whole
//! peak line, peaks are never trimmed to the part outside the blacklist.

use std::{
    collections::HashMap,
    fs::{self, File},
    io::{BufRead, BufReader, BufWriter, Read, Write},
    ops::{AddAssign, Range},
    path::{Path, PathBuf},
};

use bio::{data_structures::interval_tree::ArrayBackedIntervalTree, io::bed};
use tempfile::NamedTempFile;

use crate::error::{PeaksError, Result};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FilterStats {
    pub kept: usize,
    pub removed: usize,
}

impl AddAssign for FilterStats {
    fn add_assign(&mut self, rhs: Self) {
        self.kept += rhs.kept;
        self.removed += rhs.removed;
    }
}

/// Blacklisted regions indexed by chromosome
#[derive(Debug)]
pub struct Blacklist {
    trees: HashMap<String, ArrayBackedIntervalTree<u64, ()>>,
    n_regions: usize,
}

impl Blacklist {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|_| PeaksError::InputNotFound(path.to_path_buf()))?;
        let blacklist = Self::from_reader(BufReader::new(file), path)?;
        log::info!(
            "Loaded {} blacklisted regions from {}",
            blacklist.len(),
            path.display()
        );
        Ok(blacklist)
    }

    /// `source` only names the input in error messages. Blank lines, comments
    /// and track/browser headers are skipped.
    pub fn from_reader<R: Read>(reader: R, source: &Path) -> Result<Self> {
        let mut body = String::new();
        let mut line_nos = Vec::new();
        for (idx, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            if is_header(&line) {
                continue;
            }
            body.push_str(&line);
            body.push('\n');
            line_nos.push(idx + 1);
        }

        let bed_error = |idx: usize, msg: String| PeaksError::Bed {
            path: source.to_path_buf(),
            record: line_nos.get(idx).copied().unwrap_or(idx + 1),
            msg,
        };
        let mut reader = bed::Reader::new(body.as_bytes());
        let mut regions = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record.map_err(|e| bed_error(idx, e.to_string()))?;
            if record.start() > record.end() {
                return Err(bed_error(
                    idx,
                    format!("start {} is after end {}", record.start(), record.end()),
                ));
            }
            regions.push((record.chrom().to_string(), record.start()..record.end()));
        }
        Ok(Self::from_regions(regions))
    }

    /// Regions must have `start <= end`.
    pub fn from_regions<I>(regions: I) -> Self
    where
        I: IntoIterator<Item = (String, Range<u64>)>,
    {
        let mut trees: HashMap<String, ArrayBackedIntervalTree<u64, ()>> = HashMap::new();
        let mut n_regions = 0;
        for (chrom, range) in regions {
            trees
                .entry(chrom)
                .or_insert_with(ArrayBackedIntervalTree::new)
                .insert(range, ());
            n_regions += 1;
        }
        trees.values_mut().for_each(|tree| tree.index());
        Self { trees, n_regions }
    }

    pub fn len(&self) -> usize {
        self.n_regions
    }

    pub fn is_empty(&self) -> bool {
        self.n_regions == 0
    }

    /// Whether `chrom:start-end` shares at least one base with a blacklisted
    /// region. Zero length intervals are treated as the single base at `start`.
    pub fn overlaps(&self, chrom: &str, start: u64, end: u64) -> bool {
        let Some(tree) = self.trees.get(chrom) else {
            return false;
        };
        let end = end.max(start.saturating_add(1));
        !tree.find(start..end).is_empty()
    }

    /// Copy BED-like lines from `reader` to `writer`, dropping every line that
    /// overlaps the blacklist. Blank lines, comments and track/browser headers
    /// are copied as is.
    pub fn filter<R, W>(&self, reader: R, writer: W) -> Result<FilterStats>
    where
        R: BufRead,
        W: Write,
    {
        self.filter_named(reader, writer, Path::new("-"))
    }

    fn filter_named<R, W>(&self, mut reader: R, mut writer: W, source: &Path) -> Result<FilterStats>
    where
        R: BufRead,
        W: Write,
    {
        let mut stats = FilterStats::default();
        let mut line = String::new();
        let mut line_no = 0;
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            line_no += 1;
            let keep = match parse_interval(&line) {
                Ok(None) => true,
                Ok(Some((chrom, start, end))) => {
                    if self.overlaps(chrom, start, end) {
                        log::debug!("Removing blacklisted peak {chrom}:{start}-{end}");
                        stats.removed += 1;
                        false
                    } else {
                        stats.kept += 1;
                        true
                    }
                }
                Err(msg) => {
                    return Err(PeaksError::Bed {
                        path: source.to_path_buf(),
                        record: line_no,
                        msg,
                    })
                }
            };
            if keep {
                writer.write_all(line.as_bytes())?;
            }
        }
        writer.flush()?;
        Ok(stats)
    }

    /// Filter `path` in place. The result is written next to it and renamed
    /// over the original, so a failure leaves the original untouched.
    pub fn filter_file<P: AsRef<Path>>(&self, path: P) -> Result<FilterStats> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let reader = BufReader::new(File::open(path)?);
        let mut tmp = NamedTempFile::new_in(dir)?;
        let stats = {
            let writer = BufWriter::new(tmp.as_file_mut());
            self.filter_named(reader, writer, path)?
        };
        fs::set_permissions(tmp.path(), fs::metadata(path)?.permissions())?;
        tmp.persist(path).map_err(|e| e.error)?;
        log::info!(
            "{}: kept {} peaks, removed {} blacklisted peaks",
            path.display(),
            stats.kept,
            stats.removed
        );
        Ok(stats)
    }
}

/// Lines in a BED file that carry no interval
fn is_header(line: &str) -> bool {
    line.trim().is_empty()
        || line.starts_with('#')
        || line.starts_with("track")
        || line.starts_with("browser")
}

/// `Ok(None)` for lines that carry no interval
fn parse_interval(line: &str) -> Result<Option<(&str, u64, u64)>, String> {
    let line = line.trim_end_matches(['\n', '\r']);
    if is_header(line) {
        return Ok(None);
    }
    let mut fields = line.split('\t');
    let chrom = fields.next().unwrap_or_default();
    let start = fields
        .next()
        .ok_or("missing start column")?
        .parse::<u64>()
        .map_err(|e| format!("invalid start: {e}"))?;
    let end = fields
        .next()
        .ok_or("missing end column")?
        .parse::<u64>()
        .map_err(|e| format!("invalid end: {e}"))?;
    if start > end {
        return Err(format!("start {start} is after end {end}"));
    }
    Ok(Some((chrom, start, end)))
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use assert_fs::{prelude::*, TempDir};
    use pretty_assertions::assert_eq;
    use quickcheck::quickcheck;

    use super::*;

    const NARROW_PEAKS: &str = "chr1\t100\t200\tpeak_1\t50\t.\t5.0\t10.0\t8.0\t50\n\
                                chr1\t500\t600\tpeak_2\t80\t.\t6.0\t12.0\t9.0\t40\n";

    fn blacklist(regions: &[(&str, u64, u64)]) -> Blacklist {
        Blacklist::from_regions(
            regions
                .iter()
                .map(|&(chrom, start, end)| (chrom.to_string(), start..end)),
        )
    }

    fn filter_str(blacklist: &Blacklist, input: &str) -> (String, FilterStats) {
        let mut output = Vec::new();
        let stats = blacklist
            .filter(Cursor::new(input.as_bytes()), &mut output)
            .unwrap();
        (String::from_utf8(output).unwrap(), stats)
    }

    #[test]
    fn test_partial_overlap_removes_whole_peak() {
        let bl = blacklist(&[("chr1", 150, 250)]);
        let (output, stats) = filter_str(&bl, NARROW_PEAKS);
        assert_eq!(output, "chr1\t500\t600\tpeak_2\t80\t.\t6.0\t12.0\t9.0\t40\n");
        assert_eq!(stats, FilterStats { kept: 1, removed: 1 });
    }

    #[test]
    fn test_half_open() {
        let bl = blacklist(&[("chr1", 200, 500)]);
        let (output, stats) = filter_str(&bl, NARROW_PEAKS);
        assert_eq!(output, NARROW_PEAKS);
        assert_eq!(stats.removed, 0);

        assert!(bl.overlaps("chr1", 199, 201));
        assert!(!bl.overlaps("chr1", 100, 200));
        assert!(!bl.overlaps("chr1", 500, 501));
        assert!(bl.overlaps("chr1", 250, 250));
        assert!(!bl.overlaps("chr2", 250, 300));
    }

    #[test]
    fn test_headers_pass_through() {
        let bl = blacklist(&[("chr1", 0, 1_000)]);
        let input = "track name=peaks\n# comment\n\nchr1\t10\t20\nchr2\t10\t20\n";
        let (output, stats) = filter_str(&bl, input);
        assert_eq!(output, "track name=peaks\n# comment\n\nchr2\t10\t20\n");
        assert_eq!(stats, FilterStats { kept: 1, removed: 1 });
    }

    #[test]
    fn test_invalid_lines() {
        let bl = blacklist(&[]);
        assert!(bl.is_empty());
        let mut sink = Vec::new();
        let err = bl
            .filter(Cursor::new("chr1\t10\t20\nchr1\tten\t20\n"), &mut sink)
            .unwrap_err();
        assert!(matches!(err, PeaksError::Bed { record: 2, .. }));

        let err = bl.filter(Cursor::new("chr1\t10\n"), &mut sink).unwrap_err();
        assert!(matches!(err, PeaksError::Bed { record: 1, .. }));

        let err = bl.filter(Cursor::new("chr1\t30\t20\n"), &mut sink).unwrap_err();
        assert!(matches!(err, PeaksError::Bed { record: 1, .. }));
    }

    #[test]
    fn test_from_path() {
        let temp_dir = TempDir::new().unwrap();
        let bed = temp_dir.child("blacklist.bed");
        bed.write_str("chr1\t150\t250\tHigh Signal Region\nchrX\t0\t10\tLow Mappability\n")
            .unwrap();
        let bl = Blacklist::from_path(bed.path()).unwrap();
        assert_eq!(bl.len(), 2);
        assert!(bl.overlaps("chrX", 5, 6));

        let missing = Blacklist::from_path(temp_dir.path().join("missing.bed"));
        assert!(matches!(missing, Err(PeaksError::InputNotFound(_))));

        let reversed = temp_dir.child("reversed.bed");
        reversed.write_str("chr1\t250\t150\n").unwrap();
        assert!(matches!(
            Blacklist::from_path(reversed.path()),
            Err(PeaksError::Bed { record: 1, .. })
        ));
    }

    #[test]
    fn test_blacklist_with_headers() {
        let bed = "track name=blacklist description=\"ENCODE blacklist\"\n\
                   browser position chr1:1-1000\n\
                   # hg38\n\
                   \n\
                   chr1\t150\t250\tHigh Signal Region\n\
                   chr2\t0\t10\tLow Mappability\n";
        let bl = Blacklist::from_reader(Cursor::new(bed), Path::new("blacklist.bed")).unwrap();
        assert_eq!(bl.len(), 2);
        assert!(bl.overlaps("chr1", 200, 300));
        assert!(bl.overlaps("chr2", 5, 6));

        let bad = "track name=blacklist\nchr1\t150\t250\tok\nchr1\t300\t200\tbad\n";
        let err = Blacklist::from_reader(Cursor::new(bad), Path::new("bad.bed")).unwrap_err();
        assert!(matches!(err, PeaksError::Bed { record: 3, .. }));
    }

    #[test]
    fn test_max_coordinate() {
        let bl = blacklist(&[("chr1", 100, 200)]);
        assert!(!bl.overlaps("chr1", u64::MAX, u64::MAX));
        let input = format!("chr1\t{max}\t{max}\nchr1\t150\t160\n", max = u64::MAX);
        let (output, stats) = filter_str(&bl, &input);
        assert_eq!(output, format!("chr1\t{max}\t{max}\n", max = u64::MAX));
        assert_eq!(stats, FilterStats { kept: 1, removed: 1 });
    }

    #[test]
    fn test_filter_file_in_place() {
        let temp_dir = TempDir::new().unwrap();
        let peaks = temp_dir.child("s_peaks.narrowPeak");
        peaks.write_str(NARROW_PEAKS).unwrap();
        let bl = blacklist(&[("chr1", 150, 250)]);

        let stats = bl.filter_file(peaks.path()).unwrap();
        assert_eq!(stats, FilterStats { kept: 1, removed: 1 });
        let filtered = fs::read_to_string(peaks.path()).unwrap();
        assert_eq!(filtered, "chr1\t500\t600\tpeak_2\t80\t.\t6.0\t12.0\t9.0\t40\n");

        let again = bl.filter_file(peaks.path()).unwrap();
        assert_eq!(again, FilterStats { kept: 1, removed: 0 });
        assert_eq!(fs::read_to_string(peaks.path()).unwrap(), filtered);
    }

    fn to_bed(intervals: &[(u16, u16)], min_len: u64) -> (String, Vec<(String, u64, u64)>) {
        let mut bed = String::new();
        let mut parsed = Vec::new();
        for &(a, b) in intervals {
            let chrom = if a % 2 == 0 { "chr1" } else { "chr2" };
            let start = a.min(b) as u64;
            let end = (a.max(b) as u64).max(start + min_len);
            bed.push_str(&format!("{chrom}\t{start}\t{end}\n"));
            parsed.push((chrom.to_string(), start, end));
        }
        (bed, parsed)
    }

    fn brute_force_overlaps(regions: &[(String, u64, u64)], chrom: &str, start: u64, end: u64) -> bool {
        let end = end.max(start.saturating_add(1));
        regions
            .iter()
            .any(|(c, s, e)| c == chrom && *s < end && start < *e)
    }

    #[test]
    fn prop_filtered_peaks_avoid_blacklist() {
        fn prop(peaks: Vec<(u16, u16)>, regions: Vec<(u16, u16)>) -> bool {
            let (peak_bed, _) = to_bed(&peaks, 0);
            let (_, regions) = to_bed(&regions, 1);
            let bl = Blacklist::from_regions(
                regions.iter().map(|(c, s, e)| (c.clone(), *s..*e)),
            );
            let (output, stats) = filter_str(&bl, &peak_bed);
            let kept: Vec<_> = output
                .lines()
                .map(|l| parse_interval(l).unwrap().unwrap())
                .collect();
            let none_overlap = kept
                .iter()
                .all(|&(c, s, e)| !brute_force_overlaps(&regions, c, s, e));
            let expected_kept = peak_bed
                .lines()
                .filter_map(|l| parse_interval(l).unwrap())
                .filter(|&(c, s, e)| !brute_force_overlaps(&regions, c, s, e))
                .count();
            let (again, _) = filter_str(&bl, &output);
            none_overlap
                && stats.kept == expected_kept
                && stats.kept + stats.removed == peaks.len()
                && again == output
        }
        quickcheck(prop as fn(Vec<(u16, u16)>, Vec<(u16, u16)>) -> bool);
    }
}
