use super::dir::DirHandle;
use crate::size::SizeType;

const MAX_BINS: usize = 64;

/// One size range of a [`Histogram`], `min <= size < max`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistogramBin {
    pub min: u64,
    pub max: u64,
    pub file_count: u64,
    pub dir_count: u64,
}

/// Distribution of entry sizes within one directory
///
/// Bin 0 holds everything below `bin_min`; the following bins grow by
/// `power` each, starting at `bin_min`. The last bin is open-ended and
/// takes every entry at or above its lower bound.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub size_type: SizeType,
    pub bins: Vec<HistogramBin>,
}

impl Histogram {
    pub fn new(dir: &DirHandle, size_type: SizeType, bin_min: u64, bin_max: u64, power: f64) -> Self {
        let bin_min = bin_min.max(1);
        let mut bin_count = 1;
        if power > 1.0 {
            let mut edge = bin_min as f64 * power;
            while edge < bin_max as f64 && bin_count < MAX_BINS {
                bin_count += 1;
                edge *= power;
            }
        }

        let mut bins = Vec::with_capacity(bin_count + 1);
        bins.push(HistogramBin {
            min: 0,
            max: bin_min,
            ..Default::default()
        });
        let mut lower = bin_min;
        for i in 0..bin_count {
            let upper = if i + 1 == bin_count {
                u64::MAX
            } else {
                (bin_min as f64 * power.powi(i as i32 + 1)) as u64
            };
            bins.push(HistogramBin {
                min: lower,
                max: upper,
                ..Default::default()
            });
            lower = upper;
        }

        for entry in dir.entries() {
            let value = entry.size.get(size_type);
            let index = bins
                .iter()
                .position(|bin| value < bin.max)
                .unwrap_or(bins.len() - 1);
            let bin = &mut bins[index];
            if entry.file_type.is_directory() {
                bin.dir_count += 1;
            } else {
                bin.file_count += 1;
            }
        }

        Self { size_type, bins }
    }

    pub fn total_files(&self) -> u64 {
        self.bins.iter().map(|b| b.file_count).sum()
    }

    pub fn total_dirs(&self) -> u64 {
        self.bins.iter().map(|b| b.dir_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::model::{DevIno, DirEntry, DirRecord, FileType, IndexReport};
    use crate::size::Size;

    fn open_with(entries: Vec<DirEntry>) -> DirHandle {
        let mut db = Database::in_memory().unwrap();
        let devino = DevIno::new(3, 3);
        let mut record = DirRecord::new(DevIno::NONE, 0);
        record.entries = entries;
        db.put_dir(devino, &record).unwrap();
        let mut report = IndexReport::new("/h");
        report.devino = devino;
        db.write_report(&report).unwrap();
        db.open_dir("/h").unwrap()
    }

    fn sized(name: &str, actual: u64) -> DirEntry {
        DirEntry::file(name, FileType::Regular, Size::new(actual, actual, 1))
    }

    #[test]
    fn test_bins_cover_every_entry() {
        let dir = open_with(vec![
            sized("zero", 0),
            sized("small", 10),
            sized("mid", 1500),
            sized("huge", 1 << 40),
            DirEntry::directory("d", Size::new(0, 5000, 4), DevIno::new(3, 4)),
        ]);
        let h = Histogram::new(&dir, SizeType::Actual, 1024, 1 << 20, 2.0);

        assert_eq!(h.bins.len(), 11);
        assert_eq!(h.bins[0].min, 0);
        assert_eq!(h.bins[0].max, 1024);
        assert_eq!(h.bins[1].min, 1024);
        assert_eq!(h.bins[1].max, 2048);
        assert_eq!(h.bins.last().unwrap().max, u64::MAX);

        assert_eq!(h.bins[0].file_count, 2);
        assert_eq!(h.bins[1].file_count, 1);
        assert_eq!(h.bins[3].dir_count, 1);
        assert_eq!(h.bins[10].file_count, 1);
        assert_eq!(h.total_files(), 4);
        assert_eq!(h.total_dirs(), 1);
    }

    #[test]
    fn test_degenerate_parameters_still_bin() {
        let dir = open_with(vec![sized("a", 5), sized("b", 500)]);
        let h = Histogram::new(&dir, SizeType::Apparent, 0, 0, 1.0);
        assert_eq!(h.bins.len(), 2);
        assert_eq!(h.total_files(), 2);
    }
}
