//! Volume batch planning
//!
//! A request covering volumes `start..=end` becomes one [`WorkUnit`] per
//! volume. Units are processed one at a time and their scratch directories
//! are removed before the next unit starts, which bounds peak disk use to a
//! single volume no matter how large the range is. The plan itself is lazy:
//! a unit is only built when the pipeline is ready to process it.

use crate::types::{ChapterBounds, ContentSource, ConvertRequest};
use crate::utils;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

/// One indivisible slice of a batch
#[derive(Clone, Debug, PartialEq)]
pub struct WorkUnit {
    /// 1-based position in the batch
    pub ordinal: usize,
    /// Title of the request, used to name the merged book
    pub title: String,
    /// Volume this unit fetches (ranged catalog requests)
    pub volume: Option<u32>,
    /// Content reference handed to the downloader
    pub source: ContentSource,
    /// Chapter bounds applied inside the volume
    pub chapters: Option<ChapterBounds>,
    /// Root of this unit's scratch space
    pub scratch: PathBuf,
}

impl WorkUnit {
    /// Directory the downloader populates
    pub fn download_dir(&self) -> PathBuf {
        self.scratch.join("download")
    }

    /// Directory holding the merged page sequence
    ///
    /// The converter names its document after this directory, so it carries
    /// the book name rather than a fixed scratch name.
    pub fn merge_dir(&self) -> PathBuf {
        self.scratch.join("merge").join(self.book_name())
    }

    /// `<Title> Vol. N` for ranged units, otherwise the title alone
    pub fn book_name(&self) -> String {
        let title = utils::sanitize_file_name(&self.title);
        match self.volume {
            Some(volume) => format!("{} Vol. {}", title, volume),
            None => title,
        }
    }

    /// Directory the converter writes into
    pub fn output_dir(&self) -> PathBuf {
        self.scratch.join("output")
    }

    /// Where the unit's raw content lives once the download stage is done
    ///
    /// Local sources are read in place.
    pub fn input_path(&self) -> PathBuf {
        match &self.source {
            ContentSource::Local { path } => path.clone(),
            _ => self.download_dir(),
        }
    }

    /// Whether the download stage runs for this unit
    pub fn needs_download(&self) -> bool {
        !matches!(self.source, ContentSource::Local { .. })
    }

    /// Label used in progress messages
    pub fn label(&self) -> String {
        match self.volume {
            Some(volume) => format!("volume {}", volume),
            None => format!("unit {}", self.ordinal),
        }
    }

    /// Remove every scratch directory of this unit
    pub async fn cleanup(&self) -> crate::Result<()> {
        utils::remove_dir_if_exists(&self.scratch).await
    }
}

/// Lazy sequence of the work units of one request
///
/// Produced by [`plan_units`]. Only the unit being processed exists at any
/// time, whatever the size of the range.
#[derive(Clone, Debug)]
pub struct UnitPlan {
    title: String,
    source: ContentSource,
    chapters: Option<ChapterBounds>,
    job_scratch: PathBuf,
    volumes: Option<RangeInclusive<u32>>,
    total: u64,
    emitted: usize,
}

impl UnitPlan {
    /// Number of units the plan yields in total
    pub fn total(&self) -> u64 {
        self.total
    }
}

impl Iterator for UnitPlan {
    type Item = WorkUnit;

    fn next(&mut self) -> Option<WorkUnit> {
        let volume = match &mut self.volumes {
            Some(range) => Some(range.next()?),
            None if self.emitted == 0 => None,
            None => return None,
        };
        self.emitted += 1;
        Some(WorkUnit {
            ordinal: self.emitted,
            title: self.title.clone(),
            volume,
            source: self.source.clone(),
            chapters: self.chapters.clone(),
            scratch: self.job_scratch.join(format!("unit-{:03}", self.emitted)),
        })
    }
}

/// Decompose `request` into work units rooted under `job_scratch`
///
/// Ranged catalog requests yield `start, start + 1, ..., end`. Every other
/// request is a single unit.
///
/// ```
/// use panelpress::planner::plan_units;
/// use panelpress::types::ConvertRequest;
/// use std::path::Path;
///
/// let request = ConvertRequest::catalog("Title", "abc", 3, 5);
/// let plan = plan_units(&request, Path::new("/scratch/job-1"));
/// assert_eq!(plan.total(), 3);
/// let volumes: Vec<_> = plan.map(|u| u.volume).collect();
/// assert_eq!(volumes, vec![Some(3), Some(4), Some(5)]);
/// ```
pub fn plan_units(request: &ConvertRequest, job_scratch: &Path) -> UnitPlan {
    let volumes = match (&request.source, request.range) {
        (ContentSource::Catalog { .. }, Some(range)) => Some(range.start..=range.end),
        _ => None,
    };
    let total = match (&volumes, request.range) {
        (Some(_), Some(range)) => range.len(),
        _ => 1,
    };
    UnitPlan {
        title: request.title.clone(),
        source: request.source.clone(),
        chapters: request.chapters.clone(),
        job_scratch: job_scratch.to_path_buf(),
        volumes,
        total,
        emitted: 0,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_yields_one_unit_per_volume_in_order() {
        let mut request = ConvertRequest::catalog("T", "id-1", 1, 3);
        request.chapters = Some(ChapterBounds {
            start: Some("2".into()),
            end: None,
        });
        let units: Vec<_> = plan_units(&request, Path::new("/s/job")).collect();

        assert_eq!(units.len(), 3);
        for (i, unit) in units.iter().enumerate() {
            assert_eq!(unit.ordinal, i + 1);
            assert_eq!(unit.volume, Some(i as u32 + 1));
            assert_eq!(unit.chapters, request.chapters);
            assert!(unit.needs_download());
        }
        assert_eq!(units[1].download_dir(), PathBuf::from("/s/job/unit-002/download"));
        assert_eq!(units[1].label(), "volume 2");
    }

    #[test]
    fn single_volume_range() {
        let units: Vec<_> =
            plan_units(&ConvertRequest::catalog("T", "id", 7, 7), Path::new("/s")).collect();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].volume, Some(7));
    }

    #[test]
    fn unranged_catalog_is_a_single_unit() {
        let mut request = ConvertRequest::catalog("T", "id", 1, 1);
        request.range = None;
        let units: Vec<_> = plan_units(&request, Path::new("/s")).collect();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].volume, None);
        assert_eq!(units[0].label(), "unit 1");
    }

    #[test]
    fn local_source_is_read_in_place() {
        let request = ConvertRequest::local("T", "/uploads/book.cbz");
        let units: Vec<_> = plan_units(&request, Path::new("/s")).collect();
        assert_eq!(units.len(), 1);
        assert!(!units[0].needs_download());
        assert_eq!(units[0].input_path(), PathBuf::from("/uploads/book.cbz"));
    }

    #[test]
    fn merged_book_is_named_after_title_and_volume() {
        let request = ConvertRequest::catalog("Berserk: Deluxe", "id", 2, 3);
        let units: Vec<_> = plan_units(&request, Path::new("/s")).collect();

        assert_eq!(units[0].book_name(), "Berserk_ Deluxe Vol. 2");
        assert_eq!(
            units[1].merge_dir(),
            PathBuf::from("/s/unit-002/merge/Berserk_ Deluxe Vol. 3")
        );

        let local = plan_units(&ConvertRequest::local("Berserk", "/u/b.cbz"), Path::new("/s"))
            .next()
            .unwrap();
        assert_eq!(local.book_name(), "Berserk");
    }

    #[test]
    fn huge_range_is_planned_lazily() {
        let request = ConvertRequest::catalog("T", "id", 0, u32::MAX);
        let mut plan = plan_units(&request, Path::new("/s"));

        assert_eq!(plan.total(), u64::from(u32::MAX) + 1);
        assert_eq!(plan.next().unwrap().volume, Some(0));
        let second = plan.next().unwrap();
        assert_eq!(second.ordinal, 2);
        assert_eq!(second.volume, Some(1));
    }

    #[test]
    fn range_end_at_u32_max_terminates() {
        let request = ConvertRequest::catalog("T", "id", u32::MAX - 1, u32::MAX);
        let volumes: Vec<_> = plan_units(&request, Path::new("/s")).map(|u| u.volume).collect();
        assert_eq!(volumes, vec![Some(u32::MAX - 1), Some(u32::MAX)]);
    }

    #[tokio::test]
    async fn cleanup_removes_all_unit_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let request = ConvertRequest::catalog("T", "id", 1, 1);
        let unit = plan_units(&request, dir.path()).next().unwrap();
        for sub in [unit.download_dir(), unit.merge_dir(), unit.output_dir()] {
            std::fs::create_dir_all(&sub).unwrap();
            std::fs::write(sub.join("f"), b"x").unwrap();
        }

        unit.cleanup().await.unwrap();
        assert!(!unit.download_dir().exists());
        assert!(!unit.merge_dir().exists());
        assert!(!unit.scratch.exists());
        unit.cleanup().await.unwrap();
    }
}
