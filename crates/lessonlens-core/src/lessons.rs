//! Lesson directory scanning.
//!
//! Lessons are PDFs named `<grade>.<unit>.<lesson>.pdf`, for example
//! `6.02.06.pdf`. Files that do not follow the pattern are left out of the
//! scan without complaint.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::error::Result;

const LESSON_FILE_PATTERN: &str = r"^(\d+)\.(\d+)\.(\d+)\.pdf$";

static LESSON_FILE_NAME: OnceCell<Regex> = OnceCell::new();

/// A lesson PDF found in the lesson directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonFile {
    /// Full path to the PDF.
    pub path: PathBuf,
    /// Grade number.
    pub grade: u32,
    /// Unit number within the grade.
    pub unit: u32,
    /// Lesson number within the unit.
    pub lesson: u32,
}

impl LessonFile {
    /// Builds a lesson from a path whose file name matches the lesson pattern.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let (grade, unit, lesson) = parse_file_name(name)?;
        Some(Self {
            path: path.to_path_buf(),
            grade,
            unit,
            lesson,
        })
    }

    /// File name, for lists and reports.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    const fn sort_key(&self) -> (u32, u32, u32) {
        (self.grade, self.unit, self.lesson)
    }
}

impl fmt::Display for LessonFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Grade {}, Unit {}, Lesson {}",
            self.grade, self.unit, self.lesson
        )
    }
}

/// Parses `<grade>.<unit>.<lesson>.pdf` into its three numbers.
///
/// Leading zeros are accepted: `6.02.06.pdf` is grade 6, unit 2, lesson 6.
#[must_use]
pub fn parse_file_name(name: &str) -> Option<(u32, u32, u32)> {
    let pattern = LESSON_FILE_NAME
        .get_or_try_init(|| Regex::new(LESSON_FILE_PATTERN))
        .ok()?;
    let captures = pattern.captures(name)?;
    let number = |i: usize| captures.get(i)?.as_str().parse::<u32>().ok();
    Some((number(1)?, number(2)?, number(3)?))
}

/// Lists the lesson PDFs in `dir`, ordered by grade, unit and lesson.
///
/// A missing directory yields an empty list and a warning.
///
/// # Errors
///
/// Returns `LessonLensError::Io` if the directory exists but cannot be read.
pub fn scan_lessons(dir: &Path) -> Result<Vec<LessonFile>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(dir = %dir.display(), "Lesson directory not found");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut lessons = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        match LessonFile::from_path(&path) {
            Some(lesson) => lessons.push(lesson),
            None => tracing::trace!(path = %path.display(), "Skipping non-lesson file"),
        }
    }

    lessons.sort_by(|a, b| {
        a.sort_key()
            .cmp(&b.sort_key())
            .then_with(|| a.path.cmp(&b.path))
    });
    tracing::debug!(dir = %dir.display(), count = lessons.len(), "Scanned lessons");
    Ok(lessons)
}

/// Groups lessons by grade, keeping their order within each grade.
#[must_use]
pub fn group_by_grade(lessons: &[LessonFile]) -> BTreeMap<u32, Vec<&LessonFile>> {
    let mut grades: BTreeMap<u32, Vec<&LessonFile>> = BTreeMap::new();
    for lesson in lessons {
        grades.entry(lesson.grade).or_default().push(lesson);
    }
    grades
}
