//! Analysis instructions placed at the top of every request.

use std::path::Path;

use crate::error::{LessonLensError, Result};

/// Used when no instructions file is present.
pub const DEFAULT_INSTRUCTIONS: &str = "\
Please analyze the following lesson based on the provided math standards and progression documents.

Provide a comprehensive analysis including:
1. How well the lesson addresses the specified standards
2. Alignment with the progression documents
3. Strengths of the lesson
4. Areas for improvement
5. Suggested modifications or extensions";

/// Reads the instructions file, falling back to [`DEFAULT_INSTRUCTIONS`] when it is absent.
///
/// # Errors
///
/// Returns `LessonLensError::Encoding` if the file is not valid UTF-8 and
/// `LessonLensError::Io` if it exists but cannot be read.
pub fn load_instructions(path: &Path) -> Result<String> {
    match std::fs::read(path) {
        Ok(bytes) => String::from_utf8(bytes)
            .map_err(|_| LessonLensError::encoding(path.display().to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(
                path = %path.display(),
                "Instructions file not found, using default instructions"
            );
            Ok(DEFAULT_INSTRUCTIONS.to_string())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::assembler::{LESSON_HEADER, REFERENCE_HEADER, STANDARDS_HEADER};

    #[test]
    fn test_load_instructions_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("instructions.txt");
        std::fs::write(&path, "Focus on ratio reasoning.").unwrap();

        assert_eq!(load_instructions(&path).unwrap(), "Focus on ratio reasoning.");
    }

    #[test]
    fn test_missing_file_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        let instructions = load_instructions(&dir.path().join("instructions.txt")).unwrap();
        assert_eq!(instructions, DEFAULT_INSTRUCTIONS);
    }

    #[test]
    fn test_invalid_utf8_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("instructions.txt");
        std::fs::write(&path, [0xC3, 0x28]).unwrap();

        assert!(matches!(
            load_instructions(&path).unwrap_err(),
            LessonLensError::Encoding { .. }
        ));
    }

    #[test]
    fn test_default_does_not_contain_section_headers() {
        for header in [STANDARDS_HEADER, REFERENCE_HEADER, LESSON_HEADER] {
            assert!(!DEFAULT_INSTRUCTIONS.contains(header));
        }
        assert!(!DEFAULT_INSTRUCTIONS.contains("STANDARDS"));
        assert!(!DEFAULT_INSTRUCTIONS.contains("REFERENCE"));
        assert!(!DEFAULT_INSTRUCTIONS.contains("LESSON"));
    }
}
