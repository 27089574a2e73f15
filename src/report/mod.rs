//! Report writing.
//!
//! Pages land in `{output_dir}/DSCI{course}/Lab{lab}/` next to the shared
//! stylesheet and an index page.

pub mod generator;

pub use generator::{render_index, render_page, ReportContext, STYLESHEET, STYLESHEET_NAME};

use crate::models::{LabRef, Page, Submission};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Output directory of a lab.
pub fn lab_dir(output_root: &Path, lab: &LabRef) -> PathBuf {
    output_root
        .join(format!("DSCI{}", lab.course))
        .join(format!("Lab{}", lab.lab))
}

/// Write every page, the stylesheet and the index into `dir`.
///
/// Existing files with the same names are overwritten. Returns the paths
/// written, pages first.
pub fn write_report(
    dir: &Path,
    pages: &[Page],
    submissions: &[Submission],
    missing: &[String],
    ctx: &ReportContext,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let by_student: HashMap<&str, &Submission> = submissions
        .iter()
        .map(|s| (s.student.as_str(), s))
        .collect();

    let mut written = Vec::with_capacity(pages.len() + 2);

    for page in pages {
        let path = dir.join(ctx.page_file_name(page.number));
        let html = render_page(page, pages.len(), &by_student, ctx);
        write_file(&path, &html)?;
        debug!("Wrote page {} ({} students)", page.number, page.students.len());
        written.push(path);
    }

    let css_path = dir.join(STYLESHEET_NAME);
    write_file(&css_path, STYLESHEET)?;
    written.push(css_path);

    let index_path = dir.join("index.html");
    write_file(&index_path, &render_index(pages, missing, ctx))?;
    written.push(index_path);

    info!("Wrote {} pages to {}", pages.len(), dir.display());
    Ok(written)
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExerciseSelection, Student};
    use crate::notebook::tests::SAMPLE;
    use crate::notebook::ExerciseLocator;
    use crate::roster::paginate;
    use chrono::Utc;

    fn context() -> ReportContext {
        ReportContext {
            lab: LabRef::new("572", "1"),
            selection: ExerciseSelection::new(&[3, 4]).unwrap(),
            locator: ExerciseLocator::default(),
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_lab_dir() {
        assert_eq!(
            lab_dir(Path::new("out"), &LabRef::new("571", "4")),
            PathBuf::from("out/DSCI571/Lab4")
        );
    }

    #[test]
    fn test_write_report_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = lab_dir(tmp.path(), &LabRef::new("572", "1"));

        let students: Vec<Student> = ["a", "b", "c", "d", "e"].iter().map(|id| Student::new(*id)).collect();
        let pages = paginate(&students, 2);
        let submissions: Vec<Submission> = students
            .iter()
            .take(4)
            .map(|s| Submission {
                student: s.id.clone(),
                file_name: "lab1.ipynb".to_string(),
                fetched_at: Utc::now(),
                content: SAMPLE.to_string(),
            })
            .collect();

        let written = write_report(&dir, &pages, &submissions, &["e".to_string()], &context()).unwrap();

        assert_eq!(written.len(), 5);
        assert!(dir.join("DSCI572_lab1_exercise34_page0.html").is_file());
        assert!(dir.join("DSCI572_lab1_exercise34_page2.html").is_file());
        assert!(!dir.join("DSCI572_lab1_exercise34_page3.html").exists());
        assert!(dir.join("style.css").is_file());
        assert!(dir.join("index.html").is_file());

        let first = std::fs::read_to_string(dir.join("DSCI572_lab1_exercise34_page0.html")).unwrap();
        assert!(first.contains("<h1>a</h1>"));
        assert!(first.contains("<h1>b</h1>"));
        assert!(!first.contains("<h1>c</h1>"));
        assert!(first.contains("Explain."));
    }

    #[test]
    fn test_rewrite_overwrites_pages() {
        let tmp = tempfile::tempdir().unwrap();
        let pages = paginate(&[Student::new("a")], 15);

        write_report(tmp.path(), &pages, &[], &[], &context()).unwrap();
        let first_len = std::fs::metadata(tmp.path().join("DSCI572_lab1_exercise34_page0.html"))
            .unwrap()
            .len();

        write_report(tmp.path(), &pages, &[], &[], &context()).unwrap();
        let second_len = std::fs::metadata(tmp.path().join("DSCI572_lab1_exercise34_page0.html"))
            .unwrap()
            .len();

        assert_eq!(first_len, second_len);
    }
}
