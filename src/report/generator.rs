//! HTML generation for grading pages.
//!
//! Notebook cells are rendered in the spirit of nbconvert's basic template:
//! markdown becomes HTML, code cells show an `In [n]:` prompt with their
//! source, and outputs keep the richest representation we can embed.

use crate::models::{ExerciseSelection, LabRef, Page, Submission};
use crate::notebook::{mime_text, Cell, CellType, ExerciseLocator, MimeBundle, Notebook, Output};
use chrono::{DateTime, Utc};
use pulldown_cmark::{html, Options, Parser};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::warn;

/// Stylesheet shared by every page of a lab.
pub const STYLESHEET: &str = include_str!("style.css");
pub const STYLESHEET_NAME: &str = "style.css";

/// Everything a page needs besides its students.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub lab: LabRef,
    pub selection: ExerciseSelection,
    pub locator: ExerciseLocator,
    pub generated_at: DateTime<Utc>,
}

impl ReportContext {
    /// File name of page `number`.
    pub fn page_file_name(&self, number: usize) -> String {
        format!(
            "DSCI{}_lab{}_exercise{}_page{}.html",
            self.lab.course,
            self.lab.lab,
            self.selection.label(),
            number
        )
    }

    fn title(&self) -> String {
        format!("{} \u{2013} {}", self.lab, self.selection)
    }
}

/// Escape text for HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn ansi_regex() -> &'static Regex {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    ANSI.get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("valid ANSI regex"))
}

/// Remove terminal colour codes (tracebacks are full of them).
pub fn strip_ansi(text: &str) -> String {
    ansi_regex().replace_all(text, "").into_owned()
}

/// Render markdown to HTML.
pub fn render_markdown(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(text, options);
    let mut output = String::new();
    html::push_html(&mut output, parser);
    output
}

/// Render a run of cells as an HTML fragment.
pub fn render_cells(cells: &[Cell], language: &str) -> String {
    let mut output = String::new();
    for cell in cells {
        output.push_str(&render_cell(cell, language));
    }
    output
}

fn render_cell(cell: &Cell, language: &str) -> String {
    let source = cell.source_text();

    match cell.cell_type {
        CellType::Markdown => format!(
            "<div class=\"cell text_cell\">\n<div class=\"text_cell_render\">\n{}</div>\n</div>\n",
            render_markdown(&source)
        ),
        CellType::Code => {
            let mut block = String::new();
            block.push_str("<div class=\"cell code_cell\">\n");
            block.push_str("<div class=\"input\">\n");
            block.push_str(&format!(
                "<div class=\"prompt input_prompt\">In&nbsp;[{}]:</div>\n",
                prompt_number(cell.execution_count)
            ));
            block.push_str(&format!(
                "<pre class=\"input_area\"><code class=\"language-{}\">{}</code></pre>\n",
                escape_html(language),
                escape_html(&source)
            ));
            block.push_str("</div>\n");

            if !cell.outputs.is_empty() {
                block.push_str("<div class=\"output_wrapper\">\n");
                for output in &cell.outputs {
                    block.push_str(&render_output(output));
                }
                block.push_str("</div>\n");
            }

            block.push_str("</div>\n");
            block
        }
        CellType::Raw | CellType::Unknown => format!(
            "<div class=\"cell raw_cell\">\n<pre>{}</pre>\n</div>\n",
            escape_html(&source)
        ),
    }
}

fn prompt_number(count: Option<u32>) -> String {
    count.map(|n| n.to_string()).unwrap_or_else(|| "&nbsp;".to_string())
}

fn render_output(output: &Output) -> String {
    match output {
        Output::Stream { name, text } => {
            let class = if name == "stderr" {
                "output_stderr"
            } else {
                "output_stdout"
            };
            format!(
                "<div class=\"output_area {}\"><pre>{}</pre></div>\n",
                class,
                escape_html(&strip_ansi(&text.text()))
            )
        }
        Output::ExecuteResult {
            data,
            execution_count,
        } => format!(
            "<div class=\"output_area execute_result\">\n<div class=\"prompt output_prompt\">Out[{}]:</div>\n{}</div>\n",
            prompt_number(*execution_count),
            render_mime_bundle(data)
        ),
        Output::DisplayData { data } => format!(
            "<div class=\"output_area display_data\">\n{}</div>\n",
            render_mime_bundle(data)
        ),
        Output::Error {
            ename,
            evalue,
            traceback,
        } => {
            let mut body = format!("{}: {}", ename, evalue);
            if !traceback.is_empty() {
                body.push('\n');
                body.push_str(&strip_ansi(&traceback.join("\n")));
            }
            format!(
                "<div class=\"output_area output_error\"><pre>{}</pre></div>\n",
                escape_html(&body)
            )
        }
        Output::Unknown => String::new(),
    }
}

/// Pick the richest representation we can embed.
fn render_mime_bundle(data: &MimeBundle) -> String {
    if let Some(value) = data.get("text/html") {
        return format!("<div class=\"output_html\">{}</div>\n", mime_text(value));
    }
    if let Some(value) = data.get("image/svg+xml") {
        return format!("<div class=\"output_svg\">{}</div>\n", mime_text(value));
    }
    for mime in ["image/png", "image/jpeg", "image/gif"] {
        if let Some(value) = data.get(mime) {
            let encoded: String = mime_text(value).split_whitespace().collect();
            return format!(
                "<div class=\"output_png\"><img src=\"data:{};base64,{}\"></div>\n",
                mime, encoded
            );
        }
    }
    if let Some(value) = data.get("text/markdown") {
        return format!(
            "<div class=\"output_markdown\">{}</div>\n",
            render_markdown(&mime_text(value))
        );
    }
    if let Some(value) = data.get("text/latex") {
        return format!(
            "<div class=\"output_latex\">{}</div>\n",
            escape_html(&mime_text(value))
        );
    }
    if let Some(value) = data.get("text/plain") {
        return format!(
            "<div class=\"output_text\"><pre>{}</pre></div>\n",
            escape_html(&strip_ansi(&mime_text(value)))
        );
    }
    String::new()
}

/// Render the section of one student.
///
/// Returns `None` when the student has no submission.
pub fn render_student(
    student: &str,
    submission: Option<&Submission>,
    ctx: &ReportContext,
) -> Option<String> {
    let Some(submission) = submission else {
        warn!("{} has no submission, leaving them off the page", student);
        return None;
    };

    let mut section = String::new();
    section.push_str(&format!(
        "<section class=\"student\" id=\"{0}\">\n<h1>{0}</h1>\n<p class=\"source\">{1}</p>\n",
        escape_html(student),
        escape_html(&submission.file_name)
    ));

    match Notebook::parse(&submission.content) {
        Ok(notebook) => {
            let extraction = ctx.locator.extract(&notebook, &ctx.selection);

            for part in &extraction.parts {
                section.push_str(&format!(
                    "<div class=\"exercise\" data-exercise=\"{}\">\n",
                    part.number
                ));
                section.push_str(&render_cells(&part.cells, notebook.language()));
                section.push_str("</div>\n");
            }

            for n in &extraction.missing {
                warn!("{}: exercise {} not found in {}", student, n, submission.file_name);
                section.push_str(&format!(
                    "<p class=\"notice\">Exercise {} not found in {}.</p>\n",
                    n,
                    escape_html(&submission.file_name)
                ));
            }
        }
        Err(e) => {
            warn!("{}: {}", student, e);
            section.push_str(&format!(
                "<p class=\"notice\">Could not read {}: {}</p>\n",
                escape_html(&submission.file_name),
                escape_html(&e.to_string())
            ));
        }
    }

    section.push_str("</section>\n");
    Some(section)
}

fn document_head(title: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n\t<meta charset=\"utf-8\">\n\t<title>{}</title>\n\t<link rel=\"stylesheet\" href=\"{}\">\n</head>\n\n<body>\n\n",
        escape_html(title),
        STYLESHEET_NAME
    )
}

fn document_footer(generated_at: &DateTime<Utc>) -> String {
    format!(
        "<footer>Generated {}</footer>\n</body>\n</html>\n",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

fn page_navigation(page: usize, total: usize, ctx: &ReportContext) -> String {
    let mut nav = String::from("<nav class=\"pager\">");
    if page > 0 {
        nav.push_str(&format!(
            "<a href=\"{}\">&larr; previous</a> ",
            ctx.page_file_name(page - 1)
        ));
    }
    nav.push_str(&format!(
        "<a href=\"index.html\">index</a> <span>page {} of {}</span>",
        page + 1,
        total
    ));
    if page + 1 < total {
        nav.push_str(&format!(
            " <a href=\"{}\">next &rarr;</a>",
            ctx.page_file_name(page + 1)
        ));
    }
    nav.push_str("</nav>\n");
    nav
}

/// Render a full page document.
pub fn render_page(
    page: &Page,
    total_pages: usize,
    submissions: &HashMap<&str, &Submission>,
    ctx: &ReportContext,
) -> String {
    let mut output = document_head(&format!("{} (page {})", ctx.title(), page.number));
    let nav = page_navigation(page.number, total_pages, ctx);
    output.push_str(&nav);

    for student in &page.students {
        let submission = submissions.get(student.id.as_str()).copied();
        if let Some(section) = render_student(&student.id, submission, ctx) {
            output.push_str(&section);
        }
    }

    output.push_str(&nav);
    output.push_str(&document_footer(&ctx.generated_at));
    output
}

/// Render the index linking every page.
pub fn render_index(pages: &[Page], missing: &[String], ctx: &ReportContext) -> String {
    let mut output = document_head(&ctx.title());

    output.push_str(&format!("<h1>{}</h1>\n", escape_html(&ctx.title())));
    output.push_str("<ol class=\"pages\" start=\"0\">\n");
    for page in pages {
        output.push_str(&format!(
            "<li><a href=\"{}\">{}</a> ({} students)</li>\n",
            ctx.page_file_name(page.number),
            escape_html(&page.span()),
            page.students.len()
        ));
    }
    output.push_str("</ol>\n");

    if !missing.is_empty() {
        output.push_str("<h2>Missing submissions</h2>\n<ul class=\"missing\">\n");
        for id in missing {
            output.push_str(&format!("<li>{}</li>\n", escape_html(id)));
        }
        output.push_str("</ul>\n");
    }

    output.push_str(&document_footer(&ctx.generated_at));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Student;
    use crate::notebook::tests::SAMPLE;

    fn context(exercises: &[u32]) -> ReportContext {
        ReportContext {
            lab: LabRef::new("571", "4"),
            selection: ExerciseSelection::new(exercises).unwrap(),
            locator: ExerciseLocator::default(),
            generated_at: Utc::now(),
        }
    }

    fn submission(student: &str, content: &str) -> Submission {
        Submission {
            student: student.to_string(),
            file_name: "lab4.ipynb".to_string(),
            fetched_at: Utc::now(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_page_file_name() {
        assert_eq!(
            context(&[3]).page_file_name(2),
            "DSCI571_lab4_exercise3_page2.html"
        );
        assert_eq!(
            context(&[3, 4]).page_file_name(0),
            "DSCI571_lab4_exercise34_page0.html"
        );
    }

    #[test]
    fn test_escape_and_strip() {
        assert_eq!(escape_html("<a href='x'>&</a>"), "&lt;a href=&#39;x&#39;&gt;&amp;&lt;/a&gt;");
        assert_eq!(strip_ansi("\x1b[0;31mError\x1b[0m: bad"), "Error: bad");
    }

    #[test]
    fn test_render_markdown() {
        let html = render_markdown("## Exercise 1\n\n| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<h2>Exercise 1</h2>"));
        assert!(html.contains("<table>"));
    }

    #[test]
    fn test_render_cells_covers_outputs() {
        let notebook = Notebook::parse(SAMPLE).unwrap();
        let html = render_cells(&notebook.cells, notebook.language());

        assert!(html.contains("In&nbsp;[1]:"));
        assert!(html.contains("language-python"));
        assert!(html.contains("df = pd.read_csv(&#39;x.csv&#39;)"));
        assert!(html.contains("loaded"));
        assert!(html.contains("Out[2]:"));
        assert!(html.contains("&lt;Axes&gt;"));
        assert!(html.contains("data:image/png;base64,iVBORw0KGgo="));
        assert!(!html.contains("&lt;Figure&gt;"));
        assert!(html.contains("ZeroDivisionError: division by zero"));
        assert!(!html.contains('\x1b'));
    }

    #[test]
    fn test_error_output_names_exception_before_traceback() {
        let output = Output::Error {
            ename: "KeyError".to_string(),
            evalue: "'price'".to_string(),
            traceback: vec![
                "---------".to_string(),
                "\x1b[0;31mTraceback (most recent call last)\x1b[0m".to_string(),
                "  File x, line 3".to_string(),
            ],
        };
        let html = render_output(&output);

        let header = html.find("KeyError: &#39;price&#39;").unwrap();
        let trace = html.find("Traceback (most recent call last)").unwrap();
        assert!(header < trace);
        assert!(html.contains("File x, line 3"));
        assert!(!html.contains('\x1b'));
    }

    #[test]
    fn test_mime_preference() {
        let mut data = MimeBundle::new();
        data.insert("text/plain".into(), "plain".into());
        data.insert("text/html".into(), "<b>rich</b>".into());
        let html = render_mime_bundle(&data);
        assert!(html.contains("<b>rich</b>"));
        assert!(!html.contains("plain"));
    }

    #[test]
    fn test_render_student_only_selected_exercises() {
        let ctx = context(&[2]);
        let sub = submission("alice", SAMPLE);
        let html = render_student("alice", Some(&sub), &ctx).unwrap();

        assert!(html.contains("<h1>alice</h1>"));
        assert!(html.contains("Exercise 2"));
        assert!(html.contains("df.plot()"));
        assert!(!html.contains("read_csv"));
        assert!(!html.contains("Explain."));
    }

    #[test]
    fn test_render_student_notices() {
        let ctx = context(&[9]);
        let sub = submission("bob", SAMPLE);
        let html = render_student("bob", Some(&sub), &ctx).unwrap();
        assert!(html.contains("Exercise 9 not found in lab4.ipynb."));

        let broken = submission("carol", "{oops");
        let html = render_student("carol", Some(&broken), &ctx).unwrap();
        assert!(html.contains("Could not read lab4.ipynb"));

        assert!(render_student("dan", None, &ctx).is_none());
    }

    #[test]
    fn test_render_page_and_navigation() {
        let ctx = context(&[1]);
        let alice = submission("alice", SAMPLE);
        let mut submissions = HashMap::new();
        submissions.insert("alice", &alice);

        let page = Page {
            number: 1,
            students: vec![Student::new("alice"), Student::new("ghost")],
        };
        let html = render_page(&page, 3, &submissions, &ctx);

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("href=\"style.css\""));
        assert!(html.contains("<h1>alice</h1>"));
        assert!(!html.contains("ghost"));
        assert!(html.contains("DSCI571_lab4_exercise1_page0.html"));
        assert!(html.contains("DSCI571_lab4_exercise1_page2.html"));
        assert!(html.contains("page 2 of 3"));
        assert!(html.ends_with("</html>\n"));
    }

    #[test]
    fn test_render_index() {
        let ctx = context(&[1]);
        let pages = vec![
            Page {
                number: 0,
                students: vec![Student::new("alice"), Student::new("bob")],
            },
            Page {
                number: 1,
                students: vec![Student::new("carol")],
            },
        ];
        let html = render_index(&pages, &["bob".to_string()], &ctx);

        assert!(html.contains("DSCI571_lab4_exercise1_page1.html"));
        assert!(html.contains("(2 students)"));
        assert!(html.contains("Missing submissions"));
        assert!(html.contains("<li>bob</li>"));
    }
}
