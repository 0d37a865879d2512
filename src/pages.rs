//! HTML pages for the blueprint flow.
//!
//! Every function here is pure: it takes already-loaded data and returns a
//! complete document. Dynamic values are escaped before interpolation and the
//! rendered blueprint body is passed through `ammonia` as a last step.

use lazy_static::lazy_static;
use regex::Regex;

use crate::db::models::BlueprintRecord;

const DEFAULT_CONTACT_NAME: &str = "Valued Customer";
const SUPPORT_EMAIL: &str = "support@revamply.com";
const CONTENT_UNAVAILABLE: &str = "<p>Blueprint content not available.</p>";

lazy_static! {
    static ref BOLD: Regex = Regex::new(r"\*\*(.+?)\*\*").unwrap();
    static ref MAIN_TITLE: Regex = Regex::new(r"(?i)^AI Solution Blueprint").unwrap();
    static ref SECTION_HEADER: Regex = Regex::new(r"^[A-Z][^:]*:$").unwrap();
    static ref PHASE_HEADER: Regex = Regex::new(r"(?i)^(Phase \d+|Step \d+|Timeline)").unwrap();
    static ref NUMBERED: Regex = Regex::new(r"^\d+\.").unwrap();
    static ref LIST_ITEM: Regex = Regex::new(r"^[-•*]\s").unwrap();
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[derive(Default)]
struct Formatter {
    out: String,
    paragraph: String,
    in_list: bool,
}

impl Formatter {
    fn close_paragraph(&mut self) {
        if !self.paragraph.is_empty() {
            self.out.push_str(&format!("<p>{}</p>\n", self.paragraph));
            self.paragraph.clear();
        }
    }

    fn close_list(&mut self) {
        if self.in_list {
            self.out.push_str("</ul>\n");
            self.in_list = false;
        }
    }

    fn block(&mut self, tag: &str, line: &str) {
        self.close_paragraph();
        self.close_list();
        self.out.push_str(&format!("<{tag}>{line}</{tag}>\n"));
    }
}

/// Turns the generator's plain-text blueprint into HTML.
///
/// Blank lines end paragraphs and lists. `**x**` becomes bold. Lines starting
/// with "AI Solution Blueprint" become the title, `Heading:` lines become
/// sections, phase/step/numbered lines become subsections and `-`, `*` or `•`
/// lines become list items.
pub fn format_blueprint_content(content: &str) -> String {
    let mut f = Formatter::default();

    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() {
            f.close_paragraph();
            f.close_list();
            continue;
        }

        let line = escape_html(line);
        let line = BOLD.replace_all(&line, "<strong>$1</strong>").into_owned();

        if MAIN_TITLE.is_match(&line) {
            f.block("h1", &line);
        } else if SECTION_HEADER.is_match(&line) {
            f.block("h2", &line);
        } else if PHASE_HEADER.is_match(&line) || NUMBERED.is_match(&line) {
            f.block("h3", &line);
        } else if LIST_ITEM.is_match(&line) {
            f.close_paragraph();
            if !f.in_list {
                f.out.push_str("<ul>\n");
                f.in_list = true;
            }
            let item = LIST_ITEM.replace(&line, "");
            f.out.push_str(&format!("<li>{item}</li>\n"));
        } else {
            f.close_list();
            if !f.paragraph.is_empty() {
                f.paragraph.push(' ');
            }
            f.paragraph.push_str(&line);
        }
    }

    f.close_paragraph();
    f.close_list();

    if f.out.is_empty() {
        CONTENT_UNAVAILABLE.to_string()
    } else {
        ammonia::clean(&f.out)
    }
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} - Revamply</title>
    <style>
        body {{ font-family: 'Inter', sans-serif; line-height: 1.6; background: #f9fafb; color: #111827; margin: 0; }}
        main {{ max-width: 48rem; margin: 0 auto; padding: 3rem 1.5rem; }}
        .card {{ background: #fff; border-radius: 1.5rem; box-shadow: 0 10px 30px rgba(0,0,0,.08); padding: 2.5rem; }}
        .center {{ text-align: center; }}
        .muted {{ color: #6b7280; font-size: .875rem; }}
        .button {{ display: inline-block; background: #2563eb; color: #fff; padding: .75rem 2rem; border-radius: .75rem; font-weight: 600; text-decoration: none; }}
        .gradient-text {{ background: linear-gradient(45deg, #00E5FF, #FF00CC); -webkit-background-clip: text; -webkit-text-fill-color: transparent; background-clip: text; }}
        .blueprint h1, .blueprint h2, .blueprint h3 {{ line-height: 1.25; }}
    </style>
</head>
<body>
<main>
{body}
</main>
</body>
</html>"#
    )
}

fn name_or_default(name: Option<&str>) -> String {
    escape_html(
        name.map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_CONTACT_NAME),
    )
}

/// A completed blueprint.
pub fn render_blueprint_page(record: &BlueprintRecord) -> String {
    let contact_name = name_or_default(record.contact_name.as_deref());
    let content = record
        .blueprint_content
        .as_deref()
        .map(format_blueprint_content)
        .unwrap_or_else(|| CONTENT_UNAVAILABLE.to_string());
    let generated = record
        .generated_at
        .or(record.stored_at)
        .map(|at| at.format("%B %-d, %Y").to_string())
        .unwrap_or_default();

    let body = format!(
        r#"<div class="center">
    <h1 class="gradient-text">Your AI Blueprint is Ready, {contact_name}!</h1>
    <p class="muted">Generated {generated} &middot; Reference {submission_id}</p>
</div>
<article class="card blueprint">
{content}
</article>
<p class="center muted">Questions? Email <a href="mailto:{SUPPORT_EMAIL}">{SUPPORT_EMAIL}</a></p>"#,
        submission_id = escape_html(&record.submission_id),
    );
    layout("Your AI Blueprint is Ready", &body)
}

pub fn render_not_found_page() -> String {
    layout(
        "Blueprint Not Found",
        r#"<div class="card center">
    <h1>Blueprint Not Found</h1>
    <p>The blueprint may still be generating or the link may be incorrect.</p>
    <a class="button" href="/">Create New Blueprint</a>
</div>"#,
    )
}

/// Shown for records whose generation failed and for internal failures.
pub fn render_error_page(message: &str, contact_name: Option<&str>) -> String {
    let body = format!(
        r#"<div class="card center">
    <h1>Almost There!</h1>
    <p>Hi {name}, we'll email your blueprint shortly.</p>
    <p class="muted">{message}</p>
    <a class="button" href="mailto:{SUPPORT_EMAIL}">Contact Support</a>
</div>"#,
        name = name_or_default(contact_name),
        message = escape_html(message),
    );
    layout("Blueprint Issue", &body)
}

pub fn render_processing_page(contact_name: Option<&str>) -> String {
    let body = format!(
        r#"<div class="card center">
    <h1>Your Blueprint is Being Generated</h1>
    <p>Hi {name}, our AI is still working on your blueprint. This usually takes a minute or two.</p>
    <p class="muted">This page refreshes automatically.</p>
</div>
<script>setTimeout(function () {{ window.location.reload(); }}, 15000);</script>"#,
        name = name_or_default(contact_name),
    );
    layout("Generating Your Blueprint", &body)
}

/// Shown when an email that already has a blueprint submits again.
pub fn render_duplicate_page(contact_name: Option<&str>, email: &str, blueprint_url: Option<&str>) -> String {
    let link = blueprint_url
        .map(|url| {
            format!(
                r#"<p class="muted">Or view it instantly:</p>
    <a class="button" href="{}">View Blueprint Now</a>"#,
                escape_html(url)
            )
        })
        .unwrap_or_default();

    let body = format!(
        r#"<div class="card center">
    <h1 class="gradient-text">Great News, {name}!</h1>
    <h2>You Already Have a Blueprint!</h2>
    <p>We found that you previously generated an AI solution blueprint with this email address:</p>
    <p><code>{email}</code></p>
    <p>Check your inbox in the next few minutes. We're sending your existing blueprint right away.</p>
    {link}
</div>"#,
        name = name_or_default(contact_name),
        email = escape_html(email),
    );
    layout("Blueprint Already Generated", &body)
}

/// Acknowledgement for a generator callback made from a browser.
pub fn render_receipt_page(record: &BlueprintRecord, blueprint_url: &str) -> String {
    let body = format!(
        r#"<div class="card center">
    <h1>Blueprint Received</h1>
    <p>Submission <code>{id}</code> is now <strong>{status}</strong>.</p>
    <a class="button" href="{url}">Open Blueprint</a>
</div>"#,
        id = escape_html(&record.submission_id),
        status = record.status,
        url = escape_html(blueprint_url),
    );
    layout("Blueprint Received", &body)
}
