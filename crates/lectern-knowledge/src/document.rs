//! Course document format.
//!
//! ```text
//! Course Title: Building Towards Computer Use with Anthropic
//! Course Link: https://www.deeplearning.ai/short-courses/...
//! Course Instructor: Colt Steele
//!
//! Lesson 0: Introduction
//! Lesson Link: https://learn.deeplearning.ai/...
//! <lesson text>
//!
//! Lesson 1: Overview
//! ...
//! ```
//!
//! Header lines are optional; a missing title falls back to the caller's
//! name (usually the file stem). Text outside any `Lesson N:` block is kept
//! as the course body.

use lectern_core::error::{LecternError, Result};
use lectern_core::types::{Course, Lesson};

const TITLE: &str = "course title:";
const LINK: &str = "course link:";
const INSTRUCTOR: &str = "course instructor:";
const LESSON_LINK: &str = "lesson link:";

/// Parse a course document. `fallback_title` is used when no title header is present.
pub fn parse_course(text: &str, fallback_title: &str) -> Result<Course> {
    let mut title: Option<String> = None;
    let mut link = None;
    let mut instructor = None;
    let mut body: Vec<&str> = Vec::new();
    let mut lessons: Vec<Lesson> = Vec::new();
    let mut lesson_lines: Vec<&str> = Vec::new();
    let mut in_header = true;

    for line in text.lines() {
        let trimmed = line.trim();

        if in_header {
            if let Some(v) = header_value(trimmed, TITLE) {
                title = Some(v);
                continue;
            }
            if let Some(v) = header_value(trimmed, LINK) {
                link = Some(v);
                continue;
            }
            if let Some(v) = header_value(trimmed, INSTRUCTOR) {
                instructor = Some(v);
                continue;
            }
            if trimmed.is_empty() {
                continue;
            }
            in_header = false;
        }

        if let Some((number, lesson_title)) = lesson_marker(trimmed) {
            flush_lesson(&mut lessons, &mut lesson_lines);
            lessons.push(Lesson {
                number,
                title: lesson_title,
                link: None,
                content: String::new(),
            });
            continue;
        }

        if let Some(current) = lessons.last_mut() {
            if current.link.is_none() && lesson_lines.is_empty() {
                if let Some(v) = header_value(trimmed, LESSON_LINK) {
                    current.link = Some(v);
                    continue;
                }
            }
            lesson_lines.push(line);
        } else {
            body.push(line);
        }
    }
    flush_lesson(&mut lessons, &mut lesson_lines);

    let title = title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| fallback_title.trim().to_string());
    if title.is_empty() {
        return Err(LecternError::InvalidArgument(
            "course document has no title".into(),
        ));
    }

    Ok(Course {
        title,
        link,
        instructor,
        body: body.join("\n").trim().to_string(),
        lessons,
    })
}

fn flush_lesson(lessons: &mut [Lesson], lines: &mut Vec<&str>) {
    if let Some(last) = lessons.last_mut() {
        last.content = lines.join("\n").trim().to_string();
    }
    lines.clear();
}

/// `"Course Title: X"` → `Some("X")`, prefix matched case-insensitively.
fn header_value(line: &str, prefix: &str) -> Option<String> {
    let head = line.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(line[prefix.len()..].trim().to_string())
    } else {
        None
    }
}

/// `"Lesson 3: Tool use"` → `Some((3, "Tool use"))`.
fn lesson_marker(line: &str) -> Option<(u32, String)> {
    let rest = line.get(..7).filter(|h| h.eq_ignore_ascii_case("lesson "))?;
    let rest = &line[rest.len()..];
    let (number, title) = rest.split_once(':')?;
    let number = number.trim().parse().ok()?;
    Some((number, title.trim().to_string()))
}
