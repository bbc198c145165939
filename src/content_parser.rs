/*!
    Quick-entry syntax for tasks typed in one go:

    `[2025-03-31] (High) {Errand} Buy milk`

    Each tag is optional and may appear in any order before the text.
!*/
use winnow::Parser;
use winnow::Result;
use winnow::ascii::{alpha1, multispace0};
use winnow::combinator::{alt, delimited, preceded, repeat};
use winnow::token::take_till;

use crate::store::TaskPatch;
use crate::task::{Priority, Task};

#[derive(Debug, PartialEq)]
enum Tag<'s> {
    Due(&'s str),
    Priority(Priority),
    Category(&'s str),
}

pub fn parse_entry(input: &mut &str) -> Result<TaskPatch> {
    let tags: Vec<Tag<'_>> = repeat(0.., preceded(multispace0, parse_tag)).parse_next(input)?;
    let text = std::mem::take(input).trim();

    let mut patch = TaskPatch {
        text: (!text.is_empty()).then(|| text.to_string()),
        ..TaskPatch::default()
    };
    for tag in tags {
        match tag {
            Tag::Due(due) => patch.due_date = Some(due.to_string()),
            Tag::Priority(priority) => patch.priority = Some(priority),
            Tag::Category(category) => patch.category = Some(category.to_string()),
        }
    }
    Ok(patch)
}

/// Parses one line of quick-entry text as typed on the command line. Text
/// the tags can't make sense of is kept as the task text.
pub fn parse_line(line: &str) -> TaskPatch {
    let mut input = line;
    parse_entry
        .parse_next(&mut input)
        .unwrap_or_else(|_| TaskPatch {
            text: Some(line.trim().to_string()).filter(|t| !t.is_empty()),
            ..TaskPatch::default()
        })
}

/// Parses an editor buffer: `#` lines are comments, the remaining lines
/// are joined into one entry.
pub fn parse_buffer(buffer: &str) -> TaskPatch {
    let joined = buffer
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join(" ");
    parse_line(&joined)
}

/// Parses a buffer that started out as [`render_entry`] of an existing task.
/// The buffer describes the whole task, so a removed due date, category or
/// text clears that field. A removed priority leaves it unchanged.
pub fn parse_edit(buffer: &str) -> TaskPatch {
    let patch = parse_buffer(buffer);
    TaskPatch {
        text: Some(patch.text.unwrap_or_default()),
        category: Some(patch.category.unwrap_or_default()),
        priority: patch.priority,
        due_date: Some(patch.due_date.unwrap_or_default()),
    }
}

/// Renders `task` back into quick-entry syntax.
pub fn render_entry(task: &Task) -> String {
    let mut entry = String::new();
    if !task.due_date.is_empty() {
        entry.push_str(&format!("[{}] ", task.due_date));
    }
    entry.push_str(&format!("({}) ", task.priority));
    if !task.category.is_empty() {
        entry.push_str(&format!("{{{}}} ", task.category));
    }
    entry.push_str(&task.text);
    entry
}

fn parse_tag<'s>(input: &mut &'s str) -> Result<Tag<'s>> {
    alt((parse_due, parse_priority, parse_category)).parse_next(input)
}

fn parse_due<'s>(input: &mut &'s str) -> Result<Tag<'s>> {
    delimited('[', take_till(0.., ']'), ']')
        .map(|due: &'s str| Tag::Due(due.trim()))
        .parse_next(input)
}

fn parse_priority<'s>(input: &mut &'s str) -> Result<Tag<'s>> {
    delimited('(', alpha1, ')')
        .verify_map(|label: &str| label.parse::<Priority>().ok())
        .map(Tag::Priority)
        .parse_next(input)
}

fn parse_category<'s>(input: &mut &'s str) -> Result<Tag<'s>> {
    delimited('{', take_till(0.., '}'), '}')
        .map(|category: &'s str| Tag::Category(category.trim()))
        .parse_next(input)
}
