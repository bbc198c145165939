/*!
    CSV export and import of the task list.

    Rows follow the usual comma separated conventions: fields holding a
    separator, quote or line break are quoted, inner quotes are doubled.
!*/
use winnow::Parser;
use winnow::Result;
use winnow::ascii::line_ending;
use winnow::combinator::{alt, delimited, eof, repeat, separated, terminated};
use winnow::token::take_till;

use crate::error::Error;
use crate::task::{Priority, Task, format_timestamp, parse_timestamp};

pub const HEADER: [&str; 5] = ["Task", "Category", "Priority", "Due Date", "Created At"];

pub fn write_tasks(tasks: &[Task]) -> String {
    let mut out = HEADER.join(",");
    out.push('\n');
    for task in tasks {
        let created_at = format_timestamp(&task.created_at);
        let row = [
            task.text.as_str(),
            task.category.as_str(),
            task.priority.as_str(),
            task.due_date.as_str(),
            created_at.as_str(),
        ];
        let fields: Vec<String> = row.iter().map(|f| quote(f)).collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Parses a whole CSV document into tasks. Columns are matched by header
/// name, blank lines are skipped.
pub fn read_tasks(text: &str) -> std::result::Result<Vec<Task>, Error> {
    let mut input = text;
    let mut rows = Vec::new();
    while !input.is_empty() {
        let Ok(fields) = parse_row.parse_next(&mut input) else {
            if rows.is_empty() {
                return Err(Error::CsvHeader("unterminated or stray quote".to_string()));
            }
            return Err(Error::CsvRecord {
                row: rows.len(),
                reason: "unterminated or stray quote".to_string(),
            });
        };
        if fields.len() == 1 && fields[0].is_empty() {
            continue;
        }
        rows.push(fields);
    }

    let mut rows = rows.into_iter();
    let header = rows
        .next()
        .ok_or_else(|| Error::CsvHeader("document is empty".to_string()))?;
    let columns = column_positions(&header)?;

    rows.enumerate()
        .map(|(i, fields)| task_from_row(&columns, i + 1, fields))
        .collect()
}

/// Position of each [`HEADER`] name within the document's header row.
fn column_positions(header: &[String]) -> std::result::Result<[usize; 5], Error> {
    let mut positions = [0; 5];
    for (slot, name) in positions.iter_mut().zip(HEADER) {
        let mut found = header.iter().enumerate().filter(|(_, h)| h.trim() == name);
        *slot = match (found.next(), found.next()) {
            (Some((i, _)), None) => i,
            (None, _) => return Err(Error::CsvHeader(format!("missing column `{name}`"))),
            (Some(_), Some(_)) => {
                return Err(Error::CsvHeader(format!("duplicate column `{name}`")));
            }
        };
    }
    if header.len() != HEADER.len() {
        return Err(Error::CsvHeader(format!(
            "expected {} columns, found {}",
            HEADER.len(),
            header.len()
        )));
    }
    Ok(positions)
}

fn task_from_row(
    columns: &[usize; 5],
    row: usize,
    mut fields: Vec<String>,
) -> std::result::Result<Task, Error> {
    let invalid = |reason: String| Error::CsvRecord { row, reason };
    if fields.len() != HEADER.len() {
        return Err(invalid(format!(
            "expected {} fields, found {}",
            HEADER.len(),
            fields.len()
        )));
    }
    let mut take = |column: usize| std::mem::take(&mut fields[columns[column]]);
    let text = take(0).trim().to_string();
    if text.is_empty() {
        return Err(invalid("task text is empty".to_string()));
    }
    let category = take(1);
    let priority = match take(2).as_str() {
        "" => Priority::default(),
        label => label
            .parse::<Priority>()
            .map_err(|e| invalid(e.to_string()))?,
    };
    let due_date = take(3);
    let created_at = parse_timestamp(&take(4)).map_err(|e| invalid(e.to_string()))?;
    Ok(Task {
        text,
        category,
        priority,
        due_date,
        created_at,
    })
}

fn parse_row(input: &mut &str) -> Result<Vec<String>> {
    terminated(separated(1.., parse_field, ','), alt((line_ending, eof))).parse_next(input)
}

fn parse_field(input: &mut &str) -> Result<String> {
    alt((parse_quoted, parse_bare)).parse_next(input)
}

fn parse_bare(input: &mut &str) -> Result<String> {
    take_till(0.., [',', '"', '\r', '\n'])
        .map(str::to_string)
        .parse_next(input)
}

fn parse_quoted(input: &mut &str) -> Result<String> {
    delimited(
        '"',
        repeat(0.., alt((take_till(1.., '"'), "\"\"".value("\"")))).fold(
            String::new,
            |mut acc: String, chunk: &str| {
                acc.push_str(chunk);
                acc
            },
        ),
        '"',
    )
    .parse_next(input)
}
