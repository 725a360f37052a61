//! Input checks shared by the mutation paths. Each returns the normalized
//! value that should be stored.

use domains::{NewDiscussion, Result, ThreadError};

/// Trims `raw` and enforces non-empty, at most `max_chars` characters.
pub fn text_field(field: &str, raw: &str, max_chars: usize) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ThreadError::Validation(format!("{field} must not be empty")));
    }
    let len = trimmed.chars().count();
    if len > max_chars {
        return Err(ThreadError::Validation(format!(
            "{field} is {len} characters, limit is {max_chars}"
        )));
    }
    Ok(trimmed.to_string())
}

/// Normalizes a list stored comma-joined: entries are trimmed, blanks
/// dropped, and entries containing a comma rejected.
pub fn list_field(field: &str, raw: Vec<String>) -> Result<Vec<String>> {
    let mut out = Vec::with_capacity(raw.len());
    for entry in raw {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        if entry.contains(',') {
            return Err(ThreadError::Validation(format!(
                "{field} entry '{entry}' must not contain a comma"
            )));
        }
        out.push(entry.to_string());
    }
    Ok(out)
}

pub fn discussion(input: NewDiscussion, max_title_chars: usize, max_body_chars: usize) -> Result<NewDiscussion> {
    Ok(NewDiscussion {
        title: text_field("title", &input.title, max_title_chars)?,
        body: text_field("body", &input.body, max_body_chars)?,
        tags: list_field("tags", input.tags)?,
        resource_links: list_field("resourceLinks", input.resource_links)?,
        visibility: input.visibility,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_only_body_is_rejected() {
        let err = text_field("body", " \n\t ", 100).unwrap_err();
        assert!(matches!(err, ThreadError::Validation(_)));
    }

    #[test]
    fn body_is_trimmed_and_limit_counts_chars() {
        assert_eq!(text_field("body", "  héllo  ", 5).unwrap(), "héllo");
        assert!(text_field("body", "héllo!", 5).is_err());
    }

    #[test]
    fn lists_drop_blanks_and_reject_commas() {
        let tags = list_field("tags", vec![" rust ".into(), "".into(), "async".into()]).unwrap();
        assert_eq!(tags, vec!["rust", "async"]);
        assert!(list_field("tags", vec!["a,b".into()]).is_err());
    }
}
