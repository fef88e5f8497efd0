//! Line- and heading-aware Markdown helpers for memory files.
//!
//! Section edits go through a small ATX heading parser rather than
//! regex substitution so that headings inside fenced code blocks and
//! nested `###` sub-sections are never mistaken for section boundaries.

use serde::Serialize;

use crate::tokenize::is_cjk;

/// A heading and the line span it governs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub title: String,
    /// 1 for `#`, 2 for `##`, ...
    pub level: usize,
    /// 0-based line index of the heading.
    pub line: usize,
    /// 0-based, exclusive: the next heading of the same or higher level,
    /// or the line count.
    pub end_line: usize,
}

/// Best-effort counts scanned from a daily note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DailyNoteMetadata {
    pub conversation_count: usize,
    pub completed_tasks: usize,
    pub pending_tasks: usize,
    pub discoveries: usize,
    pub word_count: usize,
}

/// Tracks fenced code blocks while walking lines.
#[derive(Default)]
struct FenceState {
    marker: Option<&'static str>,
}

impl FenceState {
    /// Feed a line; returns `true` if the line is code (or a fence).
    fn step(&mut self, line: &str) -> bool {
        let trimmed = line.trim_start();
        match self.marker {
            Some(marker) => {
                if trimmed.starts_with(marker) {
                    self.marker = None;
                }
                true
            }
            None => {
                for marker in ["```", "~~~"] {
                    if trimmed.starts_with(marker) {
                        self.marker = Some(marker);
                        return true;
                    }
                }
                false
            }
        }
    }
}

/// Parse an ATX heading line into `(level, title)`.
pub fn parse_heading(line: &str) -> Option<(usize, String)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = &line[indent..];
    let level = rest.chars().take_while(|&c| c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let after = &rest[level..];
    if !after.is_empty() && !after.starts_with(' ') && !after.starts_with('\t') {
        return None;
    }
    let title = after.trim().trim_end_matches('#').trim_end().to_string();
    if title.is_empty() {
        return None;
    }
    Some((level, title))
}

/// Parse every heading outside fenced code blocks, in document order.
pub fn parse_sections(text: &str) -> Vec<Section> {
    let lines: Vec<&str> = text.lines().collect();
    let mut fence = FenceState::default();
    let mut headings: Vec<(usize, usize, String)> = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if fence.step(line) {
            continue;
        }
        if let Some((level, title)) = parse_heading(line) {
            headings.push((i, level, title));
        }
    }

    headings
        .iter()
        .enumerate()
        .map(|(idx, (line, level, title))| {
            let end_line = headings[idx + 1..]
                .iter()
                .find(|(_, l, _)| l <= level)
                .map(|(l, _, _)| *l)
                .unwrap_or(lines.len());
            Section {
                title: title.clone(),
                level: *level,
                line: *line,
                end_line,
            }
        })
        .collect()
}

/// Number of non-blank lines in a section's body, nested headings excluded.
pub fn section_entry_count(text: &str, section: &Section) -> usize {
    let mut fence = FenceState::default();
    text.lines()
        .enumerate()
        .skip(section.line + 1)
        .take(section.end_line.saturating_sub(section.line + 1))
        .filter(|(_, line)| {
            let code = fence.step(line);
            !line.trim().is_empty() && (code || parse_heading(line).is_none())
        })
        .count()
}

/// Insert `content` at the end of the level-2 section titled exactly
/// `section`, creating the heading at the end of the file when absent.
///
/// Existing sections are never reordered. The result ends with a newline.
pub fn append_to_section(text: &str, section: &str, content: &str) -> String {
    let content = normalize_block(content);
    let lines: Vec<&str> = text.lines().collect();
    let target = parse_sections(text)
        .into_iter()
        .find(|s| s.level == 2 && s.title == section);

    let Some(target) = target else {
        let base = text.trim_end();
        let mut out = String::with_capacity(base.len() + section.len() + content.len() + 8);
        out.push_str(base);
        if !base.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str("## ");
        out.push_str(section);
        out.push_str("\n\n");
        out.push_str(&content);
        out.push('\n');
        return out;
    };

    let mut insert_at = target.end_line;
    while insert_at > target.line + 1 && lines[insert_at - 1].trim().is_empty() {
        insert_at -= 1;
    }

    let mut out: Vec<&str> = Vec::with_capacity(lines.len() + 4);
    out.extend_from_slice(&lines[..insert_at]);
    out.push("");
    out.extend(content.lines());
    if target.end_line < lines.len() {
        out.push("");
        out.extend_from_slice(&lines[target.end_line..]);
    }

    let mut joined = out.join("\n");
    joined.push('\n');
    joined
}

/// Append `content` as a new block at the end of the document.
pub fn append_to_end(text: &str, content: &str) -> String {
    let base = text.trim_end();
    let content = normalize_block(content);
    if base.is_empty() {
        format!("{}\n", content)
    } else {
        format!("{}\n\n{}\n", base, content)
    }
}

fn normalize_block(content: &str) -> String {
    content.trim_start_matches(['\n', '\r']).trim_end().to_string()
}

/// Scan a daily note for conversation, task, and discovery counts.
///
/// Unrecognized formats yield zero counts rather than errors.
pub fn parse_daily_note_metadata(text: &str) -> DailyNoteMetadata {
    let mut meta = DailyNoteMetadata {
        word_count: count_words(text),
        ..Default::default()
    };
    let mut fence = FenceState::default();
    let mut in_discovery = false;

    for line in text.lines() {
        if fence.step(line) {
            continue;
        }
        if let Some((_, title)) = parse_heading(line) {
            let lower = title.to_lowercase();
            if title.contains('💬') || lower.starts_with("conversation") {
                meta.conversation_count += 1;
            }
            in_discovery = lower.contains("discover") || title.contains("发现");
            continue;
        }

        let trimmed = line.trim_start();
        if let Some(done) = task_state(trimmed) {
            if done {
                meta.completed_tasks += 1;
            } else {
                meta.pending_tasks += 1;
            }
        } else if trimmed.starts_with('💡')
            || (in_discovery && (trimmed.starts_with("- ") || trimmed.starts_with("* ")))
        {
            meta.discoveries += 1;
        }
    }

    meta
}

/// `Some(true)` for `- [x]`, `Some(false)` for `- [ ]`, `None` otherwise.
fn task_state(trimmed: &str) -> Option<bool> {
    let rest = trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))?;
    if rest.starts_with("[x]") || rest.starts_with("[X]") {
        Some(true)
    } else if rest.starts_with("[ ]") {
        Some(false)
    } else {
        None
    }
}

/// Latin-script words count once each; CJK characters count individually.
pub fn count_words(text: &str) -> usize {
    let mut count = 0;
    let mut in_word = false;
    for c in text.chars() {
        if is_cjk(c) {
            count += 1;
            in_word = false;
        } else if c.is_alphanumeric() {
            if !in_word {
                count += 1;
                in_word = true;
            }
        } else if c.is_whitespace() {
            in_word = false;
        }
    }
    count
}
