use std::sync::LazyLock;

use regex::Regex;

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s+(.*?)\s*$").unwrap());

/// Top-level list item, with an optional checkbox.
static TASK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*+]\s+(?:\[([ xX])\]\s+)?(.*?)\s*$").unwrap());

/// Error type for document edits
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("task text is empty")]
    EmptyTask,
    #[error("no task at {section}:{index}")]
    NoSuchTask { section: usize, index: usize },
}

/// A `# Heading` and the lines under it, up to the next heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// The heading line as written
    pub heading: String,
    /// Heading text without the leading hashes
    pub title: String,
    pub body: Vec<String>,
}

/// A task as the UI sees it: a top-level list item plus any indented
/// lines that follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub text: String,
    pub done: bool,
    /// Index of the task's first line in its section body
    pub line: usize,
    /// Number of body lines the task spans (1 + continuation lines)
    pub span: usize,
}

/// Position of a task: section index and task index within the section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRef {
    pub section: usize,
    pub index: usize,
}

/// The task file split into markdown sections.
///
/// Lines are kept verbatim so that [`Document::serialize`] reproduces the
/// input byte for byte until an edit is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Lines before the first heading
    pub preamble: Vec<String>,
    pub sections: Vec<Section>,
}

impl Document {
    pub fn parse(text: &str) -> Self {
        let mut preamble = Vec::new();
        let mut sections: Vec<Section> = Vec::new();

        for line in text.split('\n') {
            if let Some(caps) = HEADING_RE.captures(line) {
                sections.push(Section {
                    heading: line.to_string(),
                    title: caps[1].to_string(),
                    body: Vec::new(),
                });
                continue;
            }
            match sections.last_mut() {
                Some(section) => section.body.push(line.to_string()),
                None => preamble.push(line.to_string()),
            }
        }

        Document { preamble, sections }
    }

    pub fn serialize(&self) -> String {
        let mut lines: Vec<&str> = self.preamble.iter().map(String::as_str).collect();
        for section in &self.sections {
            lines.push(&section.heading);
            lines.extend(section.body.iter().map(String::as_str));
        }
        lines.join("\n")
    }

    /// Index of the first section whose title matches (case-insensitive).
    pub fn find_section(&self, title: &str) -> Option<usize> {
        self.sections
            .iter()
            .position(|s| s.title.eq_ignore_ascii_case(title.trim()))
    }

    pub fn tasks(&self, section: usize) -> Vec<Task> {
        self.sections
            .get(section)
            .map(|s| tasks_in(&s.body))
            .unwrap_or_default()
    }

    /// All tasks in document order.
    pub fn task_refs(&self) -> Vec<TaskRef> {
        (0..self.sections.len())
            .flat_map(|section| {
                (0..self.tasks(section).len()).map(move |index| TaskRef { section, index })
            })
            .collect()
    }

    pub fn task(&self, at: TaskRef) -> Option<Task> {
        self.tasks(at.section).into_iter().nth(at.index)
    }

    /// Append `- text` to the named section, creating the section at the
    /// end of the document if it does not exist.
    pub fn add_task(&mut self, section_title: &str, text: &str) -> Result<TaskRef, DocumentError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DocumentError::EmptyTask);
        }
        let section = self
            .find_section(section_title)
            .unwrap_or_else(|| self.push_section(section_title.trim()));
        let index = self.insert_lines(section, vec![format!("- {}", text)]);
        Ok(TaskRef { section, index })
    }

    /// Remove a task and its continuation lines, returning them.
    pub fn remove_task(&mut self, at: TaskRef) -> Result<Vec<String>, DocumentError> {
        let task = self.task(at).ok_or(DocumentError::NoSuchTask {
            section: at.section,
            index: at.index,
        })?;
        let body = &mut self.sections[at.section].body;
        Ok(body.drain(task.line..task.line + task.span).collect())
    }

    /// Move a task into the done section, ticking its checkbox if it has
    /// one. A task already in the done section is left alone and `None` is
    /// returned.
    pub fn complete_task(
        &mut self,
        at: TaskRef,
        done_title: &str,
    ) -> Result<Option<TaskRef>, DocumentError> {
        if self.find_section(done_title) == Some(at.section) {
            return Ok(None);
        }
        let mut lines = self.remove_task(at)?;
        if let Some(first) = lines.first_mut() {
            *first = tick_checkbox(first);
        }
        let done = self
            .find_section(done_title)
            .unwrap_or_else(|| self.push_section(done_title.trim()));
        let index = self.insert_lines(done, lines);
        Ok(Some(TaskRef {
            section: done,
            index,
        }))
    }

    /// Insert lines after the last task of a section (or after its last
    /// non-blank line if it has no tasks). Returns the new task index.
    fn insert_lines(&mut self, section: usize, lines: Vec<String>) -> usize {
        let tasks = self.tasks(section);
        let body = &mut self.sections[section].body;
        let at = match tasks.last() {
            Some(last) => last.line + last.span,
            None => body
                .iter()
                .rposition(|l| !l.trim().is_empty())
                .map_or(0, |i| i + 1),
        };
        body.splice(at..at, lines);
        tasks.len()
    }

    fn push_section(&mut self, title: &str) -> usize {
        let has_sections = !self.sections.is_empty();
        let tail = match self.sections.last_mut() {
            Some(s) => &mut s.body,
            None => &mut self.preamble,
        };
        if !has_sections && tail.iter().all(|l| l.is_empty()) {
            tail.clear();
        } else if tail.last().map_or(has_sections, |l| !l.is_empty()) {
            // blank line between the previous content and the new heading
            tail.push(String::new());
        }
        self.sections.push(Section {
            heading: format!("# {}", title),
            title: title.to_string(),
            body: vec![String::new()],
        });
        self.sections.len() - 1
    }
}

fn tasks_in(body: &[String]) -> Vec<Task> {
    let mut tasks: Vec<Task> = Vec::new();
    for (i, line) in body.iter().enumerate() {
        if let Some(caps) = TASK_RE.captures(line) {
            tasks.push(Task {
                text: caps[2].to_string(),
                done: caps.get(1).is_some_and(|m| m.as_str() != " "),
                line: i,
                span: 1,
            });
        } else if let Some(last) = tasks.last_mut()
            && last.line + last.span == i
            && line.starts_with([' ', '\t'])
            && !line.trim().is_empty()
        {
            last.span += 1;
        }
    }
    tasks
}

fn tick_checkbox(line: &str) -> String {
    for open in ["- [ ] ", "* [ ] ", "+ [ ] "] {
        if let Some(rest) = line.strip_prefix(open) {
            return format!("{}[x] {}", &open[..2], rest);
        }
    }
    line.to_string()
}
