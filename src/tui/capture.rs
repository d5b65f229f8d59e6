use crate::util::unicode::{next_grapheme_boundary, prev_grapheme_boundary, word_boundary_left};

/// The quick-capture overlay's single-line input.
///
/// `cursor` is a byte offset that always sits on a grapheme boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureState {
    pub input: String,
    pub cursor: usize,
}

impl CaptureState {
    pub fn insert_char(&mut self, c: char) {
        self.input.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    /// Insert pasted text; newlines become spaces.
    pub fn insert_str(&mut self, text: &str) {
        let clean = text.replace(['\r', '\n'], " ");
        self.input.insert_str(self.cursor, &clean);
        self.cursor += clean.len();
    }

    pub fn backspace(&mut self) {
        if let Some(prev) = prev_grapheme_boundary(&self.input, self.cursor) {
            self.input.replace_range(prev..self.cursor, "");
            self.cursor = prev;
        }
    }

    pub fn delete(&mut self) {
        if let Some(next) = next_grapheme_boundary(&self.input, self.cursor) {
            self.input.replace_range(self.cursor..next, "");
        }
    }

    pub fn delete_word_back(&mut self) {
        let start = word_boundary_left(&self.input, self.cursor);
        self.input.replace_range(start..self.cursor, "");
        self.cursor = start;
    }

    pub fn move_left(&mut self) {
        if let Some(prev) = prev_grapheme_boundary(&self.input, self.cursor) {
            self.cursor = prev;
        }
    }

    pub fn move_right(&mut self) {
        if let Some(next) = next_grapheme_boundary(&self.input, self.cursor) {
            self.cursor = next;
        }
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.input.len();
    }
}
