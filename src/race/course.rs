//! Course grammar.
//!
//! A course defines the legal transitions from any cursor position and the
//! completion predicate. Two kinds exist: motion courses (navigate a text buffer
//! from a start cursor to a target with editor motions) and typing courses (type a
//! target text one key at a time).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::RejectReason;
use crate::race::types::{Cursor, Motion, Move};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub title: String,
    #[serde(flatten)]
    pub kind: CourseKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CourseKind {
    Motion {
        lines: Vec<String>,
        start: Cursor,
        target: Cursor,
    },
    Typing {
        text: String,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CourseError {
    #[error("course {0} has an empty buffer")]
    Empty(String),
    #[error("course {0} has a cursor outside the buffer")]
    CursorOutOfBounds(String),
    #[error("course {0} starts on its target")]
    Trivial(String),
}

/// Character class used by word motions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Blank,
    Word,
    Punct,
}

fn class_of(c: char) -> CharClass {
    if c.is_whitespace() {
        CharClass::Blank
    } else if c.is_alphanumeric() || c == '_' {
        CharClass::Word
    } else {
        CharClass::Punct
    }
}

impl Course {
    pub fn motion(
        id: impl Into<String>,
        title: impl Into<String>,
        lines: &[&str],
        start: Cursor,
        target: Cursor,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind: CourseKind::Motion {
                lines: lines.iter().map(|l| l.to_string()).collect(),
                start,
                target,
            },
        }
    }

    pub fn typing(id: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind: CourseKind::Typing { text: text.into() },
        }
    }

    /// Check that the course is playable.
    pub fn validate(&self) -> Result<(), CourseError> {
        match &self.kind {
            CourseKind::Motion { lines, start, target } => {
                if lines.is_empty() {
                    return Err(CourseError::Empty(self.id.clone()));
                }
                if !self.contains(*start) || !self.contains(*target) {
                    return Err(CourseError::CursorOutOfBounds(self.id.clone()));
                }
                if start == target {
                    return Err(CourseError::Trivial(self.id.clone()));
                }
                Ok(())
            }
            CourseKind::Typing { text } => {
                if text.is_empty() {
                    return Err(CourseError::Empty(self.id.clone()));
                }
                Ok(())
            }
        }
    }

    pub fn start_cursor(&self) -> Cursor {
        match &self.kind {
            CourseKind::Motion { start, .. } => *start,
            CourseKind::Typing { .. } => Cursor::default(),
        }
    }

    /// Completion predicate.
    pub fn is_complete(&self, cursor: Cursor) -> bool {
        match &self.kind {
            CourseKind::Motion { target, .. } => cursor == *target,
            CourseKind::Typing { text } => cursor.col == text.chars().count(),
        }
    }

    /// Distance left to completion: lines plus columns, or characters to type.
    pub fn remaining(&self, cursor: Cursor) -> u32 {
        match &self.kind {
            CourseKind::Motion { target, .. } => {
                (cursor.line.abs_diff(target.line) + cursor.col.abs_diff(target.col)) as u32
            }
            CourseKind::Typing { text } => text.chars().count().saturating_sub(cursor.col) as u32,
        }
    }

    /// Transition function: the cursor reached by applying `mv` at `cursor`.
    ///
    /// A move that would leave the cursor where it is counts as illegal.
    pub fn step(&self, cursor: Cursor, mv: Move) -> Result<Cursor, RejectReason> {
        match (&self.kind, mv) {
            (CourseKind::Motion { .. }, Move::Motion(motion)) => self.apply_motion(cursor, motion),
            (CourseKind::Typing { text }, Move::Key(key)) => {
                let expected = text.chars().nth(cursor.col).ok_or(RejectReason::AlreadyFinished)?;
                if expected == key {
                    Ok(Cursor::new(0, cursor.col + 1))
                } else {
                    Err(RejectReason::UnexpectedKey { expected, got: key })
                }
            }
            _ => Err(RejectReason::WrongMoveKind),
        }
    }

    fn lines(&self) -> &[String] {
        match &self.kind {
            CourseKind::Motion { lines, .. } => lines,
            CourseKind::Typing { .. } => &[],
        }
    }

    fn line_chars(&self, line: usize) -> Vec<char> {
        self.lines().get(line).map(|l| l.chars().collect()).unwrap_or_default()
    }

    /// Last valid column on a line; an empty line still has column 0.
    fn last_col(&self, line: usize) -> usize {
        self.line_chars(line).len().saturating_sub(1)
    }

    fn contains(&self, cursor: Cursor) -> bool {
        cursor.line < self.lines().len() && cursor.col <= self.last_col(cursor.line)
    }

    fn apply_motion(&self, cursor: Cursor, motion: Motion) -> Result<Cursor, RejectReason> {
        let last_line = self.lines().len().saturating_sub(1);
        let next = match motion {
            Motion::Left => Cursor::new(cursor.line, cursor.col.saturating_sub(1)),
            Motion::Right => Cursor::new(cursor.line, (cursor.col + 1).min(self.last_col(cursor.line))),
            Motion::Up => {
                let line = cursor.line.saturating_sub(1);
                Cursor::new(line, cursor.col.min(self.last_col(line)))
            }
            Motion::Down => {
                let line = (cursor.line + 1).min(last_line);
                Cursor::new(line, cursor.col.min(self.last_col(line)))
            }
            Motion::LineStart => Cursor::new(cursor.line, 0),
            Motion::LineEnd => Cursor::new(cursor.line, self.last_col(cursor.line)),
            Motion::BufferTop => Cursor::new(0, 0),
            Motion::BufferBottom => Cursor::new(last_line, 0),
            Motion::WordForward => self.word_forward(cursor)?,
            Motion::WordBackward => self.word_backward(cursor)?,
        };
        if next == cursor {
            return Err(RejectReason::Blocked);
        }
        Ok(next)
    }

    /// Start of the next word. Empty lines count as words.
    fn word_forward(&self, cursor: Cursor) -> Result<Cursor, RejectReason> {
        let (mut line, mut col) = (cursor.line, cursor.col);
        let chars = self.line_chars(line);
        if let Some(&c) = chars.get(col) {
            let class = class_of(c);
            if class != CharClass::Blank {
                while col < chars.len() && class_of(chars[col]) == class {
                    col += 1;
                }
            }
        }
        loop {
            let chars = self.line_chars(line);
            while col < chars.len() && class_of(chars[col]) == CharClass::Blank {
                col += 1;
            }
            if col < chars.len() {
                return Ok(Cursor::new(line, col));
            }
            line += 1;
            col = 0;
            if line >= self.lines().len() {
                return Err(RejectReason::Blocked);
            }
            if self.line_chars(line).is_empty() {
                return Ok(Cursor::new(line, 0));
            }
        }
    }

    /// Start of the current or previous word.
    fn word_backward(&self, cursor: Cursor) -> Result<Cursor, RejectReason> {
        let (mut line, mut col) = (cursor.line, cursor.col);
        loop {
            if col > 0 {
                col -= 1;
            } else {
                if line == 0 {
                    return Err(RejectReason::Blocked);
                }
                line -= 1;
                let len = self.line_chars(line).len();
                if len == 0 {
                    return Ok(Cursor::new(line, 0));
                }
                col = len - 1;
            }
            let chars = self.line_chars(line);
            if chars.get(col).map(|&c| class_of(c)) != Some(CharClass::Blank) {
                break;
            }
        }
        let chars = self.line_chars(line);
        let class = chars.get(col).map(|&c| class_of(c));
        while col > 0 && chars.get(col - 1).map(|&c| class_of(c)) == class {
            col -= 1;
        }
        Ok(Cursor::new(line, col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer() -> Course {
        Course::motion(
            "buf",
            "Buffer",
            &["fn main() {", "", "    let x = 1;", "}"],
            Cursor::new(0, 0),
            Cursor::new(2, 8),
        )
    }

    fn m(motion: Motion) -> Move {
        Move::Motion(motion)
    }

    #[test]
    fn test_basic_motions() {
        let course = buffer();
        let c = course.step(Cursor::new(0, 0), m(Motion::Right)).unwrap();
        assert_eq!(c, Cursor::new(0, 1));
        assert_eq!(course.step(c, m(Motion::LineEnd)).unwrap(), Cursor::new(0, 10));
        assert_eq!(course.step(Cursor::new(0, 10), m(Motion::Down)).unwrap(), Cursor::new(1, 0));
        assert_eq!(course.step(Cursor::new(2, 7), m(Motion::BufferBottom)).unwrap(), Cursor::new(3, 0));
        assert_eq!(course.step(Cursor::new(3, 0), m(Motion::BufferTop)).unwrap(), Cursor::new(0, 0));
    }

    #[test]
    fn test_blocked_motion_is_rejected() {
        let course = buffer();
        assert_eq!(course.step(Cursor::new(0, 0), m(Motion::Left)), Err(RejectReason::Blocked));
        assert_eq!(course.step(Cursor::new(0, 0), m(Motion::Up)), Err(RejectReason::Blocked));
        assert_eq!(course.step(Cursor::new(3, 0), m(Motion::Right)), Err(RejectReason::Blocked));
        assert_eq!(course.step(Cursor::new(0, 3), m(Motion::BufferTop)).unwrap(), Cursor::new(0, 0));
    }

    #[test]
    fn test_word_forward_crosses_lines_and_stops_on_empty_line() {
        let course = buffer();
        let mut c = Cursor::new(0, 0);
        let mut seen = vec![];
        for _ in 0..6 {
            c = course.step(c, m(Motion::WordForward)).unwrap();
            seen.push(c);
        }
        assert_eq!(
            seen,
            vec![
                Cursor::new(0, 3),
                Cursor::new(0, 7),
                Cursor::new(0, 10),
                Cursor::new(1, 0),
                Cursor::new(2, 4),
                Cursor::new(2, 8),
            ]
        );
    }

    #[test]
    fn test_word_backward() {
        let course = buffer();
        assert_eq!(course.step(Cursor::new(2, 8), m(Motion::WordBackward)).unwrap(), Cursor::new(2, 4));
        assert_eq!(course.step(Cursor::new(2, 4), m(Motion::WordBackward)).unwrap(), Cursor::new(1, 0));
        assert_eq!(course.step(Cursor::new(1, 0), m(Motion::WordBackward)).unwrap(), Cursor::new(0, 10));
        assert_eq!(course.step(Cursor::new(0, 0), m(Motion::WordBackward)), Err(RejectReason::Blocked));
    }

    #[test]
    fn test_word_forward_at_buffer_end_is_blocked() {
        let course = buffer();
        assert_eq!(course.step(Cursor::new(3, 0), m(Motion::WordForward)), Err(RejectReason::Blocked));
    }

    #[test]
    fn test_typing_course() {
        let course = Course::typing("t", "Typing", "ab");
        let c = course.step(Cursor::default(), Move::Key('a')).unwrap();
        assert_eq!(
            course.step(c, Move::Key('x')),
            Err(RejectReason::UnexpectedKey { expected: 'b', got: 'x' })
        );
        let c = course.step(c, Move::Key('b')).unwrap();
        assert!(course.is_complete(c));
        assert_eq!(course.remaining(c), 0);
        assert_eq!(course.step(c, Move::Key('b')), Err(RejectReason::AlreadyFinished));
    }

    #[test]
    fn test_wrong_move_kind() {
        assert_eq!(buffer().step(Cursor::new(0, 0), Move::Key('f')), Err(RejectReason::WrongMoveKind));
        assert_eq!(
            Course::typing("t", "T", "a").step(Cursor::default(), m(Motion::Right)),
            Err(RejectReason::WrongMoveKind)
        );
    }

    #[test]
    fn test_validation() {
        assert!(buffer().validate().is_ok());
        let bad = Course::motion("bad", "Bad", &["ab"], Cursor::new(0, 0), Cursor::new(0, 5));
        assert_eq!(bad.validate(), Err(CourseError::CursorOutOfBounds("bad".into())));
        let trivial = Course::motion("same", "Same", &["ab"], Cursor::new(0, 1), Cursor::new(0, 1));
        assert_eq!(trivial.validate(), Err(CourseError::Trivial("same".into())));
        assert!(Course::typing("e", "Empty", "").validate().is_err());
    }

    #[test]
    fn test_course_json_shape() {
        let course = Course::typing("t1", "Hello", "hi");
        let json = serde_json::to_value(&course).unwrap();
        assert_eq!(json["kind"], "typing");
        assert_eq!(json["text"], "hi");
        let back: Course = serde_json::from_value(json).unwrap();
        assert_eq!(back, course);
    }
}
