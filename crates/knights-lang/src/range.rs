use nom_locate::LocatedSpan;

pub type Span<'a> = LocatedSpan<&'a str>;

#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Hash)]
pub struct Position {
    pub line: u32,
    pub column: usize,
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Position {
    pub fn new(line: u32, column: usize) -> Self {
        Position { line, column }
    }

    /// Shifts a position that is relative to the start of a directive body
    /// so that it becomes relative to the template source.
    pub fn offset_by(&self, origin: &Position) -> Self {
        if self.line <= 1 {
            Position {
                line: origin.line,
                column: origin.column + self.column.saturating_sub(1),
            }
        } else {
            Position {
                line: origin.line + self.line - 1,
                column: self.column,
            }
        }
    }
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Default, Hash)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Range { start, end }
    }
}

impl<'a> From<Span<'a>> for Position {
    fn from(span: Span<'a>) -> Self {
        Position {
            line: span.location_line(),
            column: span.get_utf8_column(),
        }
    }
}

impl<'a> From<Span<'a>> for Range {
    fn from(span: Span<'a>) -> Self {
        let start = Position::from(span);
        let fragment: &str = span.fragment();
        let end = match fragment.rfind('\n') {
            Some(i) => Position::new(
                start.line + fragment.matches('\n').count() as u32,
                fragment[i + 1..].chars().count() + 1,
            ),
            None => Position::new(start.line, start.column + fragment.chars().count()),
        };

        Range { start, end }
    }
}
