//! Splitting of an input line into segments, stages and argument vectors.
//!
//! Delimiters are literal: there is no quoting or escaping, so `echo "a|b"` is
//! two stages, `echo "a` and `b"`.

/// Operator that sends the segment before it to the background.
pub const BACKGROUND_OP: char = '&';
/// Operator that connects two stages of a segment.
pub const PIPE_OP: char = '|';

/// One command of a pipe chain: `argv[0]` is the operation name, the rest are arguments.
///
/// An empty stage (e.g. the middle of `a || b`) is kept so that stage positions stay
/// stable; it runs as a pass-through.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Stage {
    argv: Vec<String>,
}

impl Stage {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }

    fn split(text: &str) -> Self {
        Self::new(text.split_whitespace().map(str::to_owned).collect())
    }

    pub fn name(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn is_empty(&self) -> bool {
        self.argv.is_empty()
    }
}

/// An ordered pipe chain, delimited on the line by [`BACKGROUND_OP`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    stages: Vec<Stage>,
}

impl Segment {
    fn split(text: &str) -> Self {
        Self {
            stages: text.split(PIPE_OP).map(Stage::split).collect(),
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// True when no stage of the segment has a command in it.
    pub fn is_noop(&self) -> bool {
        self.stages.iter().all(Stage::is_empty)
    }
}

/// Result of splitting one line. The last segment is the foreground one,
/// every segment before it runs in the background.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedLine {
    segments: Vec<Segment>,
}

impl ParsedLine {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn background(&self) -> &[Segment] {
        match self.segments.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }

    pub fn foreground(&self) -> Option<&Segment> {
        self.segments.last()
    }
}

/// Split a raw line (trailing newline allowed) into segments and stages.
///
/// A line made only of whitespace yields no segments at all.
pub fn parse_line(line: &str) -> ParsedLine {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.trim().is_empty() {
        return ParsedLine::default();
    }
    ParsedLine {
        segments: line.split(BACKGROUND_OP).map(Segment::split).collect(),
    }
}
