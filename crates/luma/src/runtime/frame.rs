// Call stack frames: one record per active call, used for error locations
// and tracebacks.

use smol_str::SmolStr;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct CallFrame {
    /// Best-effort callee name.
    pub name: SmolStr,
    /// Chunk the callee body lives in.
    pub source: Rc<str>,
    /// Line of the call site (in the caller).
    pub call_line: u32,
    /// Line currently executing inside the callee.
    pub line: u32,
    /// This frame is a protected-call boundary (pcall/xpcall).
    pub protected: bool,
}

impl CallFrame {
    pub fn describe(&self) -> String {
        if self.name.is_empty() || self.name == "?" {
            format!("{}:{}: in function <anonymous>", self.source, self.line)
        } else {
            format!("{}:{}: in function '{}'", self.source, self.line, self.name)
        }
    }
}

pub const TRACE_FRAME_CAP: usize = 10;

/// Render a traceback from innermost to outermost: consecutive identical
/// frames fold into a repeat note, and at most [`TRACE_FRAME_CAP`] frames are
/// kept plus an overflow note.
pub fn format_traceback(frames: &[CallFrame]) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut kept = 0usize;
    let mut i = frames.len();
    while i > 0 {
        i -= 1;
        let text = frames[i].describe();
        let mut repeats = 0usize;
        while i > 0 && frames[i - 1].describe() == text {
            i -= 1;
            repeats += 1;
        }
        if kept == TRACE_FRAME_CAP {
            let remaining = i + repeats + 1;
            lines.push(format!("... ({} more frames)", remaining));
            return lines;
        }
        lines.push(text);
        if repeats > 0 {
            lines.push(format!("... repeated {} more times", repeats));
        }
        kept += 1;
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(name: &str, line: u32) -> CallFrame {
        CallFrame {
            name: SmolStr::new(name),
            source: Rc::from("test.luma"),
            call_line: line,
            line,
            protected: false,
        }
    }

    #[test]
    fn folds_consecutive_duplicates() {
        let frames = vec![frame("outer", 1), frame("rec", 7), frame("rec", 7)];
        let lines = format_traceback(&frames);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("'rec'"));
        assert!(lines[1].contains("repeated 1 more times"));
        assert!(lines[2].contains("'outer'"));
    }

    #[test]
    fn caps_frame_count() {
        let frames: Vec<CallFrame> = (0..40).map(|i| frame(&format!("f{}", i), i)).collect();
        let lines = format_traceback(&frames);
        assert_eq!(lines.len(), TRACE_FRAME_CAP + 1);
        assert!(lines.last().unwrap().contains("more frames"));
    }
}
