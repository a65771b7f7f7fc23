//! Source excerpts for error locations.

/// Lines shown on each side of the failing line.
const CONTEXT_LINES: usize = 2;

/// Render a few lines of `source` around `line`:`column` (both 1-based).
///
/// ```text
///   2 | let a = 1;
/// > 3 | let b = a.nope();
///     |           ^
///   4 | b
/// ```
///
/// Returns `None` when `line` is outside the source.
pub fn generate(source: &str, line: u32, column: u32) -> Option<String> {
    let lines: Vec<&str> = source.lines().collect();
    let target = usize::try_from(line).ok()?.checked_sub(1)?;
    if target >= lines.len() {
        return None;
    }

    let start = target.saturating_sub(CONTEXT_LINES);
    let end = (target + CONTEXT_LINES).min(lines.len() - 1);
    let width = (end + 1).to_string().len();

    let mut frame = Vec::with_capacity(end - start + 2);
    for (index, text) in lines.iter().enumerate().take(end + 1).skip(start) {
        let marker = if index == target { '>' } else { ' ' };
        frame.push(format!("{marker} {:>width$} | {text}", index + 1).trim_end().to_string());
        if index == target {
            let offset = usize::try_from(column.max(1) - 1).unwrap_or(0);
            let pad: String = text
                .chars()
                .take(offset)
                .map(|c| if c == '\t' { '\t' } else { ' ' })
                .collect();
            frame.push(format!("  {:>width$} | {pad}^", ""));
        }
    }
    Some(frame.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "fn main() {\n    let a = 1;\n    let b = a.nope();\n    b\n}\n";

    #[test]
    fn test_frame_around_middle_line() {
        let frame = generate(SOURCE, 3, 15).unwrap();
        assert_eq!(
            frame,
            [
                "  1 | fn main() {",
                "  2 |     let a = 1;",
                "> 3 |     let b = a.nope();",
                "    |               ^",
                "  4 |     b",
                "  5 | }",
            ]
            .join("\n")
        );
    }

    #[test]
    fn test_frame_at_first_line() {
        let frame = generate(SOURCE, 1, 1).unwrap();
        let lines: Vec<_> = frame.lines().collect();
        assert_eq!(lines[0], "> 1 | fn main() {");
        assert_eq!(lines[1], "    | ^");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_gutter_widens_for_two_digit_lines() {
        let source: String = (1..=12).map(|n| format!("line {n}\n")).collect();
        let frame = generate(&source, 10, 1).unwrap();
        assert!(frame.contains("> 10 | line 10"));
        assert!(frame.contains("  12 | line 12"));
        assert!(frame.contains("   8 | line 8"));
    }

    #[test]
    fn test_out_of_range_line() {
        assert!(generate(SOURCE, 0, 1).is_none());
        assert!(generate(SOURCE, 42, 1).is_none());
    }
}
