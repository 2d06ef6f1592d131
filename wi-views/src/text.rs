// wi-views/src/text.rs
use ratatui::{buffer::Buffer, layout::Rect};
use wi_core::{Size, View};

use crate::common::{DEFAULT_PALETTE, fill_line, text_width, truncate};

/// Static text. The arguments are joined with spaces; a literal `\n` word
/// separator starts a new line.
pub struct TextView {
    title: String,
    lines: Vec<String>,
}

impl TextView {
    pub fn new(args: &[String]) -> Self {
        let joined = args.join(" ");
        let lines: Vec<String> = joined.split("\\n").map(|l| l.trim().to_string()).collect();
        Self {
            title: lines.first().cloned().unwrap_or_default(),
            lines,
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl View for TextView {
    fn title(&self) -> &str {
        &self.title
    }

    fn natural_size(&self) -> Size {
        let width = self.lines.iter().map(|l| text_width(l)).max().unwrap_or(0);
        let height = u16::try_from(self.lines.len()).unwrap_or(u16::MAX);
        Size::new(width, height)
    }

    fn render(&mut self, area: Rect, buf: &mut Buffer) {
        fill_line(buf, area, "", DEFAULT_PALETTE.text);
        for (line, y) in self.lines.iter().zip(area.top()..area.bottom()) {
            buf.set_string(area.x, y, truncate(line, area.width), DEFAULT_PALETTE.text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(words: &str) -> Vec<String> {
        words.split(' ').map(String::from).collect()
    }

    #[test]
    fn test_lines_and_natural_size() {
        let view = TextView::new(&args("hello world \\n second"));
        assert_eq!(view.lines(), ["hello world", "second"]);
        assert_eq!(view.title(), "hello world");
        assert_eq!(view.natural_size(), Size::new(11, 2));
    }

    #[test]
    fn test_render_clips_to_area() {
        let mut view = TextView::new(&args("abcdef \\n xy \\n dropped"));
        let area = Rect::new(1, 1, 4, 2);
        let mut buf = Buffer::empty(Rect::new(0, 0, 6, 4));
        view.render(area, &mut buf);

        let row = |y| (0..6).map(|x| buf[(x, y)].symbol().to_string()).collect::<String>();
        assert_eq!(row(1), " abc… ");
        assert_eq!(row(2), " xy   ");
        assert_eq!(row(3), "      ");
    }

    #[test]
    fn test_empty_args() {
        let view = TextView::new(&[]);
        assert_eq!(view.title(), "");
        assert_eq!(view.natural_size(), Size::new(0, 1));
    }
}
