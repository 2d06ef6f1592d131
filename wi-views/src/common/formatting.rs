// wi-views/src/common/formatting.rs
use ratatui::{buffer::Buffer, layout::Rect, style::Style};

/// Width of `text` in cells, one per char
pub fn text_width(text: &str) -> u16 {
    u16::try_from(text.chars().count()).unwrap_or(u16::MAX)
}

/// Cut `text` to at most `width` cells, marking the cut with `…`
///
/// # Example
/// ```rust
/// # use wi_views::common::truncate;
/// assert_eq!(truncate("status", 4), "sta…");
/// assert_eq!(truncate("ok", 4), "ok");
/// ```
pub fn truncate(text: &str, width: u16) -> String {
    let width = usize::from(width);
    if text.chars().count() <= width {
        return text.to_string();
    }
    match width {
        0 => String::new(),
        _ => {
            let mut out: String = text.chars().take(width - 1).collect();
            out.push('…');
            out
        }
    }
}

/// Paint `area` with `style` and write `text` on its first row.
pub fn fill_line(buf: &mut Buffer, area: Rect, text: &str, style: Style) {
    if area.is_empty() {
        return;
    }
    buf.set_style(area, style);
    for y in area.top()..area.bottom() {
        for x in area.left()..area.right() {
            if let Some(cell) = buf.cell_mut((x, y)) {
                cell.set_symbol(" ");
            }
        }
    }
    buf.set_stringn(
        area.x,
        area.y,
        truncate(text, area.width),
        usize::from(area.width),
        style,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_width() {
        assert_eq!(text_width(""), 0);
        assert_eq!(text_width("abc"), 3);
        assert_eq!(text_width("été"), 3);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("status", 4), "sta…");
        assert_eq!(truncate("status", 6), "status");
        assert_eq!(truncate("ok", 4), "ok");
        assert_eq!(truncate("ok", 0), "");
        assert_eq!(truncate("ok", 1), "…");
    }

    #[test]
    fn test_fill_line_clears_the_area() {
        let mut buf = Buffer::empty(Rect::new(0, 0, 6, 2));
        buf.set_string(0, 1, "xxxxxx", Style::default());
        fill_line(&mut buf, Rect::new(1, 0, 4, 2), "hello", Style::default());

        let row = |y| {
            (0..6)
                .map(|x| buf[(x, y)].symbol().to_string())
                .collect::<String>()
        };
        assert_eq!(row(0), " hel… ");
        assert_eq!(row(1), "x    x");
    }
}
