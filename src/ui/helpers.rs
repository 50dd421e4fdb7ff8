use anyhow::Error;
use qrcode::render::unicode;
use qrcode::QrCode;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Color;

/// Indicator colour at the peak of the flash.
const FLASH_RGB: (u8, u8, u8) = (196, 222, 250);
/// Indicator colour once the flash has faded.
const IDLE_RGB: (u8, u8, u8) = (28, 28, 32);

/// Produce a rectangle centered within `area` that spans the requested percent
/// of the width and height. Used for modal dialogs.
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(area);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(horizontal[1]);

    vertical[1]
}

/// Extract the most relevant error message from a chained error.
pub(crate) fn surface_error(err: &Error) -> String {
    err.chain()
        .last()
        .map(|cause| cause.to_string())
        .unwrap_or_else(|| err.to_string())
}

/// Cursor cell for a text field: `row` lines down and just past `prefix` plus
/// `value_len` characters, kept inside `inner` however long the value is.
pub(crate) fn cursor_position(inner: Rect, prefix: &str, value_len: usize, row: u16) -> (u16, u16) {
    let offset = prefix.chars().count().saturating_add(value_len);
    let offset = u16::try_from(offset).unwrap_or(u16::MAX);
    let last_column = inner.right().saturating_sub(1).max(inner.x);
    let last_row = inner.bottom().saturating_sub(1).max(inner.y);
    (
        inner.x.saturating_add(offset).min(last_column),
        inner.y.saturating_add(row).min(last_row),
    )
}

/// Render `link` as a QR code made of half-block characters, light modules on
/// a dark background. `None` when the link does not fit in a QR code.
pub(crate) fn share_qr(link: &str) -> Option<String> {
    let code = QrCode::new(link.as_bytes()).ok()?;
    Some(
        code.render::<unicode::Dense1x2>()
            .dark_color(unicode::Dense1x2::Light)
            .light_color(unicode::Dense1x2::Dark)
            .build(),
    )
}

/// Blend between the idle and flash colours. `level` is clamped to `[0, 1]`.
pub(crate) fn beat_color(level: f64) -> Color {
    let level = level.clamp(0.0, 1.0);
    let mix = |idle: u8, flash: u8| -> u8 {
        (f64::from(idle) + (f64::from(flash) - f64::from(idle)) * level).round() as u8
    };
    Color::Rgb(
        mix(IDLE_RGB.0, FLASH_RGB.0),
        mix(IDLE_RGB.1, FLASH_RGB.1),
        mix(IDLE_RGB.2, FLASH_RGB.2),
    )
}

/// Name of the song after `index`, or `-` for the last song.
pub(crate) fn upcoming_label(names: &[&str], index: usize) -> String {
    names
        .get(index + 1)
        .map(|name| name.to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beat_color_spans_idle_to_flash() {
        assert_eq!(beat_color(0.0), Color::Rgb(28, 28, 32));
        assert_eq!(beat_color(1.0), Color::Rgb(196, 222, 250));
        assert_eq!(beat_color(7.0), beat_color(1.0));
    }

    #[test]
    fn cursor_stays_inside_the_field_area() {
        let inner = Rect::new(2, 3, 10, 4);
        assert_eq!(cursor_position(inner, "Name: ", 3, 0), (11, 3));
        assert_eq!(cursor_position(inner, "Name: ", 1, 1), (9, 4));
        assert_eq!(cursor_position(inner, "Name: ", 70_000, 9), (11, 6));
        assert_eq!(cursor_position(Rect::new(0, 0, 0, 0), "BPM: ", 2, 1), (0, 0));
    }

    #[test]
    fn short_links_become_qr_codes() {
        let qr = share_qr("https://downbeat.app/#import=gqFuo1NldA==").unwrap();
        assert!(qr.lines().count() > 10);
        assert!(share_qr(&"A".repeat(5_000)).is_none());
    }

    #[test]
    fn upcoming_label_handles_last_song() {
        let names = ["Intro", "Outro"];
        assert_eq!(upcoming_label(&names, 0), "Outro");
        assert_eq!(upcoming_label(&names, 1), "-");
    }
}
