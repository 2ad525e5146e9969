//! Rendering timelines and subscription windows back into diagrams.
//!
//! Rendering is the inverse of parsing modulo padding: trailing empty
//! columns are not emitted, and spaces come back as `-`.

use super::{Frame, Notification, ParsedDiagram, Timeline, TimelineEntry};
use crate::subscription::SubscriptionWindow;

fn column_of(frame: Frame, frame_time_factor: u32) -> Frame {
    frame.div_euclid(Frame::from(frame_time_factor.max(1)))
}

fn pad_to(out: &mut String, cursor: &mut Frame, column: Frame) {
    while *cursor < column {
        out.push('-');
        *cursor += 1;
    }
}

fn marker_of<T>(entry: &TimelineEntry<T>, marker: &impl Fn(&T) -> char) -> char {
    match &entry.notification {
        Notification::Next(value) => marker(value),
        Notification::Error(_) => '#',
        Notification::Complete => '|',
    }
}

/// Render a timeline.
///
/// `marker` chooses the character for each value. Entries sharing a frame
/// are wrapped in `( )` and advance the column cursor by the group width.
/// Timelines with negative frames (hot history) get a `^` at frame 0. Use
/// [`render_diagram`] to keep the `^` of a hot diagram with no history.
pub fn render<T>(
    timeline: &Timeline<T>,
    frame_time_factor: u32,
    marker: impl Fn(&T) -> char,
) -> String {
    render_timeline(timeline, frame_time_factor, false, &marker)
}

/// Render a parsed diagram, placing `^` whenever it had a subscription
/// point, so `render_diagram(parse(d)) == d` modulo padding.
pub fn render_diagram<T>(
    parsed: &ParsedDiagram<T>,
    frame_time_factor: u32,
    marker: impl Fn(&T) -> char,
) -> String {
    render_timeline(
        &parsed.timeline,
        frame_time_factor,
        parsed.subscription_column.is_some(),
        &marker,
    )
}

fn render_timeline<T>(
    timeline: &Timeline<T>,
    frame_time_factor: u32,
    caret: bool,
    marker: &impl Fn(&T) -> char,
) -> String {
    let entries = timeline.entries();
    let first_column = entries
        .first()
        .map_or(0, |entry| column_of(entry.frame, frame_time_factor));
    let hot = caret || first_column < 0;

    let mut out = String::new();
    let mut cursor = first_column.min(0);
    let mut caret_pending = hot;

    let mut index = 0;
    while index < entries.len() {
        let frame = entries[index].frame;
        let burst_len = entries[index..]
            .iter()
            .take_while(|entry| entry.frame == frame)
            .count();
        let burst = &entries[index..index + burst_len];
        index += burst_len;

        let column = column_of(frame, frame_time_factor);
        if caret_pending && column > 0 {
            pad_to(&mut out, &mut cursor, 0);
            out.push('^');
            cursor += 1;
            caret_pending = false;
        }
        pad_to(&mut out, &mut cursor, column);

        let with_caret = caret_pending && column == 0;
        if burst.len() == 1 && !with_caret {
            out.push(marker_of(&burst[0], marker));
            cursor += 1;
        } else {
            out.push('(');
            if with_caret {
                out.push('^');
                caret_pending = false;
            }
            for entry in burst {
                out.push(marker_of(entry, marker));
            }
            out.push(')');
            let width = burst.len() + 2 + usize::from(with_caret);
            cursor += Frame::try_from(width).unwrap_or(Frame::MAX);
        }
    }

    if caret_pending {
        pad_to(&mut out, &mut cursor, 0);
        out.push('^');
    }
    out
}

/// Render a subscription window: `^` at the start, `!` at the end, padded
/// with `-`. A zero-length window renders as `(^!)`.
pub fn render_subscription(window: &SubscriptionWindow, frame_time_factor: u32) -> String {
    let mut out = String::new();
    let mut cursor = 0;
    let start = column_of(window.start, frame_time_factor);
    pad_to(&mut out, &mut cursor, start);

    match window.end.map(|end| column_of(end, frame_time_factor)) {
        Some(end) if end == start => out.push_str("(^!)"),
        Some(end) => {
            out.push('^');
            cursor += 1;
            pad_to(&mut out, &mut cursor, end);
            out.push('!');
        }
        None => out.push('^'),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::{DiagramParser, parse};

    fn roundtrip(diagram: &str, factor: u32) -> String {
        let parsed = DiagramParser::new(factor)
            .parse::<char>(diagram, None, None)
            .unwrap();
        render(&parsed.timeline, factor, |c| *c)
    }

    #[test]
    fn test_render_roundtrip_cold() {
        assert_eq!(roundtrip("-a--b-|", 1), "-a--b-|");
        assert_eq!(roundtrip("-a--b-|", 10), "-a--b-|");
        assert_eq!(roundtrip("--(ab)-c-#", 10), "--(ab)-c-#");
        assert_eq!(roundtrip("(a|)", 1), "(a|)");
    }

    #[test]
    fn test_render_drops_padding() {
        assert_eq!(roundtrip("-a-b   ", 1), "-a-b");
        assert_eq!(roundtrip("a b--", 1), "a-b");
        assert_eq!(roundtrip("-----", 1), "");
    }

    #[test]
    fn test_render_roundtrip_hot() {
        // Leading padding before the first historical event is not kept.
        assert_eq!(roundtrip("--a--^b-c-|", 10), "a--^b-c-|");
        assert_eq!(roundtrip("-a-^", 1), "a-^");
        assert_eq!(roundtrip("a(^b)-|", 1), "a(^b)-|");
    }

    #[test]
    fn test_render_diagram_keeps_caret_without_history() {
        let parser = DiagramParser::new(10);
        for diagram in ["^-a|", "^", "^a", "(^a)-b", "--^-a|"] {
            let parsed = parser.parse::<char>(diagram, None, None).unwrap();
            let expected = diagram.trim_start_matches('-');
            assert_eq!(render_diagram(&parsed, 10, |c| *c), expected);
        }

        // A bare timeline carries no subscription point.
        let parsed = parse::<char>("^-a|", None).unwrap();
        assert_eq!(render(&parsed.timeline, 1, |c| *c), "--a|");
    }

    #[test]
    fn test_render_with_custom_markers() {
        let parsed = parse::<u32>("1-2|", None).unwrap();
        let rendered = render(&parsed.timeline, 1, |v| if *v == 1 { 'x' } else { 'y' });
        assert_eq!(rendered, "x-y|");
    }

    #[test]
    fn test_render_subscription() {
        let window = SubscriptionWindow {
            start: 20,
            end: Some(60),
        };
        assert_eq!(render_subscription(&window, 10), "--^---!");

        let open = SubscriptionWindow {
            start: 0,
            end: None,
        };
        assert_eq!(render_subscription(&open, 10), "^");

        let empty = SubscriptionWindow {
            start: 30,
            end: Some(30),
        };
        assert_eq!(render_subscription(&empty, 10), "---(^!)");
    }
}
