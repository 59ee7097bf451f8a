//! Line-grid redraw events to drawing callbacks

use super::events::{HlAttrs, RedrawEvent};
use crate::protocol::payload::DefaultColors;
use crate::render::{
    HighlightAttributes, BOLD, DEFAULT_COLOR, ITALIC, REVERSE, STRIKETHROUGH, UNDERCURL,
    UNDERLINE,
};
use crate::screen::ScreenSink;
use std::collections::HashMap;

/// Highlight id Neovim reserves for the default attributes
const DEFAULT_HL_ID: u64 = 0;

/// Keeps the highlight table and grid width needed to replay `grid_line`
#[derive(Debug, Default)]
pub struct RedrawTranslator {
    highlights: HashMap<u64, HighlightAttributes>,
    current_hl: Option<u64>,
    width: u32,
}

fn color(value: Option<i64>) -> i32 {
    value.map_or(DEFAULT_COLOR, |v| v as i32)
}

impl From<&HlAttrs> for HighlightAttributes {
    fn from(attrs: &HlAttrs) -> Self {
        let mut flags = 0;
        for (set, flag) in [
            (attrs.bold, BOLD),
            (attrs.italic, ITALIC),
            (attrs.underline, UNDERLINE),
            (attrs.undercurl, UNDERCURL),
            (attrs.reverse, REVERSE),
            (attrs.strikethrough, STRIKETHROUGH),
        ] {
            if set {
                flags |= flag;
            }
        }
        Self {
            foreground: color(attrs.foreground),
            background: color(attrs.background),
            special: color(attrs.special),
            flags,
        }
    }
}

impl RedrawTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    fn attributes(&self, hl_id: u64) -> HighlightAttributes {
        self.highlights.get(&hl_id).copied().unwrap_or_default()
    }

    pub fn apply<S: ScreenSink + ?Sized>(&mut self, event: RedrawEvent, sink: &mut S) {
        match event {
            RedrawEvent::GridResize { width, height, .. } => {
                let width = u32::try_from(width).unwrap_or(u32::MAX);
                let height = u32::try_from(height).unwrap_or(u32::MAX);
                self.width = width;
                self.current_hl = None;
                sink.resize(width, height);
            }
            RedrawEvent::GridClear { .. } => {
                self.current_hl = None;
                sink.clear();
            }
            RedrawEvent::GridCursorGoto { row, col, .. } => {
                sink.cursor_goto(row as u32, col as u32);
            }
            RedrawEvent::GridLine {
                row,
                col_start,
                cells,
                ..
            } => {
                sink.goto(row as u32, col_start as u32);
                let mut col = col_start;
                let last = cells.len().saturating_sub(1);
                for (i, cell) in cells.iter().enumerate() {
                    if let Some(hl_id) = cell.hl_id {
                        if self.current_hl != Some(hl_id) {
                            self.current_hl = Some(hl_id);
                            sink.highlight_set(self.attributes(hl_id));
                        }
                    }

                    // A trailing default blank run up to the right edge is a clear to eol
                    let reaches_edge = self.width > 0 && col + cell.repeat >= u64::from(self.width);
                    if i == last
                        && cell.repeat > 1
                        && cell.text == " "
                        && self.current_hl == Some(DEFAULT_HL_ID)
                        && reaches_edge
                    {
                        sink.eol_clear();
                        break;
                    }

                    for _ in 0..cell.repeat {
                        sink.put(&cell.text);
                    }
                    col += cell.repeat;
                }
            }
            RedrawEvent::GridScroll {
                top,
                bot,
                left,
                right,
                rows,
                ..
            } => {
                sink.set_scroll_region(
                    top as u32,
                    bot.saturating_sub(1) as u32,
                    left as u32,
                    right.saturating_sub(1) as u32,
                );
                sink.scroll(rows as i32);
            }
            RedrawEvent::HlAttrDefine { id, attrs } => {
                self.highlights.insert(id, HighlightAttributes::from(&attrs));
            }
            RedrawEvent::DefaultColorsSet { fg, bg, sp } => {
                sink.set_colors(DefaultColors {
                    foreground: fg as i32,
                    background: bg as i32,
                    special: sp as i32,
                });
            }
            RedrawEvent::ModeChange { mode, mode_index } => {
                sink.mode_change(&mode, mode_index as u32);
            }
            RedrawEvent::SetTitle(title) => sink.set_title(&title),
            RedrawEvent::SetIcon(icon) => sink.set_icon(&icon),
            RedrawEvent::Bell => sink.bell(),
            RedrawEvent::VisualBell => sink.visual_bell(),
            RedrawEvent::BusyStart => sink.busy_start(),
            RedrawEvent::BusyStop => sink.busy_stop(),
            RedrawEvent::MouseOn => sink.mouse_on(),
            RedrawEvent::MouseOff => sink.mouse_off(),
            RedrawEvent::Flush => sink.flush(),
            RedrawEvent::Unknown(name) => {
                tracing::trace!(event = %name, "ignoring redraw event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::events::GridCell;

    /// Records callbacks as strings
    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl ScreenSink for Recorder {
        fn resize(&mut self, width: u32, height: u32) {
            self.calls.push(format!("resize {width}x{height}"));
        }
        fn clear(&mut self) {
            self.calls.push("clear".into());
        }
        fn eol_clear(&mut self) {
            self.calls.push("eol_clear".into());
        }
        fn goto(&mut self, row: u32, col: u32) {
            self.calls.push(format!("goto {row},{col}"));
        }
        fn cursor_goto(&mut self, row: u32, col: u32) {
            self.calls.push(format!("cursor {row},{col}"));
        }
        fn highlight_set(&mut self, attrs: HighlightAttributes) {
            self.calls.push(format!("hl {:x} {}", attrs.foreground, attrs.flags));
        }
        fn put(&mut self, text: &str) {
            self.calls.push(format!("put {text:?}"));
        }
        fn set_scroll_region(&mut self, top: u32, bottom: u32, left: u32, right: u32) {
            self.calls
                .push(format!("region {top}-{bottom} {left}-{right}"));
        }
        fn scroll(&mut self, count: i32) {
            self.calls.push(format!("scroll {count}"));
        }
        fn set_colors(&mut self, colors: DefaultColors) {
            self.calls.push(format!("colors {}", colors.foreground));
        }
        fn mode_change(&mut self, mode: &str, index: u32) {
            self.calls.push(format!("mode {mode} {index}"));
        }
        fn set_title(&mut self, title: &str) {
            self.calls.push(format!("title {title}"));
        }
        fn set_icon(&mut self, icon: &str) {
            self.calls.push(format!("icon {icon}"));
        }
        fn bell(&mut self) {
            self.calls.push("bell".into());
        }
        fn visual_bell(&mut self) {
            self.calls.push("visual_bell".into());
        }
        fn busy_start(&mut self) {
            self.calls.push("busy_start".into());
        }
        fn busy_stop(&mut self) {
            self.calls.push("busy_stop".into());
        }
        fn mouse_on(&mut self) {
            self.calls.push("mouse_on".into());
        }
        fn mouse_off(&mut self) {
            self.calls.push("mouse_off".into());
        }
        fn flush(&mut self) {
            self.calls.push("flush".into());
        }
    }

    fn cell(text: &str, hl_id: Option<u64>, repeat: u64) -> GridCell {
        GridCell {
            text: text.into(),
            hl_id,
            repeat,
        }
    }

    #[test]
    fn test_grid_line_replays_cells_with_highlights() {
        let mut tr = RedrawTranslator::new();
        let mut rec = Recorder::default();
        tr.apply(
            RedrawEvent::HlAttrDefine {
                id: 5,
                attrs: HlAttrs {
                    foreground: Some(0xabcdef),
                    italic: true,
                    ..Default::default()
                },
            },
            &mut rec,
        );
        tr.apply(
            RedrawEvent::GridResize {
                grid: 1,
                width: 10,
                height: 2,
            },
            &mut rec,
        );
        tr.apply(
            RedrawEvent::GridLine {
                grid: 1,
                row: 1,
                col_start: 2,
                cells: vec![
                    cell("a", Some(5), 1),
                    cell("b", None, 2),
                    cell("あ", Some(0), 1),
                    cell("", None, 1),
                ],
            },
            &mut rec,
        );

        assert_eq!(
            rec.calls,
            vec![
                "resize 10x2",
                "goto 1,2",
                "hl abcdef 2",
                "put \"a\"",
                "put \"b\"",
                "put \"b\"",
                "hl ffffffff 0",
                "put \"あ\"",
                "put \"\"",
            ]
        );
    }

    #[test]
    fn test_trailing_blank_run_becomes_eol_clear() {
        let mut tr = RedrawTranslator::new();
        let mut rec = Recorder::default();
        tr.apply(
            RedrawEvent::GridResize {
                grid: 1,
                width: 8,
                height: 1,
            },
            &mut rec,
        );
        tr.apply(
            RedrawEvent::GridLine {
                grid: 1,
                row: 0,
                col_start: 0,
                cells: vec![cell("x", Some(0), 1), cell(" ", None, 7)],
            },
            &mut rec,
        );
        assert_eq!(
            &rec.calls[1..],
            &["goto 0,0", "hl ffffffff 0", "put \"x\"", "eol_clear"]
        );
    }

    #[test]
    fn test_highlighted_blank_run_is_drawn() {
        let mut tr = RedrawTranslator::new();
        let mut rec = Recorder::default();
        tr.apply(
            RedrawEvent::GridResize {
                grid: 1,
                width: 3,
                height: 1,
            },
            &mut rec,
        );
        tr.apply(
            RedrawEvent::GridLine {
                grid: 1,
                row: 0,
                col_start: 0,
                cells: vec![cell(" ", Some(9), 3)],
            },
            &mut rec,
        );
        assert_eq!(rec.calls.iter().filter(|c| *c == "put \" \"").count(), 3);
    }

    #[test]
    fn test_grid_scroll_sets_inclusive_region() {
        let mut tr = RedrawTranslator::new();
        let mut rec = Recorder::default();
        tr.apply(
            RedrawEvent::GridScroll {
                grid: 1,
                top: 2,
                bot: 10,
                left: 0,
                right: 80,
                rows: 3,
            },
            &mut rec,
        );
        assert_eq!(rec.calls, vec!["region 2-9 0-79", "scroll 3"]);
    }

    #[test]
    fn test_simple_events_map_one_to_one() {
        let mut tr = RedrawTranslator::new();
        let mut rec = Recorder::default();
        for event in [
            RedrawEvent::GridCursorGoto {
                grid: 1,
                row: 3,
                col: 4,
            },
            RedrawEvent::ModeChange {
                mode: "insert".into(),
                mode_index: 1,
            },
            RedrawEvent::DefaultColorsSet {
                fg: 255,
                bg: 0,
                sp: -1,
            },
            RedrawEvent::SetTitle("t".into()),
            RedrawEvent::SetIcon("i".into()),
            RedrawEvent::Bell,
            RedrawEvent::VisualBell,
            RedrawEvent::GridClear { grid: 1 },
            RedrawEvent::Unknown("option_set".into()),
            RedrawEvent::Flush,
        ] {
            tr.apply(event, &mut rec);
        }
        assert_eq!(
            rec.calls,
            vec![
                "cursor 3,4",
                "mode insert 1",
                "colors 255",
                "title t",
                "icon i",
                "bell",
                "visual_bell",
                "clear",
                "flush",
            ]
        );
    }
}
