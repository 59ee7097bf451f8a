//! Typed redraw events from Neovim
//!
//! Parses the line-grid UI protocol (`ext_linegrid`) into [`RedrawEvent`]s.
//! Only the global grid is attached, so grid ids are parsed but not routed.

use rmpv::Value;

/// One cell run of a `grid_line` event
#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    pub text: String,
    /// Absent means "same highlight as the previous cell"
    pub hl_id: Option<u64>,
    pub repeat: u64,
}

/// `rgb_attr` map of `hl_attr_define`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HlAttrs {
    pub foreground: Option<i64>,
    pub background: Option<i64>,
    pub special: Option<i64>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub undercurl: bool,
    pub reverse: bool,
    pub strikethrough: bool,
}

/// Redraw events from Neovim UI protocol
#[derive(Debug, Clone, PartialEq)]
pub enum RedrawEvent {
    /// Mode changed (mode_name, mode_index)
    ModeChange { mode: String, mode_index: u64 },
    /// Cursor moved to position on grid
    GridCursorGoto { grid: u64, row: u64, col: u64 },
    GridResize { grid: u64, width: u64, height: u64 },
    GridClear { grid: u64 },
    GridLine {
        grid: u64,
        row: u64,
        col_start: u64,
        cells: Vec<GridCell>,
    },
    /// Region is `[top, bot)` x `[left, right)`; positive rows scroll up
    GridScroll {
        grid: u64,
        top: u64,
        bot: u64,
        left: u64,
        right: u64,
        rows: i64,
    },
    HlAttrDefine { id: u64, attrs: HlAttrs },
    DefaultColorsSet { fg: i64, bg: i64, sp: i64 },
    SetTitle(String),
    SetIcon(String),
    Bell,
    VisualBell,
    BusyStart,
    BusyStop,
    MouseOn,
    MouseOff,
    /// Flush signals end of redraw batch
    Flush,
    /// Unknown or unhandled event
    Unknown(String),
}

/// Error type for event parsing
#[derive(Debug, Clone)]
pub struct ParseError {
    pub event_name: String,
    pub reason: String,
}

impl ParseError {
    pub(crate) fn new(event_name: &str, reason: impl Into<String>) -> Self {
        Self {
            event_name: event_name.to_string(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse '{}': {}", self.event_name, self.reason)
    }
}

impl std::error::Error for ParseError {}

fn u64_at(info: &[Value], index: usize, event: &str, field: &str) -> Result<u64, ParseError> {
    info.get(index)
        .and_then(|v| v.as_u64())
        .ok_or_else(|| ParseError::new(event, format!("Invalid {}", field)))
}

fn i64_at(info: &[Value], index: usize, event: &str, field: &str) -> Result<i64, ParseError> {
    info.get(index)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| ParseError::new(event, format!("Invalid {}", field)))
}

fn str_at(info: &[Value], index: usize, event: &str, field: &str) -> Result<String, ParseError> {
    info.get(index)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| ParseError::new(event, format!("Invalid {}", field)))
}

fn expect_len(info: &[Value], len: usize, event: &str) -> Result<(), ParseError> {
    if info.len() < len {
        return Err(ParseError::new(
            event,
            format!("Expected {} values, got {}", len, info.len()),
        ));
    }
    Ok(())
}

impl RedrawEvent {
    /// Parse a single redraw event from msgpack Value
    ///
    /// `event_data` is `[name, args...]` where each args entry is one
    /// invocation; an event batch can therefore yield several events.
    pub fn parse(event_data: &[Value]) -> Result<Vec<RedrawEvent>, ParseError> {
        let event_name = event_data
            .first()
            .and_then(|v| v.as_str())
            .ok_or_else(|| ParseError::new("unknown", "Missing event name"))?;

        let invocations = event_data[1..].iter().filter_map(|v| match v {
            Value::Array(info) => Some(info.as_slice()),
            _ => None,
        });

        let mut events = Vec::new();

        match event_name {
            "mode_change" => {
                for info in invocations {
                    let mode = str_at(info, 0, event_name, "mode name")?;
                    let mode_index = info.get(1).and_then(|v| v.as_u64()).unwrap_or(0);
                    events.push(RedrawEvent::ModeChange { mode, mode_index });
                }
            }
            "grid_cursor_goto" => {
                for info in invocations {
                    expect_len(info, 3, event_name)?;
                    events.push(RedrawEvent::GridCursorGoto {
                        grid: u64_at(info, 0, event_name, "grid id")?,
                        row: u64_at(info, 1, event_name, "row")?,
                        col: u64_at(info, 2, event_name, "col")?,
                    });
                }
            }
            "grid_resize" => {
                for info in invocations {
                    expect_len(info, 3, event_name)?;
                    events.push(RedrawEvent::GridResize {
                        grid: u64_at(info, 0, event_name, "grid id")?,
                        width: u64_at(info, 1, event_name, "width")?,
                        height: u64_at(info, 2, event_name, "height")?,
                    });
                }
            }
            "grid_clear" => {
                for info in invocations {
                    events.push(RedrawEvent::GridClear {
                        grid: u64_at(info, 0, event_name, "grid id")?,
                    });
                }
            }
            "grid_line" => {
                for info in invocations {
                    events.push(Self::parse_grid_line(info)?);
                }
            }
            "grid_scroll" => {
                for info in invocations {
                    expect_len(info, 6, event_name)?;
                    events.push(RedrawEvent::GridScroll {
                        grid: u64_at(info, 0, event_name, "grid id")?,
                        top: u64_at(info, 1, event_name, "top")?,
                        bot: u64_at(info, 2, event_name, "bot")?,
                        left: u64_at(info, 3, event_name, "left")?,
                        right: u64_at(info, 4, event_name, "right")?,
                        rows: i64_at(info, 5, event_name, "rows")?,
                    });
                }
            }
            "hl_attr_define" => {
                for info in invocations {
                    let id = u64_at(info, 0, event_name, "highlight id")?;
                    let attrs = Self::parse_hl_attrs(info.get(1));
                    events.push(RedrawEvent::HlAttrDefine { id, attrs });
                }
            }
            "default_colors_set" => {
                for info in invocations {
                    expect_len(info, 3, event_name)?;
                    events.push(RedrawEvent::DefaultColorsSet {
                        fg: i64_at(info, 0, event_name, "foreground")?,
                        bg: i64_at(info, 1, event_name, "background")?,
                        sp: i64_at(info, 2, event_name, "special")?,
                    });
                }
            }
            "set_title" => {
                for info in invocations {
                    events.push(RedrawEvent::SetTitle(str_at(info, 0, event_name, "title")?));
                }
            }
            "set_icon" => {
                for info in invocations {
                    events.push(RedrawEvent::SetIcon(str_at(info, 0, event_name, "icon")?));
                }
            }
            "bell" => events.push(RedrawEvent::Bell),
            "visual_bell" => events.push(RedrawEvent::VisualBell),
            "busy_start" => events.push(RedrawEvent::BusyStart),
            "busy_stop" => events.push(RedrawEvent::BusyStop),
            "mouse_on" => events.push(RedrawEvent::MouseOn),
            "mouse_off" => events.push(RedrawEvent::MouseOff),
            "flush" => events.push(RedrawEvent::Flush),
            _ => {
                // Unknown event - store for debugging if needed
                events.push(RedrawEvent::Unknown(event_name.to_string()));
            }
        }

        Ok(events)
    }

    fn parse_grid_line(info: &[Value]) -> Result<RedrawEvent, ParseError> {
        const EVENT: &str = "grid_line";
        expect_len(info, 4, EVENT)?;

        let grid = u64_at(info, 0, EVENT, "grid id")?;
        let row = u64_at(info, 1, EVENT, "row")?;
        let col_start = u64_at(info, 2, EVENT, "col_start")?;
        let Some(Value::Array(raw_cells)) = info.get(3) else {
            return Err(ParseError::new(EVENT, "Invalid cells"));
        };

        let mut cells = Vec::with_capacity(raw_cells.len());
        for raw in raw_cells {
            let Value::Array(cell) = raw else {
                return Err(ParseError::new(EVENT, "Cell is not an array"));
            };
            let text = str_at(cell, 0, EVENT, "cell text")?;
            let hl_id = cell.get(1).and_then(|v| v.as_u64());
            let repeat = cell.get(2).and_then(|v| v.as_u64()).unwrap_or(1);
            cells.push(GridCell {
                text,
                hl_id,
                repeat,
            });
        }

        Ok(RedrawEvent::GridLine {
            grid,
            row,
            col_start,
            cells,
        })
    }

    fn parse_hl_attrs(value: Option<&Value>) -> HlAttrs {
        let mut attrs = HlAttrs::default();
        let Some(map) = value.and_then(|v| v.as_map()) else {
            return attrs;
        };

        for (key, value) in map {
            match key.as_str() {
                Some("foreground") => attrs.foreground = value.as_i64(),
                Some("background") => attrs.background = value.as_i64(),
                Some("special") => attrs.special = value.as_i64(),
                Some("bold") => attrs.bold = value.as_bool().unwrap_or(false),
                Some("italic") => attrs.italic = value.as_bool().unwrap_or(false),
                Some("underline") => attrs.underline = value.as_bool().unwrap_or(false),
                Some("undercurl") => attrs.undercurl = value.as_bool().unwrap_or(false),
                Some("reverse") => attrs.reverse = value.as_bool().unwrap_or(false),
                Some("strikethrough") => attrs.strikethrough = value.as_bool().unwrap_or(false),
                _ => {}
            }
        }
        attrs
    }
}
