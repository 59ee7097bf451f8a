//! Autocommand notifications from Neovim
//!
//! The agent registers a small Lua module at start-up that forwards selected
//! autocommands as `autocommand` rpc notifications on the agent's channel.

use super::events::ParseError;
use rmpv::Value;

/// Notification name used by the Lua side
pub const NOTIFICATION: &str = "autocommand";

/// Lua module installed at start-up; `...` is the agent's channel id
pub const LUA_AUTOCMDS: &str = r#"
local chan = ...
local group = vim.api.nvim_create_augroup('neovim_agent', { clear = true })

local function notify(event, buf, value)
  vim.rpcnotify(chan, 'autocommand', event, buf, value)
end

vim.api.nvim_create_autocmd('DirChanged', {
  group = group,
  callback = function(ev) notify('DirChanged', ev.buf, vim.fn.getcwd()) end,
})

vim.api.nvim_create_autocmd('ColorScheme', {
  group = group,
  callback = function(ev) notify('ColorScheme', ev.buf, vim.g.colors_name or '') end,
})

vim.api.nvim_create_autocmd({ 'BufEnter', 'BufLeave', 'BufWritePost', 'TextChanged', 'TextChangedI' }, {
  group = group,
  callback = function(ev)
    local modified = vim.api.nvim_buf_is_valid(ev.buf) and vim.bo[ev.buf].modified
    notify(ev.event, ev.buf, modified)
  end,
})
"#;

/// Autocommand reported by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutocmdEvent {
    DirChanged { cwd: String },
    ColorScheme { name: String },
    /// Buffer lifecycle or text change; `modified` is the buffer's dirty flag
    Buffer {
        event: String,
        buffer: i32,
        modified: Option<bool>,
    },
}

impl AutocmdEvent {
    /// Parse `[event, bufnr, value]` notification arguments
    pub fn parse(args: &[Value]) -> Result<Self, ParseError> {
        let event = args
            .first()
            .and_then(|v| v.as_str())
            .ok_or_else(|| ParseError::new(NOTIFICATION, "Missing event name"))?;
        let buffer = args.get(1).and_then(|v| v.as_i64()).unwrap_or(0) as i32;
        let value = args.get(2);

        let parsed = match event {
            "DirChanged" => AutocmdEvent::DirChanged {
                cwd: value
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| ParseError::new(NOTIFICATION, "Missing directory"))?
                    .to_string(),
            },
            "ColorScheme" => AutocmdEvent::ColorScheme {
                name: value
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
            },
            _ => AutocmdEvent::Buffer {
                event: event.to_string(),
                buffer,
                modified: value.and_then(|v| v.as_bool()),
            },
        };
        Ok(parsed)
    }
}
