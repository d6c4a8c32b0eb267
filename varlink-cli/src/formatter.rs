//! # Output Formatting
//!
//! Turns command results into the text printed on stdout / stderr.
//!
//! JSON is pretty-printed with a 2-space indent and, when colour is on, every token type
//! gets its own colour role. Stripping the escape codes always yields the exact text
//! `serde_json::to_string_pretty` would produce, so redirected output stays parseable.
use crate::commands::CommandError;
use colored::{Color, Colorize};
use serde_json::Value;
use varlink_cli_core::protocol::{Parameters, ServiceInfo};

/// Colour roles used by the [`Renderer`]. A `None` role is printed unstyled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub key: Option<Color>,
    pub string: Option<Color>,
    pub number: Option<Color>,
    pub boolean: Option<Color>,
    pub null: Option<Color>,
    pub error: Option<Color>,
    pub bold_labels: bool,
}

impl Theme {
    pub fn colored() -> Self {
        Self {
            key: Some(Color::Cyan),
            string: Some(Color::Magenta),
            number: Some(Color::Magenta),
            boolean: Some(Color::Magenta),
            null: Some(Color::Magenta),
            error: Some(Color::Red),
            bold_labels: true,
        }
    }

    pub fn plain() -> Self {
        Self {
            key: None,
            string: None,
            number: None,
            boolean: None,
            null: None,
            error: None,
            bold_labels: false,
        }
    }

    fn paint(&self, text: &str, role: Option<Color>) -> String {
        match role {
            Some(color) => text.color(color).to_string(),
            None => text.to_string(),
        }
    }

    fn label(&self, text: &str) -> String {
        if self.bold_labels {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn error_marker(&self) -> String {
        match self.error {
            Some(color) => "Error:".color(color).bold().to_string(),
            None => "Error:".to_string(),
        }
    }
}

/// Renders results with a fixed [`Theme`].
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    theme: Theme,
}

impl Renderer {
    pub fn new(theme: Theme) -> Self {
        Self { theme }
    }

    /// Renders with [`Theme::colored`] or [`Theme::plain`].
    pub fn for_color(color: bool) -> Self {
        Self::new(if color {
            Theme::colored()
        } else {
            Theme::plain()
        })
    }

    pub fn parameters(&self, parameters: &Parameters) -> String {
        let mut out = String::new();
        self.write_object(&mut out, parameters, 0);
        out
    }

    /// Four labelled lines followed by the indented interface list.
    pub fn info(&self, info: &ServiceInfo) -> String {
        format!(
            "{} {}\n{} {}\n{} {}\n{} {}\n{}\n  {}\n",
            self.theme.label("Vendor:"),
            info.vendor,
            self.theme.label("Product:"),
            info.product,
            self.theme.label("Version:"),
            info.version,
            self.theme.label("URL:"),
            info.url,
            self.theme.label("Interfaces:"),
            info.interfaces.join("\n  "),
        )
    }

    /// The diagnostic printed on stderr for a failed command.
    ///
    /// Errors reported by the service show their highlighted name followed by their
    /// parameters, rendered like a successful reply.
    pub fn error(&self, err: &CommandError) -> String {
        let marker = self.theme.error_marker();

        match err {
            CommandError::Remote(remote) => {
                let mut out = format!(
                    "{marker} Call failed with error: {}",
                    self.theme.paint(&remote.name, self.theme.error)
                );
                if let Some(parameters) = &remote.parameters {
                    out.push('\n');
                    out.push_str(&self.parameters(parameters));
                }
                out
            }
            other => format!("{marker} {other}"),
        }
    }

    fn write_value(&self, out: &mut String, value: &Value, depth: usize) {
        let theme = &self.theme;

        match value {
            Value::Null => out.push_str(&theme.paint("null", theme.null)),
            Value::Bool(b) => out.push_str(&theme.paint(&b.to_string(), theme.boolean)),
            Value::Number(n) => out.push_str(&theme.paint(&n.to_string(), theme.number)),
            Value::String(s) => out.push_str(&theme.paint(&quote(s), theme.string)),
            Value::Array(items) if items.is_empty() => out.push_str("[]"),
            Value::Array(items) => {
                out.push_str("[\n");
                for (i, item) in items.iter().enumerate() {
                    indent(out, depth + 1);
                    self.write_value(out, item, depth + 1);
                    if i + 1 < items.len() {
                        out.push(',');
                    }
                    out.push('\n');
                }
                indent(out, depth);
                out.push(']');
            }
            Value::Object(map) => self.write_object(out, map, depth),
        }
    }

    fn write_object(&self, out: &mut String, map: &Parameters, depth: usize) {
        if map.is_empty() {
            out.push_str("{}");
            return;
        }

        out.push_str("{\n");
        for (i, (key, value)) in map.iter().enumerate() {
            indent(out, depth + 1);
            out.push_str(&self.theme.paint(&quote(key), self.theme.key));
            out.push_str(": ");
            self.write_value(out, value, depth + 1);
            if i + 1 < map.len() {
                out.push(',');
            }
            out.push('\n');
        }
        indent(out, depth);
        out.push('}');
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("{text:?}"))
}
