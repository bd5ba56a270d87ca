// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Popup content: labelled rows plus injected controls.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

use crate::ControlId;

/// One `Label: value` line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PopupRow {
    /// Bold label.
    pub label: String,
    /// Value text.
    pub value: String,
}

/// A button injected into the popup markup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PopupControl {
    /// DOM id the engine will expose when the popup is open.
    pub id: ControlId,
    /// Button caption.
    pub label: String,
}

/// Popup content handed to [`MapSurface::bind_popup`](crate::MapSurface::bind_popup).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PopupContent {
    /// Text rows, top to bottom.
    pub rows: Vec<PopupRow>,
    /// Controls rendered below the rows.
    pub controls: Vec<PopupControl>,
}

impl PopupContent {
    /// Empty content.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row.
    pub fn row(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.rows.push(PopupRow {
            label: label.into(),
            value: value.into(),
        });
        self
    }

    /// Append a control.
    pub fn control(mut self, id: ControlId, label: impl Into<String>) -> Self {
        self.controls.push(PopupControl {
            id,
            label: label.into(),
        });
        self
    }

    /// Ids of every control in this popup.
    pub fn control_ids(&self) -> impl Iterator<Item = &ControlId> {
        self.controls.iter().map(|c| &c.id)
    }

    /// Plain-text rendering (rows only), handy for logs and assertions.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let _ = write!(out, "{}: {}", row.label, row.value);
        }
        out
    }

    /// HTML rendering; all text is escaped.
    pub fn to_markup(&self) -> String {
        let mut out = String::from("<div>");
        for row in &self.rows {
            let _ = write!(
                out,
                "<p><b>{}:</b> {}</p>",
                escape(&row.label),
                escape(&row.value)
            );
        }
        for control in &self.controls {
            let _ = write!(
                out,
                "<button id=\"{}\">{}</button>",
                escape(control.id.as_str()),
                escape(&control.label)
            );
        }
        out.push_str("</div>");
        out
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_escapes_user_text() {
        let content = PopupContent::new()
            .row("Deployment", "<script>alert(1)</script>")
            .control(ControlId::new("deleteBtn_a\"b"), "Delete");
        let html = content.to_markup();
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("id=\"deleteBtn_a&quot;b\""));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn text_lists_rows_in_order() {
        let content = PopupContent::new()
            .row("Deployment", "Alpha")
            .row("Fence Radius", "20m");
        assert_eq!(content.text(), "Deployment: Alpha\nFence Radius: 20m");
    }
}
