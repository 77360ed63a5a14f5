use std::io::{self, IsTerminal, Write};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use tracing::debug;
use unicode_width::UnicodeWidthStr;

use tally_core::notify::{Notice, Presenter};
use tally_core::render::{TaskRow, Tone, ViewModel};

use crate::config::Config;

const BAR_CELLS: usize = 20;

/// Terminal presenter. Repaints the whole dashboard on every view model and
/// boxes notices; sound cues degrade to the terminal bell.
pub struct Screen {
    color: bool,
    sound: bool,
    rows: Arc<Mutex<Vec<TaskRow>>>,
}

impl Screen {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };
        let sound = cfg.get_bool("sound").unwrap_or(true);

        Ok(Self {
            color,
            sound,
            rows: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// The rows of the last drawn view, shared with the input loop so typed
    /// task numbers resolve against what is actually on screen.
    pub fn rows_handle(&self) -> Arc<Mutex<Vec<TaskRow>>> {
        self.rows.clone()
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }

    fn tone_code(tone: Tone) -> &'static str {
        match tone {
            Tone::Positive => "32",
            Tone::Negative => "31",
            Tone::Info => "36",
        }
    }
}

impl Presenter for Screen {
    #[tracing::instrument(skip_all)]
    fn show_view(&mut self, view: &ViewModel) -> anyhow::Result<()> {
        let mut cache = match self.rows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *cache = view.rows.clone();
        drop(cache);

        let mut out = io::stdout().lock();
        writeln!(out)?;

        if let Some(placeholder) = &view.placeholder {
            writeln!(out, "{placeholder}")?;
        } else {
            let headers = vec![
                "#".to_string(),
                "Done".to_string(),
                "Task".to_string(),
                "Time".to_string(),
            ];
            let mut rows = Vec::with_capacity(view.rows.len());
            for (idx, row) in view.rows.iter().enumerate() {
                let number = self.paint(&(idx + 1).to_string(), "33");
                let marker = if row.completed {
                    self.paint("[x]", "32")
                } else {
                    "[ ]".to_string()
                };
                rows.push(vec![number, marker, row.name.clone(), row.time.clone()]);
            }
            write_table(&mut out, headers, rows)?;
        }

        let filled = (usize::from(view.progress_percent) * BAR_CELLS) / 100;
        let bar = format!(
            "{}{}",
            "#".repeat(filled),
            "-".repeat(BAR_CELLS.saturating_sub(filled))
        );
        writeln!(
            out,
            "\n[{}] {}",
            self.paint(&bar, Self::tone_code(view.progress_tone)),
            view.progress_label
        )?;
        writeln!(
            out,
            "Flex Time    {}",
            self.paint(&view.flex_label, Self::tone_code(view.flex_tone))
        )?;
        writeln!(
            out,
            "Screen Debt  {}",
            self.paint(&view.debt_label, Self::tone_code(view.debt_tone))
        )?;

        Ok(())
    }

    #[tracing::instrument(skip_all, fields(title = %notice.title))]
    fn show_notice(&mut self, notice: &Notice) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let title_width = UnicodeWidthStr::width(notice.title.as_str());
        let body_width = UnicodeWidthStr::width(notice.body.as_str());
        let inner = title_width.max(body_width);
        let border = format!("+{}+", "-".repeat(inner + 2));

        writeln!(out, "{border}")?;
        writeln!(
            out,
            "| {}{} |",
            self.paint(&notice.title, Self::tone_code(notice.tone)),
            " ".repeat(inner - title_width)
        )?;
        writeln!(
            out,
            "| {}{} |",
            notice.body,
            " ".repeat(inner - body_width)
        )?;
        writeln!(out, "{border}")?;

        if self.sound && let Some(cue) = notice.sound {
            debug!(file = cue.file_name(), "sound cue");
            write!(out, "\x07")?;
            out.flush()?;
        }

        Ok(())
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
