// ============================================================================
// src/ui.rs – Operator console output, mirrored into the run log
// ============================================================================

use console::Style;
use std::sync::Mutex;

use crate::util::audit::AuditLog;

pub const BANNER_BODY_WIDTH: usize = 60;

/// Console front-end. Every line shown to the operator is also appended to
/// the audit log (when one is attached) with its level.
#[derive(Debug, Default)]
pub struct UX {
    log: Option<AuditLog>,
    quiet: bool,
    captured: Option<Mutex<Vec<String>>>,
}

impl UX {
    pub fn new(log: Option<AuditLog>) -> Self {
        Self {
            log,
            quiet: false,
            captured: None,
        }
    }

    /// No console output; lines are kept in memory for inspection.
    pub fn capturing() -> Self {
        Self {
            log: None,
            quiet: true,
            captured: Some(Mutex::new(Vec::new())),
        }
    }

    pub fn attach_log(&mut self, log: AuditLog) {
        self.log = Some(log);
    }

    /// Lines recorded by a capturing UX, formatted `LEVEL: message`.
    pub fn captured(&self) -> Vec<String> {
        self.captured
            .as_ref()
            .and_then(|c| c.lock().ok().map(|lines| lines.clone()))
            .unwrap_or_default()
    }

    pub fn banner(&self, title: &str) {
        if self.quiet {
            return;
        }
        let frame = Style::new().color256(39).bold();
        let span = "═".repeat(BANNER_BODY_WIDTH + 2);
        println!("{}", frame.apply_to(format!("╔{span}╗")));
        println!(
            "{}",
            frame.apply_to(format!("║{:^width$}║", title, width = BANNER_BODY_WIDTH + 2))
        );
        println!("{}", frame.apply_to(format!("╚{span}╝")));
    }

    pub fn phase(&self, title: &str) {
        self.emit("PHASE", title, Style::new().white().bold(), "\n▸ ");
    }

    pub fn info(&self, msg: &str) {
        self.emit("INFO", msg, Style::new().cyan(), "  ");
    }

    pub fn note(&self, msg: &str) {
        self.emit("NOTE", msg, Style::new().dim(), "  · ");
    }

    pub fn success(&self, msg: &str) {
        self.emit("OK", msg, Style::new().green().bold(), "  ✔ ");
    }

    pub fn warn(&self, msg: &str) {
        self.emit("WARN", msg, Style::new().yellow().bold(), "  ! ");
    }

    /// Fatal and failure lines carry the `ERROR:` prefix on the console too.
    pub fn error(&self, msg: &str) {
        self.record("ERROR", msg);
        if !self.quiet {
            eprintln!(
                "{}",
                Style::new().red().bold().apply_to(format!("ERROR: {msg}"))
            );
        }
    }

    /// Simulate-mode notice for an action that was not performed.
    pub fn dry_run(&self, msg: &str) {
        self.emit("DRY-RUN", msg, Style::new().magenta(), "  ~ ");
    }

    /// Two-column key/value panel. Each row is logged individually.
    pub fn data_panel(&self, title: &str, rows: &[(&str, String)]) {
        let key_width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        self.record("PANEL", title);
        for (key, value) in rows {
            self.record("PANEL", &format!("{key}: {value}"));
        }
        if self.quiet {
            return;
        }
        let head = Style::new().color256(214).bold();
        let key_style = Style::new().color256(221);
        println!("{}", head.apply_to(format!("┌─ {title}")));
        for (key, value) in rows {
            println!(
                "│ {}  {}",
                key_style.apply_to(format!("{key:<key_width$}")),
                value
            );
        }
        println!("{}", head.apply_to("└─"));
    }

    fn emit(&self, level: &str, msg: &str, style: Style, lead: &str) {
        self.record(level, msg);
        if !self.quiet {
            println!("{}{}", lead, style.apply_to(msg));
        }
    }

    fn record(&self, level: &str, msg: &str) {
        if let Some(log) = &self.log {
            log.append(level, msg);
        }
        if let Some(captured) = &self.captured {
            if let Ok(mut lines) = captured.lock() {
                lines.push(format!("{level}: {msg}"));
            }
        }
    }
}
