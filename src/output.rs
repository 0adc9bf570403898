// ABOUTME: CLI feedback in human, quiet, or JSON-lines form.
// ABOUTME: Results go to stdout so `productionapp deploy -q` can be captured as a URL.

use serde::Serialize;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Progress lines, results and timings
    Normal,
    /// Results only
    Quiet,
    /// One JSON object per line
    Json,
}

impl OutputMode {
    /// `--json` wins over `--quiet`.
    pub fn from_flags(quiet: bool, json: bool) -> Self {
        match (json, quiet) {
            (true, _) => OutputMode::Json,
            (false, true) => OutputMode::Quiet,
            (false, false) => OutputMode::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

#[derive(Serialize)]
struct JsonEvent<'a, T: Serialize> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

pub struct Output {
    mode: OutputMode,
    started: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            started: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn start_timer(&mut self) {
        self.started = Some(Instant::now());
    }

    fn elapsed(&self) -> Option<f64> {
        self.started.map(|t| t.elapsed().as_secs_f64())
    }

    fn write(stream: Stream, line: &str) {
        match stream {
            Stream::Stdout => println!("{line}"),
            Stream::Stderr => eprintln!("{line}"),
        }
    }

    fn emit_json<T: Serialize>(&self, stream: Stream, event: &str, message: &str, data: Option<T>) {
        let event = JsonEvent {
            event,
            message,
            duration_secs: self.elapsed(),
            data,
        };
        match serde_json::to_string(&event) {
            Ok(json) => Self::write(stream, &json),
            Err(e) => tracing::debug!(error = %e, "could not encode output event"),
        }
    }

    /// Intermediate step; only shown in normal mode.
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            Self::write(Stream::Stdout, message);
        }
    }

    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => Self::write(Stream::Stderr, &format!("Warning: {message}")),
            OutputMode::Quiet => {}
            OutputMode::Json => self.emit_json::<()>(Stream::Stderr, "warning", message, None),
        }
    }

    /// Closing line of a command, with the elapsed time when a timer runs.
    pub fn success(&self, message: &str) {
        match (self.mode, self.elapsed()) {
            (OutputMode::Normal, Some(secs)) => {
                Self::write(Stream::Stdout, &format!("{message} ({secs:.1}s)"))
            }
            (OutputMode::Normal | OutputMode::Quiet, _) => Self::write(Stream::Stdout, message),
            (OutputMode::Json, _) => self.emit_json::<()>(Stream::Stdout, "success", message, None),
        }
    }

    /// The value a command produces: `human` as a bare line, or `data` in a JSON event.
    pub fn result<T: Serialize>(&self, human: &str, data: &T) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => Self::write(Stream::Stdout, human),
            OutputMode::Json => self.emit_json(Stream::Stdout, "result", human, Some(data)),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Json => self.emit_json::<()>(Stream::Stderr, "error", message, None),
            _ => Self::write(Stream::Stderr, &format!("Error: {message}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_wins_over_quiet() {
        assert_eq!(OutputMode::from_flags(true, true), OutputMode::Json);
        assert_eq!(OutputMode::from_flags(true, false), OutputMode::Quiet);
        assert_eq!(OutputMode::from_flags(false, false), OutputMode::Normal);
    }

    #[test]
    fn json_event_omits_empty_fields() {
        let event = JsonEvent {
            event: "success",
            message: "done",
            duration_secs: None,
            data: None::<()>,
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"event":"success","message":"done"}"#
        );
    }

    #[test]
    fn timer_is_off_until_started() {
        let mut output = Output::new(OutputMode::Quiet);
        assert!(output.elapsed().is_none());
        output.start_timer();
        assert!(output.elapsed().is_some());
    }
}
