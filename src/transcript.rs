//! Incrementally maintained transcript of the current derivation log.

use crate::config::Simplification;
use crate::error::SessionError;

pub const TRANSCRIPT_SEPARATOR: char = '\n';

pub fn transcript_header(simplification: Simplification) -> String {
    format!("Simplification: {simplification}\nInitial Density Operator: ")
}

fn append_suffix(body: &mut String, suffix: &str) {
    body.push(TRANSCRIPT_SEPARATOR);
    body.push_str(suffix);
}

fn suffix_after<'a>(log: &'a str, logged_len: usize) -> Result<&'a str, SessionError> {
    log.get(logged_len..).ok_or_else(|| {
        SessionError::internal(format!(
            "Derivation log of {} bytes does not extend the {logged_len} bytes already shown",
            log.len()
        ))
    })
}

/// Renders a chain of cumulative logs (each extending the previous one) the
/// same way [`LogDiffTracker::advance`] does step by step.
pub fn render_chain<'a>(logs: impl IntoIterator<Item = &'a str>) -> Result<String, SessionError> {
    let mut logs = logs.into_iter();
    let Some(first) = logs.next() else {
        return Ok(String::new());
    };
    let mut body = first.to_string();
    let mut previous = first;
    for log in logs {
        if !log.starts_with(previous) {
            return Err(SessionError::internal(
                "Derivation log does not start with the log it was derived from",
            ));
        }
        append_suffix(&mut body, suffix_after(log, previous.len())?);
        previous = log;
    }
    Ok(body)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDiffTracker {
    header: String,
    body: String,
    logged_len: usize,
}

impl LogDiffTracker {
    pub fn new(header: impl Into<String>, initial_log: &str) -> Self {
        Self {
            header: header.into(),
            body: initial_log.to_string(),
            logged_len: initial_log.len(),
        }
    }

    /// Appends the part of `full_log` not shown yet, preceded by the
    /// separator, and returns that appended text.
    pub fn advance(&mut self, full_log: &str) -> Result<String, SessionError> {
        let suffix = suffix_after(full_log, self.logged_len)?;
        let start = self.body.len();
        append_suffix(&mut self.body, suffix);
        self.logged_len = full_log.len();
        Ok(self.body[start..].to_string())
    }

    /// Discards the incremental state and renders the surviving chain of
    /// logs from scratch. Used after undo and clear.
    pub fn rebuild<'a>(
        &mut self,
        logs: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), SessionError> {
        let logs: Vec<&str> = logs.into_iter().collect();
        let body = render_chain(logs.iter().copied())?;
        self.logged_len = logs.last().map(|l| l.len()).unwrap_or(0);
        self.body = body;
        Ok(())
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    /// Transcript without the header.
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn logged_len(&self) -> usize {
        self.logged_len
    }

    /// Header followed by the transcript, as displayed and saved.
    pub fn text(&self) -> String {
        format!("{}{}", self.header, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_format() {
        assert_eq!(
            transcript_header(Simplification::Tr8),
            "Simplification: TR8\nInitial Density Operator: "
        );
    }

    #[test]
    fn test_advance_prefixes_separator_for_bare_suffix() {
        let mut tracker = LogDiffTracker::new("H: ", "Iz");
        let appended = tracker.advance("Iz step1").unwrap();
        assert_eq!(appended, "\n step1");
        assert_eq!(tracker.body(), "Iz\n step1");
        assert_eq!(tracker.logged_len(), "Iz step1".len());
        assert_eq!(tracker.text(), "H: Iz\n step1");
    }

    #[test]
    fn test_advance_always_prefixes_separator() {
        let mut tracker = LogDiffTracker::new("", "Iz");
        let appended = tracker.advance("Iz\nstep1").unwrap();
        assert_eq!(appended, "\n\nstep1");
        tracker.advance("Iz\nstep1\nstep2").unwrap();
        assert_eq!(tracker.body(), "Iz\n\nstep1\n\nstep2");
    }

    #[test]
    fn test_advance_rejects_shorter_log() {
        let mut tracker = LogDiffTracker::new("", "Iz + Sz");
        assert!(tracker.advance("Iz").is_err());
        assert_eq!(tracker.body(), "Iz + Sz");
    }

    #[test]
    fn test_rebuild_matches_incremental_for_both_conventions() {
        for logs in [vec!["Iz", "Iz a", "Iz a b"], vec!["Iz", "Iz\na", "Iz\na\nb"]] {
            let mut tracker = LogDiffTracker::new("", logs[0]);
            for log in &logs[1..] {
                tracker.advance(log).unwrap();
            }
            let incremental = tracker.body().to_string();
            tracker.rebuild(logs.iter().copied()).unwrap();
            assert_eq!(tracker.body(), incremental);
            assert_eq!(render_chain(logs.iter().copied()).unwrap(), incremental);
        }
    }

    #[test]
    fn test_rebuild_after_truncation() {
        let mut tracker = LogDiffTracker::new("", "Iz");
        tracker.advance("Iz\na").unwrap();
        tracker.advance("Iz\na\nb").unwrap();
        tracker.rebuild(["Iz", "Iz\na"]).unwrap();
        assert_eq!(tracker.body(), "Iz\n\na");
        assert_eq!(tracker.logged_len(), 4);
        tracker.advance("Iz\na\nc").unwrap();
        assert_eq!(tracker.body(), "Iz\n\na\n\nc");
    }

    #[test]
    fn test_render_chain_rejects_broken_prefix() {
        assert!(render_chain(["Iz", "Sz\na"]).is_err());
        assert_eq!(render_chain(std::iter::empty::<&str>()).unwrap(), "");
    }
}
