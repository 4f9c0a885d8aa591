//! Approval gates: who decides whether a proposed edit is applied.
//!
//! A gate sees one [`ReviewRequest`] at a time and answers with a
//! [`GateResponse`]. Gates never touch the document or the decision log;
//! the session turns their verdicts into decisions.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use docfix_edit::atomic_write;
use docfix_render::render_review_prompt;
use docfix_types::review::{GateResponse, ReviewRequest};
use std::io::{BufRead, Write};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub trait ApprovalGate {
    /// Decide one offer. An `Err` is a failure of the gate itself and ends
    /// the session; a "no" is `Ok` with a reject verdict.
    fn decide(&mut self, request: &ReviewRequest) -> anyhow::Result<GateResponse>;
}

impl<G: ApprovalGate + ?Sized> ApprovalGate for &mut G {
    fn decide(&mut self, request: &ReviewRequest) -> anyhow::Result<GateResponse> {
        (**self).decide(request)
    }
}

/// Answers without asking anyone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SilentGate {
    ApproveAll,
    RejectAll,
    /// Approve when the issue's confidence (1.0 when unreported) reaches the
    /// threshold.
    ConfidenceThreshold(f64),
}

impl ApprovalGate for SilentGate {
    fn decide(&mut self, request: &ReviewRequest) -> anyhow::Result<GateResponse> {
        Ok(match *self {
            SilentGate::ApproveAll => GateResponse::approve(),
            SilentGate::RejectAll => GateResponse::reject(),
            SilentGate::ConfidenceThreshold(threshold) => {
                let confidence = request.issue.confidence.unwrap_or(1.0);
                if confidence >= threshold {
                    GateResponse::approve()
                } else {
                    GateResponse::reject()
                        .with_explanation(format!("confidence {confidence:.2} below {threshold:.2}"))
                }
            }
        })
    }
}

/// Prompts on `output` and reads one answer line per offer from `input`.
pub struct InteractiveGate<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> InteractiveGate<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }
}

impl InteractiveGate<std::io::StdinLock<'static>, std::io::Stderr> {
    /// Prompt on stderr so stdout stays free for reports.
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stderr())
    }
}

enum Answer {
    Approve,
    Reject,
    Defer,
}

fn parse_answer(line: &str) -> Option<(Answer, String)> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let answer = match word.to_ascii_lowercase().as_str() {
        "y" | "yes" => Answer::Approve,
        "n" | "no" => Answer::Reject,
        "d" | "defer" => Answer::Defer,
        _ => return None,
    };
    Some((answer, rest.trim().to_string()))
}

impl<R: BufRead, W: Write> ApprovalGate for InteractiveGate<R, W> {
    fn decide(&mut self, request: &ReviewRequest) -> anyhow::Result<GateResponse> {
        self.output
            .write_all(render_review_prompt(request).as_bytes())
            .context("write review prompt")?;

        loop {
            self.output.flush().context("flush review prompt")?;
            let mut line = String::new();
            let read = self.input.read_line(&mut line).context("read answer")?;
            if read == 0 {
                return Ok(GateResponse::reject().with_explanation("no input"));
            }

            match parse_answer(&line) {
                Some((answer, note)) => {
                    let response = match answer {
                        Answer::Approve => GateResponse::approve(),
                        Answer::Reject => GateResponse::reject(),
                        Answer::Defer => GateResponse::defer(),
                    };
                    return Ok(response.with_explanation(note));
                }
                None => {
                    self.output
                        .write_all(b"Please answer y, n or d: ")
                        .context("write re-prompt")?;
                }
            }
        }
    }
}

/// Somewhere outside the process that can answer review requests.
pub trait ApprovalSurface {
    /// Post `request` and wait up to `timeout` for an answer. `Ok(None)`
    /// means nobody answered in time.
    fn ask(
        &mut self,
        request: &ReviewRequest,
        timeout: Duration,
    ) -> anyhow::Result<Option<GateResponse>>;
}

/// Hands each request to an [`ApprovalSurface`] and turns silence into a
/// timeout verdict.
#[derive(Debug)]
pub struct DelegatedGate<S> {
    surface: S,
    timeout: Duration,
}

impl<S: ApprovalSurface> DelegatedGate<S> {
    pub fn new(surface: S, timeout: Duration) -> Self {
        Self { surface, timeout }
    }
}

impl<S: ApprovalSurface> ApprovalGate for DelegatedGate<S> {
    fn decide(&mut self, request: &ReviewRequest) -> anyhow::Result<GateResponse> {
        match self.surface.ask(request, self.timeout)? {
            Some(response) => Ok(response),
            None => {
                debug!(id = %request.id, timeout_ms = self.timeout.as_millis() as u64, "review timed out");
                Ok(GateResponse::timed_out())
            }
        }
    }
}

/// A request in flight on a [`ChannelSurface`].
#[derive(Debug)]
pub struct ReviewTicket {
    pub request: ReviewRequest,
    reply: Sender<GateResponse>,
}

impl ReviewTicket {
    /// Answer the request. Returns `false` when the session stopped waiting.
    pub fn respond(self, response: GateResponse) -> bool {
        self.reply.try_send(response).is_ok()
    }
}

/// In-process surface: requests go out on a channel, each with its own
/// single-slot reply channel.
#[derive(Debug, Clone)]
pub struct ChannelSurface {
    requests: Sender<ReviewTicket>,
}

impl ChannelSurface {
    /// The surface plus the receiving end a reviewer thread listens on.
    pub fn new() -> (Self, Receiver<ReviewTicket>) {
        let (requests, rx) = channel::unbounded();
        (Self { requests }, rx)
    }
}

impl ApprovalSurface for ChannelSurface {
    fn ask(
        &mut self,
        request: &ReviewRequest,
        timeout: Duration,
    ) -> anyhow::Result<Option<GateResponse>> {
        let (reply, answer) = channel::bounded(1);
        self.requests
            .send(ReviewTicket {
                request: request.clone(),
                reply,
            })
            .map_err(|_| anyhow::anyhow!("no reviewer is listening"))?;

        match answer.recv_timeout(timeout) {
            Ok(response) => Ok(Some(response)),
            // A reviewer that drops the ticket never answers.
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => Ok(None),
        }
    }
}

/// Drop-box surface: writes `<id>.request.json` into a directory and polls
/// for `<id>.response.json`.
///
/// Both files are removed once the exchange ends. Responders should write the
/// response atomically; a response that does not parse is retried until the
/// timeout.
#[derive(Debug, Clone)]
pub struct DirectorySurface {
    dir: Utf8PathBuf,
    poll_interval: Duration,
}

impl DirectorySurface {
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            poll_interval: Duration::from_millis(200),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    pub fn request_path(&self, id: &str) -> Utf8PathBuf {
        self.dir.join(format!("{id}.request.json"))
    }

    pub fn response_path(&self, id: &str) -> Utf8PathBuf {
        self.dir.join(format!("{id}.response.json"))
    }

    fn read_response(&self, path: &Utf8Path) -> Option<GateResponse> {
        let raw = fs_err::read_to_string(path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(response) => Some(response),
            Err(e) => {
                warn!(path = %path, error = %e, "ignoring unreadable review response");
                None
            }
        }
    }

    fn cleanup(&self, id: &str) {
        for path in [self.request_path(id), self.response_path(id)] {
            if path.exists()
                && let Err(e) = fs_err::remove_file(&path)
            {
                warn!(path = %path, error = %e, "failed to remove review file");
            }
        }
    }
}

impl ApprovalSurface for DirectorySurface {
    fn ask(
        &mut self,
        request: &ReviewRequest,
        timeout: Duration,
    ) -> anyhow::Result<Option<GateResponse>> {
        fs_err::create_dir_all(&self.dir)
            .with_context(|| format!("create review queue {}", self.dir))?;
        let json = serde_json::to_string_pretty(request).context("serialize review request")?;
        let request_path = self.request_path(&request.id);
        atomic_write(&request_path, &json)?;
        debug!(path = %request_path, "posted review request");

        let response_path = self.response_path(&request.id);
        let deadline = Instant::now() + timeout;
        let answer = loop {
            if let Some(response) = self.read_response(&response_path) {
                break Some(response);
            }
            let now = Instant::now();
            if now >= deadline {
                break None;
            }
            std::thread::sleep(self.poll_interval.min(deadline - now));
        };

        self.cleanup(&request.id);
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docfix_types::issue::IssueDraft;
    use docfix_types::review::{ReviewContext, Verdict};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn request(confidence: Option<f64>) -> ReviewRequest {
        let mut draft = IssueDraft::replace(1, "b");
        draft.confidence = confidence;
        ReviewRequest::new(
            "req-1".to_string(),
            "a.md".to_string(),
            draft.into_issue("terms", 1),
            ReviewContext {
                resolved_line: 1,
                current: Some("a".to_string()),
                proposed: Some("b".to_string()),
                surrounding: vec![],
            },
        )
    }

    fn interactive(input: &str) -> (GateResponse, String) {
        let mut gate = InteractiveGate::new(Cursor::new(input.as_bytes().to_vec()), Vec::new());
        let response = gate.decide(&request(None)).expect("decide");
        let (_, output) = gate.into_inner();
        (response, String::from_utf8(output).expect("utf8"))
    }

    #[test]
    fn interactive_reads_verdict_and_note() {
        let (response, output) = interactive("y looks right\n");
        assert_eq!(response.verdict, Verdict::Approve);
        assert_eq!(response.explanation.as_deref(), Some("looks right"));
        assert!(output.contains("- a\n+ b\n"));

        let (response, _) = interactive("NO\n");
        assert_eq!(response.verdict, Verdict::Reject);
        assert_eq!(response.explanation, None);

        let (response, _) = interactive("defer\n");
        assert_eq!(response.verdict, Verdict::Defer);
    }

    #[test]
    fn interactive_reprompts_on_unknown_input() {
        let (response, output) = interactive("maybe\n\nd later\n");
        assert_eq!(response.verdict, Verdict::Defer);
        assert_eq!(response.explanation.as_deref(), Some("later"));
        assert_eq!(output.matches("Please answer y, n or d: ").count(), 2);
    }

    #[test]
    fn interactive_rejects_at_end_of_input() {
        let (response, _) = interactive("");
        assert_eq!(response.verdict, Verdict::Reject);
        assert_eq!(response.explanation.as_deref(), Some("no input"));
    }

    #[test]
    fn threshold_treats_missing_confidence_as_certain() {
        let mut gate = SilentGate::ConfidenceThreshold(0.8);
        assert_eq!(
            gate.decide(&request(None)).expect("decide").verdict,
            Verdict::Approve
        );
        assert_eq!(
            gate.decide(&request(Some(0.8))).expect("decide").verdict,
            Verdict::Approve
        );
        let low = gate.decide(&request(Some(0.5))).expect("decide");
        assert_eq!(low.verdict, Verdict::Reject);
        assert_eq!(low.explanation.as_deref(), Some("confidence 0.50 below 0.80"));
    }

    #[test]
    fn channel_surface_round_trip() {
        let (surface, tickets) = ChannelSurface::new();
        let reviewer = std::thread::spawn(move || {
            let ticket = tickets.recv().expect("ticket");
            assert_eq!(ticket.request.id, "req-1");
            ticket.respond(GateResponse::approve().with_explanation("ok"))
        });

        let mut gate = DelegatedGate::new(surface, Duration::from_secs(5));
        let response = gate.decide(&request(None)).expect("decide");
        assert!(reviewer.join().expect("join"));
        assert_eq!(response.verdict, Verdict::Approve);
        assert_eq!(response.explanation.as_deref(), Some("ok"));
    }

    #[test]
    fn channel_surface_times_out() {
        let (surface, tickets) = ChannelSurface::new();
        let mut gate = DelegatedGate::new(surface, Duration::from_millis(20));
        let response = gate.decide(&request(None)).expect("decide");
        assert_eq!(response.verdict, Verdict::TimedOut);

        // The late answer has nowhere to go.
        let ticket = tickets.try_recv().expect("ticket was posted");
        assert!(!ticket.respond(GateResponse::approve()));
    }

    #[test]
    fn channel_surface_without_reviewer_is_an_error() {
        let (surface, tickets) = ChannelSurface::new();
        drop(tickets);
        let mut gate = DelegatedGate::new(surface, Duration::from_millis(20));
        assert!(gate.decide(&request(None)).is_err());
    }
}
