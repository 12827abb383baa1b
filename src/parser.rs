//! Model-response parsing: tool-call framing, thinking regions, bare JSON.
//!
//! Local models emit tool invocations inline with their text, framed as
//!
//! ```text
//! <tool_call>{"name": "...", "arguments": {...}}</tool_call>
//! ```
//!
//! with reasoning optionally wrapped in `<think>`/`<thinking>` tags, and —
//! from weaker models — sometimes as a *bare* JSON object with `"name"` and
//! `"arguments"` fields and no framing at all. This module recovers the
//! structure both ways:
//!
//! - [`parse_response`] works on the complete response buffer and produces
//!   an ordered list of [`Segment`]s over arena-backed values.
//! - [`StreamingParser`] classifies a token stream as it arrives so the
//!   orchestrator can suppress tool-call bytes from the UI and flag the
//!   thinking state early.

use crate::arena::Arena;
use crate::json::{self, Value};

const TAG_TOOL_OPEN: &str = "<tool_call>";
const TAG_TOOL_CLOSE: &str = "</tool_call>";
const TAG_THINK_OPEN: &str = "<think>";
const TAG_THINK_CLOSE: &str = "</think>";
const TAG_THINKING_OPEN: &str = "<thinking>";
const TAG_THINKING_CLOSE: &str = "</thinking>";

/// Longest byte length a pending `<...>` opener may reach before the
/// streaming parser gives up on it and reclassifies it as text.
const MAX_TAG_LEN: usize = 16;

/// A tool invocation recovered from the response.
#[derive(Debug, Clone, Copy)]
pub struct ParsedToolCall<'a> {
    /// Tool name from the `"name"` field.
    pub name: &'a str,
    /// Argument object; an absent `"arguments"` field yields an empty one.
    pub arguments: Value<'a>,
    /// The raw JSON span the call was parsed from.
    pub raw: &'a str,
}

/// One unit of parsed model output, in buffer order.
#[derive(Debug, Clone, Copy)]
pub enum Segment<'a> {
    /// Plain text, trimmed of ASCII whitespace.
    Text(&'a str),
    /// A tool invocation.
    ToolCall(ParsedToolCall<'a>),
    /// Reasoning content from a `<think>`/`<thinking>` region.
    Thinking(&'a str),
}

/// True iff the response contains a complete `<tool_call>...</tool_call>`.
pub fn has_tool_call(response: &str) -> bool {
    match response.find(TAG_TOOL_OPEN) {
        Some(open) => response[open..].contains(TAG_TOOL_CLOSE),
        None => false,
    }
}

/// True iff a `<tool_call>` opener is present with no closer after it.
///
/// The orchestrator uses this on the accumulating response to enter the
/// thinking state and stop forwarding tokens.
pub fn has_incomplete_tool_call(response: &str) -> bool {
    match response.find(TAG_TOOL_OPEN) {
        Some(open) => !response[open..].contains(TAG_TOOL_CLOSE),
        None => false,
    }
}

/// Parse the JSON payload of a tool call.
///
/// Requires an object with a string `"name"`; a missing `"arguments"`
/// defaults to an empty object. Anything else yields `None`.
fn parse_tool_call_json<'a>(arena: &'a Arena, json_text: &str) -> Option<ParsedToolCall<'a>> {
    let value = json::parse(arena, json_text).ok()?;
    if !value.is_object() {
        return None;
    }
    let name = value.get("name")?.as_str()?;
    let arguments = value.get("arguments").unwrap_or(Value::Object(&[]));
    Some(ParsedToolCall {
        name,
        arguments,
        raw: arena.alloc_str(json_text),
    })
}

/// Index of the `}` matching the `{` at `text[0]`, respecting string
/// literals and backslash escapes.
fn find_matching_brace(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.first() != Some(&b'{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;
    for (i, &b) in bytes.iter().enumerate() {
        if escape {
            escape = false;
            continue;
        }
        match b {
            b'\\' if in_string => escape = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Locate a bare JSON tool call in `text`.
///
/// Heuristic: find the literal `"name"`, walk backward over whitespace to
/// an opening `{` (any other character between them rejects the candidate —
/// this keeps prose that merely mentions "name" from being eaten), match
/// the closing brace, and require a literal `"arguments"` inside the span.
///
/// Returns the byte range of the JSON span and the parsed call.
fn find_bare_json<'a>(
    arena: &'a Arena,
    text: &str,
) -> Option<(usize, usize, ParsedToolCall<'a>)> {
    let name_idx = text.find("\"name\"")?;
    let bytes = text.as_bytes();

    let mut json_start = None;
    let mut i = name_idx;
    while i > 0 {
        i -= 1;
        match bytes[i] {
            b'{' => {
                json_start = Some(i);
                break;
            }
            b' ' | b'\t' | b'\n' | b'\r' => continue,
            _ => break,
        }
    }
    let start = json_start?;

    let end = start + find_matching_brace(&text[start..])?;
    let json_text = &text[start..=end];
    if !json_text.contains("\"arguments\"") {
        return None;
    }

    let tc = parse_tool_call_json(arena, json_text)?;
    Some((start, end + 1, tc))
}

fn push_text<'a>(arena: &'a Arena, segments: &mut Vec<Segment<'a>>, text: &str) {
    let trimmed = text.trim_matches(|c: char| c.is_ascii_whitespace());
    if !trimmed.is_empty() {
        segments.push(Segment::Text(arena.alloc_str(trimmed)));
    }
}

/// Parse a complete response into an ordered segment list.
///
/// Scans left-to-right for `<tool_call>` framings; the text between them is
/// emitted trimmed. A `<tool_call>` with no closing tag **drops** the
/// trailing region rather than emitting it as text, which keeps
/// half-generated tool calls out of transcripts. When the
/// tail carries no framing at all, the bare-JSON detector runs on it. A
/// final pass splits `<think>`/`<thinking>` regions out of text segments;
/// a lone closing tag (the opener having been consumed by the prompt) makes
/// everything before it the thinking region.
///
/// Empty segments are never emitted.
pub fn parse_response<'a>(arena: &'a Arena, response: &str) -> Vec<Segment<'a>> {
    let mut segments = Vec::new();
    if response.is_empty() {
        return segments;
    }

    let mut pos = 0;
    while pos < response.len() {
        let tail = &response[pos..];
        let Some(open) = tail.find(TAG_TOOL_OPEN) else {
            // No more framed calls; the tail may still hold a bare one.
            if let Some((start, end, tc)) = find_bare_json(arena, tail) {
                log::debug!("bare JSON tool call detected: {}", tc.name);
                push_text(arena, &mut segments, &tail[..start]);
                segments.push(Segment::ToolCall(tc));
                push_text(arena, &mut segments, &tail[end..]);
            } else {
                push_text(arena, &mut segments, tail);
            }
            break;
        };

        push_text(arena, &mut segments, &tail[..open]);

        let content_start = open + TAG_TOOL_OPEN.len();
        let content_tail = &tail[content_start..];
        let Some(close) = content_tail.find(TAG_TOOL_CLOSE) else {
            // Unterminated framing: the region is dropped.
            log::debug!("unterminated <tool_call>; dropping trailing region");
            break;
        };

        if let Some(tc) = parse_tool_call_json(arena, &content_tail[..close]) {
            segments.push(Segment::ToolCall(tc));
        }
        pos += content_start + close + TAG_TOOL_CLOSE.len();
    }

    apply_thinking_pass(arena, &mut segments);
    segments
}

/// Split the first thinking region out of `text`.
///
/// Returns `(thinking, remainder)` when a non-empty region is present;
/// `None` leaves the segment untouched.
fn extract_thinking<'a>(arena: &'a Arena, text: &str) -> Option<(&'a str, &'a str)> {
    let trim = |s: &str| -> String {
        s.trim_matches(|c: char| c.is_ascii_whitespace()).to_string()
    };

    // <think> is preferred over <thinking> when both appear.
    let mut found = text
        .find(TAG_THINK_OPEN)
        .map(|open| (open, TAG_THINK_OPEN.len(), TAG_THINK_CLOSE));
    if found.is_none() {
        found = text
            .find(TAG_THINKING_OPEN)
            .map(|open| (open, TAG_THINKING_OPEN.len(), TAG_THINKING_CLOSE));
    }

    if let Some((open, open_len, close_tag)) = found {
        let body_start = open + open_len;
        let close = text[body_start..].find(close_tag)?;
        let thinking = trim(&text[body_start..body_start + close]);
        if thinking.is_empty() {
            return None;
        }
        let mut remainder = String::new();
        remainder.push_str(&text[..open]);
        remainder.push_str(&text[body_start + close + close_tag.len()..]);
        let remainder = trim(&remainder);
        return Some((arena.alloc_str(&thinking), arena.alloc_str(&remainder)));
    }

    // Closing tag with no opener: the opener sat in the prompt, so the
    // whole prefix is the thinking region.
    let (close, close_len) = match text.find(TAG_THINK_CLOSE) {
        Some(idx) => (idx, TAG_THINK_CLOSE.len()),
        None => match text.find(TAG_THINKING_CLOSE) {
            Some(idx) => (idx, TAG_THINKING_CLOSE.len()),
            None => return None,
        },
    };
    let thinking = trim(&text[..close]);
    if thinking.is_empty() {
        return None;
    }
    let remainder = trim(&text[close + close_len..]);
    Some((arena.alloc_str(&thinking), arena.alloc_str(&remainder)))
}

fn apply_thinking_pass<'a>(arena: &'a Arena, segments: &mut Vec<Segment<'a>>) {
    let mut i = 0;
    while i < segments.len() {
        if let Segment::Text(text) = segments[i] {
            if let Some((thinking, remainder)) = extract_thinking(arena, text) {
                segments[i] = Segment::Thinking(thinking);
                if !remainder.is_empty() {
                    segments.insert(i + 1, Segment::Text(remainder));
                    i += 1;
                }
            }
        }
        i += 1;
    }
}

// ============================================================================
// STREAMING PARSER
// ============================================================================

/// Event produced by [`StreamingParser::feed`]; owned so events outlive the
/// parser's internal buffers.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Plain text, delivered promptly (not trimmed).
    Text(String),
    /// The body of a closed `<think>`/`<thinking>` region.
    Thinking(String),
    /// A complete, well-formed tool call.
    ToolCall {
        /// Tool name from the `"name"` field.
        name: String,
        /// Argument object (empty object when absent).
        arguments: serde_json::Value,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    TagOpen,
    ToolCall,
    Think,
}

/// Incremental classifier over a token stream.
///
/// Feed chunks as they arrive; text is flushed at every `feed` return so
/// downstream UI sees characters promptly, while bytes inside a recognized
/// framing are withheld until the framing closes. Chunks arrive as `&str`,
/// so scalar integrity is guaranteed by construction; hosts slicing raw
/// bytes must cut on [`crate::utils::utf8_complete_boundary`] first.
///
/// ```
/// use agent_loop::{StreamingParser, StreamEvent};
///
/// let mut parser = StreamingParser::new();
/// let mut events = parser.feed("Hello <tool_call>{\"name\":\"t\",");
/// assert_eq!(events, vec![StreamEvent::Text("Hello ".into())]);
/// assert!(parser.in_tool_call());
/// events = parser.feed("\"arguments\":{}}</tool_call>");
/// assert!(matches!(&events[0], StreamEvent::ToolCall { name, .. } if name == "t"));
/// assert!(!parser.in_tool_call());
/// ```
#[derive(Debug)]
pub struct StreamingParser {
    state: State,
    text_buf: String,
    tag_buf: String,
    content_buf: String,
}

impl Default for StreamingParser {
    fn default() -> Self {
        StreamingParser::new()
    }
}

impl StreamingParser {
    /// Parser in the initial text state.
    pub fn new() -> Self {
        StreamingParser {
            state: State::Text,
            text_buf: String::new(),
            tag_buf: String::new(),
            content_buf: String::new(),
        }
    }

    /// Drop all buffered state and return to the text state.
    pub fn reset(&mut self) {
        self.state = State::Text;
        self.text_buf.clear();
        self.tag_buf.clear();
        self.content_buf.clear();
    }

    /// True iff the parser is currently inside a `<tool_call>` framing.
    pub fn in_tool_call(&self) -> bool {
        self.state == State::ToolCall
    }

    /// Consume one chunk and return the events it completed.
    pub fn feed(&mut self, chunk: &str) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        for c in chunk.chars() {
            match self.state {
                State::Text => {
                    if c == '<' {
                        self.state = State::TagOpen;
                        self.tag_buf.clear();
                        self.tag_buf.push('<');
                    } else {
                        self.text_buf.push(c);
                    }
                }
                State::TagOpen => {
                    self.tag_buf.push(c);
                    if c == '>' {
                        match self.tag_buf.as_str() {
                            TAG_TOOL_OPEN => {
                                self.flush_text(&mut events);
                                self.state = State::ToolCall;
                                self.content_buf.clear();
                            }
                            TAG_THINK_OPEN | TAG_THINKING_OPEN => {
                                self.flush_text(&mut events);
                                self.state = State::Think;
                                self.content_buf.clear();
                            }
                            _ => {
                                // Unknown tag: reclassify as literal text.
                                self.text_buf.push_str(&self.tag_buf);
                                self.state = State::Text;
                            }
                        }
                        self.tag_buf.clear();
                    } else if self.tag_buf.len() > MAX_TAG_LEN {
                        self.text_buf.push_str(&self.tag_buf);
                        self.tag_buf.clear();
                        self.state = State::Text;
                    }
                }
                State::ToolCall => {
                    self.content_buf.push(c);
                    if self.content_buf.ends_with(TAG_TOOL_CLOSE) {
                        let json_len = self.content_buf.len() - TAG_TOOL_CLOSE.len();
                        let arena = Arena::new();
                        if let Some(tc) = parse_tool_call_json(&arena, &self.content_buf[..json_len])
                        {
                            log::debug!("streaming tool call: {}", tc.name);
                            events.push(StreamEvent::ToolCall {
                                name: tc.name.to_string(),
                                arguments: tc.arguments.to_json(),
                            });
                        }
                        self.content_buf.clear();
                        self.state = State::Text;
                    }
                }
                State::Think => {
                    self.content_buf.push(c);
                    let closed = if self.content_buf.ends_with(TAG_THINK_CLOSE) {
                        Some(TAG_THINK_CLOSE.len())
                    } else if self.content_buf.ends_with(TAG_THINKING_CLOSE) {
                        Some(TAG_THINKING_CLOSE.len())
                    } else {
                        None
                    };
                    if let Some(close_len) = closed {
                        let body_len = self.content_buf.len() - close_len;
                        events.push(StreamEvent::Thinking(
                            self.content_buf[..body_len].to_string(),
                        ));
                        self.content_buf.clear();
                        self.state = State::Text;
                    }
                }
            }
        }

        if self.state == State::Text {
            self.flush_text(&mut events);
        }
        events
    }

    /// Deliver remaining buffered text, including a pending `tag_buf` that
    /// turned out not to be a tag. Call once after the stream ends.
    pub fn flush(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        self.flush_text(&mut events);
        if !self.tag_buf.is_empty() {
            events.push(StreamEvent::Text(std::mem::take(&mut self.tag_buf)));
        }
        events
    }

    fn flush_text(&mut self, events: &mut Vec<StreamEvent>) {
        if !self.text_buf.is_empty() {
            events.push(StreamEvent::Text(std::mem::take(&mut self.text_buf)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts<'a>(segments: &[Segment<'a>]) -> Vec<&'a str> {
        segments
            .iter()
            .filter_map(|s| match s {
                Segment::Text(t) => Some(*t),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_has_tool_call() {
        assert!(has_tool_call("<tool_call>{}</tool_call>"));
        assert!(!has_tool_call("<tool_call>{"));
        assert!(!has_tool_call("plain text"));
        assert!(has_incomplete_tool_call("a <tool_call>{\"na"));
        assert!(!has_incomplete_tool_call("<tool_call>{}</tool_call>"));
    }

    #[test]
    fn test_matching_brace() {
        assert_eq!(find_matching_brace("{}"), Some(1));
        assert_eq!(find_matching_brace(r#"{"a":{"b":1}}"#), Some(12));
        assert_eq!(find_matching_brace(r#"{"s":"}"}"#), Some(8));
        assert_eq!(find_matching_brace(r#"{"s":"\"}"}"#), Some(10));
        assert_eq!(find_matching_brace("{unclosed"), None);
        assert_eq!(find_matching_brace("no brace"), None);
    }

    #[test]
    fn test_plain_text_response() {
        let arena = Arena::new();
        let segments = parse_response(&arena, "  Hello! How can I help you?  ");
        assert_eq!(segments.len(), 1);
        assert!(matches!(segments[0], Segment::Text("Hello! How can I help you?")));
    }

    #[test]
    fn test_framed_tool_call_with_text() {
        let arena = Arena::new();
        let segments = parse_response(
            &arena,
            "Let me check. <tool_call>{\"name\":\"lookup\",\"arguments\":{\"q\":\"x\"}}</tool_call> Done.",
        );
        assert_eq!(segments.len(), 3);
        assert!(matches!(segments[0], Segment::Text("Let me check.")));
        match &segments[1] {
            Segment::ToolCall(tc) => {
                assert_eq!(tc.name, "lookup");
                assert_eq!(
                    tc.arguments.get("q").and_then(|v| v.as_str()),
                    Some("x")
                );
            }
            other => panic!("Expected tool call, got {other:?}"),
        }
        assert!(matches!(segments[2], Segment::Text("Done.")));
    }

    #[test]
    fn test_multiple_tool_calls() {
        let arena = Arena::new();
        let segments = parse_response(
            &arena,
            "<tool_call>{\"name\":\"a\",\"arguments\":{}}</tool_call>\n<tool_call>{\"name\":\"b\",\"arguments\":{}}</tool_call>",
        );
        let names: Vec<_> = segments
            .iter()
            .filter_map(|s| match s {
                Segment::ToolCall(tc) => Some(tc.name),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_missing_arguments_defaults_to_empty_object() {
        let arena = Arena::new();
        let segments = parse_response(&arena, "<tool_call>{\"name\":\"t\"}</tool_call>");
        match &segments[0] {
            Segment::ToolCall(tc) => {
                assert!(tc.arguments.is_object());
                assert_eq!(tc.arguments.len(), 0);
            }
            other => panic!("Expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_tool_call_drops_tail() {
        let arena = Arena::new();
        let segments = parse_response(&arena, "before <tool_call>{\"name\":\"t\"");
        assert_eq!(segments.len(), 1);
        assert!(matches!(segments[0], Segment::Text("before")));
    }

    #[test]
    fn test_malformed_json_in_framing_skipped() {
        let arena = Arena::new();
        let segments = parse_response(&arena, "a <tool_call>not json</tool_call> b");
        assert_eq!(texts(&segments), vec!["a", "b"]);
    }

    #[test]
    fn test_bare_json_detection() {
        let arena = Arena::new();
        let segments = parse_response(
            &arena,
            "prefix {\"name\":\"t\",\"arguments\":{\"x\":1}} suffix",
        );
        assert_eq!(segments.len(), 3);
        assert!(matches!(segments[0], Segment::Text("prefix")));
        match &segments[1] {
            Segment::ToolCall(tc) => {
                assert_eq!(tc.name, "t");
                assert_eq!(tc.arguments.get("x").and_then(|v| v.get_int()), Some(1));
            }
            other => panic!("Expected tool call, got {other:?}"),
        }
        assert!(matches!(segments[2], Segment::Text("suffix")));
    }

    #[test]
    fn test_bare_json_rejected_when_name_not_first() {
        // Non-whitespace between '{' and "name" rejects the candidate.
        let arena = Arena::new();
        let segments = parse_response(
            &arena,
            "{\"other\":1,\"name\":\"t\",\"arguments\":{}}",
        );
        assert_eq!(segments.len(), 1);
        assert!(matches!(segments[0], Segment::Text(_)));
    }

    #[test]
    fn test_bare_json_requires_arguments() {
        let arena = Arena::new();
        let segments = parse_response(&arena, "{\"name\":\"t\"} trailing");
        assert!(segments.iter().all(|s| matches!(s, Segment::Text(_))));
    }

    #[test]
    fn test_thinking_extraction() {
        let arena = Arena::new();
        let segments = parse_response(&arena, "<think>reason</think>answer");
        assert_eq!(segments.len(), 2);
        assert!(matches!(segments[0], Segment::Thinking("reason")));
        assert!(matches!(segments[1], Segment::Text("answer")));
    }

    #[test]
    fn test_thinking_long_form_tag() {
        let arena = Arena::new();
        let segments = parse_response(&arena, "<thinking>hmm</thinking>ok");
        assert!(matches!(segments[0], Segment::Thinking("hmm")));
        assert!(matches!(segments[1], Segment::Text("ok")));
    }

    #[test]
    fn test_closing_tag_only_thinking() {
        // The opener was in the prompt, so the model only emits the closer.
        let arena = Arena::new();
        let segments = parse_response(&arena, "all of this is reasoning</think>the answer");
        assert_eq!(segments.len(), 2);
        assert!(matches!(
            segments[0],
            Segment::Thinking("all of this is reasoning")
        ));
        assert!(matches!(segments[1], Segment::Text("the answer")));
    }

    #[test]
    fn test_thinking_without_remainder() {
        let arena = Arena::new();
        let segments = parse_response(&arena, "<think>only reasoning</think>");
        assert_eq!(segments.len(), 1);
        assert!(matches!(segments[0], Segment::Thinking("only reasoning")));
    }

    #[test]
    fn test_thinking_before_tool_call() {
        let arena = Arena::new();
        let segments = parse_response(
            &arena,
            "<think>plan</think>calling now <tool_call>{\"name\":\"t\",\"arguments\":{}}</tool_call>",
        );
        assert!(matches!(segments[0], Segment::Thinking("plan")));
        assert!(matches!(segments[1], Segment::Text("calling now")));
        assert!(matches!(segments[2], Segment::ToolCall(_)));
    }

    #[test]
    fn test_empty_response() {
        let arena = Arena::new();
        assert!(parse_response(&arena, "").is_empty());
        assert!(parse_response(&arena, "   \n\t ").is_empty());
    }

    // --- streaming ---

    #[test]
    fn test_streaming_plain_text() {
        let mut parser = StreamingParser::new();
        let events = parser.feed("hello world");
        assert_eq!(events, vec![StreamEvent::Text("hello world".into())]);
        assert!(parser.flush().is_empty());
    }

    #[test]
    fn test_streaming_scenario_chunks() {
        let mut parser = StreamingParser::new();

        let e1 = parser.feed("Text <tool");
        assert_eq!(e1, vec![]);
        assert!(!parser.in_tool_call());

        let e2 = parser.feed("_call>{\"name");
        assert_eq!(e2, vec![StreamEvent::Text("Text ".into())]);
        assert!(parser.in_tool_call());

        let e3 = parser.feed("\":\"t\",\"arguments\":{}}</tool_call>");
        assert_eq!(e3.len(), 1);
        match &e3[0] {
            StreamEvent::ToolCall { name, arguments } => {
                assert_eq!(name, "t");
                assert_eq!(arguments, &serde_json::json!({}));
            }
            other => panic!("Expected tool call event, got {other:?}"),
        }
        assert!(!parser.in_tool_call());
    }

    #[test]
    fn test_streaming_thinking() {
        let mut parser = StreamingParser::new();
        let mut events = parser.feed("<think>because");
        assert!(events.is_empty());
        events = parser.feed("</think>done");
        assert_eq!(
            events,
            vec![
                StreamEvent::Thinking("because".into()),
                StreamEvent::Text("done".into()),
            ]
        );
    }

    #[test]
    fn test_streaming_unknown_tag_is_text() {
        let mut parser = StreamingParser::new();
        let events = parser.feed("a <b> c");
        let joined: String = events
            .iter()
            .map(|e| match e {
                StreamEvent::Text(t) => t.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(joined, "a <b> c");
    }

    #[test]
    fn test_streaming_overlong_tag_reverts_to_text() {
        let mut parser = StreamingParser::new();
        let mut collected = String::new();
        for e in parser.feed("x <this_is_not_a_recognized_tag y") {
            if let StreamEvent::Text(t) = e {
                collected.push_str(&t);
            }
        }
        for e in parser.flush() {
            if let StreamEvent::Text(t) = e {
                collected.push_str(&t);
            }
        }
        assert_eq!(collected, "x <this_is_not_a_recognized_tag y");
    }

    #[test]
    fn test_streaming_flush_pending_tag() {
        let mut parser = StreamingParser::new();
        let events = parser.feed("ends with <tool_ca");
        assert_eq!(events, vec![]);
        let flushed = parser.flush();
        assert_eq!(
            flushed,
            vec![
                StreamEvent::Text("ends with ".into()),
                StreamEvent::Text("<tool_ca".into()),
            ]
        );
    }

    #[test]
    fn test_streaming_reset() {
        let mut parser = StreamingParser::new();
        parser.feed("<tool_call>{\"name\"");
        assert!(parser.in_tool_call());
        parser.reset();
        assert!(!parser.in_tool_call());
        assert!(parser.flush().is_empty());
    }

    #[test]
    fn test_streaming_matches_batch_over_chunkings() {
        let response =
            "intro <think>plan</think> mid <tool_call>{\"name\":\"t\",\"arguments\":{\"x\":1}}</tool_call> outro";
        let arena = Arena::new();
        let batch = parse_response(&arena, response);

        for chunk_size in [1, 2, 3, 5, 7, 11, response.len()] {
            let mut parser = StreamingParser::new();
            let mut events = Vec::new();
            let chars: Vec<char> = response.chars().collect();
            for chunk in chars.chunks(chunk_size) {
                let s: String = chunk.iter().collect();
                events.extend(parser.feed(&s));
            }
            events.extend(parser.flush());

            let stream_text: String = events
                .iter()
                .filter_map(|e| match e {
                    StreamEvent::Text(t) => Some(t.as_str()),
                    _ => None,
                })
                .collect();
            let stream_tools: Vec<String> = events
                .iter()
                .filter_map(|e| match e {
                    StreamEvent::ToolCall { name, .. } => Some(name.clone()),
                    _ => None,
                })
                .collect();
            let stream_thinking: String = events
                .iter()
                .filter_map(|e| match e {
                    StreamEvent::Thinking(t) => Some(t.as_str()),
                    _ => None,
                })
                .collect();

            let batch_tools: Vec<String> = batch
                .iter()
                .filter_map(|s| match s {
                    Segment::ToolCall(tc) => Some(tc.name.to_string()),
                    _ => None,
                })
                .collect();

            assert_eq!(stream_tools, batch_tools, "chunk_size={chunk_size}");
            assert_eq!(stream_thinking.trim(), "plan", "chunk_size={chunk_size}");
            let normalized: Vec<&str> = stream_text.split_whitespace().collect();
            assert_eq!(normalized, vec!["intro", "mid", "outro"], "chunk_size={chunk_size}");
        }
    }
}
