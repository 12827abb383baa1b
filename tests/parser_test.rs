//! Integration tests for the response parser: batch, streaming, and their
//! equivalence over arbitrary chunkings.

use agent_loop::{
    Arena, Segment, StreamEvent, StreamingParser, has_incomplete_tool_call, has_tool_call,
    parse_response,
};

fn tool_names<'a>(segments: &[Segment<'a>]) -> Vec<&'a str> {
    segments
        .iter()
        .filter_map(|s| match s {
            Segment::ToolCall(tc) => Some(tc.name),
            _ => None,
        })
        .collect()
}

fn text_parts<'a>(segments: &[Segment<'a>]) -> Vec<&'a str> {
    segments
        .iter()
        .filter_map(|s| match s {
            Segment::Text(t) => Some(*t),
            _ => None,
        })
        .collect()
}

#[test]
fn test_thinking_then_answer() {
    let arena = Arena::new();
    let segments = parse_response(&arena, "<think>reason</think>answer");
    assert_eq!(segments.len(), 2);
    assert!(matches!(segments[0], Segment::Thinking("reason")));
    assert!(matches!(segments[1], Segment::Text("answer")));
}

#[test]
fn test_bare_json_with_surrounding_text() {
    let arena = Arena::new();
    let segments = parse_response(
        &arena,
        "prefix {\"name\":\"t\",\"arguments\":{\"x\":1}} suffix",
    );
    assert_eq!(text_parts(&segments), vec!["prefix", "suffix"]);
    match &segments[1] {
        Segment::ToolCall(tc) => {
            assert_eq!(tc.name, "t");
            assert_eq!(tc.arguments.get("x").and_then(|v| v.get_int()), Some(1));
        }
        other => panic!("Expected tool call, got {other:?}"),
    }
}

#[test]
fn test_framed_call_takes_priority_over_bare_json() {
    // Framing anywhere in the response disables the bare detector for the
    // framed span; the detector only runs on the tag-free tail.
    let arena = Arena::new();
    let response = "<tool_call>{\"name\":\"framed\",\"arguments\":{}}</tool_call>";
    let segments = parse_response(&arena, response);
    assert_eq!(tool_names(&segments), vec!["framed"]);
}

#[test]
fn test_incomplete_framing_detection() {
    let partial = "answer <tool_call>{\"name\":\"t\"";
    assert!(has_incomplete_tool_call(partial));
    assert!(!has_tool_call(partial));

    let complete = "answer <tool_call>{\"name\":\"t\",\"arguments\":{}}</tool_call>";
    assert!(!has_incomplete_tool_call(complete));
    assert!(has_tool_call(complete));
}

#[test]
fn test_incomplete_framing_drops_tail_in_batch() {
    let arena = Arena::new();
    let segments = parse_response(&arena, "kept text <tool_call>{\"name\":\"t\", but never closed");
    assert_eq!(segments.len(), 1);
    assert!(matches!(segments[0], Segment::Text("kept text")));
}

#[test]
fn test_streaming_scenario_chunks() {
    let mut parser = StreamingParser::new();

    let events1 = parser.feed("Text <tool");
    assert!(events1.is_empty());
    assert!(!parser.in_tool_call());

    let events2 = parser.feed("_call>{\"name");
    assert_eq!(events2, vec![StreamEvent::Text("Text ".into())]);
    assert!(parser.in_tool_call());

    let events3 = parser.feed("\":\"t\",\"arguments\":{}}</tool_call>");
    assert_eq!(events3.len(), 1);
    match &events3[0] {
        StreamEvent::ToolCall { name, arguments } => {
            assert_eq!(name, "t");
            assert_eq!(arguments, &serde_json::json!({}));
        }
        other => panic!("Expected tool-call event, got {other:?}"),
    }
    assert!(!parser.in_tool_call());
}

#[test]
fn test_streaming_equivalence_across_chunkings() {
    let responses = [
        "plain text only",
        "<think>w</think>answer",
        "a <tool_call>{\"name\":\"x\",\"arguments\":{\"k\":\"v\"}}</tool_call> b",
        "first <tool_call>{\"name\":\"one\",\"arguments\":{}}</tool_call> middle \
         <tool_call>{\"name\":\"two\",\"arguments\":{}}</tool_call> last",
        "<thinking>long form</thinking>after",
    ];

    for response in responses {
        let arena = Arena::new();
        let batch = parse_response(&arena, response);
        let batch_tools = tool_names(&batch);
        let batch_text = text_parts(&batch).join(" ");
        let batch_thinking: Vec<&str> = batch
            .iter()
            .filter_map(|s| match s {
                Segment::Thinking(t) => Some(*t),
                _ => None,
            })
            .collect();

        for chunk_size in 1..=8 {
            let mut parser = StreamingParser::new();
            let chars: Vec<char> = response.chars().collect();
            let mut events = Vec::new();
            for chunk in chars.chunks(chunk_size) {
                events.extend(parser.feed(&chunk.iter().collect::<String>()));
            }
            events.extend(parser.flush());

            let stream_tools: Vec<String> = events
                .iter()
                .filter_map(|e| match e {
                    StreamEvent::ToolCall { name, .. } => Some(name.clone()),
                    _ => None,
                })
                .collect();
            assert_eq!(
                stream_tools, batch_tools,
                "tools diverged for {response:?} at chunk size {chunk_size}"
            );

            let stream_text: String = events
                .iter()
                .filter_map(|e| match e {
                    StreamEvent::Text(t) => Some(t.as_str()),
                    _ => None,
                })
                .collect();
            assert_eq!(
                stream_text.split_ascii_whitespace().collect::<Vec<_>>(),
                batch_text.split_ascii_whitespace().collect::<Vec<_>>(),
                "text diverged for {response:?} at chunk size {chunk_size}"
            );

            let stream_thinking: Vec<String> = events
                .iter()
                .filter_map(|e| match e {
                    StreamEvent::Thinking(t) => Some(t.trim().to_string()),
                    _ => None,
                })
                .collect();
            assert_eq!(
                stream_thinking, batch_thinking,
                "thinking diverged for {response:?} at chunk size {chunk_size}"
            );
        }
    }
}

#[test]
fn test_streaming_multibyte_text() {
    // Multi-byte scalars pass through the state machine intact.
    let mut parser = StreamingParser::new();
    let mut collected = String::new();
    for e in parser.feed("こんにちは、<think>考え中</think>どうぞ") {
        match e {
            StreamEvent::Text(t) => collected.push_str(&t),
            StreamEvent::Thinking(t) => assert_eq!(t, "考え中"),
            other => panic!("Unexpected event {other:?}"),
        }
    }
    assert_eq!(collected, "こんにちは、どうぞ");
}

#[test]
fn test_arguments_survive_into_events() {
    let mut parser = StreamingParser::new();
    let events = parser.feed(
        "<tool_call>{\"name\":\"calc\",\"arguments\":{\"expr\":\"1+1\",\"precision\":2}}</tool_call>",
    );
    match &events[0] {
        StreamEvent::ToolCall { name, arguments } => {
            assert_eq!(name, "calc");
            assert_eq!(arguments["expr"], serde_json::json!("1+1"));
            assert_eq!(arguments["precision"], serde_json::json!(2));
        }
        other => panic!("Expected tool-call event, got {other:?}"),
    }
}
