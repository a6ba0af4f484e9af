//! End-to-end scenarios for the agent loop, run against a scripted mock
//! provider instead of a real one.

mod support;

use caretforge::agent::{AgentLoop, SilentObserver};
use caretforge::cli::build_tools;
use caretforge::message::Message;
use caretforge::permission::PermissionManager;
use caretforge::tool::ToolContext;
use support::mock_provider::{assistant_with_tool_call, MockProvider};

fn ctx(dir: &tempfile::TempDir) -> ToolContext {
    ToolContext::new(dir.path().to_string_lossy().to_string())
}

#[tokio::test]
async fn plain_turn_returns_assistant_text_with_no_tool_calls() {
    let provider = MockProvider::single(Message::assistant("hello", vec![]));
    let dir = tempfile::tempdir().unwrap();
    let mut permissions = PermissionManager::new(true, true);
    let mut agent = AgentLoop::new(&provider, build_tools(), &mut permissions);

    let result = agent
        .run(
            "system",
            vec![Message::user("hi")],
            "mock-1",
            false,
            &ctx(&dir),
            &SilentObserver,
        )
        .await
        .unwrap();

    assert_eq!(result.tool_call_count, 0);
    assert_eq!(result.final_content, "hello");
    assert_eq!(result.conversation.messages.len(), 3);
}

#[tokio::test]
async fn one_tool_call_reads_a_file_and_reports_its_contents() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("package.json"), r#"{"version":"0.1.0"}"#).unwrap();

    let provider = MockProvider::new(vec![
        assistant_with_tool_call("read_file", r#"{"path":"package.json"}"#, "call_1"),
        Message::assistant("version 0.1.0", vec![]),
    ]);
    let mut permissions = PermissionManager::new(true, true);
    let mut agent = AgentLoop::new(&provider, build_tools(), &mut permissions);

    let result = agent
        .run(
            "system",
            vec![Message::user("read package.json")],
            "mock-1",
            false,
            &ctx(&dir),
            &SilentObserver,
        )
        .await
        .unwrap();

    assert_eq!(result.tool_call_count, 1);
    assert_eq!(result.final_content, "version 0.1.0");

    let tool_message = &result.conversation.messages[3];
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_1"));
    assert!(tool_message.content.contains("0.1.0"));
}

#[tokio::test]
async fn permission_denial_skips_the_write_and_feeds_back_a_denial() {
    let dir = tempfile::tempdir().unwrap();

    let provider = MockProvider::new(vec![
        assistant_with_tool_call(
            "write_file",
            r#"{"path":"hello.py","content":"print(1)"}"#,
            "call_1",
        ),
        Message::assistant("done, but without writing", vec![]),
    ]);
    // Not interactive and always_write unset: every write is denied.
    let mut permissions = PermissionManager::new(false, false);
    let mut agent = AgentLoop::new(&provider, build_tools(), &mut permissions);

    let result = agent
        .run(
            "system",
            vec![Message::user("create hello.py")],
            "mock-1",
            false,
            &ctx(&dir),
            &SilentObserver,
        )
        .await
        .unwrap();

    assert!(!dir.path().join("hello.py").exists());
    let tool_message = &result.conversation.messages[3];
    assert!(tool_message.content.starts_with("Permission denied"));
    assert_eq!(result.final_content, "done, but without writing");
}

#[tokio::test]
async fn blocked_write_path_is_denied_even_with_allow_write() {
    let dir = tempfile::tempdir().unwrap();

    let provider = MockProvider::new(vec![
        assistant_with_tool_call("write_file", r#"{"path":"/etc/passwd","content":"x"}"#, "call_1"),
        Message::assistant("stopped", vec![]),
    ]);
    // always_write = true (as --allow-write would set), but the path is
    // blocked outright and must still be denied.
    let mut permissions = PermissionManager::new(true, true);
    let mut agent = AgentLoop::new(&provider, build_tools(), &mut permissions);

    let result = agent
        .run(
            "system",
            vec![Message::user("overwrite /etc/passwd")],
            "mock-1",
            false,
            &ctx(&dir),
            &SilentObserver,
        )
        .await
        .unwrap();

    let tool_message = &result.conversation.messages[3];
    assert!(tool_message.content.contains("Permission denied"));
}

#[tokio::test]
async fn iteration_cap_stops_after_twenty_turns() {
    let turns: Vec<Message> = (0..25)
        .map(|i| assistant_with_tool_call("read_file", r#"{"path":"a.txt"}"#, &format!("call_{i}")))
        .collect();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "x").unwrap();

    let provider = MockProvider::new(turns);
    let mut permissions = PermissionManager::new(true, true);
    let mut agent = AgentLoop::new(&provider, build_tools(), &mut permissions);

    let result = agent
        .run(
            "system",
            vec![Message::user("loop forever")],
            "mock-1",
            false,
            &ctx(&dir),
            &SilentObserver,
        )
        .await
        .unwrap();

    assert_eq!(result.tool_call_count, 20);
    assert_eq!(result.final_content, "[Agent reached maximum iteration limit]");
}

#[tokio::test]
async fn streaming_and_non_streaming_paths_agree_on_final_content() {
    let dir = tempfile::tempdir().unwrap();
    let script = || {
        MockProvider::new(vec![
            assistant_with_tool_call("read_file", r#"{"path":"a.txt"}"#, "call_1"),
            Message::assistant("final answer", vec![]),
        ])
    };
    std::fs::write(dir.path().join("a.txt"), "contents").unwrap();

    let non_streaming = script();
    let mut permissions_a = PermissionManager::new(true, true);
    let mut agent_a = AgentLoop::new(&non_streaming, build_tools(), &mut permissions_a);
    let result_a = agent_a
        .run(
            "system",
            vec![Message::user("read a.txt")],
            "mock-1",
            false,
            &ctx(&dir),
            &SilentObserver,
        )
        .await
        .unwrap();

    let streaming = script();
    let mut permissions_b = PermissionManager::new(true, true);
    let mut agent_b = AgentLoop::new(&streaming, build_tools(), &mut permissions_b);
    let result_b = agent_b
        .run(
            "system",
            vec![Message::user("read a.txt")],
            "mock-1",
            true,
            &ctx(&dir),
            &SilentObserver,
        )
        .await
        .unwrap();

    assert_eq!(result_a.final_content, result_b.final_content);
    assert_eq!(result_a.tool_call_count, result_b.tool_call_count);
}
