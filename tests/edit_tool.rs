//! Scenario: an ambiguous `edit_file` match is rejected, then succeeds once
//! `replace_all` disambiguates it.

use caretforge::tool::{EditTool, Tool, ToolContext};
use serde_json::json;

#[tokio::test]
async fn ambiguous_match_is_rejected_then_replace_all_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("f.txt"), "aaa\nbbb\naaa\n").unwrap();
    let ctx = ToolContext::new(dir.path().to_string_lossy().to_string());
    let tool = EditTool;

    let err = tool
        .execute(
            json!({"path": "f.txt", "old_string": "aaa", "new_string": "z"}),
            &ctx,
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("matched 2 times"));
    assert_eq!(std::fs::read_to_string(dir.path().join("f.txt")).unwrap(), "aaa\nbbb\naaa\n");

    let result = tool
        .execute(
            json!({"path": "f.txt", "old_string": "aaa", "new_string": "z", "replace_all": true}),
            &ctx,
        )
        .await
        .unwrap();
    assert_eq!(std::fs::read_to_string(dir.path().join("f.txt")).unwrap(), "z\nbbb\nz\n");
    assert!(result.output.contains("Replacements: 2"));
}
