//! Session-scoped permission gate for the three write/shell-capable tools.
//!
//! The state is two booleans, not a per-tool ACL: once the user answers
//! "always" to a write or shell prompt, every subsequent call of that kind
//! is approved for the rest of the process. There is no way to un-set them
//! short of restarting.

use std::io::{self, IsTerminal, Write as _};

use crate::safety::{analyse_command, analyse_write_path, Tier};

#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionState {
    pub always_write: bool,
    pub always_shell: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// Gates `write_file`, `edit_file`, and `exec_shell`. Constructed once per
/// process from the `--allow-write`/`--allow-shell` CLI flags.
pub struct PermissionManager {
    state: PermissionState,
    interactive: bool,
}

impl PermissionManager {
    pub fn new(always_write: bool, always_shell: bool) -> Self {
        Self {
            state: PermissionState {
                always_write,
                always_shell,
            },
            interactive: io::stdin().is_terminal(),
        }
    }

    #[cfg(test)]
    fn with_interactive(always_write: bool, always_shell: bool, interactive: bool) -> Self {
        Self {
            state: PermissionState {
                always_write,
                always_shell,
            },
            interactive,
        }
    }

    pub fn state(&self) -> PermissionState {
        self.state
    }

    /// Decide whether `tool_name` may run with the given raw args.
    /// `read_file`, `grep_search`, and `glob_find` are always allowed and
    /// never reach the interactive prompt.
    pub fn check(&mut self, tool_name: &str, args: &serde_json::Value) -> Decision {
        match tool_name {
            "write_file" | "edit_file" => {
                let path = args
                    .get("path")
                    .and_then(|v| v.as_str())
                    .or_else(|| args.get("filePath").and_then(|v| v.as_str()))
                    .unwrap_or("");
                let verdict = analyse_write_path(path);
                self.check_gated(verdict.tier, self.state.always_write, |s| {
                    s.always_write = true
                })
            }
            "exec_shell" => {
                let cmd = args.get("command").and_then(|v| v.as_str()).unwrap_or("");
                let verdict = analyse_command(cmd);
                self.check_gated(verdict.tier, self.state.always_shell, |s| {
                    s.always_shell = true
                })
            }
            _ => Decision::Allow,
        }
    }

    fn check_gated(
        &mut self,
        tier: Tier,
        always_set: bool,
        set_always: impl FnOnce(&mut PermissionState),
    ) -> Decision {
        match tier {
            Tier::Blocked => {
                eprintln!("blocked: this action matches a disallowed pattern");
                Decision::Deny
            }
            Tier::Safe | Tier::Mutating => {
                if always_set {
                    return Decision::Allow;
                }
                if !self.interactive {
                    return Decision::Deny;
                }
                match self.prompt(true) {
                    PromptAnswer::AllowOnce => Decision::Allow,
                    PromptAnswer::AllowAlways => {
                        set_always(&mut self.state);
                        Decision::Allow
                    }
                    PromptAnswer::Deny => Decision::Deny,
                }
            }
            Tier::Destructive => {
                if !self.interactive {
                    return Decision::Deny;
                }
                match self.prompt(false) {
                    PromptAnswer::AllowOnce => Decision::Allow,
                    PromptAnswer::AllowAlways | PromptAnswer::Deny => Decision::Deny,
                }
            }
        }
    }

    fn prompt(&self, offer_always: bool) -> PromptAnswer {
        let suffix = if offer_always { "y/N/a" } else { "y/N" };
        print!("Allow this action? [{suffix}] ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        if io::stdin().read_line(&mut line).is_err() {
            return PromptAnswer::Deny;
        }
        parse_answer(&line, offer_always)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum PromptAnswer {
    AllowOnce,
    AllowAlways,
    Deny,
}

fn parse_answer(raw: &str, offer_always: bool) -> PromptAnswer {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "y" | "yes" => PromptAnswer::AllowOnce,
        "a" | "always" if offer_always => PromptAnswer::AllowAlways,
        _ => PromptAnswer::Deny,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn read_like_tools_always_allowed() {
        let mut mgr = PermissionManager::with_interactive(false, false, false);
        assert_eq!(mgr.check("read_file", &json!({})), Decision::Allow);
        assert_eq!(mgr.check("grep_search", &json!({})), Decision::Allow);
    }

    #[test]
    fn blocked_shell_command_denied_even_when_always_set() {
        let mut mgr = PermissionManager::with_interactive(true, true, true);
        let d = mgr.check("exec_shell", &json!({"command": "rm -rf /"}));
        assert_eq!(d, Decision::Deny);
    }

    #[test]
    fn safe_shell_allowed_when_always_shell_set() {
        let mut mgr = PermissionManager::with_interactive(false, true, false);
        let d = mgr.check("exec_shell", &json!({"command": "ls"}));
        assert_eq!(d, Decision::Allow);
    }

    #[test]
    fn non_interactive_without_always_denies_safe_shell() {
        let mut mgr = PermissionManager::with_interactive(false, false, false);
        let d = mgr.check("exec_shell", &json!({"command": "ls"}));
        assert_eq!(d, Decision::Deny);
    }

    #[test]
    fn destructive_shell_denies_non_interactively_even_with_always() {
        let mut mgr = PermissionManager::with_interactive(false, true, false);
        let d = mgr.check("exec_shell", &json!({"command": "rm old.txt"}));
        assert_eq!(d, Decision::Deny);
    }

    #[test]
    fn write_to_blocked_path_denied() {
        let mut mgr = PermissionManager::with_interactive(true, true, true);
        let d = mgr.check("write_file", &json!({"path": "/etc/hosts"}));
        assert_eq!(d, Decision::Deny);
    }

    #[test]
    fn write_allowed_when_always_write_set() {
        let mut mgr = PermissionManager::with_interactive(false, true, false);
        let d = mgr.check("write_file", &json!({"path": "src/lib.rs"}));
        assert_eq!(d, Decision::Allow);
    }

    #[test]
    fn parse_answer_treats_empty_and_y_as_allow_once() {
        assert_eq!(parse_answer("\n", true), PromptAnswer::AllowOnce);
        assert_eq!(parse_answer("y\n", true), PromptAnswer::AllowOnce);
        assert_eq!(parse_answer("yes\n", true), PromptAnswer::AllowOnce);
    }

    #[test]
    fn parse_answer_always_only_honored_when_offered() {
        assert_eq!(parse_answer("a\n", true), PromptAnswer::AllowAlways);
        assert_eq!(parse_answer("a\n", false), PromptAnswer::Deny);
    }

    #[test]
    fn parse_answer_anything_else_denies() {
        assert_eq!(parse_answer("n\n", true), PromptAnswer::Deny);
        assert_eq!(parse_answer("whatever\n", true), PromptAnswer::Deny);
    }
}
