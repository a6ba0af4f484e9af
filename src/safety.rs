//! Pure classification of shell commands and write paths into safety tiers.
//!
//! No I/O, no config lookups — classification is a function of the string
//! alone, built from data tables so tiers can be audited at a glance instead
//! of chased through branches.

use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    Safe,
    Mutating,
    Destructive,
    Blocked,
}

#[derive(Debug, Clone)]
pub struct SafetyVerdict {
    pub tier: Tier,
    pub reason: String,
}

impl SafetyVerdict {
    fn new(tier: Tier, reason: impl Into<String>) -> Self {
        Self {
            tier,
            reason: reason.into(),
        }
    }
}

fn table(patterns: &[(&str, &str)]) -> Vec<(Regex, &'static str)> {
    patterns
        .iter()
        .map(|(pat, reason)| {
            (
                Regex::new(pat).unwrap_or_else(|e| panic!("bad pattern {pat}: {e}")),
                *reason,
            )
        })
        .collect()
}

static BLOCKED_COMMAND_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    table(&[
        (r"rm\s+-[a-zA-Z]*r[a-zA-Z]*f[a-zA-Z]*\s+(/|~|\$HOME)\s*$", "recursive delete of root or home"),
        (r"rm\s+-[a-zA-Z]*f[a-zA-Z]*r[a-zA-Z]*\s+(/|~|\$HOME)\s*$", "recursive delete of root or home"),
        (r"rm\s+-[a-zA-Z]*r[a-zA-Z]*f[a-zA-Z]*\s+\.\s*$", "recursive delete of the current directory"),
        (r"rm\s+-[a-zA-Z]*f[a-zA-Z]*r[a-zA-Z]*\s+\.\s*$", "recursive delete of the current directory"),
        (r":\(\)\s*\{.*\|.*&.*\}\s*;", "fork bomb"),
        (r">\s*/dev/sd[a-z]", "redirect into a block device"),
        (r"\bmkfs(\.\w+)?\b", "filesystem format"),
        (r"\bdd\b.*\bof=/dev/", "raw write to a device"),
        (r"\btruncate\b.*\s/etc/", "truncate a system config file"),
        (r"(curl|wget)\b[^|]*\|\s*(sudo\s+)?(ba)?sh\b", "pipe remote script into a shell"),
    ])
});

static DESTRUCTIVE_COMMAND_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    table(&[
        (r"\brm\b", "deletes files"),
        (r"\bdd\b", "low-level disk copy"),
        (r"\bchmod\b\s+-R", "recursive permission change"),
        (r"\bchown\b\s+-R", "recursive ownership change"),
        (r"\bkill\b\s+-9", "force-kills a process"),
        (r"\bkillall\b", "kills processes by name"),
        (r"\bpkill\b", "kills processes by pattern"),
        (r"\bsudo\b", "privilege escalation"),
        (r"\bsu\b(\s|$)", "switches user"),
        (r"\bshutdown\b", "shuts the machine down"),
        (r"\breboot\b", "reboots the machine"),
        (r"\bsystemctl\b\s+(stop|restart|disable)", "changes a system service's run state"),
        (r"\biptables\b", "modifies firewall rules"),
        (r">\s*/[^\s]", "redirects into an absolute path"),
    ])
});

static SAFE_COMMAND_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    table(&[
        (r"^\s*ls\b", "lists directory contents"),
        (r"^\s*cat\b", "prints file contents"),
        (r"^\s*head\b", "prints file contents"),
        (r"^\s*tail\b", "prints file contents"),
        (r"^\s*grep\b", "searches text"),
        (r"^\s*rg\b", "searches text"),
        (r"^\s*find\b", "lists files"),
        (r"^\s*git\s+(status|log|diff|show|branch)\b", "reads repository state"),
        (r"^\s*(node|python3?|rustc|go|cargo)\s+(-v|--version)\b", "queries a tool's version"),
        (r"^\s*pwd\b", "prints the working directory"),
        (r"^\s*echo\b", "prints a string"),
        (r"^\s*which\b", "locates a binary"),
    ])
});

fn worst(a: Tier, b: Tier) -> Tier {
    if a > b {
        a
    } else {
        b
    }
}

/// Split a shell command on pipe/chain operators, classify each segment
/// independently, and return the worst tier found.
pub fn analyse_command(cmd: &str) -> SafetyVerdict {
    let trimmed = cmd.trim();
    if trimmed.is_empty() {
        return SafetyVerdict::new(Tier::Safe, "empty command");
    }

    for (re, reason) in BLOCKED_COMMAND_PATTERNS.iter() {
        if re.is_match(trimmed) {
            return SafetyVerdict::new(Tier::Blocked, *reason);
        }
    }

    let segments: Vec<&str> = trimmed
        .split(['|', ';'])
        .flat_map(|s| s.split("&&"))
        .flat_map(|s| s.split("||"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if segments.len() > 1 {
        let mut worst_tier = Tier::Safe;
        let mut worst_reason = String::from("compound command");
        for seg in &segments {
            let v = analyse_command(seg);
            if v.tier == Tier::Blocked {
                return v;
            }
            if v.tier > worst_tier {
                worst_tier = v.tier;
                worst_reason = v.reason;
            }
        }
        return SafetyVerdict::new(worst_tier, worst_reason);
    }

    for (re, reason) in DESTRUCTIVE_COMMAND_PATTERNS.iter() {
        if re.is_match(trimmed) {
            return SafetyVerdict::new(Tier::Destructive, *reason);
        }
    }

    for (re, reason) in SAFE_COMMAND_PATTERNS.iter() {
        if re.is_match(trimmed) {
            return SafetyVerdict::new(Tier::Safe, *reason);
        }
    }

    SafetyVerdict::new(Tier::Mutating, "unrecognized command, assumed to mutate state")
}

static BLOCKED_WRITE_PATHS: &[&str] = &[
    "/etc", "/usr", "/bin", "/sbin", "/boot", "/dev", "/proc", "/sys",
    "~/.ssh", "~/.gnupg", "~/.aws/credentials", "~/.azure", "~/.kube/config",
    ".env", ".env.local",
];

static DESTRUCTIVE_WRITE_PATHS: &[&str] = &[
    "~/.bashrc", "~/.zshrc", "~/.profile", "~/.bash_profile", "~/.gitconfig", "~/.npmrc",
];

fn expand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).to_string_lossy().into_owned();
        }
    }
    path.to_string()
}

fn path_matches(path: &str, expanded: &str, entry: &str) -> bool {
    let expanded_entry = expand_home(entry);
    path == entry
        || expanded == expanded_entry
        || path.starts_with(&format!("{entry}/"))
        || expanded.starts_with(&format!("{expanded_entry}/"))
}

/// Classify a write-target path (used by `write_file` and `edit_file`).
pub fn analyse_write_path(path: &str) -> SafetyVerdict {
    let expanded = expand_home(path);

    for entry in BLOCKED_WRITE_PATHS {
        if path_matches(path, &expanded, entry) {
            return SafetyVerdict::new(Tier::Blocked, format!("path under protected location {entry}"));
        }
    }

    for entry in DESTRUCTIVE_WRITE_PATHS {
        if path_matches(path, &expanded, entry) {
            return SafetyVerdict::new(Tier::Destructive, format!("modifies shell/tool startup file {entry}"));
        }
    }

    SafetyVerdict::new(Tier::Safe, "ordinary project file")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_commands_classify_safe() {
        assert_eq!(analyse_command("ls -la").tier, Tier::Safe);
        assert_eq!(analyse_command("git status").tier, Tier::Safe);
    }

    #[test]
    fn rm_is_destructive() {
        assert_eq!(analyse_command("rm old.txt").tier, Tier::Destructive);
    }

    #[test]
    fn recursive_root_delete_is_blocked() {
        assert_eq!(analyse_command("rm -rf /").tier, Tier::Blocked);
    }

    #[test]
    fn recursive_delete_of_dot_is_blocked() {
        assert_eq!(analyse_command("rm -rf .").tier, Tier::Blocked);
        assert_eq!(analyse_command("rm -fr .").tier, Tier::Blocked);
    }

    #[test]
    fn fork_bomb_is_blocked() {
        assert_eq!(analyse_command(":(){ :|:& };:").tier, Tier::Blocked);
    }

    #[test]
    fn pipe_chain_takes_worst_tier() {
        let v = analyse_command("ls | rm file.txt");
        assert_eq!(v.tier, Tier::Destructive);
    }

    #[test]
    fn chain_with_blocked_segment_is_blocked() {
        let v = analyse_command("ls && rm -rf ~");
        assert_eq!(v.tier, Tier::Blocked);
    }

    #[test]
    fn unknown_command_is_mutating() {
        assert_eq!(analyse_command("some-custom-tool --flag").tier, Tier::Mutating);
    }

    #[test]
    fn write_to_etc_is_blocked() {
        assert_eq!(analyse_write_path("/etc/hosts").tier, Tier::Blocked);
    }

    #[test]
    fn write_to_ssh_dir_is_blocked() {
        assert_eq!(analyse_write_path("~/.ssh/authorized_keys").tier, Tier::Blocked);
    }

    #[test]
    fn write_to_bashrc_is_destructive() {
        assert_eq!(analyse_write_path("~/.bashrc").tier, Tier::Destructive);
    }

    #[test]
    fn write_to_project_file_is_safe() {
        assert_eq!(analyse_write_path("src/main.rs").tier, Tier::Safe);
    }
}
