use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const ENABLED_KEYS: [&str; 2] = [
    "CAREERCHAT_OBSERVABILITY_ENABLED",
    "CAREERCHAT_OBSERVABILITY",
];
const LOG_LEVEL_KEY: &str = "CAREERCHAT_LOG_LEVEL";
const JSON_LOG_PATH_KEY: &str = "CAREERCHAT_JSON_LOG_PATH";
const DEFAULT_LOG_FILE: &str = "careerchat.logs.jsonl";

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

fn observability_enabled(lookup: impl Fn(&str) -> Option<String>) -> bool {
    ENABLED_KEYS
        .iter()
        .find_map(|key| lookup(*key))
        .map(|value| parse_bool_env(&value).unwrap_or(true))
        .unwrap_or(true)
}

/// Where log records go.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogTarget {
    /// Compact console lines on stderr, keeping stdout free for replies.
    Console,
    /// JSON lines appended to `dir/file_name`.
    JsonFile {
        dir: std::path::PathBuf,
        file_name: String,
    },
}

fn log_target(lookup: &impl Fn(&str) -> Option<String>) -> LogTarget {
    let Some(raw) = lookup(JSON_LOG_PATH_KEY).filter(|p| !p.trim().is_empty()) else {
        return LogTarget::Console;
    };
    let path = std::path::PathBuf::from(raw.trim());
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(std::path::Path::to_path_buf)
        .unwrap_or_else(|| std::path::PathBuf::from("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE)
        .to_string();
    LogTarget::JsonFile { dir, file_name }
}

/// Filter directive: `CAREERCHAT_LOG_LEVEL` if it parses, then `RUST_LOG`,
/// then `info`.
fn filter_directive(lookup: &impl Fn(&str) -> Option<String>) -> String {
    [LOG_LEVEL_KEY, "RUST_LOG"]
        .into_iter()
        .filter_map(|key| lookup(key))
        .find(|level| tracing_subscriber::EnvFilter::try_new(level).is_ok())
        .unwrap_or_else(|| "info".to_string())
}

/// Initialize logging once per process.
///
/// Environment variables:
/// - `CAREERCHAT_OBSERVABILITY_ENABLED` / `CAREERCHAT_OBSERVABILITY`: optional enable/disable flag (default enabled).
/// - `CAREERCHAT_LOG_LEVEL`: optional level/filter override (`info`, `debug`, etc.).
/// - `CAREERCHAT_JSON_LOG_PATH`: optional log file path. If set, logs are JSONL in that file.
///   If unset, logs go to stderr in a compact console format so stdout stays free for output.
/// - `RUST_LOG`: used when `CAREERCHAT_LOG_LEVEL` is unset or invalid.
pub fn init_observability() {
    INIT.get_or_init(|| {
        let lookup = |key: &str| std::env::var(key).ok();
        if !observability_enabled(lookup) {
            return;
        }

        let env_filter = tracing_subscriber::EnvFilter::new(filter_directive(&lookup));
        match log_target(&lookup) {
            LogTarget::JsonFile { dir, file_name } => {
                let _ = std::fs::create_dir_all(&dir);
                let writer = tracing_appender::rolling::never(dir, file_name);
                let json_layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(false)
                    .with_writer(writer);
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(json_layer)
                    .try_init();
            }
            LogTarget::Console => {
                let console_layer = tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr);
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(console_layer)
                    .try_init();
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_flags_accept_common_spellings() {
        assert_eq!(parse_bool_env(" YES "), Some(true));
        assert_eq!(parse_bool_env("disabled"), Some(false));
        assert_eq!(parse_bool_env("maybe"), None);
    }

    #[test]
    fn enabled_by_default_and_first_key_wins() {
        assert!(observability_enabled(|_| None));
        assert!(!observability_enabled(|key| {
            (key == "CAREERCHAT_OBSERVABILITY").then(|| "off".to_string())
        }));
        assert!(observability_enabled(|key| match key {
            "CAREERCHAT_OBSERVABILITY_ENABLED" => Some("garbage".to_string()),
            _ => Some("off".to_string()),
        }));
    }

    fn env<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn console_is_the_default_target() {
        assert_eq!(log_target(&env(&[])), LogTarget::Console);
        assert_eq!(
            log_target(&env(&[(JSON_LOG_PATH_KEY, "  ")])),
            LogTarget::Console
        );
    }

    #[test]
    fn json_path_splits_into_dir_and_file() {
        assert_eq!(
            log_target(&env(&[(JSON_LOG_PATH_KEY, "logs/chat/run.jsonl")])),
            LogTarget::JsonFile {
                dir: "logs/chat".into(),
                file_name: "run.jsonl".into(),
            }
        );
        assert_eq!(
            log_target(&env(&[(JSON_LOG_PATH_KEY, "run.jsonl")])),
            LogTarget::JsonFile {
                dir: ".".into(),
                file_name: "run.jsonl".into(),
            }
        );
    }

    #[test]
    fn invalid_level_falls_back_to_rust_log_then_info() {
        assert_eq!(filter_directive(&env(&[])), "info");
        assert_eq!(
            filter_directive(&env(&[(LOG_LEVEL_KEY, "careerchat_ingest=debug")])),
            "careerchat_ingest=debug"
        );
        assert_eq!(
            filter_directive(&env(&[(LOG_LEVEL_KEY, "careerchat=loud"), ("RUST_LOG", "warn")])),
            "warn"
        );
    }

    #[test]
    fn init_is_idempotent() {
        init_observability();
        init_observability();
    }
}
