//! Topic help with examples and operator guidance
//!
//! `--help` is clap's generated reference; `--help-topic <TOPIC>` prints the
//! longer explanations below.

use crate::config::env::EnvManager;
use colored::*;

/// Topics accepted by `--help-topic`
pub const HELP_TOPICS: &[&str] = &["targets", "speed", "control", "config", "output", "examples"];

/// Help system for the CLI application
pub struct HelpSystem {
    platform: String,
}

impl HelpSystem {
    pub fn new() -> Self {
        Self {
            platform: env!("TARGET_TRIPLE").to_string(),
        }
    }

    /// Overview: header, topic list and a few examples
    pub fn display_main_help(&self, use_colors: bool) -> String {
        let mut help = String::new();
        help.push_str(&self.format_header(use_colors));
        help.push('\n');
        help.push_str(&self.format_examples_section(use_colors));
        help.push('\n');
        help.push_str(&section(
            "HELP TOPICS:",
            &HELP_TOPICS
                .iter()
                .map(|t| format!("  rprobe --help-topic {}", t))
                .collect::<Vec<_>>()
                .join("\n"),
            use_colors,
        ));
        help
    }

    /// Help for one topic, `None` when the topic is unknown
    pub fn display_topic_help(&self, topic: &str, use_colors: bool) -> Option<String> {
        match topic.trim().to_lowercase().as_str() {
            "targets" | "inventory" => Some(self.format_targets_help(use_colors)),
            "speed" | "throughput" => Some(self.format_speed_help(use_colors)),
            "control" | "interactive" => Some(self.format_control_help(use_colors)),
            "config" | "env" | "environment" => Some(self.format_config_help(use_colors)),
            "output" => Some(self.format_output_help(use_colors)),
            "examples" => Some(self.format_examples_section(use_colors)),
            _ => None,
        }
    }

    fn format_header(&self, use_colors: bool) -> String {
        let title = "Relay Probe";
        let subtitle = "Concurrent latency and echo-throughput ranking of network endpoints";
        let version = env!("CARGO_PKG_VERSION");

        if use_colors {
            format!(
                "{}\n{}\nVersion: {} | Platform: {}\n",
                title.bright_cyan().bold(),
                subtitle.bright_blue(),
                version.green(),
                self.platform.yellow()
            )
        } else {
            format!("{}\n{}\nVersion: {} | Platform: {}\n", title, subtitle, version, self.platform)
        }
    }

    fn format_examples_section(&self, use_colors: bool) -> String {
        let examples = [
            ExampleHelp {
                title: "Ping a few hosts",
                command: "rprobe -t gw=192.168.1.1 -t 1.1.1.1 -t 9.9.9.9",
                description: "Rank three targets by average round-trip time",
            },
            ExampleHelp {
                title: "Pick the fastest Swedish WireGuard relay",
                command: "rprobe --relays-file relays.json --country se --protocol wireguard --limit 5",
                description: "Probe every matching relay with 15 workers and show the best five",
            },
            ExampleHelp {
                title: "Latency and throughput against an echo service",
                command: "rprobe -t lab=10.0.0.7 --test-type both -p 7 --speed-duration 3 --sort download",
                description: "Run a 3 second echo session on port 7 and rank by download",
            },
            ExampleHelp {
                title: "Interactive run with JSON output",
                command: "rprobe --relays-file relays.json --interactive --json > report.json",
                description: "Type p, r or s on stdin to pause, resume or stop",
            },
        ];

        let body = examples.iter().map(|e| e.format(use_colors)).collect::<Vec<_>>().join("\n");
        section("EXAMPLES:", &body, use_colors)
    }

    fn format_targets_help(&self, use_colors: bool) -> String {
        section(
            "TARGETS:",
            "  Targets come from --target (repeatable) and/or a relay inventory file.\n\
             \n\
             \x20 --target name=address   named target; the name is used in tables and JSON\n\
             \x20 --target address        bare target; the address doubles as the name\n\
             \n\
             \x20 --relays-file FILE      VPN relay list JSON (countries > cities > relays)\n\
             \x20 --country CODE          keep relays of one country (case-insensitive)\n\
             \x20 --protocol P            wireguard, openvpn or any\n\
             \n\
             \x20 Relays without an IPv4 entry address are skipped with a warning.\n\
             \x20 Duplicate names keep their first occurrence.",
            use_colors,
        )
    }

    fn format_speed_help(&self, use_colors: bool) -> String {
        section(
            "THROUGHPUT ESTIMATE:",
            "  --test-type speed|both runs a symmetric echo session per target.\n\
             \n\
             \x20 Ports from --port are tried in order; the first that accepts a TCP\n\
             \x20 connection is used for the whole session. Each round sends one random\n\
             \x20 block (--chunk-size) and waits up to 2s for it to come back.\n\
             \n\
             \x20 Rounds are stop-and-wait, so results are capped by round-trip time.\n\
             \x20 Only endpoints that echo bytes back report non-zero figures; treat the\n\
             \x20 numbers as a relative signal, not a bandwidth benchmark.",
            use_colors,
        )
    }

    fn format_control_help(&self, use_colors: bool) -> String {
        section(
            "RUN CONTROL:",
            "  Ctrl-C stops the run: targets not yet started are reported as skipped\n\
             \x20 and the partial ranking is still printed.\n\
             \n\
             \x20 With --interactive, commands are read from stdin:\n\
             \x20   p  pause (in-flight probes finish, no new target starts)\n\
             \x20   r  resume\n\
             \x20   s  stop (q works too)",
            use_colors,
        )
    }

    fn format_config_help(&self, use_colors: bool) -> String {
        let mut body = String::from("  Priority: CLI arguments > environment > .env file > defaults\n\n");
        for (name, description, example) in EnvManager::get_supported_env_vars() {
            if use_colors {
                body.push_str(&format!("  {:<24} {} (e.g. {})\n", name.bright_yellow(), description, example));
            } else {
                body.push_str(&format!("  {:<24} {} (e.g. {})\n", name, description, example));
            }
        }
        body.push_str("\n  Example .env file:\n\n");
        for line in EnvManager::create_example_env_content().lines() {
            body.push_str(&format!("    {}\n", line));
        }
        section("CONFIGURATION REFERENCE:", body.trim_end(), use_colors)
    }

    fn format_output_help(&self, use_colors: bool) -> String {
        section(
            "OUTPUT:",
            "  Results are ranked by --sort (latency ascending, or download/upload\n\
             \x20 descending); targets without a value always come last.\n\
             \n\
             \x20 Latency bands: Excellent < 50ms, Good < 125ms, Fair < 250ms, Poor above.\n\
             \n\
             \x20 --json prints the whole run report on stdout; logs go to stderr.\n\
             \x20 --limit N shows only the best N rows.",
            use_colors,
        )
    }
}

impl Default for HelpSystem {
    fn default() -> Self {
        Self::new()
    }
}

fn section(header: &str, body: &str, use_colors: bool) -> String {
    let header = if use_colors {
        header.bright_green().bold().to_string()
    } else {
        header.to_string()
    };
    format!("{}\n{}\n", header, body)
}

struct ExampleHelp {
    title: &'static str,
    command: &'static str,
    description: &'static str,
}

impl ExampleHelp {
    fn format(&self, use_colors: bool) -> String {
        if use_colors {
            format!(
                "  {}:\n    {}\n    {}",
                self.title.bright_yellow().bold(),
                self.command.bright_white(),
                self.description.bright_blue().italic()
            )
        } else {
            format!("  {}:\n    {}\n    {}", self.title, self.command, self.description)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_help_lists_topics() {
        let help = HelpSystem::new().display_main_help(false);
        assert!(help.contains("Relay Probe"));
        assert!(help.contains("EXAMPLES:"));
        for topic in HELP_TOPICS {
            assert!(help.contains(&format!("--help-topic {}", topic)));
        }
    }

    #[test]
    fn test_every_topic_has_content() {
        let system = HelpSystem::new();
        for topic in HELP_TOPICS {
            let text = system.display_topic_help(topic, false).unwrap();
            assert!(!text.is_empty(), "{} is empty", topic);
        }
        assert!(system.display_topic_help("CONFIG", false).unwrap().contains("RPROBE_MAX_WORKERS"));
        assert!(system.display_topic_help("env", false).unwrap().contains("# RPROBE_SPEED_PORTS="));
        assert!(system.display_topic_help("dns", false).is_none());
    }

    #[test]
    fn test_plain_help_has_no_escape_codes() {
        let system = HelpSystem::new();
        assert!(!system.display_main_help(false).contains('\x1b'));
        assert!(!system.display_topic_help("speed", false).unwrap().contains('\x1b'));
    }
}
