//! Synthetic validator configuration.
//!
//! When the operator supplies no config file (offline catchup always, online
//! mode never), the runner writes one with just enough to make the validator
//! replay ledgers standalone: no fsync, no quorum participation, buckets in
//! the session temp directory, and one history block per archive URL.

use std::path::Path;

/// Placeholder validator key. The binary refuses to start without a quorum
/// set even in standalone mode; the key is never used to sign anything.
const FICTIONAL_VALIDATOR: &str = "GCZBOIAY4HLKAJVNJORXZOZRAY2BJDBZHKPBHZCRAIUR5IHC2UHBGCQR";

/// Render the generated config file contents.
pub fn generate_core_config(
    network_passphrase: &str,
    temp_dir: &Path,
    history_urls: &[String],
) -> String {
    let mut lines = vec![
        "# Generated file -- do not edit".to_string(),
        "RUN_STANDALONE=true".to_string(),
        "NODE_IS_VALIDATOR=false".to_string(),
        "DISABLE_XDR_FSYNC=true".to_string(),
        "UNSAFE_QUORUM=true".to_string(),
        format!("NETWORK_PASSPHRASE=\"{network_passphrase}\""),
        format!(
            "BUCKET_DIR_PATH=\"{}\"",
            temp_dir.join("buckets").display()
        ),
    ];
    for (i, url) in history_urls.iter().enumerate() {
        lines.push(format!("[HISTORY.h{i}]"));
        lines.push(format!("get=\"curl -sf {url}/{{0}} -o {{1}}\""));
    }
    lines.push("[QUORUM_SET]".to_string());
    lines.push("THRESHOLD_PERCENT=100".to_string());
    lines.push(format!("VALIDATORS=[\"{FICTIONAL_VALIDATOR}\"]"));

    lines.join("\n").replace('\\', "\\\\")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn render() -> String {
        generate_core_config(
            "Test Network ; September 2015",
            &PathBuf::from("/tmp/captive"),
            &["http://history.example.org/prd/core-live/core_live_001".to_string()],
        )
    }

    #[test]
    fn standalone_keys_present() {
        let conf = render();
        assert!(conf.contains("RUN_STANDALONE=true"));
        assert!(conf.contains("NODE_IS_VALIDATOR=false"));
        assert!(conf.contains("DISABLE_XDR_FSYNC=true"));
        assert!(conf.contains("UNSAFE_QUORUM=true"));
        assert!(conf.contains("NETWORK_PASSPHRASE=\"Test Network ; September 2015\""));
    }

    #[test]
    fn buckets_live_under_temp_dir() {
        let conf = render();
        assert!(conf.contains("BUCKET_DIR_PATH=\"/tmp/captive/buckets\""));
    }

    #[test]
    fn one_history_block_per_url() {
        let conf = generate_core_config(
            "p",
            &PathBuf::from("/t"),
            &["http://a".to_string(), "http://b".to_string()],
        );
        assert!(conf.contains("[HISTORY.h0]"));
        assert!(conf.contains("get=\"curl -sf http://a/{0} -o {1}\""));
        assert!(conf.contains("[HISTORY.h1]"));
        assert!(conf.contains("get=\"curl -sf http://b/{0} -o {1}\""));
    }

    #[test]
    fn quorum_block_closes_the_file() {
        let conf = render();
        let quorum = conf.find("[QUORUM_SET]").expect("quorum block");
        assert!(conf[quorum..].contains("THRESHOLD_PERCENT=100"));
        assert!(conf[quorum..].contains(FICTIONAL_VALIDATOR));
    }

    #[test]
    fn backslashes_are_escaped() {
        let conf = generate_core_config("p", &PathBuf::from("C:\\temp"), &[]);
        assert!(conf.contains("C:\\\\temp"));
    }
}
