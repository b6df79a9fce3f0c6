//! Heuristic bot detection over a login string. SPEC_FULL §4.3. Pure, no I/O,
//! no allocation beyond the one lowercase copy needed for case-insensitive
//! matching.

const BOT_SUFFIXES: [&str; 4] = ["[bot]", "-bot", "_bot", ".bot"];
const BOT_PREFIXES: [&str; 2] = ["bot-", "bot_"];

const KNOWN_AUTOMATIONS: [&str; 27] = [
    "dependabot",
    "renovate",
    "greenkeeper",
    "snyk",
    "codecov",
    "coveralls",
    "circleci",
    "travis",
    "jenkins",
    "mergify",
    "stale",
    "imgbot",
    "allcontributors",
    "whitesource",
    "sonarcloud",
    "deepsource",
    "codefactor",
    "lgtm",
    "codacy",
    "hound",
    "semantic-release",
    "release-drafter",
    "probot",
    "octokitbot",
    "buildkite",
    "semaphore",
    "appveyor",
];

const AUTOMATION_HINTS: [&str; 4] = ["automation", "automate", "ci-bot", "cd-bot"];

const SERVICE_ACCOUNT_MARKERS: [&str; 20] = [
    "-sts",
    "-svc",
    "-service",
    "-system",
    "-automation",
    "-ci",
    "-cd",
    "-deploy",
    "-release",
    "release-manager",
    "-build",
    "-test",
    "-admin",
    "-security",
    "security-scanner",
    "-compliance",
    "compliance-checker",
    "octo-sts",
    "octocat",
    "azure-pipelines",
];

const EXTRA_CI_NAMES: [&str; 2] = ["github-classroom", "github-actions"];

/// Returns true when `login` matches any of the suffix, prefix, known-name,
/// automation-hint, or service-account heuristics in SPEC_FULL §4.3.
pub fn is_likely_bot(login: &str) -> bool {
    let lower = login.to_lowercase();

    if BOT_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
        return true;
    }
    if BOT_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return true;
    }
    if KNOWN_AUTOMATIONS.iter().any(|needle| lower.contains(needle)) {
        return true;
    }
    if EXTRA_CI_NAMES.iter().any(|needle| lower.contains(needle)) {
        return true;
    }
    if AUTOMATION_HINTS.iter().any(|needle| lower.contains(needle)) {
        return true;
    }
    if SERVICE_ACCOUNT_MARKERS.iter().any(|needle| lower.contains(needle)) {
        return true;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_bracket_bot_suffix_when_classifying_then_true() {
        assert!(is_likely_bot("dependabot[bot]"));
    }

    #[test]
    fn given_mixed_case_when_classifying_then_case_insensitive() {
        assert!(is_likely_bot("RENOVATE-Bot"));
    }

    #[test]
    fn given_bot_prefix_when_classifying_then_true() {
        assert!(is_likely_bot("bot-deploy-helper"));
    }

    #[test]
    fn given_service_account_marker_when_classifying_then_true() {
        assert!(is_likely_bot("prod-svc-account"));
    }

    #[test]
    fn given_ordinary_human_login_when_classifying_then_false() {
        assert!(!is_likely_bot("jane-doe"));
    }

    #[test]
    fn given_octocat_substring_when_classifying_then_true() {
        assert!(is_likely_bot("octocat"));
    }

    #[test]
    fn given_github_actions_when_classifying_then_true() {
        assert!(is_likely_bot("github-actions[bot]"));
    }
}
