//! robots.txt compliance gate
//!
//! Loads the marketplace robots rules once at startup and answers
//! allow/deny for every outbound fetch. Rules are grouped per user-agent;
//! the most specific matching group wins, falling back to `*`. Only
//! `Disallow` prefixes are honored.

use anyhow::Result;
use tracing::warn;
use url::Url;

use crate::domain::error::{CrawlError, CrawlResult};
use crate::domain::services::ComplianceGate;

#[derive(Debug, Default, Clone)]
struct RuleGroup {
    agents: Vec<String>,
    disallow: Vec<String>,
}

/// Parsed robots.txt rules.
#[derive(Debug, Default, Clone)]
pub struct RobotsRules {
    groups: Vec<RuleGroup>,
}

impl RobotsRules {
    /// Parse a robots.txt document.
    ///
    /// Consecutive `User-agent` lines open a group; `Disallow` lines attach
    /// to the open group. Unknown directives and comments are skipped.
    pub fn parse(text: &str) -> Self {
        let mut groups: Vec<RuleGroup> = Vec::new();
        let mut open_agents = true;

        for raw_line in text.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    if !open_agents || groups.is_empty() {
                        groups.push(RuleGroup::default());
                        open_agents = true;
                    }
                    if let Some(group) = groups.last_mut() {
                        group.agents.push(value.to_ascii_lowercase());
                    }
                }
                "disallow" => {
                    open_agents = false;
                    if let Some(group) = groups.last_mut() {
                        if !value.is_empty() {
                            group.disallow.push(value.to_string());
                        }
                    }
                }
                _ => {
                    open_agents = false;
                }
            }
        }

        Self { groups }
    }

    /// Whether `user_agent` may fetch `path`.
    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        let ua = user_agent.to_ascii_lowercase();

        let specific = self.groups.iter().find(|g| {
            g.agents
                .iter()
                .any(|agent| agent != "*" && ua.contains(agent.as_str()))
        });
        let group = specific.or_else(|| {
            self.groups
                .iter()
                .find(|g| g.agents.iter().any(|agent| agent == "*"))
        });

        match group {
            Some(group) => !group
                .disallow
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str())),
            None => true,
        }
    }
}

/// Compliance gate backed by parsed robots rules.
#[derive(Debug, Clone)]
pub struct RobotsGate {
    rules: RobotsRules,
}

impl RobotsGate {
    pub fn new(rules: RobotsRules) -> Self {
        Self { rules }
    }

    pub fn from_text(text: &str) -> Self {
        Self::new(RobotsRules::parse(text))
    }
}

impl ComplianceGate for RobotsGate {
    fn check(&self, user_agent: &str, url: &str) -> CrawlResult<()> {
        let path = match Url::parse(url) {
            Ok(parsed) => parsed.path().to_string(),
            // Relative link: treat the leading segment as the path.
            Err(_) => url.split('?').next().unwrap_or(url).to_string(),
        };

        if self.rules.is_allowed(user_agent, &path) {
            Ok(())
        } else {
            Err(CrawlError::ComplianceDisallowed {
                url: url.to_string(),
            })
        }
    }
}

/// Fetch and parse the marketplace robots.txt.
///
/// An unreachable robots.txt degrades to an allow-all gate with a warning;
/// only persistent storage is allowed to be fatal at startup.
pub async fn load_robots_gate(
    client: &crate::infrastructure::http_client::HttpClient,
    domain: &str,
) -> Result<RobotsGate> {
    let robots_url = format!("https://{domain}/robots.txt");
    match client.get_text(&robots_url).await {
        Ok(text) => Ok(RobotsGate::from_text(&text)),
        Err(err) => {
            warn!("Could not fetch {robots_url} ({err}), assuming allowed");
            Ok(RobotsGate::new(RobotsRules::default()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
User-agent: *\n\
Disallow: /gp/\n\
Disallow: /ap/\n\
\n\
User-agent: badbot\n\
Disallow: /\n";

    #[test]
    fn wildcard_group_applies_to_unknown_agents() {
        let rules = RobotsRules::parse(SAMPLE);
        assert!(rules.is_allowed("Mozilla/5.0", "/dp/B000TEST00"));
        assert!(!rules.is_allowed("Mozilla/5.0", "/gp/offers"));
    }

    #[test]
    fn specific_group_wins_over_wildcard() {
        let rules = RobotsRules::parse(SAMPLE);
        assert!(!rules.is_allowed("BadBot/1.0", "/dp/B000TEST00"));
    }

    #[test]
    fn empty_rules_allow_everything() {
        let rules = RobotsRules::default();
        assert!(rules.is_allowed("anything", "/anywhere"));
    }

    #[test]
    fn gate_maps_denial_to_compliance_error() {
        let gate = RobotsGate::from_text(SAMPLE);
        assert!(gate.check("Mozilla/5.0", "https://market.test/dp/B000").is_ok());
        let err = gate
            .check("Mozilla/5.0", "https://market.test/gp/offers")
            .unwrap_err();
        assert!(matches!(err, CrawlError::ComplianceDisallowed { .. }));
    }
}
