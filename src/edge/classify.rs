//! Resolves which personality (if any) an inbound event targets, and
//! whether it should be dropped outright ("Inbound
//! classification" (a), (c), (d)).
//!
//! Each step's lookup (alias resolution, reply-chain lookup, channel
//! activation, DM autoresponse history) is a database or cache query that
//! belongs to the caller; this module only encodes the precedence order and
//! the final admit/drop decision over already-resolved candidates.

use uuid::Uuid;

/// Candidates gathered by the caller, one per classification signal, in
/// the precedence order names: "explicit mention token, reply-to-
/// our-message lookup, channel activation, DM autoresponse state".
#[derive(Debug, Clone, Default)]
pub struct ClassificationSignals {
    pub explicit_mention: Option<Uuid>,
    pub reply_target: Option<Uuid>,
    pub channel_activation: Option<Uuid>,
    pub dm_autoresponse: Option<Uuid>,
}

/// Outcome of classifying one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Forward to C2 for this personality.
    Target(Uuid),
    /// No personality resolved; drop silently.
    NoTarget,
}

/// Pick a personality from the signals in precedence order.
#[must_use]
pub fn resolve_personality(signals: &ClassificationSignals) -> Classification {
    signals
        .explicit_mention
        .or(signals.reply_target)
        .or(signals.channel_activation)
        .or(signals.dm_autoresponse)
        .map_or(Classification::NoTarget, Classification::Target)
}

/// Whether the self-authored-or-owned-webhook skip applies ((a)):
/// "if the author is the bot or any webhook this process owns, drop".
#[must_use]
pub fn is_self_authored(author_id: &str, bot_user_id: &str, owned_webhook_ids: &[String]) -> bool {
    author_id == bot_user_id || owned_webhook_ids.iter().any(|id| id == author_id)
}

/// Final admit decision combining classification and denylist status: only
/// forward to C2 when a personality resolved and the source isn't
/// denylisted.
#[must_use]
pub fn should_forward(classification: &Classification, is_denylisted: bool) -> bool {
    matches!(classification, Classification::Target(_)) && !is_denylisted
}

/// Pull a leading `@token` off raw message content, for the caller to
/// resolve against known aliases/slugs as the "explicit mention token"
/// signal ((c)). Not a final alias match — just the candidate.
#[must_use]
pub fn extract_leading_mention_token(content: &str) -> Option<&str> {
    let rest = content.trim_start().strip_prefix('@')?;
    rest.split_whitespace().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_mention_wins_over_everything() {
        let a = Uuid::new_v4();
        let signals = ClassificationSignals {
            explicit_mention: Some(a),
            reply_target: Some(Uuid::new_v4()),
            channel_activation: Some(Uuid::new_v4()),
            dm_autoresponse: Some(Uuid::new_v4()),
        };
        assert_eq!(resolve_personality(&signals), Classification::Target(a));
    }

    #[test]
    fn reply_target_wins_over_activation_and_dm() {
        let a = Uuid::new_v4();
        let signals = ClassificationSignals {
            explicit_mention: None,
            reply_target: Some(a),
            channel_activation: Some(Uuid::new_v4()),
            dm_autoresponse: Some(Uuid::new_v4()),
        };
        assert_eq!(resolve_personality(&signals), Classification::Target(a));
    }

    #[test]
    fn channel_activation_wins_over_dm() {
        let a = Uuid::new_v4();
        let signals = ClassificationSignals {
            channel_activation: Some(a),
            dm_autoresponse: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert_eq!(resolve_personality(&signals), Classification::Target(a));
    }

    #[test]
    fn dm_autoresponse_is_last_resort() {
        let a = Uuid::new_v4();
        let signals = ClassificationSignals {
            dm_autoresponse: Some(a),
            ..Default::default()
        };
        assert_eq!(resolve_personality(&signals), Classification::Target(a));
    }

    #[test]
    fn no_signals_means_no_target() {
        let signals = ClassificationSignals::default();
        assert_eq!(resolve_personality(&signals), Classification::NoTarget);
    }

    #[test]
    fn self_authored_detects_bot_and_owned_webhooks() {
        assert!(is_self_authored("bot1", "bot1", &[]));
        assert!(is_self_authored("wh1", "bot1", &["wh1".to_string()]));
        assert!(!is_self_authored("user1", "bot1", &["wh1".to_string()]));
    }

    #[test]
    fn should_forward_requires_target_and_not_denylisted() {
        let target = Classification::Target(Uuid::new_v4());
        assert!(should_forward(&target, false));
        assert!(!should_forward(&target, true));
        assert!(!should_forward(&Classification::NoTarget, false));
    }

    #[test]
    fn extracts_leading_mention_token() {
        assert_eq!(extract_leading_mention_token("@luna how are you?"), Some("luna"));
        assert_eq!(extract_leading_mention_token("no mention here"), None);
        assert_eq!(extract_leading_mention_token("  @luna hi"), Some("luna"));
    }
}
