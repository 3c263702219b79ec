//! Personalized digest message composition.
//!
//! Composition only: this module fills the fixed HTML template from a
//! participant's statistics and hands the result to whatever transport the
//! caller wires up. Credentials and SMTP details never enter this crate.
//! The figure is referenced by file name, so a body written next to its
//! PNG renders as-is and a mail transport can rewrite the reference when
//! inlining the attachment.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use crate::models::ParticipantStats;

pub const DEFAULT_SUBJECT: &str = "Garden Life-Cycle Assessment Statistics";

/// Messaging configuration, supplied at construction.
#[derive(Debug, Clone)]
pub struct MessageConfig {
    pub sender: String,
    pub subject: String,
}

/// Composes one digest message per participant record.
#[derive(Debug, Clone)]
pub struct Messenger {
    config: MessageConfig,
}

/// A composed message, ready for a mail transport. The figure path is
/// carried alongside the body for inlining.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub html_body: String,
    pub figure: PathBuf,
}

impl Messenger {
    pub fn new(config: MessageConfig) -> Self {
        Self { config }
    }

    pub fn compose(&self, record: &ParticipantStats, figure: &Path) -> OutgoingMessage {
        let stats = &record.stats;
        let produce_change = describe_change(stats.dif_produce);
        let water_change = describe_change(stats.dif_water);
        let trend = describe_trend(stats.dwater_dt);

        let figure_name = figure
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut body = String::new();
        let _ = writeln!(body, "<html>");
        let _ = writeln!(body, "  <body>");
        let _ = writeln!(body, r#"    <img src="{figure_name}" width="100%">"#);
        let _ = writeln!(body, "    <p>Dear {},</p>", record.participant);
        let _ = writeln!(
            body,
            "    <p>Your garden yielded {} produce and used {} water this week than last week. \
             Until now, you've used a total of {:.1} Gallons of water and gathered a total of \
             {:.1} kg produce.</p>",
            produce_change, water_change, stats.total_water, stats.total_produce
        );
        let _ = writeln!(
            body,
            "    <p>You use an average of {:.1} Gallons of water per week. During your \
             involvement in our study, your water use has been {} overall at a rate of {:.1} \
             Gallons per week.</p>",
            stats.mean_water,
            trend,
            stats.dwater_dt.abs()
        );
        let _ = writeln!(body, "  </body>");
        let _ = writeln!(body, "</html>");

        OutgoingMessage {
            to: record.email.clone(),
            from: self.config.sender.clone(),
            subject: self.config.subject.clone(),
            html_body: body,
            figure: figure.to_path_buf(),
        }
    }
}

pub fn message_path(dir: &Path, participant: &str) -> PathBuf {
    dir.join(format!("{participant}_message.html"))
}

/// Week-over-week wording: `"12.3% more"`, `"4.5% less"`, or
/// `"no difference in"`.
fn describe_change(delta_pct: f64) -> String {
    if delta_pct > 0.0 {
        format!("{:.1}% more", delta_pct)
    } else if delta_pct < 0.0 {
        format!("{:.1}% less", delta_pct.abs())
    } else {
        "no difference in".to_string()
    }
}

fn describe_trend(slope: f64) -> &'static str {
    if slope > 0.0 {
        "increasing"
    } else if slope < 0.0 {
        "decreasing"
    } else {
        "steady"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StatsRecord;

    fn sample_record() -> ParticipantStats {
        ParticipantStats {
            participant: "1".to_string(),
            email: "ana@example.com".to_string(),
            stats: StatsRecord {
                total_produce: 10.0,
                total_water: 100.0,
                mean_produce: 2.5,
                mean_water: 25.0,
                dif_produce: 33.333,
                dif_water: -12.5,
                dwater_dt: 10.0,
                yield_per_water: 0.1,
            },
        }
    }

    #[test]
    fn change_wording_follows_the_sign() {
        assert_eq!(describe_change(33.333), "33.3% more");
        assert_eq!(describe_change(-12.5), "12.5% less");
        assert_eq!(describe_change(0.0), "no difference in");
    }

    #[test]
    fn trend_wording_follows_the_slope() {
        assert_eq!(describe_trend(2.0), "increasing");
        assert_eq!(describe_trend(-0.5), "decreasing");
        assert_eq!(describe_trend(0.0), "steady");
    }

    #[test]
    fn composed_message_carries_the_personalization() {
        let messenger = Messenger::new(MessageConfig {
            sender: "study@example.edu".to_string(),
            subject: DEFAULT_SUBJECT.to_string(),
        });
        let message = messenger.compose(&sample_record(), Path::new("out/1_line.png"));

        assert_eq!(message.to, "ana@example.com");
        assert_eq!(message.from, "study@example.edu");
        assert_eq!(message.subject, DEFAULT_SUBJECT);
        assert_eq!(message.figure, Path::new("out/1_line.png"));

        assert!(message.html_body.contains("Dear 1,"));
        assert!(message.html_body.contains("33.3% more produce"));
        assert!(message.html_body.contains("12.5% less water"));
        assert!(message.html_body.contains("total of 100.0 Gallons"));
        assert!(message.html_body.contains("average of 25.0 Gallons"));
        assert!(message.html_body.contains("increasing overall at a rate of 10.0"));
        assert!(message.html_body.contains(r#"<img src="1_line.png""#));
    }

    #[test]
    fn message_path_uses_the_participant_id() {
        let path = message_path(Path::new("2024-06-12_out"), "7");
        assert_eq!(path, Path::new("2024-06-12_out").join("7_message.html"));
    }
}
