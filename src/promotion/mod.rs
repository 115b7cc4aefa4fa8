//! Promotion gate
//!
//! A candidate replaces the published model only on strictly higher
//! accuracy. Ties count as no improvement. With no published model the
//! candidate becomes the baseline.

use tracing::{info, warn};

use crate::types::{MetricSet, PromotionDecision};

/// Decide whether `new` may replace the model that produced `current`
pub fn decide(current: Option<&MetricSet>, new: &MetricSet) -> PromotionDecision {
    let Some(current) = current else {
        info!(new_accuracy = new.accuracy, "No current model metrics, accepting as baseline");
        return PromotionDecision {
            accepted: true,
            current_accuracy: None,
            new_accuracy: new.accuracy,
            improvement: None,
            reason: Some("No current model to compare against".to_string()),
        };
    };

    let improvement = new.accuracy - current.accuracy;
    let accepted = new.accuracy > current.accuracy;

    if accepted {
        info!(
            current_accuracy = current.accuracy,
            new_accuracy = new.accuracy,
            improvement,
            "New model is better"
        );
    } else {
        warn!(
            current_accuracy = current.accuracy,
            new_accuracy = new.accuracy,
            "New model is not better, keeping current model"
        );
    }

    PromotionDecision {
        accepted,
        current_accuracy: Some(current.accuracy),
        new_accuracy: new.accuracy,
        improvement: Some(improvement),
        reason: if accepted {
            None
        } else {
            Some(format!(
                "New model accuracy ({:.4}) <= current ({:.4})",
                new.accuracy, current.accuracy
            ))
        },
    }
}
