//! Profiles command - show the built-in exercise profiles.

use std::path::Path;

use repsense::form::RuleCheck;
use repsense::{ExerciseKind, ExerciseProfile};

use super::common::{load_config, ExerciseArg};
use crate::error::CliError;

/// Run the profiles command.
pub fn run(exercise: Option<ExerciseArg>, config_path: Option<&Path>) -> Result<(), CliError> {
    let Some(exercise) = exercise else {
        list();
        return Ok(());
    };

    let config = load_config(config_path)?;
    let profile = config.profile(exercise.into())?;
    show(&profile);
    Ok(())
}

fn list() {
    println!("Exercises");
    println!("=========");
    for kind in ExerciseKind::ALL {
        println!("  {:<8} {}", kind.as_str(), kind.description());
    }
    println!();
    println!("Use 'repsense profiles --exercise <NAME>' for details.");
}

fn show(profile: &ExerciseProfile) {
    println!("{} ({})", profile.kind, profile.kind.description());
    println!();
    println!("  Primary joint:   {}", profile.primary_joint);
    println!("  Phase style:     {}", profile.style);
    println!(
        "  Thresholds:      high {:.0}°, low {:.0}°",
        profile.thresholds.high_deg, profile.thresholds.low_deg
    );
    match profile.rep_pattern {
        Some(pattern) => println!("  Rep pattern:     {}", pattern),
        None => println!("  Rep pattern:     (hold, no repetitions)"),
    }
    println!("  Smoothing:       {} frames", profile.smoothing_window);
    println!("  Min confidence:  {:.2}", profile.keypoint_confidence);

    if profile.rules.is_empty() {
        return;
    }
    println!();
    println!("  Form rules:");
    for rule in &profile.rules {
        let check = match rule.check {
            RuleCheck::MinAtMost { joint, max_deg } => format!("min {} ≤ {:.0}°", joint, max_deg),
            RuleCheck::MinAtLeast { joint, min_deg } => format!("min {} ≥ {:.0}°", joint, min_deg),
            RuleCheck::Smoothness { jitter_deg } => format!("jitter ≤ {:.0}°", jitter_deg),
        };
        println!(
            "    {:<15} {:<20} {:>3.0} pts{}",
            rule.kind.as_str(),
            check,
            rule.weight,
            if rule.hard_fail { "  (hard)" } else { "" }
        );
    }
}
