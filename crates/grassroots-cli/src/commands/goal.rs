use std::path::Path;

use grassroots_core::goal_flow::{GoalFlow, GoalStep};
use grassroots_core::models::{Fixture, PlayerId, TeamId};
use grassroots_core::{EventIntent, Error};

use crate::commands::common::resolve_notes;
use crate::commands::record::{capture, format_capture_confirmation};
use crate::error::CliError;

pub struct GoalArgs {
    pub team: String,
    pub scorer: Option<String>,
    pub assist: Option<String>,
    pub own_goal: bool,
    pub notes: Option<String>,
    pub dictate: bool,
}

pub async fn run_goal(args: GoalArgs, fixture: &Fixture, db_path: &Path) -> Result<(), CliError> {
    let notes = resolve_notes(args.notes.clone(), args.dictate).await;
    let intent = goal_intent(&args, fixture, notes)?;

    let entry = capture(intent, fixture, db_path).await?;
    println!("{}", format_capture_confirmation(&entry, fixture));
    if let Some(credited) = fixture.credited_team(&entry.payload) {
        if credited.id != *entry.payload.team_id() {
            println!("Own goal credited to {}", credited.name);
        }
    }
    Ok(())
}

/// Walk the goal flow with the answers given as flags.
pub fn goal_intent(
    args: &GoalArgs,
    fixture: &Fixture,
    notes: Option<String>,
) -> Result<EventIntent, CliError> {
    let scorer = args.scorer.clone().map(PlayerId::new);
    let assist = args.assist.clone().map(PlayerId::new);

    let flow = GoalFlow::new(fixture).choose_team(TeamId::new(args.team.clone()))?;
    let flow = match flow.step() {
        GoalStep::GoalType => {
            if !args.own_goal {
                reject_named_choice(scorer.as_ref(), "scorer", &flow)?;
                reject_named_choice(assist.as_ref(), "assist", &flow)?;
            }
            flow.choose_goal_type(args.own_goal)?
        }
        _ if args.own_goal => flow.choose_own_goal()?,
        _ => flow.choose_scorer(scorer.clone().unwrap_or_else(PlayerId::anonymous))?,
    };
    let flow = match flow.step() {
        GoalStep::OpponentScorer => flow.choose_opponent_scorer(scorer)?,
        GoalStep::Assist => flow.choose_assist(assist)?,
        _ => flow,
    };

    Ok(flow.finish(notes)?)
}

fn reject_named_choice(
    player: Option<&PlayerId>,
    role: &str,
    flow: &GoalFlow<'_>,
) -> Result<(), CliError> {
    match (player, flow.scoring_team()) {
        (Some(player), Some(team)) if !player.is_anonymous() => {
            Err(CliError::Core(Error::validation(format!(
                "{} has no named players; cannot credit {role} '{player}'",
                team.name
            ))))
        }
        _ => Ok(()),
    }
}
