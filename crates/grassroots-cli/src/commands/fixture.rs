use grassroots_core::models::{Fixture, PlayerId, Team};

pub fn run_fixture(fixture: &Fixture) {
    for line in format_fixture_lines(fixture) {
        println!("{line}");
    }
}

pub fn format_fixture_lines(fixture: &Fixture) -> Vec<String> {
    let mut lines = vec![format!(
        "Match {} (season {}, period {})",
        fixture.match_id, fixture.season_id, fixture.period_number
    )];
    for (side, team) in [("Home", &fixture.home), ("Away", &fixture.away)] {
        lines.push(String::new());
        lines.push(format!("{side}: {} [{}]", team.name, team.id));
        lines.extend(roster_lines(team));
    }
    lines
}

fn roster_lines(team: &Team) -> Vec<String> {
    let mut lines = team
        .players
        .iter()
        .map(|player| format!("  {:>6}  {}", player.id.as_str(), player.full_name))
        .collect::<Vec<_>>();
    lines.push(format!("  {:>6}  Anonymous", PlayerId::ANONYMOUS));
    lines
}
