//! Postgres-backed repository implementation.
//!
//! Every upsert is a single multi-row `INSERT ... ON CONFLICT` keyed on the
//! entity's natural identifier, so replaying a batch can never create
//! duplicate rows.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{
    QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
    query,
};
use time::OffsetDateTime;

use crate::application::repos::{FplRepositories, RepoError};
use crate::domain::entities::{Fixture, Gameweek, Player, PlayerGameweekStat, Team};

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }
}

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db)
            if db
                .message()
                .contains("canceling statement due to user request") =>
        {
            RepoError::Timeout
        }
        other => RepoError::from_persistence(other),
    }
}

#[derive(sqlx::FromRow)]
struct PlayerStatRow {
    player_id: i64,
    gameweek_id: i64,
    minutes: i64,
    goals_scored: i64,
    assists: i64,
    clean_sheets: i64,
    goals_conceded: i64,
    own_goals: i64,
    penalties_saved: i64,
    penalties_missed: i64,
    yellow_cards: i64,
    red_cards: i64,
    saves: i64,
    bonus: i64,
    total_points: i64,
    created_at: OffsetDateTime,
}

impl From<PlayerStatRow> for PlayerGameweekStat {
    fn from(row: PlayerStatRow) -> Self {
        Self {
            player_id: row.player_id,
            gameweek_id: row.gameweek_id,
            minutes: row.minutes,
            goals_scored: row.goals_scored,
            assists: row.assists,
            clean_sheets: row.clean_sheets,
            goals_conceded: row.goals_conceded,
            own_goals: row.own_goals,
            penalties_saved: row.penalties_saved,
            penalties_missed: row.penalties_missed,
            yellow_cards: row.yellow_cards,
            red_cards: row.red_cards,
            saves: row.saves,
            bonus: row.bonus,
            total_points: row.total_points,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl FplRepositories for PostgresRepositories {
    async fn upsert_teams(&self, teams: &[Team]) -> Result<(), RepoError> {
        if teams.is_empty() {
            return Ok(());
        }
        let mut qb = QueryBuilder::new("INSERT INTO teams (id, name, short_name, last_updated) ");
        qb.push_values(teams, |mut row, team| {
            row.push_bind(team.id)
                .push_bind(&team.name)
                .push_bind(&team.short_name)
                .push_bind(team.last_updated);
        });
        qb.push(
            " ON CONFLICT (id) DO UPDATE SET \
             name = EXCLUDED.name, \
             short_name = EXCLUDED.short_name, \
             last_updated = EXCLUDED.last_updated",
        );
        qb.build()
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn upsert_players(&self, players: &[Player]) -> Result<(), RepoError> {
        if players.is_empty() {
            return Ok(());
        }
        let mut qb = QueryBuilder::new(
            "INSERT INTO players \
             (id, web_name, full_name, team_id, position, form, points_per_game, \
              total_points, selected_by_percent, last_updated) ",
        );
        qb.push_values(players, |mut row, player| {
            row.push_bind(player.id)
                .push_bind(&player.web_name)
                .push_bind(&player.full_name)
                .push_bind(player.team_id)
                .push_bind(player.position.as_str())
                .push_bind(player.form.as_deref())
                .push_bind(player.points_per_game.as_deref())
                .push_bind(player.total_points)
                .push_bind(player.selected_by_percent.as_deref())
                .push_bind(player.last_updated);
        });
        qb.push(
            " ON CONFLICT (id) DO UPDATE SET \
             web_name = EXCLUDED.web_name, \
             full_name = EXCLUDED.full_name, \
             team_id = EXCLUDED.team_id, \
             position = EXCLUDED.position, \
             form = EXCLUDED.form, \
             points_per_game = EXCLUDED.points_per_game, \
             total_points = EXCLUDED.total_points, \
             selected_by_percent = EXCLUDED.selected_by_percent, \
             last_updated = EXCLUDED.last_updated",
        );
        qb.build()
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn upsert_gameweeks(&self, gameweeks: &[Gameweek]) -> Result<(), RepoError> {
        if gameweeks.is_empty() {
            return Ok(());
        }
        let mut qb = QueryBuilder::new(
            "INSERT INTO gameweeks \
             (id, name, deadline_time, is_current, is_next, finished, last_updated) ",
        );
        qb.push_values(gameweeks, |mut row, gameweek| {
            row.push_bind(gameweek.id)
                .push_bind(&gameweek.name)
                .push_bind(gameweek.deadline_time)
                .push_bind(gameweek.is_current)
                .push_bind(gameweek.is_next)
                .push_bind(gameweek.finished)
                .push_bind(gameweek.last_updated);
        });
        qb.push(
            " ON CONFLICT (id) DO UPDATE SET \
             name = EXCLUDED.name, \
             deadline_time = EXCLUDED.deadline_time, \
             is_current = EXCLUDED.is_current, \
             is_next = EXCLUDED.is_next, \
             finished = EXCLUDED.finished, \
             last_updated = EXCLUDED.last_updated",
        );
        qb.build()
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn upsert_fixtures(&self, fixtures: &[Fixture]) -> Result<(), RepoError> {
        if fixtures.is_empty() {
            return Ok(());
        }
        let mut qb = QueryBuilder::new(
            "INSERT INTO fixtures \
             (id, gameweek_id, home_team_id, away_team_id, kickoff_time, finished, \
              team_h_score, team_a_score, last_updated) ",
        );
        qb.push_values(fixtures, |mut row, fixture| {
            row.push_bind(fixture.id)
                .push_bind(fixture.gameweek_id)
                .push_bind(fixture.home_team_id)
                .push_bind(fixture.away_team_id)
                .push_bind(fixture.kickoff_time)
                .push_bind(fixture.finished)
                .push_bind(fixture.team_h_score)
                .push_bind(fixture.team_a_score)
                .push_bind(fixture.last_updated);
        });
        qb.push(
            " ON CONFLICT (id) DO UPDATE SET \
             gameweek_id = EXCLUDED.gameweek_id, \
             home_team_id = EXCLUDED.home_team_id, \
             away_team_id = EXCLUDED.away_team_id, \
             kickoff_time = EXCLUDED.kickoff_time, \
             finished = EXCLUDED.finished, \
             team_h_score = EXCLUDED.team_h_score, \
             team_a_score = EXCLUDED.team_a_score, \
             last_updated = EXCLUDED.last_updated",
        );
        qb.build()
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn upsert_fixture_results(&self, fixtures: &[Fixture]) -> Result<(), RepoError> {
        if fixtures.is_empty() {
            return Ok(());
        }
        let mut qb = QueryBuilder::new(
            "INSERT INTO fixtures \
             (id, gameweek_id, home_team_id, away_team_id, kickoff_time, finished, \
              team_h_score, team_a_score, last_updated) ",
        );
        qb.push_values(fixtures, |mut row, fixture| {
            row.push_bind(fixture.id)
                .push_bind(fixture.gameweek_id)
                .push_bind(fixture.home_team_id)
                .push_bind(fixture.away_team_id)
                .push_bind(fixture.kickoff_time)
                .push_bind(fixture.finished)
                .push_bind(fixture.team_h_score)
                .push_bind(fixture.team_a_score)
                .push_bind(fixture.last_updated);
        });
        qb.push(
            " ON CONFLICT (id) DO UPDATE SET \
             finished = EXCLUDED.finished, \
             team_h_score = EXCLUDED.team_h_score, \
             team_a_score = EXCLUDED.team_a_score, \
             last_updated = EXCLUDED.last_updated",
        );
        qb.build()
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn upsert_player_stats(&self, stats: &[PlayerGameweekStat]) -> Result<(), RepoError> {
        if stats.is_empty() {
            return Ok(());
        }
        let mut qb = QueryBuilder::new(
            "INSERT INTO player_gameweek_stats \
             (player_id, gameweek_id, minutes, goals_scored, assists, clean_sheets, \
              goals_conceded, own_goals, penalties_saved, penalties_missed, \
              yellow_cards, red_cards, saves, bonus, total_points, created_at) ",
        );
        qb.push_values(stats, |mut row, stat| {
            row.push_bind(stat.player_id)
                .push_bind(stat.gameweek_id)
                .push_bind(stat.minutes)
                .push_bind(stat.goals_scored)
                .push_bind(stat.assists)
                .push_bind(stat.clean_sheets)
                .push_bind(stat.goals_conceded)
                .push_bind(stat.own_goals)
                .push_bind(stat.penalties_saved)
                .push_bind(stat.penalties_missed)
                .push_bind(stat.yellow_cards)
                .push_bind(stat.red_cards)
                .push_bind(stat.saves)
                .push_bind(stat.bonus)
                .push_bind(stat.total_points)
                .push_bind(stat.created_at);
        });
        qb.push(
            " ON CONFLICT (player_id, gameweek_id) DO UPDATE SET \
             minutes = EXCLUDED.minutes, \
             goals_scored = EXCLUDED.goals_scored, \
             assists = EXCLUDED.assists, \
             clean_sheets = EXCLUDED.clean_sheets, \
             goals_conceded = EXCLUDED.goals_conceded, \
             own_goals = EXCLUDED.own_goals, \
             penalties_saved = EXCLUDED.penalties_saved, \
             penalties_missed = EXCLUDED.penalties_missed, \
             yellow_cards = EXCLUDED.yellow_cards, \
             red_cards = EXCLUDED.red_cards, \
             saves = EXCLUDED.saves, \
             bonus = EXCLUDED.bonus, \
             total_points = EXCLUDED.total_points",
        );
        qb.build()
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn find_player_stat(
        &self,
        player_id: i64,
        gameweek_id: i64,
    ) -> Result<Option<PlayerGameweekStat>, RepoError> {
        let row = sqlx::query_as::<_, PlayerStatRow>(
            "SELECT player_id, gameweek_id, minutes, goals_scored, assists, clean_sheets, \
                    goals_conceded, own_goals, penalties_saved, penalties_missed, \
                    yellow_cards, red_cards, saves, bonus, total_points, created_at \
             FROM player_gameweek_stats \
             WHERE player_id = $1 AND gameweek_id = $2",
        )
        .bind(player_id)
        .bind(gameweek_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PlayerGameweekStat::from))
    }
}
