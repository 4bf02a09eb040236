//! Model names and field paths of the tournament schema.

pub const TOKEN: &str = "Token";
pub const TOURNAMENT: &str = "Tournament";
pub const PRIZE: &str = "Prize";
pub const PLATFORM_METRICS: &str = "PlatformMetrics";
pub const PRIZE_METRICS: &str = "PrizeMetrics";

/// Every model the hooks query.
pub const ALL: &[&str] = &[TOKEN, TOURNAMENT, PRIZE, PLATFORM_METRICS, PRIZE_METRICS];

// ─── Field paths ──────────────────────────────────────────────────────────────

pub const ID: &str = "id";
pub const KEY: &str = "key";
pub const TOURNAMENT_ID: &str = "tournament_id";
pub const SCHEDULE_START: &str = "schedule.game.start";
pub const SCHEDULE_END: &str = "schedule.game.end";
