//! Pure query constructors for the tournament schema.
//!
//! Identifier and time operands are normalized before they enter a filter,
//! so they compare against stored fixed-width values.

use chainsync_core::error::SyncError;
use chainsync_core::ids::{normalize_id, normalize_ids, IdInput};
use chainsync_core::query::{self, FetchOptions, OrderBy, Query, QueryBuilder};

use crate::models::{
    ID, KEY, PLATFORM_METRICS, PRIZE, PRIZE_METRICS, SCHEDULE_END, SCHEDULE_START, TOKEN,
    TOURNAMENT, TOURNAMENT_ID,
};

/// Every `Token`.
pub fn tokens(namespace: &str) -> Query {
    query::build(namespace, [(TOKEN, vec![])])
}

/// Every `Tournament`.
pub fn tournaments(namespace: &str) -> Query {
    query::build(namespace, [(TOURNAMENT, vec![])])
}

/// `PlatformMetrics` whose `key` equals `key`.
pub fn tournament_counts(namespace: &str, key: &IdInput) -> Result<Query, SyncError> {
    metrics_by_key(namespace, PLATFORM_METRICS, key)
}

/// `PrizeMetrics` whose `key` equals `key`.
pub fn prize_counts(namespace: &str, key: &IdInput) -> Result<Query, SyncError> {
    metrics_by_key(namespace, PRIZE_METRICS, key)
}

fn metrics_by_key(namespace: &str, model: &str, key: &IdInput) -> Result<Query, SyncError> {
    let key = normalize_id(key.clone())?;
    Ok(QueryBuilder::new(namespace)
        .entity(model, |e| e.eq(KEY, key))
        .build())
}

/// Tournaments whose game starts after `now`.
pub fn upcoming_tournaments(namespace: &str, now: &IdInput) -> Result<Query, SyncError> {
    let now = normalize_id(now.clone())?;
    Ok(QueryBuilder::new(namespace)
        .entity(TOURNAMENT, |e| e.gt(SCHEDULE_START, now))
        .build())
}

/// Tournaments whose game has started at `now` and not yet ended.
pub fn live_tournaments(namespace: &str, now: &IdInput) -> Result<Query, SyncError> {
    let now = normalize_id(now.clone())?;
    Ok(QueryBuilder::new(namespace)
        .entity(TOURNAMENT, |e| {
            e.lte(SCHEDULE_START, &now).gt(SCHEDULE_END, &now)
        })
        .build())
}

/// One tournament by id, plus the prizes attached to it.
pub fn tournament_details(namespace: &str, id: &IdInput) -> Result<Query, SyncError> {
    let id = normalize_id(id.clone())?;
    Ok(QueryBuilder::new(namespace)
        .entity(TOURNAMENT, |e| e.eq(ID, &id))
        .entity(PRIZE, |e| e.eq(TOURNAMENT_ID, &id))
        .build())
}

/// Prizes attached to any of `ids`.
pub fn tournament_details_in_list(namespace: &str, ids: &[IdInput]) -> Result<Query, SyncError> {
    let ids = normalize_ids(ids.iter().cloned())?;
    Ok(QueryBuilder::new(namespace)
        .entity(PRIZE, |e| e.is_in(TOURNAMENT_ID, ids))
        .build())
}

/// Ascending by game start, paginated.
pub fn by_schedule_start(namespace: &str, limit: u32, offset: u32) -> FetchOptions {
    FetchOptions::new()
        .order_by(OrderBy::asc(namespace, TOURNAMENT, SCHEDULE_START))
        .limit(limit)
        .offset(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainsync_core::filter::Filter;

    const NS: &str = "budokan";
    const ONE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn unfiltered_listings() {
        let q = tokens(NS);
        assert!(q.contains_model(TOKEN));
        assert!(q.filter_for(TOKEN).is_none());
        assert_eq!(tournaments(NS).model_names().collect::<Vec<_>>(), vec![TOURNAMENT]);
    }

    #[test]
    fn metrics_key_is_padded() {
        let q = tournament_counts(NS, &IdInput::from(1u64)).unwrap();
        assert_eq!(q.filter_for(PLATFORM_METRICS), Some(&Filter::eq(KEY, ONE)));

        let q = prize_counts(NS, &IdInput::from("0x1")).unwrap();
        assert_eq!(q.filter_for(PRIZE_METRICS), Some(&Filter::eq(KEY, ONE)));
    }

    #[test]
    fn live_window_is_a_conjunction() {
        let q = live_tournaments(NS, &IdInput::from(1u64)).unwrap();
        assert_eq!(
            q.filter_for(TOURNAMENT),
            Some(&Filter::and(vec![
                Filter::lte(SCHEDULE_START, ONE),
                Filter::gt(SCHEDULE_END, ONE),
            ]))
        );
    }

    #[test]
    fn details_span_tournament_and_prize() {
        let q = tournament_details(NS, &IdInput::from(1u64)).unwrap();
        assert_eq!(q.filter_for(TOURNAMENT), Some(&Filter::eq(ID, ONE)));
        assert_eq!(q.filter_for(PRIZE), Some(&Filter::eq(TOURNAMENT_ID, ONE)));
    }

    #[test]
    fn details_in_list_pads_every_id() {
        let q = tournament_details_in_list(NS, &[1u64.into(), "0x1".into()]).unwrap();
        assert_eq!(
            q.filter_for(PRIZE),
            Some(&Filter::is_in(TOURNAMENT_ID, [ONE, ONE]))
        );
    }

    #[test]
    fn invalid_time_is_rejected() {
        let err = upcoming_tournaments(NS, &IdInput::from(-1i64)).unwrap_err();
        assert!(err.is_caller_error());
    }

    #[test]
    fn schedule_sort_targets_namespaced_model() {
        let options = by_schedule_start(NS, 10, 20);
        assert_eq!(options.order_by[0].model, "budokan-Tournament");
        assert_eq!(options.order_by[0].member, SCHEDULE_START);
        assert_eq!((options.limit, options.offset), (Some(10), Some(20)));
    }

    #[test]
    fn equal_inputs_build_equal_queries() {
        let a = upcoming_tournaments(NS, &IdInput::from(5u64)).unwrap();
        let b = upcoming_tournaments(NS, &IdInput::from("0x5")).unwrap();
        assert_eq!(a, b);
    }
}
