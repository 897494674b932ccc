//! Route aggregator: cached routes of many items to one renderable edge set.
//!
//! # Invariants
//! - Items with fewer than two waypoints contribute no edge and are counted
//!   in `skipped_items`.
//! - Without `dedupe_edges`, overlapping edges of different items are all kept.
//! - With `dedupe_edges`, the first edge of each start/end geometry wins.

use crate::config::AggregateConfig;
use crate::model::correspondence::ItemId;
use crate::model::route::{Edge, Route, RouteSet};
use crate::repo::correspondence_repo::CorrespondenceSource;
use crate::repo::place_repo::RepoResult;
use crate::service::route_cache::{RouteCache, RouteStore};
use crate::service::waypoint_builder::BuildRoute;
use log::info;
use std::collections::HashSet;
use std::time::Instant;

pub struct RouteAggregator<'cache, S, C, B> {
    cache: &'cache RouteCache<S, C, B>,
    config: AggregateConfig,
}

impl<'cache, S, C, B> RouteAggregator<'cache, S, C, B>
where
    S: CorrespondenceSource,
    C: RouteStore,
    B: BuildRoute,
{
    pub fn new(cache: &'cache RouteCache<S, C, B>, config: AggregateConfig) -> Self {
        Self { cache, config }
    }

    /// Builds edges for the given items, in the given order.
    pub fn build_route_set(&self, items: impl IntoIterator<Item = ItemId>) -> RouteSet {
        let started_at = Instant::now();
        let mut set = RouteSet::default();
        let mut seen = HashSet::new();
        let mut route_index = 0;

        for item in items {
            let route = self.cache.get_route(item);
            if !route.is_renderable() {
                set.skipped_items += 1;
                continue;
            }

            for edge in edges_for_route(&route, route_index) {
                if self.config.dedupe_edges && !seen.insert(edge.geometry_key()) {
                    continue;
                }
                set.edges.push(edge);
            }
            route_index += 1;
        }

        info!(
            "event=route_set_build module=route_aggregator status=ok routes={} edges={} skipped={} dedupe={} duration_ms={}",
            route_index,
            set.edges.len(),
            set.skipped_items,
            self.config.dedupe_edges,
            started_at.elapsed().as_millis()
        );
        set
    }

    /// Builds edges for every item in the archive.
    pub fn build_all(&self) -> RepoResult<RouteSet> {
        let items = self.cache.source().item_ids()?;
        Ok(self.build_route_set(items))
    }

    /// Builds edges for items sent or received by the named correspondent.
    pub fn build_for_correspondent(&self, display_name: &str) -> RepoResult<RouteSet> {
        let items = self.cache.source().item_ids_for_correspondent(display_name)?;
        Ok(self.build_route_set(items))
    }
}

/// Splits a route into consecutive waypoint pairs.
pub fn edges_for_route(route: &Route, route_index: usize) -> Vec<Edge> {
    route
        .waypoints
        .windows(2)
        .enumerate()
        .map(|(segment, pair)| Edge {
            id: format!("{}:{segment}", route.item_id),
            route_index,
            item_id: route.item_id,
            from: pair[0],
            to: pair[1],
        })
        .collect()
}
