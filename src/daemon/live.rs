use anyhow::Result;

use super::{
    collection::counter::EventCounter,
    storage::{aggregation_store::AggregationStore, entities::Totals},
};

/// Today's stored totals plus the input the sampler has not drained yet. Screen time only moves
/// in whole ticks, so only clicks and keystrokes are topped up.
pub fn live_session_stats(store: &dyn AggregationStore, counter: &EventCounter) -> Result<Totals> {
    let stored = store.today_stats()?;
    let pending = counter.peek();
    Ok(Totals {
        mouse_clicks: stored.mouse_clicks + pending.clicks,
        keystrokes: stored.keystrokes + pending.keystrokes,
        ..stored
    })
}
