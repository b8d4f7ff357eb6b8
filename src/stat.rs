use tracing::info;

#[derive(Debug, Clone, Default)]
pub(crate) struct Stats {
    pub(crate) costs: usize,
    pub(crate) time_us: usize,
    pub(crate) low_level_expand_open_nodes: usize,
    pub(crate) low_level_expand_focal_nodes: usize,
    pub(crate) high_level_expand_nodes: usize,
}

impl Stats {
    pub(crate) fn print(&self, solver: &str) {
        info!(
            "{} Cost {:?} Time(microseconds) {:?} High level expand nodes {:?} Low level focal expansions {:?} Low level open expansions {:?}",
            solver,
            self.costs,
            self.time_us,
            self.high_level_expand_nodes,
            self.low_level_expand_focal_nodes,
            self.low_level_expand_open_nodes
        );
    }
}
