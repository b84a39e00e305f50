//! Basin propagation graph.
//!
//! A fixed directed graph of river nodes. Each edge carries an integer
//! transit delay in days; an anomaly injected at one node on day 0 is
//! diffused downstream, attenuated by transit time and damped by a constant
//! transfer factor on every hop.
//!
//! Every delay is at least one day, so day `d` only reads values from days
//! strictly before `d`. Construction rejects any zero-delay edge.

use crate::config::{BasinConfig, NodeKind, NodeSpec};
use crate::logging::{self, Component};
use crate::model::{HydroError, PropagationSeries};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
struct Edge {
    from: usize,
    to: usize,
    delay_days: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasinPropagationGraph {
    nodes: Vec<NodeSpec>,
    edges: Vec<Edge>,
    transfer: f64,
}

impl BasinPropagationGraph {
    /// Builds and validates the graph described by `config`.
    pub fn new(config: &BasinConfig) -> Result<Self, HydroError> {
        config.validate()?;

        let index: BTreeMap<&str, usize> = config
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();

        let mut edges = Vec::with_capacity(config.edges.len());
        for spec in &config.edges {
            let (Some(&from), Some(&to)) = (index.get(spec.from.as_str()), index.get(spec.to.as_str()))
            else {
                return Err(HydroError::InvalidTopology(format!(
                    "edge {} -> {} references an unknown node",
                    spec.from, spec.to
                )));
            };
            edges.push(Edge {
                from,
                to,
                delay_days: spec.delay_days,
            });
        }

        logging::debug(
            Component::Basin,
            None,
            &format!("basin graph ready: {} nodes, {} edges", config.nodes.len(), edges.len()),
        );

        Ok(Self {
            nodes: config.nodes.clone(),
            edges,
            transfer: config.transfer,
        })
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.id.as_str())
    }

    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<&NodeSpec> {
        self.nodes.iter().filter(|n| n.kind == kind).collect()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Smallest edge delay, or `None` for an edgeless graph.
    pub fn min_delay(&self) -> Option<usize> {
        self.edges.iter().map(|e| e.delay_days).min()
    }

    /// Diffuses `anomaly`, injected at `source` on day 0, for `horizon` days.
    pub fn propagate(
        &self,
        anomaly: f64,
        source: &str,
        horizon: usize,
    ) -> Result<PropagationSeries, HydroError> {
        let source_index = self
            .nodes
            .iter()
            .position(|n| n.id == source)
            .ok_or_else(|| HydroError::UnknownNode(source.to_string()))?;

        let mut series = vec![vec![0.0; horizon]; self.nodes.len()];
        if horizon > 0 {
            series[source_index][0] = anomaly;
        }

        for day in 1..horizon {
            for edge in &self.edges {
                if edge.delay_days > day {
                    continue;
                }
                let upstream = series[edge.from][day - edge.delay_days];
                if upstream == 0.0 {
                    continue;
                }
                let attenuation = 1.0 - edge.delay_days as f64 / (2.0 * horizon as f64);
                series[edge.to][day] += upstream * attenuation * self.transfer;
            }
        }

        Ok(PropagationSeries {
            horizon_days: horizon,
            series: self
                .nodes
                .iter()
                .map(|n| n.id.clone())
                .zip(series)
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EdgeSpec;

    fn graph() -> BasinPropagationGraph {
        BasinPropagationGraph::new(&BasinConfig::default()).expect("default basin is valid")
    }

    #[test]
    fn test_default_topology_shape() {
        let g = graph();
        assert_eq!(g.node_ids().count(), 7);
        assert_eq!(g.edge_count(), 8);
        assert_eq!(g.nodes_of_kind(NodeKind::Dam).len(), 2);
        assert_eq!(g.nodes_of_kind(NodeKind::Outlet).len(), 1);
        assert_eq!(g.node("kaedi").map(|n| n.name.as_str()), Some("Kaédi"));
    }

    #[test]
    fn test_no_edge_has_zero_delay() {
        assert!(graph().min_delay().unwrap() >= 1);
    }

    #[test]
    fn test_zero_delay_edge_rejected_at_construction() {
        let mut config = BasinConfig::default();
        config.edges.push(EdgeSpec {
            from: "matam".into(),
            to: "bakel".into(),
            delay_days: 0,
        });
        assert!(matches!(
            BasinPropagationGraph::new(&config),
            Err(HydroError::InvalidTopology(_))
        ));
    }

    #[test]
    fn test_single_day_horizon_only_touches_source() {
        let result = graph().propagate(100.0, "bakel", 1).unwrap();
        assert_eq!(result.node("bakel").unwrap(), &[100.0]);
        for (id, values) in &result.series {
            if id != "bakel" {
                assert!(values.iter().all(|&v| v == 0.0), "{} should be untouched", id);
            }
        }
    }

    #[test]
    fn test_one_day_edge_fires_on_day_one() {
        // bakel -> matam has delay 1: 100 × (1 − 1/20) × 0.7 = 66.5
        let result = graph().propagate(100.0, "bakel", 10).unwrap();
        let matam = result.node("matam").unwrap();
        assert!((matam[1] - 66.5).abs() < 1e-9);
        assert_eq!(matam[0], 0.0);
        assert!(matam[2..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_multi_hop_arrival_days() {
        // bakel -1-> matam -3-> kaedi -8-> diama -2-> delta
        let result = graph().propagate(100.0, "bakel", 16).unwrap();
        let kaedi = result.node("kaedi").unwrap();
        assert!(kaedi[4] > 0.0);
        assert!(kaedi[..4].iter().all(|&v| v == 0.0));
        let diama = result.node("diama").unwrap();
        assert!(diama[12] > 0.0);
        assert!(diama[..12].iter().all(|&v| v == 0.0));
        let delta = result.node("delta").unwrap();
        assert!(delta[14] > 0.0);
        // Nothing flows upstream.
        assert!(result.node("fouta_djallon").unwrap().iter().all(|&v| v == 0.0));
        assert!(result.node("manantali").unwrap().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_signal_decays_along_the_path() {
        let result = graph().propagate(100.0, "bakel", 16).unwrap();
        let peak = |id: &str| {
            result
                .node(id)
                .unwrap()
                .iter()
                .cloned()
                .fold(0.0_f64, f64::max)
        };
        assert!(peak("bakel") > peak("matam"));
        assert!(peak("matam") > peak("kaedi"));
        assert!(peak("kaedi") > peak("diama"));
        assert!(peak("diama") > peak("delta"));
    }

    #[test]
    fn test_zero_horizon_returns_empty_series() {
        let result = graph().propagate(100.0, "bakel", 0).unwrap();
        assert_eq!(result.series.len(), 7);
        assert!(result.series.values().all(|v| v.is_empty()));
    }

    #[test]
    fn test_unknown_source_is_an_error() {
        assert_eq!(
            graph().propagate(1.0, "timbuktu", 5).unwrap_err(),
            HydroError::UnknownNode("timbuktu".into())
        );
    }
}
