//! Bundled apps on small graphs, checked against hand-computed results for
//! several fragment counts

use approx::assert_relative_eq;
use grape_core::apps::{InDegree, PageRank, PageRankArgs, Sssp, SsspArgs, Wcc};
use grape_core::{
    App, AutoMessageManager, Context, EdgeCutFragment, Error, Fragment, FragmentBuilder,
    LocalCluster, MessageStrategy, Oid, ParallelEngine, QueryOutcome, SyncBuffer, VertexValue,
    WorkerConfig,
};
use std::collections::BTreeMap;
use std::sync::Arc;

fn build(
    fnum: u32,
    vertices: std::ops::Range<Oid>,
    edges: &[(Oid, Oid, f64)],
) -> Vec<Arc<EdgeCutFragment>> {
    let mut builder = FragmentBuilder::new(fnum);
    for oid in vertices {
        builder.add_vertex(oid);
    }
    for &(src, dst, weight) in edges {
        builder.add_edge(src, dst, weight);
    }
    builder.build().unwrap().into_iter().map(Arc::new).collect()
}

fn by_oid<T: Clone>(outcomes: &[QueryOutcome<Vec<VertexValue<T>>>]) -> BTreeMap<Oid, T> {
    outcomes
        .iter()
        .flat_map(|o| o.output.iter())
        .map(|v| (v.oid, v.value.clone()))
        .collect()
}

const WEIGHTED: &[(Oid, Oid, f64)] = &[
    (0, 1, 1.0),
    (0, 2, 4.0),
    (1, 2, 2.0),
    (2, 3, 1.0),
    (3, 4, 3.0),
    (1, 4, 10.0),
];

#[test]
fn test_sssp() {
    for fnum in 1..=3 {
        let frags = build(fnum, 0..6, WEIGHTED);
        let config = WorkerConfig::new(2);
        let outcomes = LocalCluster::run(&frags, Arc::new(Sssp), &SsspArgs::new(0), &config)
            .unwrap();
        assert_eq!(outcomes.len(), fnum as usize);

        let dist = by_oid(&outcomes);
        assert_eq!(dist[&0], 0.0);
        assert_eq!(dist[&1], 1.0);
        assert_eq!(dist[&2], 3.0);
        assert_eq!(dist[&3], 4.0);
        assert_eq!(dist[&4], 7.0);
        assert!(dist[&5].is_infinite(), "fnum {}", fnum);
    }
}

#[test]
fn test_sssp_source_elsewhere() {
    let frags = build(2, 0..6, WEIGHTED);
    let outcomes = LocalCluster::run(
        &frags,
        Arc::new(Sssp),
        &SsspArgs::new(3),
        &WorkerConfig::default(),
    )
    .unwrap();
    let dist = by_oid(&outcomes);
    assert_eq!(dist[&3], 0.0);
    assert_eq!(dist[&4], 3.0);
    assert!(dist[&0].is_infinite());
}

#[test]
fn test_wcc() {
    let edges = [(0, 1, 1.0), (2, 1, 1.0), (4, 3, 1.0), (6, 4, 1.0)];
    for fnum in 1..=4 {
        let frags = build(fnum, 0..8, &edges);
        let outcomes =
            LocalCluster::run(&frags, Arc::new(Wcc), &(), &WorkerConfig::default()).unwrap();
        let comp = by_oid(&outcomes);
        let expected: BTreeMap<Oid, Oid> =
            [(0, 0), (1, 0), (2, 0), (3, 3), (4, 3), (5, 5), (6, 3), (7, 7)]
                .into_iter()
                .collect();
        assert_eq!(comp, expected, "fnum {}", fnum);
    }
}

#[test]
fn test_in_degree() {
    let edges = [(0, 3, 1.0), (1, 3, 1.0), (2, 3, 1.0), (3, 0, 1.0), (1, 0, 1.0)];
    for fnum in 1..=3 {
        let frags = build(fnum, 0..5, &edges);
        let outcomes =
            LocalCluster::run(&frags, Arc::new(InDegree), &(), &WorkerConfig::default())
                .unwrap();
        let degree = by_oid(&outcomes);
        let expected: BTreeMap<Oid, u64> =
            [(0, 2), (1, 0), (2, 0), (3, 3), (4, 0)].into_iter().collect();
        assert_eq!(degree, expected);

        // PEval, then one round to merge the shipped counts
        let expected_rounds = if fnum == 1 { 1 } else { 2 };
        assert!(outcomes.iter().all(|o| o.stats.rounds == expected_rounds));
    }
}

#[test]
fn test_page_rank_on_cycle() {
    let edges = [(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0), (3, 0, 1.0)];
    let frags = build(2, 0..4, &edges);
    let args = PageRankArgs::default().with_max_round(5);
    let outcomes =
        LocalCluster::run(&frags, Arc::new(PageRank), &args, &WorkerConfig::default()).unwrap();

    for rank in by_oid(&outcomes).values() {
        assert_relative_eq!(*rank, 0.25, epsilon = 1e-12);
    }
    assert!(outcomes.iter().all(|o| o.stats.rounds == 6));
}

#[test]
fn test_page_rank_independent_of_partitioning() {
    let edges = [
        (0, 1, 1.0),
        (0, 2, 1.0),
        (1, 2, 1.0),
        (2, 0, 1.0),
        (3, 2, 1.0),
        (4, 3, 1.0),
        (4, 0, 1.0),
        (5, 4, 1.0),
        (2, 5, 1.0),
    ];
    let args = PageRankArgs::default().with_max_round(8);
    let reference = by_oid(
        &LocalCluster::run(
            &build(1, 0..6, &edges),
            Arc::new(PageRank),
            &args,
            &WorkerConfig::default(),
        )
        .unwrap(),
    );
    // Every vertex has an outgoing edge, so rank mass is conserved.
    assert_relative_eq!(reference.values().sum::<f64>(), 1.0, epsilon = 1e-9);

    for fnum in 2..=4 {
        let ranks = by_oid(
            &LocalCluster::run(
                &build(fnum, 0..6, &edges),
                Arc::new(PageRank),
                &args,
                &WorkerConfig::new(2),
            )
            .unwrap(),
        );
        for (oid, rank) in &ranks {
            assert_relative_eq!(*rank, reference[oid], epsilon = 1e-12);
        }
    }
}

#[test]
fn test_page_rank_rejects_bad_damping() {
    let frags = build(2, 0..2, &[(0, 1, 1.0)]);
    let args = PageRankArgs::default().with_damping(1.5);
    let err = LocalCluster::run(&frags, Arc::new(PageRank), &args, &WorkerConfig::default())
        .unwrap_err();
    assert!(matches!(err, Error::App(_)));
}

/// Fails in IncEval on one fragment only
#[derive(Debug, Default)]
struct FailingApp;

#[derive(Debug, Default)]
struct FailingContext;

impl<F: Fragment> Context<F> for FailingContext {
    type Args = ();
    type Output = ();

    fn init(
        &mut self,
        _frag: &F,
        _messages: &mut AutoMessageManager,
        _args: &(),
    ) -> grape_core::Result<()> {
        Ok(())
    }

    fn output(&self, _frag: &F, _messages: &AutoMessageManager) -> grape_core::Result<()> {
        Ok(())
    }
}

impl<F: Fragment> App<F> for FailingApp {
    type Context = FailingContext;

    fn name(&self) -> &'static str {
        "failing"
    }

    fn peval(
        &self,
        _frag: &F,
        _ctx: &mut FailingContext,
        messages: &mut AutoMessageManager,
        _engine: &ParallelEngine,
    ) -> grape_core::Result<()> {
        messages.force_continue();
        Ok(())
    }

    fn inc_eval(
        &self,
        frag: &F,
        _ctx: &mut FailingContext,
        messages: &mut AutoMessageManager,
        _engine: &ParallelEngine,
    ) -> grape_core::Result<()> {
        if frag.fid() == 1 {
            return Err(Error::app("diverged"));
        }
        messages.force_continue();
        Ok(())
    }
}

#[test]
fn test_app_failure_aborts_every_fragment() {
    let frags = build(3, 0..6, &[]);
    let err = LocalCluster::run(&frags, Arc::new(FailingApp), &(), &WorkerConfig::default())
        .unwrap_err();
    assert!(matches!(err, Error::App(ref msg) if msg == "diverged"), "{}", err);
}

/// Registers its buffer with an edge-routed strategy
#[derive(Debug, Default)]
struct EdgeRoutedApp;

#[derive(Debug, Default)]
struct EdgeRoutedContext;

impl<F: Fragment> Context<F> for EdgeRoutedContext {
    type Args = ();
    type Output = ();

    fn init(
        &mut self,
        frag: &F,
        messages: &mut AutoMessageManager,
        _args: &(),
    ) -> grape_core::Result<()> {
        let buffer =
            SyncBuffer::with_kind(frag.vertices(0), 0.0f64, grape_core::AggregateKind::Min)?;
        messages.register_sync_buffer(
            frag,
            0,
            buffer,
            MessageStrategy::AlongOutgoingEdgeToOuterVertex,
        )?;
        Ok(())
    }

    fn output(&self, _frag: &F, _messages: &AutoMessageManager) -> grape_core::Result<()> {
        Ok(())
    }
}

impl<F: Fragment> App<F> for EdgeRoutedApp {
    type Context = EdgeRoutedContext;

    fn name(&self) -> &'static str {
        "edge_routed"
    }

    fn peval(
        &self,
        _frag: &F,
        _ctx: &mut EdgeRoutedContext,
        _messages: &mut AutoMessageManager,
        _engine: &ParallelEngine,
    ) -> grape_core::Result<()> {
        Ok(())
    }

    fn inc_eval(
        &self,
        _frag: &F,
        _ctx: &mut EdgeRoutedContext,
        _messages: &mut AutoMessageManager,
        _engine: &ParallelEngine,
    ) -> grape_core::Result<()> {
        Ok(())
    }
}

#[test]
fn test_edge_routed_strategy_fails_query() {
    let frags = build(2, 0..4, &[(0, 1, 1.0)]);
    let err = LocalCluster::run(&frags, Arc::new(EdgeRoutedApp), &(), &WorkerConfig::default())
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "{}", err);
    assert!(err.to_string().contains("AlongOutgoingEdgeToOuterVertex"));
}

#[test]
fn test_invalid_worker_config() {
    let frags = build(2, 0..4, &[]);
    let config = WorkerConfig::new(0);
    let err = LocalCluster::run(&frags, Arc::new(Wcc), &(), &config).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}
