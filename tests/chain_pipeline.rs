// Chain-level behavior: executor properties, engine selection and the runner
use std::collections::HashMap;
use std::sync::Arc;
use insightease::engine::{EngineSelector, EngineThresholds, ExecutionEngine};
use insightease::executor::{
    AnalyticalBackend, CancellationToken, ChainRunner, ConditionEvaluator, DedupExecutor, NoTables,
    OperationExecutor, ReshapeExecutor, SampleExecutor, TableResolver,
};
use insightease::types::{
    Aggregation, DedupConfig, DeriveConfig, FilterCondition, FilterConfig, FilterLogic, FilterOperator,
    InsightError, JoinConfig, JoinType, KeepPolicy, MeltConfig, Operation, OperationChain, OperationKind,
    PivotConfig, PivotValue, Row, SampleConfig, SampleSize, Table, Value, ValueKey, WidenConfig,
};
use tokio::sync::mpsc;

fn sales() -> Table {
    Table::new(
        "sales",
        vec!["id".into(), "dept".into(), "amt".into()],
        vec![
            Row::from_pairs([("id", Value::Integer(1)), ("dept", Value::from("A")), ("amt", Value::Integer(10))]),
            Row::from_pairs([("id", Value::Integer(2)), ("dept", Value::from("A")), ("amt", Value::Integer(20))]),
            Row::from_pairs([("id", Value::Integer(3)), ("dept", Value::from("B")), ("amt", Value::Integer(5))]),
        ],
    )
}

fn wide(rows: usize) -> Table {
    Table::new(
        "wide",
        vec!["id".into(), "q1".into(), "q2".into(), "note".into()],
        (0..rows)
            .map(|i| {
                Row::from_pairs([
                    ("id", Value::Integer(i as i64)),
                    ("q1", Value::Integer((i * 7 % 11) as i64)),
                    ("q2", if i % 3 == 0 { Value::Null } else { Value::Real(i as f64 / 2.0) }),
                    ("note", Value::from(format!("n{}", i % 4))),
                ])
            })
            .collect(),
    )
}

fn row_keys(table: &Table, columns: &[String]) -> Vec<Vec<ValueKey>> {
    let mut keys: Vec<Vec<ValueKey>> = table.rows.iter().map(|r| r.key(columns, false)).collect();
    keys.sort();
    keys
}

fn pivot_sum_by_dept() -> Operation {
    Operation::new(
        "by dept",
        OperationKind::Pivot(PivotConfig {
            rows: vec!["dept".into()],
            values: vec![PivotValue { column: "amt".into(), aggregation: Aggregation::Sum }],
            ..PivotConfig::default()
        }),
    )
}

#[test]
fn test_pivot_scenario() {
    let out = OperationExecutor::execute(&sales(), &pivot_sum_by_dept()).unwrap();
    assert_eq!(out.columns, vec!["dept", "amt_sum"]);
    assert_eq!(out.rows.len(), 2);
    assert_eq!(out.rows[0], Row::from_pairs([("dept", Value::from("A")), ("amt_sum", Value::Integer(30))]));
    assert_eq!(out.rows[1], Row::from_pairs([("dept", Value::from("B")), ("amt_sum", Value::Integer(5))]));
}

#[test]
fn test_dedup_scenario() {
    let op = Operation::new(
        "one per dept",
        OperationKind::Dedup(DedupConfig { columns: vec!["dept".into()], keep: KeepPolicy::First, case_insensitive: false }),
    );
    let out = OperationExecutor::execute(&sales(), &op).unwrap();
    let ids: Vec<&Value> = out.rows.iter().map(|r| r.get("id")).collect();
    assert_eq!(ids, vec![&Value::Integer(1), &Value::Integer(3)]);
}

#[test]
fn test_filter_soundness() {
    let table = wide(40);
    let conditions = vec![
        FilterCondition::new("q1", FilterOperator::GreaterOrEqual, 4),
        FilterCondition::new("q2", FilterOperator::IsNotNull, Value::Null),
    ];
    for logic in [FilterLogic::And, FilterLogic::Or] {
        let config = FilterConfig { conditions: conditions.clone(), logic };
        let out = ConditionEvaluator::filter(&table, &config);
        assert!(out.rows.iter().all(|r| ConditionEvaluator::evaluate_all(r, &conditions, logic)));

        // sub-multiset in original order
        let mut source = table.rows.iter();
        for row in &out.rows {
            assert!(source.any(|r| r == row), "row out of order or not from the input");
        }
    }
}

#[test]
fn test_dedup_idempotence() {
    let table = wide(30);
    let column_sets = [vec![], vec!["note".to_string()], vec!["note".to_string(), "q1".to_string()]];
    for columns in column_sets {
        for keep in [KeepPolicy::First, KeepPolicy::Last] {
            for case_insensitive in [false, true] {
                let config = DedupConfig { columns: columns.clone(), keep, case_insensitive };
                let once = DedupExecutor::apply(&table, &config);
                let twice = DedupExecutor::apply(&once, &config);
                assert_eq!(once.rows, twice.rows);
                assert_eq!(once.columns, twice.columns);
            }
        }
    }
}

#[test]
fn test_melt_then_widen_round_trip() {
    let table = wide(12);
    let long = ReshapeExecutor::melt(
        &table,
        &MeltConfig::new(vec!["id".into()], vec!["q1".into(), "q2".into(), "note".into()]),
    )
    .unwrap();
    assert_eq!(long.row_count(), 36);

    let back = ReshapeExecutor::widen(
        &long,
        &WidenConfig { index: vec!["id".into()], columns: "variable".into(), values: "value".into() },
    )
    .unwrap();
    assert_eq!(row_keys(&back, &table.columns), row_keys(&table, &table.columns));
}

#[test]
fn test_sample_determinism() {
    let table = wide(50);
    for size in [SampleSize::Count { count: 7 }, SampleSize::Percentage { percentage: 30.0 }] {
        let config = SampleConfig { size, seed: 12345 };
        let a = SampleExecutor::apply(&table, &config).unwrap();
        let b = SampleExecutor::apply(&table, &config).unwrap();
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }
}

#[test]
fn test_engine_selection_monotonic() {
    let selector = EngineSelector::default();
    let simple = Operation::new("f", OperationKind::Filter(FilterConfig::default()));
    let complex = pivot_sum_by_dept();

    let mut escalated = false;
    for rows in [0, 10, 1_000, 100_000, 200_000, 200_001, 400_000] {
        let table = Table::new(
            "t",
            vec!["a".into(), "b".into()],
            vec![Row::new(); rows],
        );
        let decision = selector.choose(&table, &simple);
        if rows <= 200_000 {
            assert_eq!(decision.engine, ExecutionEngine::InProcess, "{rows} rows");
        }
        // never back to in-process once escalated
        assert!(!escalated || decision.is_escalated());
        escalated = decision.is_escalated();

        assert_eq!(selector.choose(&table, &complex).engine, ExecutionEngine::EmbeddedAnalytical);
    }
    assert!(escalated);
}

#[test]
fn test_chain_json_round_trip() {
    let chain = OperationChain::with_operations(
        "monthly",
        vec![
            Operation::new(
                "positive",
                OperationKind::Filter(FilterConfig {
                    conditions: vec![FilterCondition::new("amt", FilterOperator::GreaterThan, 0)],
                    logic: FilterLogic::And,
                }),
            ),
            Operation::new("double", OperationKind::Derive(DeriveConfig { column: "x2".into(), formula: "[amt] * 2".into() })),
            pivot_sum_by_dept(),
            Operation::new(
                "join",
                OperationKind::Join(JoinConfig {
                    right_table: "depts".into(),
                    join_type: JoinType::Left,
                    left_key: "dept".into(),
                    right_key: "code".into(),
                }),
            ),
        ],
    );
    let json = serde_json::to_string(&chain).unwrap();
    let back: OperationChain = serde_json::from_str(&json).unwrap();
    assert_eq!(back, chain);
}

#[test]
fn test_chain_runs_in_order_with_join_context() {
    let depts = Table::new(
        "depts",
        vec!["code".into(), "label".into()],
        vec![Row::from_pairs([("code", "A"), ("label", "Apparel")])],
    );
    let mut tables: HashMap<String, Table> = HashMap::new();
    tables.insert("depts".into(), depts);

    let operations = vec![
        Operation::new("tax", OperationKind::Derive(DeriveConfig { column: "gross".into(), formula: "[amt] * 1.5".into() })),
        Operation::new(
            "label",
            OperationKind::Join(JoinConfig {
                right_table: "depts".into(),
                join_type: JoinType::Left,
                left_key: "dept".into(),
                right_key: "code".into(),
            }),
        ),
    ];

    let runner = ChainRunner::default();
    let out = runner.run_in_process(&sales(), &operations, &tables).unwrap();
    assert_eq!(out.columns, vec!["id", "dept", "amt", "gross", "code", "label"]);
    assert_eq!(out.rows[0].get("gross"), &Value::Integer(15));
    assert_eq!(out.rows[0].get("label"), &Value::from("Apparel"));
    assert!(out.rows[2].get("label").is_null());

    // the same join without a resolver
    assert!(matches!(
        OperationExecutor::execute(&sales(), &operations[1]),
        Err(InsightError::NeedsMultiTableContext(_))
    ));
    assert!(matches!(
        runner.run_in_process(&sales(), &operations, &NoTables),
        Err(InsightError::TableNotFound(name)) if name == "depts"
    ));
}

#[test]
fn test_progress_is_ordered_and_cancellation_stops() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let runner = ChainRunner::default().with_progress(tx);
    let operations = vec![
        Operation::new("a", OperationKind::Dedup(DedupConfig::default())),
        Operation::new("b", OperationKind::Filter(FilterConfig::default())),
        pivot_sum_by_dept(),
    ];
    runner.run_in_process(&sales(), &operations, &NoTables).unwrap();
    drop(runner);

    let mut steps = Vec::new();
    while let Ok(progress) = rx.try_recv() {
        assert_eq!(progress.total, 3);
        steps.push(progress.step);
    }
    assert_eq!(steps, vec![0, 1, 2]);

    let token = CancellationToken::new();
    let runner = ChainRunner::default().with_cancellation(token.clone());
    token.cancel();
    assert!(matches!(
        runner.run_in_process(&sales(), &operations, &NoTables),
        Err(InsightError::Cancelled { step: 0 })
    ));
}

struct EchoBackend;

impl AnalyticalBackend for EchoBackend {
    fn name(&self) -> &str {
        "echo"
    }

    fn run_chain(&self, table: &Table, _operations: &[Operation], _tables: &dyn TableResolver) -> Result<Table, InsightError> {
        Ok(table.derive_from(table.columns.clone(), table.rows.clone()))
    }
}

#[test]
fn test_escalation_needs_a_backend() {
    let operations = vec![pivot_sum_by_dept()];
    let runner = ChainRunner::default();
    assert!(matches!(
        runner.run_auto(&sales(), &operations, &NoTables),
        Err(InsightError::EngineUnavailable(_))
    ));

    let runner = ChainRunner::new(EngineSelector::new(EngineThresholds::default())).with_backend(Arc::new(EchoBackend));
    let (decision, out) = runner.run_auto(&sales(), &operations, &NoTables).unwrap();
    assert_eq!(decision.engine, ExecutionEngine::EmbeddedAnalytical);
    assert_eq!(out.row_count(), 3);
}
