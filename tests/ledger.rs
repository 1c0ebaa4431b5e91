//! Library-level checks over whole command sequences

use chrono::NaiveDate;
use invest_ledger::core::{
    project, EventLog, InMemoryEventLog, InvestmentId, JsonFileEventLog, Outcome,
    ProcessorConfig, Rejection, TransactionCommand, TransactionKind, TransactionProcessor,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::thread;

#[derive(Debug, Clone)]
enum Op {
    Buy { quantity: u32, price: u32 },
    Sell { quantity: u32, price: u32 },
    Dividend { amount: u32 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u32..100, 1u32..1000).prop_map(|(quantity, price)| Op::Buy { quantity, price }),
        (1u32..100, 1u32..1000).prop_map(|(quantity, price)| Op::Sell { quantity, price }),
        (1u32..500).prop_map(|amount| Op::Dividend { amount }),
    ]
}

fn command(key: usize, op: &Op) -> TransactionCommand {
    let (kind, quantity, price, amount) = match *op {
        Op::Buy { quantity, price } => (
            TransactionKind::Buy,
            Decimal::from(quantity),
            Decimal::from(price),
            Decimal::from(quantity * price),
        ),
        Op::Sell { quantity, price } => (
            TransactionKind::Sell,
            Decimal::from(quantity),
            Decimal::from(price),
            Decimal::from(quantity * price),
        ),
        Op::Dividend { amount } => (
            TransactionKind::Dividend,
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::from(amount),
        ),
    };
    let date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap() + chrono::Duration::days(key as i64);
    TransactionCommand {
        owner: "alice".to_string(),
        symbol: "VTI".to_string(),
        name: None,
        investment_kind: None,
        external_key: format!("k-{}", key),
        kind,
        quantity,
        unit_price: price,
        amount,
        fee: Decimal::ONE,
        currency: "USD".to_string(),
        date,
        notes: None,
    }
}

fn processor(retries: u32) -> TransactionProcessor<InMemoryEventLog> {
    TransactionProcessor::new(
        InMemoryEventLog::new(),
        ProcessorConfig {
            max_append_retries: retries,
        },
    )
}

proptest! {
    #[test]
    fn replay_matches_processor_state(ops in prop::collection::vec(op(), 1..40)) {
        let processor = processor(3);
        let mut held = Decimal::ZERO;
        for (key, op) in ops.iter().enumerate() {
            let command = command(key, op);
            match processor.handle(&command) {
                Ok(Outcome::Recorded(_)) => match command.kind {
                    TransactionKind::Buy => held += command.quantity,
                    TransactionKind::Sell => held -= command.quantity,
                    _ => {}
                },
                Ok(Outcome::Duplicate(_)) => prop_assert!(false, "fresh key reported as duplicate"),
                Err(Rejection::InsufficientQuantity { .. }) | Err(Rejection::InvalidDividend(_))
                | Err(Rejection::UnknownInvestment(_)) => {}
                Err(other) => prop_assert!(false, "unexpected rejection: {}", other),
            }
        }

        let log = processor.log();
        let mut total = Decimal::ZERO;
        for id in log.investment_ids().unwrap() {
            let events = log.read_all(&id).unwrap();
            let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
            let expected: Vec<u64> = (1..=events.len() as u64).collect();
            prop_assert_eq!(sequences, expected);

            let replayed = project(&events);
            prop_assert_eq!(&replayed, &project(&events));
            prop_assert_eq!(&replayed, &processor.state(&id).unwrap());
            prop_assert!(replayed.quantity >= Decimal::ZERO);
            prop_assert!(replayed.average_cost >= Decimal::ZERO);
            total += replayed.quantity;
        }
        prop_assert_eq!(total, held);
    }

    #[test]
    fn resubmitting_never_appends(ops in prop::collection::vec(op(), 1..20)) {
        let processor = processor(3);
        for (key, op) in ops.iter().enumerate() {
            let _ = processor.handle(&command(key, op));
        }
        let before: Vec<_> = processor
            .log()
            .investment_ids()
            .unwrap()
            .iter()
            .map(|id| processor.log().read_all(id).unwrap())
            .collect();

        for (key, op) in ops.iter().enumerate() {
            if let Ok(outcome) = processor.handle(&command(key, op)) {
                prop_assert!(outcome.is_duplicate());
            }
        }
        let after: Vec<_> = processor
            .log()
            .investment_ids()
            .unwrap()
            .iter()
            .map(|id| processor.log().read_all(id).unwrap())
            .collect();
        prop_assert_eq!(before, after);
    }
}

#[test]
fn concurrent_buys_all_land() {
    let processor = processor(32);
    thread::scope(|s| {
        for worker in 0..8 {
            let processor = &processor;
            s.spawn(move || {
                for n in 0..5 {
                    let key = worker * 100 + n;
                    let outcome = processor
                        .handle(&command(key, &Op::Buy { quantity: 1, price: 10 }))
                        .unwrap();
                    assert!(!outcome.is_duplicate());
                }
            });
        }
    });

    let id = InvestmentId::lineage("alice", "VTI", 1);
    let events = processor.log().read_all(&id).unwrap();
    // one creation plus forty buys, in a single lineage
    assert_eq!(events.len(), 41);
    assert_eq!(processor.log().investment_ids().unwrap(), vec![id.clone()]);
    assert_eq!(processor.state(&id).unwrap().quantity, Decimal::from(40));
}

#[test]
fn concurrent_resubmission_records_once() {
    let processor = processor(32);
    let command = command(7, &Op::Buy { quantity: 3, price: 50 });

    let outcomes: Vec<Outcome> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| processor.handle(&command).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let recorded = outcomes.iter().filter(|o| !o.is_duplicate()).count();
    assert_eq!(recorded, 1);
    let ids = processor.log().investment_ids().unwrap();
    assert_eq!(ids.len(), 1);
    assert_eq!(processor.log().read_all(&ids[0]).unwrap().len(), 2);
}

#[test]
fn sold_out_position_reopens_as_new_lineage() {
    let processor = processor(3);
    processor
        .handle(&command(1, &Op::Buy { quantity: 5, price: 10 }))
        .unwrap();
    processor
        .handle(&command(2, &Op::Sell { quantity: 5, price: 12 }))
        .unwrap();
    processor
        .handle(&command(3, &Op::Buy { quantity: 2, price: 11 }))
        .unwrap();

    let first = processor
        .state(&InvestmentId::lineage("alice", "VTI", 1))
        .unwrap();
    let second = processor
        .state(&InvestmentId::lineage("alice", "VTI", 2))
        .unwrap();
    assert!(!first.is_active());
    assert!(second.is_active());
    assert_eq!(second.quantity, Decimal::from(2));

    // a key from the closed lineage is still a duplicate
    let again = processor
        .handle(&command(1, &Op::Buy { quantity: 5, price: 10 }))
        .unwrap();
    assert!(again.is_duplicate());
}

#[test]
fn two_processors_on_one_ledger_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    let config = ProcessorConfig {
        max_append_retries: 3,
    };
    let first = TransactionProcessor::new(JsonFileEventLog::open(&path).unwrap(), config.clone());
    let second = TransactionProcessor::new(JsonFileEventLog::open(&path).unwrap(), config);

    let mut aapl = command(1, &Op::Buy { quantity: 2, price: 100 });
    aapl.symbol = "AAPL".to_string();
    let mut msft = command(2, &Op::Buy { quantity: 3, price: 300 });
    msft.symbol = "MSFT".to_string();

    assert!(!first.handle(&aapl).unwrap().is_duplicate());
    assert!(!second.handle(&msft).unwrap().is_duplicate());
    // the second handle never saw this key, but the file did
    assert!(second.handle(&aapl).unwrap().is_duplicate());

    let reopened = JsonFileEventLog::open(&path).unwrap();
    let ids = reopened.investment_ids().unwrap();
    assert_eq!(
        ids,
        vec![
            InvestmentId::lineage("alice", "AAPL", 1),
            InvestmentId::lineage("alice", "MSFT", 1)
        ]
    );
    let aapl_events = reopened
        .read_all(&InvestmentId::lineage("alice", "AAPL", 1))
        .unwrap();
    assert_eq!(project(&aapl_events).quantity, Decimal::from(2));
}
